//! Ordered fallback strategies.
//!
//! Each resolver is a list of strategies that may or may not produce a value.
//! `TryChain` runs them in order and stops at the first `Some`. Steps are
//! plain futures, so a step that is never reached is never polled and does no
//! I/O.

use futures::future::BoxFuture;
use tracing::debug;

/// Ordered list of named, lazily evaluated strategies.
pub struct TryChain<'a, T> {
    label: &'static str,
    steps: Vec<(&'static str, BoxFuture<'a, Option<T>>)>,
}

impl<'a, T: Send + 'a> TryChain<'a, T> {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            steps: Vec::new(),
        }
    }

    /// Append a strategy.
    pub fn then<F>(mut self, name: &'static str, step: F) -> Self
    where
        F: std::future::Future<Output = Option<T>> + Send + 'a,
    {
        self.steps.push((name, Box::pin(step)));
        self
    }

    /// Number of strategies in the chain
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run strategies in order; the first `Some` wins.
    pub async fn run(self) -> Option<T> {
        self.run_named().await.map(|(_, value)| value)
    }

    /// Like [`run`](Self::run), also reporting which strategy succeeded.
    pub async fn run_named(self) -> Option<(&'static str, T)> {
        let label = self.label;
        for (name, step) in self.steps {
            debug!(chain = label, step = name, "Trying strategy");
            if let Some(value) = step.await {
                debug!(chain = label, step = name, "Strategy succeeded");
                return Some((name, value));
            }
        }
        debug!(chain = label, "All strategies exhausted");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_first_success_wins() {
        let chain = TryChain::new("test")
            .then("none", async { None })
            .then("one", async { Some(1) })
            .then("two", async { Some(2) });
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.run_named().await, Some(("one", 1)));
    }

    #[tokio::test]
    async fn test_later_steps_not_polled() {
        let polled = AtomicUsize::new(0);
        let result = TryChain::new("lazy")
            .then("hit", async { Some("a") })
            .then("never", async {
                polled.fetch_add(1, Ordering::SeqCst);
                Some("b")
            })
            .run()
            .await;
        assert_eq!(result, Some("a"));
        assert_eq!(polled.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exhausted_chain() {
        let chain: TryChain<'_, u32> = TryChain::new("empty");
        assert!(chain.is_empty());
        assert_eq!(chain.run().await, None);

        let result = TryChain::new("misses")
            .then("a", async { None::<u32> })
            .then("b", async { None })
            .run()
            .await;
        assert_eq!(result, None);
    }
}

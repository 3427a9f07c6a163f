//! # scholarleads
//!
//! Academic lead generation: Google Scholar profiles found through Custom
//! Search are qualified on citation metrics, then enriched with a Wikipedia
//! page, a homepage and a contact email, and written to partitioned CSVs.
//!
//! ## Modules
//!
//! - [`normalize`] - Name and markup cleanup
//! - [`metrics`] - Citation/h-index extraction and qualification policy
//! - [`matcher`] - Person name vs. candidate label matching
//! - [`chain`] - Ordered fallback strategies
//! - [`cse`] - Google Custom Search client
//! - [`wikipedia`] - Wikipedia page resolution
//! - [`homepage`] - Scholar profile page reading
//! - [`email`] - Contact email discovery
//! - [`review`] - Optional LLM article review
//! - [`resolver`] - Per-result orchestration
//! - [`assembler`] - Deduplicated, partitioned CSV output
//! - [`batch`] - Enrichment of existing lead CSVs
//! - [`cookies`] - Cookie persistence
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use scholarleads::matcher::NameMatcher;
//! use scholarleads::wikipedia::WikipediaResolver;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let resolver = WikipediaResolver::new(NameMatcher::default(), 20)?;
//!     let page = resolver.resolve("George Church").await;
//!     println!("{}", page.url_cell());
//!     Ok(())
//! }
//! ```

pub mod assembler;
pub mod batch;
pub mod chain;
pub mod config;
pub mod cookies;
pub mod cse;
pub mod email;
pub mod error;
pub mod fetch;
pub mod homepage;
pub mod matcher;
pub mod metrics;
pub mod normalize;
pub mod profile;
pub mod prompts;
pub mod resolver;
pub mod review;
pub mod wikipedia;

pub use error::{LeadsError, Result};

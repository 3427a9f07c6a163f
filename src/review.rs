//! LLM review of Wikipedia articles.
//!
//! Sends an article's wikitext to an OpenAI-compatible chat completion
//! endpoint and parses the labelled answer into an [`ArticleReview`]. Token
//! usage accumulates across the run and is appended to a log file at the end.

use crate::config::LlmConfig;
use crate::error::{LeadsError, Result};
use crate::fetch::{build_http_client, check_status};
use crate::prompts::article_review::{build_user_prompt, SYSTEM_PROMPT};
use crate::wikipedia::ArticleDigest;
use serde::Deserialize;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Default log file for token usage
pub const USAGE_LOG_FILE: &str = "llm_token_usage.log";

const NO_WARNINGS: &str = "No warnings detected";

/// Parsed review of one article
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleReview {
    pub summary: String,
    pub missing_sections: String,
    pub warnings: String,
    pub overall_assessment: String,
}

impl ArticleReview {
    /// Text for the `info` column
    pub fn to_info(&self) -> String {
        format!(
            "SUMMARY: {} / MISSING: {} / WARNINGS: {} / ASSESSMENT: {}",
            self.summary, self.missing_sections, self.warnings, self.overall_assessment
        )
    }

    /// Fold template warnings found in the wikitext into the model's answer.
    pub fn merge_detected_warnings(&mut self, detected: &[String]) {
        if detected.is_empty() {
            return;
        }
        let detected = detected.join(" and ");
        if self.warnings.is_empty() || self.warnings.eq_ignore_ascii_case(NO_WARNINGS) {
            self.warnings = format!("Wikipedia templates detected: {}", detected);
        } else {
            self.warnings = format!("{} and additional templates: {}", self.warnings, detected);
        }
    }
}

/// Parse the four labelled lines of a review answer.
pub fn parse_review(content: &str) -> ArticleReview {
    let mut review = ArticleReview::default();
    for line in content.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("SUMMARY:") {
            review.summary = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("MISSING_SECTIONS:") {
            review.missing_sections = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("WARNINGS:") {
            review.warnings = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("OVERALL_ASSESSMENT:") {
            review.overall_assessment = rest.trim().to_string();
        }
    }
    review
}

/// Token usage tracking
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Default)]
struct AtomicTokenUsage {
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
    total_tokens: AtomicU64,
    requests: AtomicU64,
}

impl AtomicTokenUsage {
    fn add(&self, usage: &TokenUsage) {
        self.prompt_tokens.fetch_add(usage.prompt_tokens, Ordering::Relaxed);
        self.completion_tokens.fetch_add(usage.completion_tokens, Ordering::Relaxed);
        self.total_tokens.fetch_add(usage.total_tokens, Ordering::Relaxed);
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    fn get(&self) -> TokenUsage {
        TokenUsage {
            prompt_tokens: self.prompt_tokens.load(Ordering::Relaxed),
            completion_tokens: self.completion_tokens.load(Ordering::Relaxed),
            total_tokens: self.total_tokens.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
}

/// Reviews articles through an OpenAI-compatible endpoint
pub struct ArticleReviewer {
    client: reqwest::Client,
    config: LlmConfig,
    usage: AtomicTokenUsage,
}

impl ArticleReviewer {
    pub fn new(config: LlmConfig, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: build_http_client(timeout_secs)?,
            config,
            usage: AtomicTokenUsage::default(),
        })
    }

    /// Usage accumulated so far
    pub fn usage(&self) -> TokenUsage {
        self.usage.get()
    }

    /// Number of completed review requests
    pub fn requests(&self) -> u64 {
        self.usage.requests.load(Ordering::Relaxed)
    }

    pub async fn review(&self, name: &str, digest: &ArticleDigest) -> Result<ArticleReview> {
        let request_body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": build_user_prompt(name, &digest.wikitext)}
            ],
            "temperature": 0.3,
            "max_tokens": 1000
        });

        let api_url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        debug!(name = name, model = %self.config.model, "Sending review request");

        let response = self
            .client
            .post(&api_url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&request_body)
            .send()
            .await?;
        check_status(&response)?;

        let api_response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LeadsError::Parse(format!("Failed to parse LLM response: {}", e)))?;

        if let Some(u) = api_response.usage {
            self.usage.add(&TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            });
        }

        let content = api_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        let mut review = parse_review(&content);
        if review.summary.is_empty() {
            return Err(LeadsError::Parse("Review answer has no SUMMARY line".to_string()));
        }
        review.merge_detected_warnings(&digest.warnings);
        Ok(review)
    }

    /// Append one usage line to `path`. Nothing is written when no request was made.
    pub fn append_usage_log(&self, path: &Path) -> Result<()> {
        if self.requests() == 0 {
            return Ok(());
        }
        let usage = self.usage();
        let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(
            file,
            "{} model={} requests={} prompt_tokens={} completion_tokens={} total_tokens={}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            self.config.model,
            self.requests(),
            usage.prompt_tokens,
            usage.completion_tokens,
            usage.total_tokens
        )?;
        info!(path = %path.display(), total_tokens = usage.total_tokens, "Logged LLM token usage");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    const ANSWER: &str = "SUMMARY: George Church is an American geneticist.\n\
                          MISSING_SECTIONS: Books\n\
                          WARNINGS: No warnings detected\n\
                          OVERALL_ASSESSMENT: Add a Books section";

    #[test]
    fn test_parse_review() {
        let review = parse_review(ANSWER);
        assert_eq!(review.summary, "George Church is an American geneticist.");
        assert_eq!(review.missing_sections, "Books");
        assert_eq!(review.overall_assessment, "Add a Books section");
    }

    #[test]
    fn test_merge_detected_warnings() {
        let mut review = parse_review(ANSWER);
        review.merge_detected_warnings(&["Refimprove".to_string()]);
        assert_eq!(review.warnings, "Wikipedia templates detected: Refimprove");

        review.merge_detected_warnings(&["stub".to_string()]);
        assert!(review.warnings.ends_with("and additional templates: stub"));
    }

    #[test]
    fn test_to_info() {
        let info = parse_review(ANSWER).to_info();
        assert!(info.starts_with("SUMMARY: George Church"));
        assert!(info.contains(" / MISSING: Books / "));
    }

    #[tokio::test]
    async fn test_review_and_usage_log() -> Result<()> {
        let mut server = Server::new_async().await;
        let body = serde_json::json!({
            "choices": [{"message": {"content": ANSWER}}],
            "usage": {"prompt_tokens": 900, "completion_tokens": 100, "total_tokens": 1000}
        });
        let _m = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let reviewer = ArticleReviewer::new(
            LlmConfig {
                base_url: format!("{}/v1/", server.url()),
                api_key: "sk-test".to_string(),
                model: "gpt-4o-mini".to_string(),
            },
            5,
        )?;
        let digest = ArticleDigest {
            title: "George Church".to_string(),
            wikitext: "'''George Church''' {{stub}}".to_string(),
            warnings: vec!["stub".to_string()],
            ..Default::default()
        };

        let review = reviewer.review("George Church", &digest).await?;
        assert_eq!(review.warnings, "Wikipedia templates detected: stub");
        assert_eq!(reviewer.usage().total_tokens, 1000);

        let dir = tempfile::tempdir()?;
        let log = dir.path().join(USAGE_LOG_FILE);
        reviewer.append_usage_log(&log)?;
        let content = std::fs::read_to_string(&log)?;
        assert!(content.contains("requests=1"));
        assert!(content.contains("total_tokens=1000"));
        Ok(())
    }
}

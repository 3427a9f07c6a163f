//! Run configuration: credentials, thresholds and resolver limits.

use crate::error::{LeadsError, Result};
use crate::homepage::ProfileFetch;
use crate::metrics::QualificationPolicy;
use std::path::PathBuf;

/// Search term tuned to surface "Cited by" and "h-index" in Scholar snippets
pub const DEFAULT_SEARCH_TERM: &str = r#"harvard university professor "cited by" "h-index""#;

/// Google CSE credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub api_key: String,
    /// Engine scoped to scholar.google.com
    pub scholar_cx: String,
    /// Whole-web engine used for homepage and email searches
    pub general_cx: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Credentials {
    /// Validate credentials before any processing starts.
    pub fn new(
        api_key: Option<String>,
        scholar_cx: Option<String>,
        general_cx: Option<String>,
    ) -> Result<Self> {
        let api_key = non_blank(api_key)
            .ok_or_else(|| LeadsError::Config("GOOGLE_API_KEY must be set".to_string()))?;
        let scholar_cx = non_blank(scholar_cx).ok_or_else(|| {
            LeadsError::Config(
                "GOOGLE_SCHOLAR_CSE_ID must be set to an engine searching scholar.google.com"
                    .to_string(),
            )
        })?;
        Ok(Self {
            api_key,
            scholar_cx,
            general_cx: non_blank(general_cx),
        })
    }
}

/// Optional OpenAI-compatible endpoint for article reviews.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

/// Everything the pipeline needs besides credentials.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub policy: QualificationPolicy,
    /// Tokens matched against homepage hosts and used in augmented queries
    pub affiliations: Vec<String>,
    pub max_crawl_pages: usize,
    pub profile_fetch: ProfileFetch,
    /// Scholar CSE result pages to walk (10 results each)
    pub max_search_pages: u32,
    pub cse_delay_ms: u64,
    pub wiki_delay_ms: u64,
    /// Ranked Wikipedia candidates validated per query stage
    pub validate_top: usize,
    pub max_augmented_queries: usize,
    pub request_timeout_secs: u64,
    pub output_dir: PathBuf,
    pub llm: Option<LlmConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            policy: QualificationPolicy::default(),
            affiliations: vec!["harvard".to_string()],
            max_crawl_pages: 20,
            profile_fetch: ProfileFetch::default(),
            max_search_pages: 1,
            cse_delay_ms: 500,
            wiki_delay_ms: 200,
            validate_top: 3,
            max_augmented_queries: 4,
            request_timeout_secs: 20,
            output_dir: PathBuf::from("."),
            llm: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credentials_are_config_errors() {
        let err = Credentials::new(None, Some("cx".to_string()), None).unwrap_err();
        assert!(matches!(err, LeadsError::Config(_)));

        let err = Credentials::new(Some("key".to_string()), Some("  ".to_string()), None)
            .unwrap_err();
        assert!(err.to_string().contains("GOOGLE_SCHOLAR_CSE_ID"));
    }

    #[test]
    fn test_blank_general_engine_is_absent() -> Result<()> {
        let creds = Credentials::new(
            Some("key".to_string()),
            Some("scholar".to_string()),
            Some(" ".to_string()),
        )?;
        assert_eq!(creds.scholar_cx, "scholar");
        assert!(creds.general_cx.is_none());
        Ok(())
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_crawl_pages, 20);
        assert_eq!(config.wiki_delay_ms, 200);
        assert_eq!(config.policy.min_citations, 10_000);
        assert_eq!(config.profile_fetch, ProfileFetch::Both);
    }
}

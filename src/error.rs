//! Custom error types for scholarleads.
//!
//! Clients and resolvers return `Result<T, LeadsError>`. The resolver layer
//! turns most of these into fallbacks or sentinels; only configuration errors
//! are meant to reach the top level.

use thiserror::Error;

/// Main error type for scholarleads operations.
#[derive(Debug, Error)]
pub enum LeadsError {
    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Remote endpoint answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Http {
        /// Status code returned by the server
        status: u16,
        /// Requested URL
        url: String,
    },

    /// Page was served but is a sign-in wall, CAPTCHA or otherwise not the expected content
    #[error("Blocked: {0}")]
    Blocked(String),

    /// HTML/JSON/text parsing error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Rate limited by external API
    #[error("Rate limited, retry after {0}s")]
    RateLimited(u64),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error (missing credential, invalid option)
    #[error("Config error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias using `LeadsError`
pub type Result<T> = std::result::Result<T, LeadsError>;

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with a parse error message
    fn ok_or_parse(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_parse(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| LeadsError::Parse(msg.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_or_parse() {
        let some: Option<u32> = Some(3);
        assert_eq!(some.ok_or_parse("missing").ok(), Some(3));

        let none: Option<u32> = None;
        let err = none.ok_or_parse("missing title").unwrap_err();
        assert_eq!(err.to_string(), "Parse error: missing title");
    }

    #[test]
    fn test_http_display() {
        let err = LeadsError::Http {
            status: 403,
            url: "https://scholar.google.com/citations?user=x".to_string(),
        };
        assert!(err.to_string().starts_with("HTTP 403"));
    }
}

//! Persisted Google cookies for direct Scholar profile fetches.
//!
//! Profile pages are far less likely to be served as a sign-in wall when the
//! request carries a browser session's cookies. They are stored as JSON at
//! `~/.scholarleads_cookies.json` and can be imported from a browser export.

use crate::error::{LeadsError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const COOKIE_FILE_NAME: &str = ".scholarleads_cookies.json";

/// Default cookie file path: `~/.scholarleads_cookies.json`
fn default_cookie_path() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|p| p.join(COOKIE_FILE_NAME))
        .ok_or_else(|| LeadsError::Config("Cannot determine home directory".to_string()))
}

/// Cookie entry. Accepts both snake_case and browser-export field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default, alias = "httpOnly")]
    pub http_only: bool,
    #[serde(default, alias = "expirationDate")]
    pub expires: Option<f64>,
}

impl Cookie {
    fn is_google(&self) -> bool {
        self.domain.contains("google")
    }
}

/// Build a `Cookie` header value from the Google cookies in a list
pub fn build_cookie_header(cookies: &[Cookie]) -> String {
    cookies
        .iter()
        .filter(|c| c.is_google())
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Loads and saves the cookie file
pub struct CookieManager {
    path: PathBuf,
}

impl CookieManager {
    pub fn new() -> Result<Self> {
        Ok(Self {
            path: default_cookie_path()?,
        })
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load cookies from file
    ///
    /// Returns empty vec if file doesn't exist or is invalid
    pub fn load(&self) -> Vec<Cookie> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "Cookie file not found");
            return Vec::new();
        }

        match std::fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str::<Vec<Cookie>>(&content) {
                Ok(cookies) => {
                    info!(count = cookies.len(), path = %self.path.display(), "Loaded cookies");
                    cookies
                }
                Err(e) => {
                    warn!(error = %e, "Failed to parse cookies");
                    Vec::new()
                }
            },
            Err(e) => {
                warn!(error = %e, "Failed to read cookie file");
                Vec::new()
            }
        }
    }

    /// Header value for requests to Google hosts; empty when no cookies are stored
    pub fn cookie_header(&self) -> String {
        build_cookie_header(&self.load())
    }

    pub fn save(&self, cookies: &[Cookie]) -> Result<()> {
        let content = serde_json::to_string_pretty(cookies)?;
        std::fs::write(&self.path, content)?;
        info!(count = cookies.len(), path = %self.path.display(), "Saved cookies");
        Ok(())
    }

    /// Import a browser cookie export, keeping only Google cookies.
    ///
    /// Returns the number of cookies stored.
    pub fn import(&self, export: &Path) -> Result<usize> {
        let content = std::fs::read_to_string(export)?;
        let cookies: Vec<Cookie> = serde_json::from_str(&content)?;
        let google: Vec<Cookie> = cookies.into_iter().filter(Cookie::is_google).collect();
        if google.is_empty() {
            return Err(LeadsError::Validation(format!(
                "No Google cookies found in {}",
                export.display()
            )));
        }
        self.save(&google)?;
        Ok(google.len())
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
            info!(path = %self.path.display(), "Cleared cookies");
        }
        Ok(())
    }
}

impl Default for CookieManager {
    fn default() -> Self {
        Self::new().unwrap_or_else(|_| Self {
            path: PathBuf::from(COOKIE_FILE_NAME),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn cookie(name: &str, domain: &str) -> Cookie {
        Cookie {
            name: name.to_string(),
            value: format!("{name}-value"),
            domain: domain.to_string(),
            path: "/".to_string(),
            secure: true,
            http_only: false,
            expires: None,
        }
    }

    #[test]
    fn test_load_missing_file() {
        let manager = CookieManager::with_path(PathBuf::from("/nonexistent/path"));
        assert!(manager.load().is_empty());
        assert_eq!(manager.cookie_header(), "");
    }

    #[test]
    fn test_save_and_header() -> Result<()> {
        let temp = NamedTempFile::new()?;
        let manager = CookieManager::with_path(temp.path().to_path_buf());

        manager.save(&[cookie("NID", ".google.com"), cookie("other", ".example.com")])?;
        assert_eq!(manager.load().len(), 2);
        assert_eq!(manager.cookie_header(), "NID=NID-value");
        Ok(())
    }

    #[test]
    fn test_import_browser_export() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let export = dir.path().join("export.json");
        std::fs::write(
            &export,
            r#"[
                {"name": "SID", "value": "s", "domain": ".google.com", "httpOnly": true, "expirationDate": 1893456000.0},
                {"name": "x", "value": "y", "domain": "example.org"}
            ]"#,
        )?;

        let manager = CookieManager::with_path(dir.path().join("cookies.json"));
        assert_eq!(manager.import(&export)?, 1);
        let loaded = manager.load();
        assert!(loaded[0].http_only);
        assert_eq!(loaded[0].expires, Some(1893456000.0));

        manager.clear()?;
        assert!(manager.load().is_empty());
        Ok(())
    }

    #[test]
    fn test_import_without_google_cookies() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let export = dir.path().join("export.json");
        std::fs::write(&export, r#"[{"name": "x", "value": "y", "domain": "example.org"}]"#)?;

        let manager = CookieManager::with_path(dir.path().join("cookies.json"));
        assert!(matches!(
            manager.import(&export),
            Err(LeadsError::Validation(_))
        ));
        Ok(())
    }
}

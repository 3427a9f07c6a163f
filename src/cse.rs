//! Google Custom Search JSON API client.
//!
//! One client serves both engines: the Scholar-scoped engine used to find
//! profiles and the optional whole-web engine used by the homepage and email
//! fallbacks. Every text field is passed through [`clean_unicode`] on the way in.

use crate::error::{LeadsError, Result};
use crate::fetch::{build_http_client, check_status};
use crate::normalize::clean_unicode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Default Custom Search endpoint
pub const DEFAULT_CSE_URL: &str = "https://www.googleapis.com/customsearch/v1";

/// Maximum results per request allowed by the API
pub const PAGE_SIZE: u32 = 10;

/// A single search result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub link: String,
}

impl SearchItem {
    fn cleaned(self) -> Self {
        Self {
            title: clean_unicode(&self.title),
            snippet: clean_unicode(&self.snippet),
            link: self.link.trim().to_string(),
        }
    }

    /// Title, snippet and link joined for pattern scans
    pub fn combined_text(&self) -> String {
        format!("{} {} {}", self.snippet, self.title, self.link)
    }
}

#[derive(Debug, Deserialize)]
struct CseResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

/// Custom Search client
pub struct CseClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    delay: Duration,
}

impl CseClient {
    pub fn new(api_key: &str, timeout_secs: u64, delay_ms: u64) -> Result<Self> {
        Ok(Self {
            client: build_http_client(timeout_secs)?,
            api_key: api_key.to_string(),
            base_url: DEFAULT_CSE_URL.to_string(),
            delay: Duration::from_millis(delay_ms),
        })
    }

    /// Point the client at a different endpoint
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Courtesy delay between successive queries
    pub async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }

    fn build_search_url(&self, cx: &str, query: &str, num: u32, start: u32) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| LeadsError::Config(format!("Invalid CSE base URL: {}", e)))?;

        {
            let mut params = url.query_pairs_mut();
            params.append_pair("key", &self.api_key);
            params.append_pair("cx", cx);
            params.append_pair("q", query);
            params.append_pair("num", &num.clamp(1, PAGE_SIZE).to_string());
            if start > 1 {
                params.append_pair("start", &start.to_string());
            }
        }

        Ok(url)
    }

    /// Run one query. `start` is the 1-based index of the first result.
    pub async fn search(&self, cx: &str, query: &str, num: u32, start: u32) -> Result<Vec<SearchItem>> {
        let url = self.build_search_url(cx, query, num, start)?;
        debug!(query = query, start = start, "CSE query");

        let response = self.client.get(url.as_str()).send().await?;
        check_status(&response)?;

        let data: CseResponse = response
            .json()
            .await
            .map_err(|e| LeadsError::Parse(format!("Failed to parse CSE response: {}", e)))?;

        Ok(data.items.into_iter().map(SearchItem::cleaned).collect())
    }

    /// Walk up to `max_pages` result pages in order.
    ///
    /// Stops early on an empty or short page, or on the first failed request.
    pub async fn search_pages(&self, cx: &str, query: &str, max_pages: u32) -> Vec<SearchItem> {
        let mut all_items = Vec::new();

        for page in 0..max_pages {
            if page > 0 {
                self.pause().await;
            }
            let start = page * PAGE_SIZE + 1;

            match self.search(cx, query, PAGE_SIZE, start).await {
                Ok(items) => {
                    let count = items.len();
                    info!(page = page + 1, count = count, "Fetched search results");
                    all_items.extend(items);
                    if count < PAGE_SIZE as usize {
                        break;
                    }
                }
                Err(e) => {
                    warn!(page = page + 1, error = %e, "Search request failed");
                    break;
                }
            }
        }

        all_items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn items_body(count: usize) -> String {
        let items: Vec<serde_json::Value> = (0..count)
            .map(|i| {
                serde_json::json!({
                    "title": format!("\u{202A}Person {i}\u{202C} - \u{202A}Google Scholar\u{202C}"),
                    "snippet": "Harvard University - Cited by 12,345",
                    "link": format!("https://scholar.google.com/citations?user={i}"),
                })
            })
            .collect();
        serde_json::json!({ "items": items }).to_string()
    }

    #[test]
    fn test_build_search_url() -> Result<()> {
        let client = CseClient::new("k", 5, 0)?;
        let url = client.build_search_url("cx1", "harvard professor", 10, 11)?;
        assert!(url.as_str().starts_with(DEFAULT_CSE_URL));
        assert!(url.as_str().contains("q=harvard+professor"));
        assert!(url.as_str().contains("start=11"));

        let url = client.build_search_url("cx1", "q", 50, 1)?;
        assert!(url.as_str().contains("num=10"));
        assert!(!url.as_str().contains("start="));
        Ok(())
    }

    #[tokio::test]
    async fn test_search_cleans_fields() -> Result<()> {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/")
            .match_query(Matcher::UrlEncoded("cx".into(), "scholar".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(items_body(2))
            .create_async()
            .await;

        let client = CseClient::new("k", 5, 0)?.with_base_url(&server.url());
        let items = client.search("scholar", "q", 10, 1).await?;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Person 0 - Google Scholar");
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_items_is_empty() -> Result<()> {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"searchInformation": {"totalResults": "0"}}"#)
            .create_async()
            .await;

        let client = CseClient::new("k", 5, 0)?.with_base_url(&server.url());
        assert!(client.search("cx", "q", 10, 1).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_pagination_stops_on_short_page() -> Result<()> {
        let mut server = Server::new_async().await;
        let first = server
            .mock("GET", "/")
            .match_query(Matcher::Regex("num=10$".into()))
            .with_status(200)
            .with_body(items_body(10))
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("GET", "/")
            .match_query(Matcher::UrlEncoded("start".into(), "11".into()))
            .with_status(200)
            .with_body(items_body(3))
            .expect(1)
            .create_async()
            .await;

        let client = CseClient::new("k", 5, 0)?.with_base_url(&server.url());
        let items = client.search_pages("cx", "q", 5).await;
        assert_eq!(items.len(), 13);
        first.assert_async().await;
        second.assert_async().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_pagination_stops_on_error() -> Result<()> {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/")
            .match_query(Matcher::Any)
            .with_status(403)
            .create_async()
            .await;

        let client = CseClient::new("k", 5, 0)?.with_base_url(&server.url());
        assert!(client.search_pages("cx", "q", 3).await.is_empty());
        Ok(())
    }
}

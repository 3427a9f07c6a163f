//! Shared HTTP plumbing: client construction and browser-like page fetches.

use crate::error::{LeadsError, Result};
use std::time::Duration;
use tracing::debug;

/// User agent string for requests
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Build an HTTP client with the browser user agent and a request timeout
pub fn build_http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(timeout_secs))
        .cookie_store(true)
        .build()
        .map_err(|e| LeadsError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Map a non-success status to an error.
pub fn check_status(response: &reqwest::Response) -> Result<()> {
    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(LeadsError::RateLimited(60));
    }
    if !status.is_success() {
        return Err(LeadsError::Http {
            status: status.as_u16(),
            url: response.url().to_string(),
        });
    }
    Ok(())
}

/// Fetch a page the way a browser navigation would, optionally with cookies.
pub async fn fetch_page_with_cookies(
    client: &reqwest::Client,
    url: &str,
    cookie_header: &str,
) -> Result<String> {
    let mut request = client
        .get(url)
        .header(
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        )
        .header("Accept-Language", "en-US,en;q=0.9")
        .header("Cache-Control", "no-cache")
        .header("Pragma", "no-cache")
        .header("Sec-Fetch-Dest", "document")
        .header("Sec-Fetch-Mode", "navigate")
        .header("Sec-Fetch-Site", "none")
        .header("Sec-Fetch-User", "?1")
        .header("Upgrade-Insecure-Requests", "1");

    if !cookie_header.is_empty() {
        request = request.header("Cookie", cookie_header);
    }

    let response = request.send().await?;
    check_status(&response)?;

    let body = response.text().await?;
    debug!(url = url, bytes = body.len(), "Fetched page");
    Ok(body)
}

/// Fetch a page without cookies
pub async fn fetch_page(client: &reqwest::Client, url: &str) -> Result<String> {
    fetch_page_with_cookies(client, url, "").await
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[tokio::test]
    async fn test_fetch_sends_cookie_header() -> Result<()> {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/page")
            .match_header("cookie", "NID=abc")
            .with_status(200)
            .with_body("<html>ok</html>")
            .create_async()
            .await;

        let client = build_http_client(5)?;
        let url = format!("{}/page", server.url());
        let body = fetch_page_with_cookies(&client, &url, "NID=abc").await?;
        assert_eq!(body, "<html>ok</html>");
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_status_errors() -> Result<()> {
        let mut server = Server::new_async().await;
        let _missing = server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;
        let _limited = server
            .mock("GET", "/limited")
            .with_status(429)
            .create_async()
            .await;

        let client = build_http_client(5)?;
        let err = fetch_page(&client, &format!("{}/missing", server.url()))
            .await
            .unwrap_err();
        assert!(matches!(err, LeadsError::Http { status: 404, .. }));

        let err = fetch_page(&client, &format!("{}/limited", server.url()))
            .await
            .unwrap_err();
        assert!(matches!(err, LeadsError::RateLimited(_)));
        Ok(())
    }
}

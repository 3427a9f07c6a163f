//! Scholar profile page fetch and homepage extraction.
//!
//! A profile page is read directly (browser headers plus stored cookies) or
//! through a plain-text mirror. From whichever copy is readable we take the
//! "Homepage" link, the affiliation line and the h-index. When the profile has
//! no homepage link, the first allow-listed external URL on the page is used.

use crate::chain::TryChain;
use crate::error::{LeadsError, Result};
use crate::fetch::{build_http_client, fetch_page, fetch_page_with_cookies};
use crate::metrics::extract_h_index;
use crate::normalize::collapse_whitespace;
use crate::profile::Resolution;
use regex::Regex;
use scraper::{Html, Selector};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Plain-text rendering service; the target URL is appended verbatim
pub const DEFAULT_MIRROR_URL: &str = "https://r.jina.ai/";

/// Marker present on every real Scholar profile page
const PROFILE_MARKER: &str = "gsc_prf";

const BLOCK_CUES: &[&str] = &[
    "unusual traffic",
    "solving the above captcha",
    "not a robot",
    "<title>sign in",
    "/sorry/index",
];

/// Host or path fragments typical of personal and academic pages
const PATH_ALLOW_LIST: &[&str] = &[
    "/faculty/",
    "/people/",
    "/~",
    "lab",
    "research",
    "/staff/",
    "/profile",
    "/person/",
    "/directory/",
    "/home",
];

const DOC_EXTENSIONS: &[&str] = &[
    ".pdf", ".doc", ".docx", ".ppt", ".pptx", ".xls", ".xlsx", ".zip", ".ps",
];

const NEWS_PATTERNS: &[&str] = &["/news", "/press", "/article", "/story", "/blog", "/events"];

const EXCLUDED_HOSTS: &[&str] = &["google.", "gstatic.", "googleusercontent.", "r.jina.ai"];

static MARKDOWN_HOMEPAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[\s*homepage\s*\]\(\s*(https?://[^)\s]+)\s*\)").expect("valid homepage regex")
});

static BARE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s)\]"'<>]+"#).expect("valid url regex")
});

/// How profile pages are fetched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProfileFetch {
    Direct,
    Mirror,
    #[default]
    Both,
    Disabled,
}

impl ProfileFetch {
    pub fn uses_direct(self) -> bool {
        matches!(self, ProfileFetch::Direct | ProfileFetch::Both)
    }

    pub fn uses_mirror(self) -> bool {
        matches!(self, ProfileFetch::Mirror | ProfileFetch::Both)
    }
}

impl FromStr for ProfileFetch {
    type Err = LeadsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "direct" => Ok(ProfileFetch::Direct),
            "mirror" | "text" => Ok(ProfileFetch::Mirror),
            "both" => Ok(ProfileFetch::Both),
            "disabled" | "off" | "none" => Ok(ProfileFetch::Disabled),
            other => Err(LeadsError::Config(format!(
                "Unknown profile fetch strategy '{}': expected direct, mirror, both or disabled",
                other
            ))),
        }
    }
}

impl fmt::Display for ProfileFetch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProfileFetch::Direct => "direct",
            ProfileFetch::Mirror => "mirror",
            ProfileFetch::Both => "both",
            ProfileFetch::Disabled => "disabled",
        };
        f.write_str(name)
    }
}

/// Facts read off a profile page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileFacts {
    pub homepage: Option<String>,
    pub affiliation: Option<String>,
    pub h_index: Option<u64>,
}

fn is_excluded_host(host: &str) -> bool {
    EXCLUDED_HOSTS.iter().any(|h| host.contains(h))
}

/// Strict check for a personal or academic homepage URL.
///
/// External http(s) URL whose host or path carries an allow-list fragment and
/// which is neither a document nor a news item.
pub fn is_plausible_homepage(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return false;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }
    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host = host.to_lowercase();
    if is_excluded_host(&host) {
        return false;
    }

    let path = parsed.path().to_lowercase();
    if DOC_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return false;
    }
    if NEWS_PATTERNS.iter().any(|p| path.contains(p)) {
        return false;
    }

    let host_and_path = format!("{}{}", host, path);
    PATH_ALLOW_LIST.iter().any(|p| host_and_path.contains(p))
}

/// Whether a URL is at least an external web page worth crawling
pub fn is_crawlable(url: &str) -> bool {
    Url::parse(url.trim())
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .and_then(|u| u.host_str().map(|h| !is_excluded_host(&h.to_lowercase())))
        .unwrap_or(false)
}

fn host_has_affiliation(url: &str, affiliations: &[String]) -> bool {
    let host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .unwrap_or_default();
    affiliations
        .iter()
        .any(|token| !token.is_empty() && host.contains(&token.to_lowercase()))
}

/// Pick the fallback homepage among candidate URLs.
///
/// Only plausible URLs count. A host carrying an affiliation token wins;
/// otherwise the first plausible URL in page order.
pub fn pick_external_url<I>(urls: I, affiliations: &[String]) -> Option<String>
where
    I: IntoIterator<Item = String>,
{
    let mut plausible: Vec<String> = Vec::new();
    for url in urls {
        let url = url.trim().to_string();
        if is_plausible_homepage(&url) && !plausible.contains(&url) {
            plausible.push(url);
        }
    }

    plausible
        .iter()
        .find(|u| host_has_affiliation(u, affiliations))
        .or_else(|| plausible.first())
        .cloned()
}

/// Whether a directly fetched page is something other than a profile
pub fn is_blocked_page(html: &str) -> bool {
    if !html.contains(PROFILE_MARKER) {
        return true;
    }
    let lower = html.to_lowercase();
    BLOCK_CUES.iter().any(|cue| lower.contains(cue))
}

pub(crate) fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| LeadsError::Parse(e.to_string()))
}

fn resolve_href(base: Option<&Url>, href: &str) -> Option<String> {
    match Url::parse(href) {
        Ok(url) => Some(url.to_string()),
        Err(_) => base.and_then(|b| b.join(href).ok()).map(|u| u.to_string()),
    }
}

/// Parse a directly fetched profile page.
pub fn parse_profile_html(html: &str, page_url: &str, affiliations: &[String]) -> Result<ProfileFacts> {
    let document = Html::parse_document(html);
    let base = Url::parse(page_url).ok();

    let homepage_selector = selector("#gsc_prf_ivh a")?;
    let affiliation_selector = selector(".gsc_prf_il")?;
    let link_selector = selector("a[href]")?;

    let mut homepage = document
        .select(&homepage_selector)
        .filter_map(|a| a.value().attr("href"))
        .find_map(|href| resolve_href(base.as_ref(), href));

    if homepage.is_none() {
        homepage = document
            .select(&link_selector)
            .filter(|a| {
                a.text()
                    .collect::<String>()
                    .trim()
                    .eq_ignore_ascii_case("homepage")
            })
            .filter_map(|a| a.value().attr("href"))
            .find_map(|href| resolve_href(base.as_ref(), href));
    }

    if homepage.is_none() {
        let links = document
            .select(&link_selector)
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| resolve_href(base.as_ref(), href));
        homepage = pick_external_url(links, affiliations);
    }

    let affiliation = document
        .select(&affiliation_selector)
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .find(|text| !text.is_empty());

    let page_text = document.root_element().text().collect::<Vec<_>>().join(" ");

    Ok(ProfileFacts {
        homepage,
        affiliation,
        h_index: extract_h_index(&page_text),
    })
}

/// Parse a plain-text (markdown) mirror rendering of a profile page.
pub fn parse_profile_text(text: &str, affiliations: &[String]) -> ProfileFacts {
    let homepage = MARKDOWN_HOMEPAGE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .or_else(|| {
            let urls = BARE_URL.find_iter(text).map(|m| m.as_str().to_string());
            pick_external_url(urls, affiliations)
        });

    ProfileFacts {
        homepage,
        affiliation: None,
        h_index: extract_h_index(text),
    }
}

/// Reads Scholar profile pages according to a [`ProfileFetch`] strategy
pub struct HomepageResolver {
    client: reqwest::Client,
    strategy: ProfileFetch,
    mirror_base: String,
    cookie_header: String,
    affiliations: Vec<String>,
    max_jitter_ms: u64,
}

impl HomepageResolver {
    pub fn new(
        strategy: ProfileFetch,
        cookie_header: String,
        affiliations: Vec<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        Ok(Self {
            client: build_http_client(timeout_secs)?,
            strategy,
            mirror_base: DEFAULT_MIRROR_URL.to_string(),
            cookie_header,
            affiliations,
            max_jitter_ms: 1500,
        })
    }

    pub fn with_mirror_base(mut self, mirror_base: &str) -> Self {
        self.mirror_base = mirror_base.to_string();
        self
    }

    /// Upper bound of the random pause before each direct fetch
    pub fn with_max_jitter_ms(mut self, max_jitter_ms: u64) -> Self {
        self.max_jitter_ms = max_jitter_ms;
        self
    }

    async fn fetch_direct(&self, profile_url: &str) -> Option<ProfileFacts> {
        if self.max_jitter_ms > 0 {
            let delay = rand::random::<u64>() % (self.max_jitter_ms + 1);
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let html = match fetch_page_with_cookies(&self.client, profile_url, &self.cookie_header).await {
            Ok(html) => html,
            Err(e) => {
                warn!(url = profile_url, error = %e, "Direct profile fetch failed");
                return None;
            }
        };

        if is_blocked_page(&html) {
            warn!(url = profile_url, "Direct profile fetch blocked");
            return None;
        }

        match parse_profile_html(&html, profile_url, &self.affiliations) {
            Ok(facts) => Some(facts),
            Err(e) => {
                warn!(url = profile_url, error = %e, "Failed to parse profile page");
                None
            }
        }
    }

    async fn fetch_mirror(&self, profile_url: &str) -> Option<ProfileFacts> {
        let mirror_url = format!("{}{}", self.mirror_base, profile_url);
        match fetch_page(&self.client, &mirror_url).await {
            Ok(text) if !text.trim().is_empty() => {
                Some(parse_profile_text(&text, &self.affiliations))
            }
            Ok(_) => {
                warn!(url = profile_url, "Mirror returned an empty page");
                None
            }
            Err(e) => {
                warn!(url = profile_url, error = %e, "Mirror profile fetch failed");
                None
            }
        }
    }

    /// Resolve the homepage of a Scholar profile, with the facts read alongside.
    pub async fn resolve(&self, profile_url: &str) -> (Resolution, ProfileFacts) {
        if self.strategy == ProfileFetch::Disabled || profile_url.trim().is_empty() {
            debug!(url = profile_url, "Profile fetch skipped");
            return (Resolution::NotFound, ProfileFacts::default());
        }

        let mut chain = TryChain::new("homepage");
        if self.strategy.uses_direct() {
            chain = chain.then("direct", self.fetch_direct(profile_url));
        }
        if self.strategy.uses_mirror() {
            chain = chain.then("mirror", self.fetch_mirror(profile_url));
        }

        let facts = chain.run().await.unwrap_or_default();
        match &facts.homepage {
            Some(url) => {
                info!(profile = profile_url, homepage = %url, "Found homepage");
                (Resolution::Found(url.clone()), facts)
            }
            None => {
                info!(profile = profile_url, "No homepage found");
                (Resolution::NotFound, facts)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    const PROFILE_HTML: &str = r#"<html><head><title>George Church - Google Scholar</title></head><body>
        <div id="gsc_prf"><div id="gsc_prf_i">
          <div id="gsc_prf_in">George Church</div>
          <div class="gsc_prf_il">Professor of Genetics, Harvard Medical School</div>
          <div class="gsc_prf_il" id="gsc_prf_ivh">Verified email at harvard.edu -
            <a href="http://arep.med.harvard.edu/gmc/" rel="nofollow" class="gsc_prf_ila">Homepage</a></div>
        </div></div>
        <table id="gsc_rsb_st">
          <tr><td class="gsc_rsb_sc1"><a>Citations</a></td><td class="gsc_rsb_std">200004</td></tr>
          <tr><td class="gsc_rsb_sc1"><a>h-index</a></td><td class="gsc_rsb_std">217</td></tr>
        </table></body></html>"#;

    fn harvard() -> Vec<String> {
        vec!["harvard".to_string()]
    }

    #[test]
    fn test_profile_fetch_from_str() -> Result<()> {
        assert_eq!("mirror".parse::<ProfileFetch>()?, ProfileFetch::Mirror);
        assert_eq!("BOTH".parse::<ProfileFetch>()?, ProfileFetch::Both);
        assert!("sometimes".parse::<ProfileFetch>().is_err());
        assert_eq!(ProfileFetch::Disabled.to_string(), "disabled");
        Ok(())
    }

    #[test]
    fn test_is_plausible_homepage() {
        assert!(is_plausible_homepage("https://www.mit.edu/people/jdoe"));
        assert!(is_plausible_homepage("https://churchlab.hms.harvard.edu/"));
        assert!(is_plausible_homepage("https://www.cs.example.edu/~jdoe/"));
        assert!(!is_plausible_homepage("https://x.edu/faculty/cv.pdf"));
        assert!(!is_plausible_homepage("https://x.edu/news/faculty/jdoe"));
        assert!(!is_plausible_homepage("https://scholar.google.com/citations?user=abc"));
        assert!(!is_plausible_homepage("https://gking.harvard.edu/"));
        assert!(!is_plausible_homepage("mailto:jdoe@x.edu"));
        assert!(!is_plausible_homepage("not a url"));
    }

    #[test]
    fn test_pick_prefers_affiliation_host() {
        let urls = [
            "https://scholar.google.com/citations?user=x",
            "https://www.nature.com/articles/abc.pdf",
            "https://news.harvard.edu/gazette/story/x",
            "https://www.mit.edu/people/jdoe",
            "https://gking.harvard.edu/research",
        ]
        .map(String::from);
        assert_eq!(
            pick_external_url(urls.clone(), &harvard()),
            Some("https://gking.harvard.edu/research".to_string())
        );
        assert_eq!(
            pick_external_url(urls, &[]),
            Some("https://www.mit.edu/people/jdoe".to_string())
        );
    }

    #[test]
    fn test_blocked_page() {
        assert!(is_blocked_page("<html><title>Sign in - Google Accounts</title></html>"));
        assert!(is_blocked_page(
            "<div id=gsc_prf>Our systems have detected unusual traffic</div>"
        ));
        assert!(!is_blocked_page(PROFILE_HTML));
    }

    #[test]
    fn test_parse_profile_html() -> Result<()> {
        let facts = parse_profile_html(
            PROFILE_HTML,
            "https://scholar.google.com/citations?user=abc",
            &harvard(),
        )?;
        assert_eq!(facts.homepage.as_deref(), Some("http://arep.med.harvard.edu/gmc/"));
        assert_eq!(
            facts.affiliation.as_deref(),
            Some("Professor of Genetics, Harvard Medical School")
        );
        assert_eq!(facts.h_index, Some(217));
        Ok(())
    }

    #[test]
    fn test_parse_profile_html_fallback_link() -> Result<()> {
        let html = r#"<div id="gsc_prf"><div class="gsc_prf_il">MIT</div>
            <a href="/citations?view_op=list_works">Articles</a>
            <a href="https://press.mit.edu/news/x">News</a>
            <a href="https://www.mit.edu/people/jdoe">Lab page</a></div>"#;
        let facts = parse_profile_html(html, "https://scholar.google.com/citations?user=x", &[])?;
        assert_eq!(facts.homepage.as_deref(), Some("https://www.mit.edu/people/jdoe"));
        assert_eq!(facts.h_index, None);
        Ok(())
    }

    #[test]
    fn test_parse_profile_text() {
        let text = "Title: George Church\n\nHarvard Medical School\n\
                    Verified email at harvard.edu - [Homepage](https://churchlab.hms.harvard.edu/)\n\
                    h-index 217 150";
        let facts = parse_profile_text(text, &harvard());
        assert_eq!(
            facts.homepage.as_deref(),
            Some("https://churchlab.hms.harvard.edu/")
        );
        assert_eq!(facts.h_index, Some(217));

        let plain = "See https://scholar.google.com/x and https://www.mit.edu/people/jdoe).";
        assert_eq!(
            parse_profile_text(plain, &[]).homepage.as_deref(),
            Some("https://www.mit.edu/people/jdoe")
        );
    }

    #[tokio::test]
    async fn test_resolve_falls_back_to_mirror() -> Result<()> {
        let mut server = Server::new_async().await;
        let _direct = server
            .mock("GET", "/citations")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html><title>Sign in</title></html>")
            .create_async()
            .await;
        let _mirror = server
            .mock("GET", Matcher::Regex("^/mirror/".into()))
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("[Homepage](https://churchlab.hms.harvard.edu/) h-index: 217")
            .create_async()
            .await;

        let resolver = HomepageResolver::new(ProfileFetch::Both, String::new(), harvard(), 5)?
            .with_mirror_base(&format!("{}/mirror/", server.url()))
            .with_max_jitter_ms(0);
        let profile_url = format!("{}/citations?user=abc", server.url());
        let (resolution, facts) = resolver.resolve(&profile_url).await;

        assert_eq!(
            resolution,
            Resolution::Found("https://churchlab.hms.harvard.edu/".to_string())
        );
        assert_eq!(facts.h_index, Some(217));
        Ok(())
    }

    #[tokio::test]
    async fn test_resolve_disabled() -> Result<()> {
        let resolver = HomepageResolver::new(ProfileFetch::Disabled, String::new(), vec![], 5)?;
        let (resolution, facts) = resolver
            .resolve("https://scholar.google.com/citations?user=abc")
            .await;
        assert_eq!(resolution, Resolution::NotFound);
        assert_eq!(facts, ProfileFacts::default());
        Ok(())
    }
}

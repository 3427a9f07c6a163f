//! Contact email discovery.
//!
//! A homepage is crawled breadth-first within its own host; every page is
//! scanned for addresses in raw HTML, visible text, `mailto:` links and
//! spelled-out forms such as `jdoe [at] fas [dot] harvard [dot] edu`. When a
//! general-web search engine is configured it is used both to re-derive a
//! homepage and, as a last resort, to read addresses off result snippets.

use crate::chain::TryChain;
use crate::cse::CseClient;
use crate::error::Result;
use crate::fetch::{build_http_client, fetch_page};
use crate::homepage::{is_crawlable, is_plausible_homepage, selector};
use crate::matcher::NameMatcher;
use crate::normalize::fold_for_matching;
use crate::profile::Resolution;
use regex::Regex;
use scraper::Html;
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::LazyLock;
use tracing::{debug, info, warn};
use url::Url;

const MAX_EMAIL_LEN: usize = 254;

/// TLDs that are really file extensions caught by the pattern
const ASSET_TLDS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "svg", "webp", "js", "css", "pdf", "doc", "ico",
];

const PLACEHOLDER_DOMAINS: &[&str] = &["example.com", "example.org", "domain.com"];

/// Links the crawler never follows
const SKIP_EXTENSIONS: &[&str] = &[
    ".pdf", ".doc", ".docx", ".ppt", ".pptx", ".xls", ".xlsx", ".zip", ".gz", ".ps", ".png",
    ".jpg", ".jpeg", ".gif", ".svg", ".mp4", ".mp3", ".bib",
];

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[A-Za-z]{2,}").expect("valid email regex")
});

static SPACED_EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z0-9._%+-]+\s*@\s*[a-zA-Z0-9.-]+\s*\.[A-Za-z]{2,}").expect("valid spaced email regex")
});

static STRICT_EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$")
        .expect("valid strict email regex")
});

static HEX_HASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-f]{16,}$").expect("valid hash regex"));

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

static DEOBFUSCATIONS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)\s*\(at\)\s*", "@"),
        (r"(?i)\s*\[at\]\s*", "@"),
        (r"(?i)\s+at\s+", "@"),
        (r"(?i)\s*\(dot\)\s*", "."),
        (r"(?i)\s*\[dot\]\s*", "."),
        (r"(?i)\s+dot\s+", "."),
    ]
    .into_iter()
    .map(|(pattern, replacement)| {
        (Regex::new(pattern).expect("valid deobfuscation regex"), replacement)
    })
    .collect()
});

/// Strict address check used before any ranking.
pub fn is_valid_email(email: &str) -> bool {
    if email.len() > MAX_EMAIL_LEN || !STRICT_EMAIL.is_match(email) {
        return false;
    }
    let Some((local, domain)) = email.rsplit_once('@') else {
        return false;
    };
    let local = local.to_lowercase();
    let domain = domain.to_lowercase();

    if local.chars().count() <= 2
        || HEX_HASH.is_match(&local)
        || local.chars().all(|c| c.is_ascii_digit())
        || !local.chars().any(|c| c.is_ascii_alphabetic())
    {
        return false;
    }

    let tld = domain.rsplit('.').next().unwrap_or_default();
    !ASSET_TLDS.contains(&tld) && !PLACEHOLDER_DOMAINS.contains(&domain.as_str())
}

fn deobfuscate(text: &str) -> String {
    DEOBFUSCATIONS
        .iter()
        .fold(text.to_string(), |acc, (re, replacement)| {
            re.replace_all(&acc, *replacement).into_owned()
        })
}

fn keep_valid(found: &mut BTreeSet<String>, candidate: &str) {
    let candidate = candidate.trim().trim_end_matches('.').to_lowercase();
    if is_valid_email(&candidate) {
        found.insert(candidate);
    }
}

/// Addresses in plain text, including spelled-out forms.
pub fn extract_emails_from_text(text: &str) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    for m in EMAIL.find_iter(text) {
        keep_valid(&mut found, m.as_str());
    }
    for m in SPACED_EMAIL.find_iter(&deobfuscate(text)) {
        keep_valid(&mut found, &WHITESPACE.replace_all(m.as_str(), ""));
    }
    found
}

/// Addresses behind a `mailto:` href: percent-decoded, split on `,`/`;`,
/// query string dropped.
pub fn mailto_addresses(href: &str) -> Vec<String> {
    let href = href.trim();
    let Some(rest) = href
        .get(..7)
        .filter(|scheme| scheme.eq_ignore_ascii_case("mailto:"))
        .and_then(|_| href.get(7..))
    else {
        return Vec::new();
    };
    let decoded = urlencoding::decode(rest)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| rest.to_string());

    decoded
        .split([',', ';'])
        .filter_map(|part| part.split('?').next())
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

/// What one crawled page yields
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PageScan {
    pub emails: BTreeSet<String>,
    /// Absolute same-host links, fragments removed
    pub links: Vec<String>,
}

fn is_skipped_link(url: &Url) -> bool {
    let path = url.path().to_lowercase();
    SKIP_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Scan one HTML page for addresses and crawlable same-host links.
pub fn scan_page(html: &str, page_url: &str) -> Result<PageScan> {
    let document = Html::parse_document(html);
    let link_selector = selector("a[href]")?;

    let mut emails = extract_emails_from_text(html);
    let text = document.root_element().text().collect::<Vec<_>>().join(" ");
    emails.extend(extract_emails_from_text(&text));

    let base = Url::parse(page_url).ok();
    let host = base.as_ref().and_then(|b| b.host_str().map(str::to_lowercase));
    let mut links = Vec::new();

    for href in document.select(&link_selector).filter_map(|a| a.value().attr("href")) {
        let mailto = mailto_addresses(href);
        if !mailto.is_empty() {
            for address in mailto {
                keep_valid(&mut emails, &address);
            }
            continue;
        }

        let Some(mut link) = base.as_ref().and_then(|b| b.join(href.trim()).ok()) else {
            continue;
        };
        if !matches!(link.scheme(), "http" | "https") || is_skipped_link(&link) {
            continue;
        }
        if link.host_str().map(str::to_lowercase) != host {
            continue;
        }
        link.set_fragment(None);
        let link = link.to_string();
        if !links.contains(&link) {
            links.push(link);
        }
    }

    Ok(PageScan { emails, links })
}

/// How well an address's local part matches a person's name.
///
/// First and last name each score +10 when contained in the local part, +5
/// for a partial token overlap, +2 for a matching initial. Both names present
/// adds +5; every name token present adds +15.
pub fn name_similarity_score(email: &str, person_name: &str) -> u32 {
    let local = email.split('@').next().unwrap_or_default().to_lowercase();
    let local: String = local
        .chars()
        .map(|c| if matches!(c, '.' | '_' | '-') { ' ' } else { c })
        .collect();
    let local_words: Vec<&str> = local.split_whitespace().collect();

    let folded = fold_for_matching(person_name);
    let tokens: Vec<&str> = folded.split_whitespace().collect();
    let (Some(first), Some(last)) = (tokens.first().copied(), tokens.last().copied()) else {
        return 0;
    };
    let has_last = tokens.len() > 1;

    let partial = |name: &str| {
        local_words
            .iter()
            .any(|w| w.contains(name) || name.contains(w))
    };
    let initial = |name: &str| name.chars().next();

    let exact_first = local.contains(first);
    let partial_first = partial(first);
    let first_initial = initial(first).is_some_and(|c| local.starts_with(c));

    let exact_last = has_last && local.contains(last);
    let partial_last = has_last && partial(last);
    let last_initial = has_last
        && initial(last).is_some_and(|c| local_words.iter().any(|w| w.starts_with(c)));

    let mut score = 0;
    score += if exact_first {
        10
    } else if partial_first {
        5
    } else if first_initial {
        2
    } else {
        0
    };
    score += if exact_last {
        10
    } else if partial_last {
        5
    } else if last_initial {
        2
    } else {
        0
    };
    if (exact_first || partial_first) && (exact_last || partial_last) {
        score += 5;
    }
    if tokens.iter().all(|t| local.contains(t)) {
        score += 15;
    }
    score
}

/// The best-scoring address; ties go to the earliest. Zero scores never win.
pub fn best_email<'a, I>(emails: I, person_name: &str) -> Option<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut best: Option<(&String, u32)> = None;
    for email in emails {
        let score = name_similarity_score(email, person_name);
        debug!(email = %email, score = score, "Scored email");
        if score > 0 && best.map_or(true, |(_, s)| score > s) {
            best = Some((email, score));
        }
    }
    best.map(|(email, _)| email.clone())
}

/// Totals of one crawl
#[derive(Debug, Default)]
pub struct CrawlOutcome {
    pub emails: BTreeSet<String>,
    pub pages_fetched: usize,
    pub failures: usize,
}

impl CrawlOutcome {
    /// Every attempted fetch failed
    pub fn all_failed(&self) -> bool {
        self.pages_fetched == 0 && self.failures > 0
    }
}

struct GeneralSearch {
    client: CseClient,
    cx: String,
}

/// Finds a contact email for a person
pub struct EmailResolver {
    client: reqwest::Client,
    matcher: NameMatcher,
    general: Option<GeneralSearch>,
    affiliations: Vec<String>,
    max_crawl_pages: usize,
}

impl EmailResolver {
    pub fn new(matcher: NameMatcher, max_crawl_pages: usize, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: build_http_client(timeout_secs)?,
            matcher,
            general: None,
            affiliations: Vec::new(),
            max_crawl_pages: max_crawl_pages.max(1),
        })
    }

    /// Enable homepage re-derivation and snippet search through a whole-web engine
    pub fn with_general_search(mut self, client: CseClient, cx: &str) -> Self {
        self.general = Some(GeneralSearch {
            client,
            cx: cx.to_string(),
        });
        self
    }

    pub fn with_affiliations(mut self, affiliations: Vec<String>) -> Self {
        self.affiliations = affiliations;
        self
    }

    /// Breadth-first crawl of `start_url` and same-host links.
    pub async fn crawl(&self, start_url: &str) -> CrawlOutcome {
        let mut outcome = CrawlOutcome::default();
        let mut queue = VecDeque::from([start_url.to_string()]);
        let mut seen: HashSet<String> = HashSet::from([start_url.to_string()]);

        while let Some(url) = queue.pop_front() {
            if outcome.pages_fetched + outcome.failures >= self.max_crawl_pages {
                break;
            }

            let html = match fetch_page(&self.client, &url).await {
                Ok(html) => html,
                Err(e) => {
                    debug!(url = %url, error = %e, "Crawl fetch failed");
                    outcome.failures += 1;
                    continue;
                }
            };
            outcome.pages_fetched += 1;

            let scan = match scan_page(&html, &url) {
                Ok(scan) => scan,
                Err(e) => {
                    warn!(url = %url, error = %e, "Failed to scan page");
                    continue;
                }
            };
            if !scan.emails.is_empty() {
                debug!(url = %url, count = scan.emails.len(), "Found emails");
            }
            outcome.emails.extend(scan.emails);

            for link in scan.links {
                if seen.insert(link.clone()) {
                    queue.push_back(link);
                }
            }
        }

        info!(
            start = start_url,
            pages = outcome.pages_fetched,
            failures = outcome.failures,
            emails = outcome.emails.len(),
            "Crawl finished"
        );
        outcome
    }

    /// Look a homepage up on the general engine.
    async fn rederive_homepage(&self, person_name: &str) -> Option<String> {
        let general = self.general.as_ref()?;
        let query = format!("\"{}\" faculty homepage", person_name);
        general.client.pause().await;

        let items = match general.client.search(&general.cx, &query, 10, 1).await {
            Ok(items) => items,
            Err(e) => {
                warn!(person = person_name, error = %e, "Homepage search failed");
                return None;
            }
        };

        items
            .into_iter()
            .find(|item| {
                is_plausible_homepage(&item.link)
                    && self.matcher.is_match(person_name, &item.title, &item.snippet, &item.link)
            })
            .map(|item| item.link)
    }

    /// Page the crawl starts from, if any.
    async fn start_page(&self, person_name: &str, homepage: Option<&str>) -> Option<String> {
        let mut chain = TryChain::new("email_start");
        if let Some(url) = homepage.filter(|u| is_plausible_homepage(u)) {
            chain = chain.then("homepage", futures::future::ready(Some(url.to_string())));
        }
        if self.general.is_some() {
            chain = chain.then("rederive", self.rederive_homepage(person_name));
        }
        if let Some(url) = homepage.filter(|u| is_crawlable(u)) {
            chain = chain.then("crawlable", futures::future::ready(Some(url.to_string())));
        }
        chain.run().await
    }

    async fn crawl_step(&self, person_name: &str, start_url: &str, failed: &AtomicBool) -> Option<String> {
        let outcome = self.crawl(start_url).await;
        if outcome.all_failed() {
            failed.store(true, Ordering::Relaxed);
        }
        best_email(&outcome.emails, person_name)
    }

    fn snippet_queries(&self, person_name: &str) -> Vec<String> {
        let mut queries = vec![format!("\"{}\" email site:.edu", person_name)];
        if let Some(affiliation) = self.affiliations.first() {
            queries.push(format!("\"{}\" contact email {}", person_name, affiliation));
        }
        queries.push(format!("\"{}\" email faculty profile", person_name));
        queries.push(format!("\"{}\" email contact information", person_name));
        queries
    }

    /// Read addresses off general search results.
    async fn search_snippets(&self, person_name: &str) -> Option<String> {
        let general = self.general.as_ref()?;

        for query in self.snippet_queries(person_name) {
            general.client.pause().await;
            let items = match general.client.search(&general.cx, &query, 10, 1).await {
                Ok(items) => items,
                Err(e) => {
                    warn!(query = %query, error = %e, "Email search failed");
                    continue;
                }
            };

            let found: BTreeSet<String> = items
                .iter()
                .flat_map(|item| extract_emails_from_text(&item.combined_text()))
                .collect();
            if let Some(email) = best_email(&found, person_name) {
                return Some(email);
            }
        }
        None
    }

    /// Resolve a contact email for `person_name`.
    pub async fn resolve(&self, person_name: &str, homepage: Option<&str>) -> Resolution {
        let homepage = homepage.map(str::trim).filter(|h| !h.is_empty());
        if homepage.is_none() && self.general.is_none() {
            debug!(person = person_name, "No homepage and no general search, email not searched");
            return Resolution::NotSearched;
        }

        let start = self.start_page(person_name, homepage).await;
        let crawl_failed = AtomicBool::new(false);

        let mut chain = TryChain::new("email");
        if let Some(start) = start.as_deref() {
            chain = chain.then("crawl", self.crawl_step(person_name, start, &crawl_failed));
        }
        if self.general.is_some() {
            chain = chain.then("search_snippets", self.search_snippets(person_name));
        }

        match chain.run_named().await {
            Some((step, email)) => {
                info!(person = person_name, step = step, email = %email, "Found email");
                Resolution::Found(email)
            }
            None if crawl_failed.load(Ordering::Relaxed) => {
                warn!(person = person_name, "Every crawl fetch failed");
                Resolution::Error
            }
            None => {
                info!(person = person_name, "No email found");
                Resolution::NotFound
            }
        }
    }
}

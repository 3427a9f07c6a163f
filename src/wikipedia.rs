//! Wikipedia page resolution through the MediaWiki and Wikidata APIs.
//!
//! Resolution is split in two stages. [`rank_hits`] orders the hits of one
//! search query by a heuristic score; the validator then looks up the top
//! candidates (following redirects), drops disambiguation and missing pages,
//! applies the name matcher to the resolved title and checks on Wikidata that
//! the page is about a human. Queries run from strict to loose until one
//! stage yields an accepted page.

use crate::chain::TryChain;
use crate::error::{LeadsError, Result};
use crate::fetch::{build_http_client, check_status};
use crate::matcher::{MatchVocabulary, NameMatcher};
use crate::normalize::{collapse_whitespace, fold_for_matching, normalize_name, strip_html_tags, UNKNOWN_NAME};
use crate::profile::Resolution;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// English Wikipedia API endpoint
pub const DEFAULT_WIKI_API_URL: &str = "https://en.wikipedia.org/w/api.php";

/// Wikidata API endpoint
pub const DEFAULT_WIKIDATA_API_URL: &str = "https://www.wikidata.org/w/api.php";

const ARTICLE_BASE_URL: &str = "https://en.wikipedia.org/wiki/";

/// Wikidata item for "human"
const HUMAN_QID: &str = "Q5";

/// Hits requested per search query
const SEARCH_LIMIT: &str = "5";

/// Maintenance templates reported as article warnings
const WARNING_TEMPLATES: &[&str] = &[
    "notability",
    "advert",
    "refimprove",
    "more citations needed",
    "cleanup",
    "unreferenced",
    "primary sources",
    "primarysources",
    "original research",
    "peacock",
    "weasel",
    "disputed",
    "npov",
    "pov",
    "merge",
    "delete",
    "stub",
    "outdated",
    "update",
    "citation needed",
    "verify",
    "unreliable sources",
    "coi",
    "autobiography",
    "unbalanced",
    "one source",
    "orphan",
    "bare urls",
];

static PARENTHETICAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\([^)]*\)\s*$").expect("valid parenthetical regex"));

static TEMPLATE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([^|{}]+?)\s*(?:\||\}\})").expect("valid template regex"));

/// One hit from a MediaWiki full-text search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    /// Snippet with highlight markup removed
    pub snippet: String,
}

/// Score a search hit; higher is a better candidate.
///
/// +2 for a parenthetical disambiguator, +1 per occupation keyword in the
/// snippet, +3 when the first and last name both occur in the base title.
pub fn score_hit(hit: &SearchHit, first: &str, last: &str, vocabulary: &MatchVocabulary) -> usize {
    let mut score = 0;
    if PARENTHETICAL.is_match(&hit.title) {
        score += 2;
    }
    score += vocabulary.occupations_in(&hit.snippet).count();

    let base = fold_for_matching(&PARENTHETICAL.replace(&hit.title, ""));
    if !first.is_empty() && !last.is_empty() && base.contains(first) && base.contains(last) {
        score += 3;
    }
    score
}

/// Order hits by descending score; ties keep search order.
pub fn rank_hits(hits: Vec<SearchHit>, person_name: &str, vocabulary: &MatchVocabulary) -> Vec<SearchHit> {
    let folded = fold_for_matching(person_name);
    let tokens: Vec<&str> = folded.split_whitespace().collect();
    let first = tokens.first().copied().unwrap_or_default();
    let last = tokens.last().copied().unwrap_or_default();

    let mut scored: Vec<(usize, SearchHit)> = hits
        .into_iter()
        .map(|hit| (score_hit(&hit, first, last, vocabulary), hit))
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().map(|(_, hit)| hit).collect()
}

/// Maintenance-template names found in article wikitext, in order of appearance
pub fn extract_warnings(wikitext: &str) -> Vec<String> {
    let mut warnings: Vec<String> = Vec::new();
    for caps in TEMPLATE_NAME.captures_iter(wikitext) {
        let Some(name) = caps.get(1) else { continue };
        let name = collapse_whitespace(name.as_str());
        let lower = name.to_lowercase();
        let is_stub = lower.ends_with("-stub") || lower.ends_with(" stub");
        let is_warning = is_stub || WARNING_TEMPLATES.iter().any(|w| lower == *w);
        if is_warning && !warnings.iter().any(|w| w.eq_ignore_ascii_case(&name)) {
            warnings.push(name);
        }
    }
    warnings
}

/// Article title from a `/wiki/` URL
pub fn title_from_url(url: &str) -> Option<String> {
    let (_, raw) = url.split_once("/wiki/")?;
    let raw = raw.split(['#', '?']).next().unwrap_or_default();
    if raw.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(raw).ok()?;
    Some(decoded.replace('_', " "))
}

fn article_url(title: &str) -> String {
    format!("{}{}", ARTICLE_BASE_URL, title.replace(' ', "_"))
}

/// Per-run cache of resolutions keyed by folded name. Misses are cached too.
#[derive(Debug, Default)]
pub struct LookupCache {
    entries: Mutex<HashMap<String, Option<String>>>,
}

impl LookupCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Option<String>> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    pub fn insert(&self, key: String, value: Option<String>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key, value);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Page facts after redirect resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInfo {
    pub title: String,
    pub url: String,
    pub disambiguation: bool,
    pub missing: bool,
    pub wikibase_item: Option<String>,
}

/// Intro text and maintenance warnings of an accepted article
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleDigest {
    pub title: String,
    pub extract: String,
    pub wikitext: String,
    pub warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    query: Option<ApiQuery>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiQuery {
    #[serde(default)]
    search: Vec<ApiSearchHit>,
    #[serde(default)]
    pages: Vec<ApiPage>,
}

#[derive(Debug, Deserialize)]
struct ApiSearchHit {
    title: String,
    #[serde(default)]
    snippet: String,
}

#[derive(Debug, Deserialize)]
struct ApiPage {
    title: String,
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    invalid: bool,
    #[serde(default)]
    fullurl: Option<String>,
    #[serde(default)]
    pageprops: HashMap<String, serde_json::Value>,
    #[serde(default)]
    extract: String,
    #[serde(default)]
    revisions: Vec<ApiRevision>,
}

#[derive(Debug, Deserialize)]
struct ApiRevision {
    #[serde(default)]
    slots: HashMap<String, ApiSlot>,
}

#[derive(Debug, Deserialize)]
struct ApiSlot {
    #[serde(default)]
    content: String,
}

/// Resolves people to Wikipedia article URLs
pub struct WikipediaResolver {
    client: reqwest::Client,
    api_url: String,
    wikidata_url: String,
    delay: Duration,
    matcher: NameMatcher,
    cache: LookupCache,
    affiliations: Vec<String>,
    validate_top: usize,
    max_augmented_queries: usize,
}

impl WikipediaResolver {
    pub fn new(matcher: NameMatcher, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: build_http_client(timeout_secs)?,
            api_url: DEFAULT_WIKI_API_URL.to_string(),
            wikidata_url: DEFAULT_WIKIDATA_API_URL.to_string(),
            delay: Duration::from_millis(200),
            matcher,
            cache: LookupCache::new(),
            affiliations: Vec::new(),
            validate_top: 3,
            max_augmented_queries: 4,
        })
    }

    pub fn with_api_urls(mut self, api_url: &str, wikidata_url: &str) -> Self {
        self.api_url = api_url.to_string();
        self.wikidata_url = wikidata_url.to_string();
        self
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay = Duration::from_millis(delay_ms);
        self
    }

    pub fn with_affiliations(mut self, affiliations: Vec<String>) -> Self {
        self.affiliations = affiliations;
        self
    }

    pub fn with_limits(mut self, validate_top: usize, max_augmented_queries: usize) -> Self {
        self.validate_top = validate_top.max(1);
        self.max_augmented_queries = max_augmented_queries;
        self
    }

    pub fn cache(&self) -> &LookupCache {
        &self.cache
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str, params: &[(&str, &str)]) -> Result<T> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let response = self.client.get(url).query(params).send().await?;
        check_status(&response)?;
        response
            .json()
            .await
            .map_err(|e| LeadsError::Parse(format!("Failed to parse API response: {}", e)))
    }

    /// Full-text search, highlight markup stripped from snippets
    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let data: ApiResponse = self
            .get_json(
                &self.api_url,
                &[
                    ("action", "query"),
                    ("list", "search"),
                    ("srsearch", query),
                    ("srlimit", SEARCH_LIMIT),
                    ("srprop", "snippet"),
                    ("format", "json"),
                    ("formatversion", "2"),
                ],
            )
            .await?;

        Ok(data
            .query
            .unwrap_or_default()
            .search
            .into_iter()
            .map(|hit| SearchHit {
                title: hit.title,
                snippet: collapse_whitespace(&strip_html_tags(&hit.snippet)),
            })
            .collect())
    }

    /// Look a title up, following redirects
    pub async fn page_info(&self, title: &str) -> Result<Option<PageInfo>> {
        let data: ApiResponse = self
            .get_json(
                &self.api_url,
                &[
                    ("action", "query"),
                    ("titles", title),
                    ("redirects", "1"),
                    ("prop", "pageprops|info"),
                    ("inprop", "url"),
                    ("format", "json"),
                    ("formatversion", "2"),
                ],
            )
            .await?;

        Ok(data.query.unwrap_or_default().pages.into_iter().next().map(|page| {
            let wikibase_item = page
                .pageprops
                .get("wikibase_item")
                .and_then(|v| v.as_str())
                .map(str::to_string);
            PageInfo {
                url: page.fullurl.unwrap_or_else(|| article_url(&page.title)),
                disambiguation: page.pageprops.contains_key("disambiguation"),
                missing: page.missing || page.invalid,
                title: page.title,
                wikibase_item,
            }
        }))
    }

    /// Whether a Wikidata item is an instance of human.
    ///
    /// An item without `instance of` claims is not rejected.
    pub async fn is_human(&self, qid: &str) -> Result<bool> {
        let data: serde_json::Value = self
            .get_json(
                &self.wikidata_url,
                &[
                    ("action", "wbgetentities"),
                    ("ids", qid),
                    ("props", "claims"),
                    ("format", "json"),
                ],
            )
            .await?;

        let claims = data["entities"][qid]["claims"]["P31"].as_array().cloned().unwrap_or_default();
        if claims.is_empty() {
            return Ok(true);
        }
        Ok(claims
            .iter()
            .any(|c| c["mainsnak"]["datavalue"]["value"]["id"].as_str() == Some(HUMAN_QID)))
    }

    /// Confirm one ranked candidate; returns its canonical URL.
    async fn validate(&self, person_name: &str, hit: &SearchHit) -> Option<String> {
        let page = match self.page_info(&hit.title).await {
            Ok(Some(page)) => page,
            Ok(None) => return None,
            Err(e) => {
                warn!(title = %hit.title, error = %e, "Page lookup failed");
                return None;
            }
        };

        if page.missing {
            debug!(title = %hit.title, "Page missing");
            return None;
        }
        if page.disambiguation {
            debug!(title = %page.title, "Rejected disambiguation page");
            return None;
        }
        if !self.matcher.is_match(person_name, &page.title, &hit.snippet, &page.url) {
            debug!(person = person_name, title = %page.title, "Title does not match person");
            return None;
        }

        if let Some(qid) = &page.wikibase_item {
            match self.is_human(qid).await {
                Ok(false) => {
                    debug!(title = %page.title, qid = %qid, "Rejected non-human page");
                    return None;
                }
                Ok(true) => {}
                Err(e) => warn!(qid = %qid, error = %e, "Wikidata check failed, accepting page"),
            }
        }

        Some(page.url)
    }

    /// Search, rank and validate the top candidates of one query.
    async fn try_query(&self, person_name: &str, query: &str) -> Option<String> {
        let hits = match self.search(query).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(query = query, error = %e, "Wikipedia search failed");
                return None;
            }
        };
        if hits.is_empty() {
            return None;
        }

        let ranked = rank_hits(hits, person_name, self.matcher.vocabulary());
        for hit in ranked.iter().take(self.validate_top) {
            if let Some(url) = self.validate(person_name, hit).await {
                return Some(url);
            }
        }
        None
    }

    /// Query stages from strict to loose, without repeats.
    pub fn query_stages(&self, person_name: &str) -> Vec<(&'static str, String)> {
        let name = normalize_name(person_name);
        let tokens: Vec<&str> = name.split_whitespace().collect();
        let mut stages: Vec<(&'static str, String)> = Vec::new();
        let mut push = |stage: &'static str, query: String| {
            if !stages.iter().any(|(_, q)| *q == query) {
                stages.push((stage, query));
            }
        };

        let first_last = match tokens.as_slice() {
            [first, .., last] => format!("{} {}", first, last),
            _ => name.clone(),
        };

        push("unquoted", first_last.clone());
        push("quoted", format!("\"{}\"", first_last));

        if let Some(first) = tokens.first() {
            let last = tokens.last().filter(|_| tokens.len() >= 2);
            for variant in self.matcher.vocabulary().variants_of(first).iter().skip(1) {
                let variant = capitalize(variant);
                let query = match last {
                    Some(last) => format!("\"{} {}\"", variant, last),
                    None => format!("\"{}\"", variant),
                };
                push("alias", query);
            }
        }

        if tokens.len() >= 2 {
            push("full_name", format!("\"{}\"", name));

            let occupations = &self.matcher.vocabulary().occupation_keywords;
            let mut augmented = Vec::new();
            let longest = occupations.len().max(self.affiliations.len());
            for i in 0..longest {
                if let Some(occupation) = occupations.get(i) {
                    augmented.push(format!("\"{}\" {}", first_last, occupation));
                }
                if let Some(affiliation) = self.affiliations.get(i) {
                    augmented.push(format!("\"{}\" {}", first_last, capitalize(affiliation)));
                }
            }
            for query in augmented.into_iter().take(self.max_augmented_queries) {
                push("augmented", query);
            }
        }

        stages
    }

    /// Resolve a person to a Wikipedia URL.
    pub async fn resolve(&self, person_name: &str) -> Resolution {
        let key = fold_for_matching(person_name);
        if key.is_empty() || person_name.trim() == UNKNOWN_NAME {
            return Resolution::NotFound;
        }

        if let Some(cached) = self.cache.get(&key) {
            debug!(person = person_name, "Wikipedia cache hit");
            return cached.map(Resolution::Found).unwrap_or(Resolution::NotFound);
        }

        let stages = self.query_stages(person_name);
        let mut chain = TryChain::new("wikipedia");
        for (stage, query) in &stages {
            chain = chain.then(*stage, self.try_query(person_name, query));
        }

        let result = chain.run_named().await;
        let url = match result {
            Some((stage, url)) => {
                info!(person = person_name, stage = stage, url = %url, "Found Wikipedia page");
                Some(url)
            }
            None => {
                info!(person = person_name, "No Wikipedia page found");
                None
            }
        };

        self.cache.insert(key, url.clone());
        url.map(Resolution::Found).unwrap_or(Resolution::NotFound)
    }

    /// Intro extract, wikitext and maintenance warnings of an article
    pub async fn fetch_digest(&self, url: &str) -> Result<ArticleDigest> {
        let title = title_from_url(url)
            .ok_or_else(|| LeadsError::Validation(format!("Not a Wikipedia article URL: {}", url)))?;

        let data: ApiResponse = self
            .get_json(
                &self.api_url,
                &[
                    ("action", "query"),
                    ("titles", title.as_str()),
                    ("redirects", "1"),
                    ("prop", "extracts|revisions"),
                    ("exintro", "1"),
                    ("explaintext", "1"),
                    ("rvprop", "content"),
                    ("rvslots", "main"),
                    ("format", "json"),
                    ("formatversion", "2"),
                ],
            )
            .await?;

        let page = data
            .query
            .unwrap_or_default()
            .pages
            .into_iter()
            .next()
            .filter(|p| !p.missing)
            .ok_or_else(|| LeadsError::Parse(format!("No article for {}", title)))?;

        let wikitext = page
            .revisions
            .into_iter()
            .next()
            .and_then(|mut r| r.slots.remove("main"))
            .map(|s| s.content)
            .unwrap_or_default();

        Ok(ArticleDigest {
            title: page.title,
            extract: collapse_whitespace(&page.extract),
            warnings: extract_warnings(&wikitext),
            wikitext,
        })
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

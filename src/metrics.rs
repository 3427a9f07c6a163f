//! Citation and h-index extraction from free-text snippets.
//!
//! Scholar snippets come in several shapes ("Citations, 200004", "Cited by
//! 12,345", "h-index: 45", "3,210 citations"). Each metric has an ordered list
//! of patterns, most specific first; the first pattern whose numeral parses
//! wins.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static CITATION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\bcitations?\s*[,:]\s*([0-9][0-9,.]*)",
        r"(?i)\bcited\s+by\s*[,:]?\s*([0-9][0-9,.]*)",
        r"(?i)\b([0-9][0-9,.]*)\s+citations?\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid citation regex"))
    .collect()
});

static H_INDEX_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\bh[\s\-–—]?index\s*(?:[,:=]|of)?\s*([0-9]{1,4})\b",
        r"(?i)\b([0-9]{1,4})\s*\(?\s*h[\s\-–—]?index\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid h-index regex"))
    .collect()
});

/// Metrics parsed out of a snippet. Either field may be absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    pub citations: Option<u64>,
    pub h_index: Option<u64>,
}

/// Extract citations and h-index from arbitrary text.
pub fn extract_metrics(text: &str) -> Metrics {
    Metrics {
        citations: first_numeric_match(&CITATION_PATTERNS, text),
        h_index: extract_h_index(text),
    }
}

/// Extract only the h-index, e.g. from a fetched profile page.
pub fn extract_h_index(text: &str) -> Option<u64> {
    first_numeric_match(&H_INDEX_PATTERNS, text)
}

fn first_numeric_match(patterns: &[Regex], text: &str) -> Option<u64> {
    patterns.iter().find_map(|re| {
        re.captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .find_map(|m| parse_grouped_number(m.as_str()))
    })
}

/// Parse a numeral that may carry `,` or `.` grouping marks.
///
/// Returns `None` for anything that is not a valid non-negative integer after
/// the marks are removed.
pub fn parse_grouped_number(raw: &str) -> Option<u64> {
    let digits: String = raw.chars().filter(|c| *c != ',' && *c != '.').collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<u64>().ok()
}

/// Outcome of the qualification check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Citations meet the threshold and no h-index was found (nor required)
    CitationsOnly,
    /// Both citations and h-index meet their thresholds
    DualThreshold,
    /// Candidate does not qualify
    Reject(RejectReason),
}

impl Verdict {
    pub fn qualifies(&self) -> bool {
        !matches!(self, Verdict::Reject(_))
    }
}

/// Why a candidate was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    MissingCitations,
    CitationsBelow { citations: u64, threshold: u64 },
    MissingHIndex,
    HIndexBelow { h_index: u64, threshold: u64 },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::MissingCitations => write!(f, "could not extract citations"),
            RejectReason::CitationsBelow { citations, threshold } => {
                write!(f, "citations {} < {}", citations, threshold)
            }
            RejectReason::MissingHIndex => write!(f, "h-index required but not found"),
            RejectReason::HIndexBelow { h_index, threshold } => {
                write!(f, "h-index {} < {}", h_index, threshold)
            }
        }
    }
}

/// Thresholds deciding which search results become leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualificationPolicy {
    pub min_citations: u64,
    pub min_h_index: u64,
    /// When false, a missing h-index does not block qualification
    pub require_h_index: bool,
}

impl Default for QualificationPolicy {
    fn default() -> Self {
        Self {
            min_citations: 10_000,
            min_h_index: 40,
            require_h_index: false,
        }
    }
}

impl QualificationPolicy {
    pub fn evaluate(&self, metrics: &Metrics) -> Verdict {
        let Some(citations) = metrics.citations else {
            return Verdict::Reject(RejectReason::MissingCitations);
        };
        if citations < self.min_citations {
            return Verdict::Reject(RejectReason::CitationsBelow {
                citations,
                threshold: self.min_citations,
            });
        }

        match metrics.h_index {
            None if self.require_h_index => Verdict::Reject(RejectReason::MissingHIndex),
            None => Verdict::CitationsOnly,
            Some(h_index) if h_index >= self.min_h_index => Verdict::DualThreshold,
            Some(h_index) => Verdict::Reject(RejectReason::HIndexBelow {
                h_index,
                threshold: self.min_h_index,
            }),
        }
    }
}

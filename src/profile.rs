//! Candidate profile and lead row types.

use crate::normalize::{clean_markup, clean_unicode, fold_for_matching, normalize_name, UNKNOWN_NAME};
use serde::{Deserialize, Serialize};

/// Rendering of a URL that was searched for and not found
pub const NOT_AVAILABLE: &str = "N/A";
pub const NOT_FOUND: &str = "Not found";
pub const ERROR: &str = "Error";
pub const NOT_SEARCHED: &str = "Not searched";

/// Result of resolving one field of a profile.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Resolution {
    Found(String),
    #[default]
    NotFound,
    Error,
    NotSearched,
}

impl Resolution {
    pub fn found(&self) -> Option<&str> {
        match self {
            Resolution::Found(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found(_))
    }

    /// CSV cell for a URL field. Missing URLs render as `N/A`.
    pub fn url_cell(&self) -> String {
        match self {
            Resolution::Found(url) => url.clone(),
            _ => NOT_AVAILABLE.to_string(),
        }
    }

    /// CSV cell for the email field.
    pub fn email_cell(&self) -> String {
        match self {
            Resolution::Found(email) => email.clone(),
            Resolution::NotFound => NOT_FOUND.to_string(),
            Resolution::Error => ERROR.to_string(),
            Resolution::NotSearched => NOT_SEARCHED.to_string(),
        }
    }

    /// Parse a CSV cell back into a resolution.
    pub fn from_cell(cell: &str) -> Self {
        let trimmed = cell.trim();
        if trimmed.eq_ignore_ascii_case(ERROR) {
            Resolution::Error
        } else if trimmed.eq_ignore_ascii_case(NOT_SEARCHED) {
            Resolution::NotSearched
        } else if is_missing_cell(trimmed) {
            Resolution::NotFound
        } else {
            Resolution::Found(trimmed.to_string())
        }
    }
}

/// Whether a CSV cell holds one of the "no value" sentinels.
pub fn is_missing_cell(cell: &str) -> bool {
    let cell = cell.trim();
    cell.is_empty()
        || [NOT_AVAILABLE, NOT_FOUND, ERROR, NOT_SEARCHED]
            .iter()
            .any(|s| cell.eq_ignore_ascii_case(s))
}

/// One prospective lead.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CandidateProfile {
    /// Normalized display name, never empty
    pub name: String,
    pub citations: Option<u64>,
    pub h_index: Option<u64>,
    /// Source search-result URL
    pub profile_url: String,
    pub homepage_url: Resolution,
    pub wikipedia_url: Resolution,
    pub email: Resolution,
    pub summary: String,
    pub affiliation_text: Option<String>,
}

impl CandidateProfile {
    /// Start a profile from a raw search-result title.
    pub fn from_title(raw_title: &str, profile_url: &str) -> Self {
        Self {
            name: normalize_name(raw_title),
            profile_url: profile_url.to_string(),
            email: Resolution::NotSearched,
            ..Default::default()
        }
    }

    /// Rebuild a profile from a row of an earlier run.
    pub fn from_row(row: &LeadRow) -> Self {
        Self {
            name: normalize_name(&row.name),
            wikipedia_url: Resolution::from_cell(&row.wikipedia_url),
            email: Resolution::from_cell(&row.email),
            summary: row.info.trim().to_string(),
            ..Default::default()
        }
    }

    pub fn has_email(&self) -> bool {
        self.email.is_found()
    }

    pub fn has_wikipedia(&self) -> bool {
        self.wikipedia_url.is_found()
    }

    pub fn is_unknown(&self) -> bool {
        self.name == UNKNOWN_NAME
    }

    /// Deduplication key: folded name plus Wikipedia URL, else email.
    pub fn dedup_key(&self) -> (String, String) {
        dedup_key(
            &self.name,
            &self.wikipedia_url.url_cell(),
            &self.email.email_cell(),
        )
    }

    pub fn to_row(&self) -> LeadRow {
        LeadRow {
            name: clean_unicode(&self.name),
            email: clean_unicode(&self.email.email_cell()),
            wikipedia_url: clean_unicode(&self.wikipedia_url.url_cell()),
            info: clean_markup(&self.summary),
            is_wiki: if self.has_wikipedia() { "1" } else { "0" }.to_string(),
        }
    }
}

/// Build the dedup key from raw cell values.
///
/// The Wikipedia URL wins over the email when it is present.
pub fn dedup_key(name: &str, wikipedia_cell: &str, email_cell: &str) -> (String, String) {
    let folded = fold_for_matching(name);
    let name_key = if folded.is_empty() {
        name.trim().to_lowercase()
    } else {
        folded
    };
    let unique_id = if is_missing_cell(wikipedia_cell) {
        email_cell
    } else {
        wikipedia_cell
    };
    (name_key, unique_id.trim().to_lowercase())
}

/// CSV row written to the output partitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadRow {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub wikipedia_url: String,
    #[serde(default)]
    pub info: String,
    #[serde(default)]
    pub is_wiki: String,
}

impl LeadRow {
    pub const HEADER: [&'static str; 5] = ["Name", "email", "wikipedia_url", "info", "is_wiki"];

    pub fn dedup_key(&self) -> (String, String) {
        dedup_key(&self.name, &self.wikipedia_url, &self.email)
    }
}

//! Text normalization for names, snippets and Wikipedia text.
//!
//! Search-result titles arrive wrapped in bidi marks
//! (`\u{202A}George Church\u{202C} - \u{202A}Google Scholar\u{202C}`),
//! carry site suffixes and academic titles, and Wikipedia
//! text carries wiki markup. Everything here is pure string rewriting.

use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Sentinel name for empty or fully stripped titles
pub const UNKNOWN_NAME: &str = "Unknown";

static CONTROL_MARKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\u{200B}-\u{200F}\u{202A}-\u{202E}\u{2066}-\u{2069}\u{FEFF}\u{F8FF}]")
        .expect("valid control mark regex")
});

static EXOTIC_SPACES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\u{00A0}\u{2000}-\u{200A}]").expect("valid space regex")
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

static SITE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*(?:[-–—|]\s*(?:google scholar|wikipedia)\b.*|\b(?:google scholar|wikipedia))$")
        .expect("valid suffix regex")
});

static ACADEMIC_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:professor|prof\.?|dr\.?|doctor)\s+").expect("valid prefix regex")
});

static ACADEMIC_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i),?\s+(?:jr\.?|sr\.?|ph\.?\s?d\.?|m\.?d\.?|ii|iii|iv)$")
        .expect("valid suffix regex")
});

static EDGE_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\s\-–—,;]+|[\s\-–—,;]+$").expect("valid edge regex"));

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid tag regex"));

static WIKI_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[([^|\]]+)(?:\|([^\]]+))?\]\]").expect("valid wiki link regex")
});

static WIKI_TEMPLATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{[^{}]*\}\}").expect("valid template regex"));

static WIKI_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"==+\s*([^=]*?)\s*==+").expect("valid header regex"));

static TABLE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*(?:\{\||\|\}|\|-).*$").expect("valid table regex"));

static LINE_LEADERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t\-\*#\|:]+").expect("valid leader regex"));

static LIST_MARKERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\*#]+").expect("valid list marker regex"));

static STRAY_MARKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[|\]\]|[{}]|'{2,}|\|+").expect("valid stray regex"));

static CITE_RESIDUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bcite\s+(?:journal|book|web|news)\b").expect("valid cite regex")
});

/// Remove bidi/format marks and map exotic spaces to plain spaces.
///
/// Applied to every CSE field and every CSV cell.
pub fn clean_unicode(text: &str) -> String {
    let cleaned = CONTROL_MARKS.replace_all(text, "");
    let cleaned = EXOTIC_SPACES.replace_all(&cleaned, " ");
    collapse_whitespace(&cleaned)
}

/// Collapse runs of whitespace to a single space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

fn normalize_once(raw: &str) -> String {
    let name = clean_unicode(raw);
    let name = SITE_SUFFIX.replace(&name, "");
    let name = ACADEMIC_PREFIX.replace(&name, "");
    let name = ACADEMIC_SUFFIX.replace(&name, "");
    let name = EDGE_PUNCT.replace_all(&name, "");
    collapse_whitespace(&name)
}

/// Turn a raw search-result title into a display name.
///
/// Rewrites are applied until nothing changes, which makes the function
/// idempotent. An empty result becomes [`UNKNOWN_NAME`].
pub fn normalize_name(raw_title: &str) -> String {
    let mut current = raw_title.to_string();
    loop {
        let next = normalize_once(&current);
        if next == current {
            break;
        }
        current = next;
    }

    if current.is_empty() {
        UNKNOWN_NAME.to_string()
    } else {
        current
    }
}

/// Lower-cased, punctuation-free form of a name used for comparisons.
///
/// Returns an empty string for unknown names.
pub fn fold_for_matching(name: &str) -> String {
    let normalized = normalize_name(name);
    if normalized == UNKNOWN_NAME {
        return String::new();
    }

    let folded: String = normalized
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() || c == '-' || c == '\'' {
                c
            } else {
                ' '
            }
        })
        .collect();
    collapse_whitespace(&folded)
}

/// Strip HTML tags from text
pub fn strip_html_tags(text: &str) -> String {
    HTML_TAG.replace_all(text, "").to_string()
}

/// Remove wiki/HTML markup and make text safe for a comma-separated cell.
///
/// Commas and semicolons become " and ".
pub fn clean_markup(text: &str) -> String {
    let mut cleaned = WIKI_LINK
        .replace_all(text, |caps: &Captures| {
            caps.get(2)
                .or_else(|| caps.get(1))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default()
        })
        .to_string();

    // Nested templates collapse from the inside out.
    loop {
        let next = WIKI_TEMPLATE.replace_all(&cleaned, "").to_string();
        if next == cleaned {
            break;
        }
        cleaned = next;
    }

    let cleaned = HTML_TAG.replace_all(&cleaned, " ");
    let cleaned = WIKI_HEADER.replace_all(&cleaned, " $1 ");
    let cleaned = TABLE_LINE.replace_all(&cleaned, "");
    let cleaned = LINE_LEADERS.replace_all(&cleaned, "");
    let cleaned = LIST_MARKERS.replace_all(&cleaned, " ");
    let cleaned = STRAY_MARKUP.replace_all(&cleaned, " ");
    let cleaned = CITE_RESIDUE.replace_all(&cleaned, " ");
    let cleaned = clean_unicode(&cleaned);

    let cleaned = cleaned.replace([',', ';'], " and ");
    collapse_whitespace(&cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_scholar_title() {
        assert_eq!(
            normalize_name("\u{202A}George Church\u{202C} - \u{202A}Google Scholar\u{202C}"),
            "George Church"
        );
        assert_eq!(normalize_name("Avi Loeb - Wikipedia"), "Avi Loeb");
        assert_eq!(normalize_name("  Jeff   Lichtman  -  "), "Jeff Lichtman");
    }

    #[test]
    fn test_normalize_titles_and_suffixes() {
        assert_eq!(normalize_name("Prof. Dr. Jane Roe, PhD"), "Jane Roe");
        assert_eq!(normalize_name("Professor Martin Nowak"), "Martin Nowak");
        assert_eq!(normalize_name("Robert Langer Jr."), "Robert Langer");
        assert_eq!(normalize_name("Drew Faust"), "Drew Faust");
    }

    #[test]
    fn test_normalize_unknown() {
        assert_eq!(normalize_name(""), UNKNOWN_NAME);
        assert_eq!(normalize_name("\u{200E}\u{FEFF} - "), UNKNOWN_NAME);
        assert_eq!(normalize_name("Google Scholar"), UNKNOWN_NAME);
    }

    #[test]
    fn test_site_suffix_needs_separator_or_end() {
        assert_eq!(
            normalize_name("Wikipedia Smith - Wikipedia"),
            "Wikipedia Smith"
        );
        assert_eq!(
            normalize_name("Jane Roe | Wikipedia, the free encyclopedia"),
            "Jane Roe"
        );
        assert_eq!(normalize_name("Jane Roe Google Scholar"), "Jane Roe");
        assert_eq!(
            normalize_name("Google Scholar Fellow Ann Lee"),
            "Google Scholar Fellow Ann Lee"
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let inputs = [
            "\u{202A}George Church\u{202C} - \u{202A}Google Scholar\u{202C}",
            "Prof. Dr. Jane Roe, PhD",
            "Dr. Professor John Smith Jr., MD",
            "Gary King (political scientist)",
            "  -- Ann\u{00A0}Lee --  ",
            "Doctor",
            "",
            "Unknown",
        ];
        for input in inputs {
            let once = normalize_name(input);
            assert_eq!(normalize_name(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn test_fold_for_matching() {
        assert_eq!(fold_for_matching("Donald E. Ingber"), "donald e ingber");
        assert_eq!(
            fold_for_matching("Gary King (political scientist)"),
            "gary king political scientist"
        );
        assert_eq!(fold_for_matching("Jean-Pierre O'Neil"), "jean-pierre o'neil");
        assert_eq!(fold_for_matching(""), "");
    }

    #[test]
    fn test_clean_unicode() {
        assert_eq!(clean_unicode("\u{200E}Ann\u{2009}Lee\u{202C}"), "Ann Lee");
    }

    #[test]
    fn test_strip_html_tags() {
        assert_eq!(strip_html_tags("<p>Hello</p>"), "Hello");
        assert_eq!(
            strip_html_tags("<span class=\"searchmatch\">Gary</span> King"),
            "Gary King"
        );
    }

    #[test]
    fn test_clean_markup() {
        let text = "'''Gary King''' is an [[United States|American]] [[political scientist]], \
                    {{citation needed}} known for {{cite journal|title={{lang|x}}}} work; see below.\n\
                    == Career ==\n* Harvard\n# MIT\n{| class=wikitable\n| a || b\n|}";
        let cleaned = clean_markup(text);
        assert!(cleaned.starts_with("Gary King is an American political scientist and known for"));
        assert!(cleaned.contains("Career"));
        assert!(cleaned.contains("Harvard"));
        assert!(!cleaned.contains("[["));
        assert!(!cleaned.contains("{{"));
        assert!(!cleaned.contains('|'));
        assert!(!cleaned.contains('='));
    }

    #[test]
    fn test_clean_markup_never_emits_separators() {
        let inputs = [
            "a, b; c",
            ",,,;;;",
            "[[x|y, z]]; {{t|a,b}} <b>1,000</b>",
            "plain text",
            "",
        ];
        for input in inputs {
            let cleaned = clean_markup(input);
            assert!(!cleaned.contains(','), "{cleaned:?}");
            assert!(!cleaned.contains(';'), "{cleaned:?}");
        }
        assert_eq!(clean_markup("a, b; c"), "a and b and c");
    }
}

//! Name matching between a target person and a candidate label.
//!
//! A candidate label is typically a Wikipedia page title or a search result
//! title. Matching runs seven strategies in order and succeeds on the first
//! one that fires. The word lists behind the alias and context strategies live
//! in [`MatchVocabulary`] so they can be replaced at run time.

use crate::error::Result;
use crate::normalize::fold_for_matching;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info};

static PARENTHETICAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\([^)]*\)\s*$").expect("valid parenthetical regex"));

/// Word lists used by the matcher and the Wikipedia ranker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchVocabulary {
    /// Groups of interchangeable first names (lower-case)
    pub aliases: Vec<Vec<String>>,
    /// Words that mark an academic context
    pub academic_keywords: Vec<String>,
    /// Occupations used for ranking and query augmentation
    pub occupation_keywords: Vec<String>,
}

fn owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl Default for MatchVocabulary {
    fn default() -> Self {
        let aliases = [
            &["abraham", "avi", "avraham", "abe"][..],
            &["michael", "mike", "mick"],
            &["robert", "bob", "rob", "bobby"],
            &["william", "bill", "will", "billy"],
            &["james", "jim", "jimmy"],
            &["joseph", "joe"],
            &["jeffrey", "jeff", "geoffrey"],
            &["nicholas", "nick"],
            &["christopher", "chris"],
            &["david", "dave"],
            &["steven", "stephen", "steve"],
            &["anthony", "tony"],
            &["richard", "rick", "dick"],
            &["thomas", "tom"],
            &["daniel", "dan", "danny"],
            &["edward", "ed", "ted"],
            &["elizabeth", "liz", "beth"],
            &["katherine", "catherine", "kate", "kathy"],
            &["benjamin", "ben"],
            &["alexander", "alex"],
            &["samuel", "sam"],
            &["matthew", "matt"],
            &["andrew", "andy", "drew"],
            &["charles", "charlie", "chuck"],
            &["gregory", "greg"],
            &["timothy", "tim"],
            &["kenneth", "ken"],
            &["lawrence", "larry"],
            &["jonathan", "jon"],
            &["margaret", "maggie", "peggy"],
        ]
        .iter()
        .map(|group| owned(group))
        .collect();

        Self {
            aliases,
            academic_keywords: owned(&[
                "professor",
                "researcher",
                "academic",
                "scholar",
                "scientist",
                "faculty",
            ]),
            occupation_keywords: owned(&[
                "professor",
                "scientist",
                "physicist",
                "chemist",
                "biologist",
                "economist",
                "mathematician",
                "engineer",
                "researcher",
                "psychologist",
                "sociologist",
                "historian",
                "philosopher",
                "astronomer",
                "geneticist",
                "neuroscientist",
                "physician",
                "academic",
            ]),
        }
    }
}

impl MatchVocabulary {
    /// Load a vocabulary from a JSON file. Missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let vocabulary: Self = serde_json::from_str(&content)?;
        info!(
            path = %path.display(),
            alias_groups = vocabulary.aliases.len(),
            "Loaded match vocabulary"
        );
        Ok(vocabulary)
    }

    /// All known variants of a first name, the name itself included.
    pub fn variants_of(&self, first: &str) -> Vec<String> {
        let first = first.to_lowercase();
        let mut variants = vec![first.clone()];
        for group in &self.aliases {
            if group.iter().any(|alias| alias.eq_ignore_ascii_case(&first)) {
                for alias in group {
                    let alias = alias.to_lowercase();
                    if !variants.contains(&alias) {
                        variants.push(alias);
                    }
                }
            }
        }
        variants
    }

    /// Occupation keywords that occur as whole words in `text`.
    pub fn occupations_in<'a>(&'a self, text: &str) -> impl Iterator<Item = &'a String> + 'a {
        let padded = pad(&text.to_lowercase());
        self.occupation_keywords
            .iter()
            .filter(move |kw| padded.contains(&pad(&kw.to_lowercase())))
    }
}

/// Which strategy produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    Exact,
    Containment,
    ParentheticalStrip,
    Alias,
    TokenOverlap,
    FirstLast,
    AcademicContext,
}

/// Heuristic matcher over a [`MatchVocabulary`].
#[derive(Debug, Clone, Default)]
pub struct NameMatcher {
    vocabulary: MatchVocabulary,
}

fn pad(s: &str) -> String {
    format!(" {} ", s)
}

/// Plain substring containment in either direction.
fn contained_either_way(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a.contains(b) || b.contains(a))
}

/// Equal, or one token contains the other.
fn token_related(a: &str, b: &str) -> bool {
    a == b || a.contains(b) || b.contains(a)
}

fn significant_tokens(folded: &str) -> Vec<&str> {
    folded
        .split_whitespace()
        .filter(|t| t.chars().count() > 2)
        .collect()
}

impl NameMatcher {
    pub fn new(vocabulary: MatchVocabulary) -> Self {
        Self { vocabulary }
    }

    pub fn vocabulary(&self) -> &MatchVocabulary {
        &self.vocabulary
    }

    /// Whether `candidate_label` plausibly refers to `person_name`.
    pub fn is_match(
        &self,
        person_name: &str,
        candidate_label: &str,
        context_snippet: &str,
        candidate_url: &str,
    ) -> bool {
        let strategy = self.match_strategy(person_name, candidate_label, context_snippet);
        debug!(
            person = person_name,
            label = candidate_label,
            url = candidate_url,
            strategy = ?strategy,
            "Name match"
        );
        strategy.is_some()
    }

    /// The first strategy that accepts the pair, if any.
    pub fn match_strategy(
        &self,
        person_name: &str,
        candidate_label: &str,
        context_snippet: &str,
    ) -> Option<MatchStrategy> {
        let person = fold_for_matching(person_name);
        let label = fold_for_matching(candidate_label);
        if person.is_empty() || label.is_empty() {
            return None;
        }

        if person == label {
            return Some(MatchStrategy::Exact);
        }

        if contained_either_way(&person, &label) {
            return Some(MatchStrategy::Containment);
        }

        let stripped = fold_for_matching(&PARENTHETICAL.replace(candidate_label, ""));
        if !stripped.is_empty() && (stripped == person || contained_either_way(&person, &stripped))
        {
            return Some(MatchStrategy::ParentheticalStrip);
        }

        let person_tokens: Vec<&str> = person.split_whitespace().collect();
        let label_tokens: Vec<&str> = label.split_whitespace().collect();

        if let Some((first, rest)) = person_tokens.split_first() {
            let rest = rest.join(" ");
            let hit = self.vocabulary.variants_of(first).iter().skip(1).any(|variant| {
                let candidate = if rest.is_empty() {
                    variant.clone()
                } else {
                    format!("{} {}", variant, rest)
                };
                candidate == label || contained_either_way(&candidate, &label)
            });
            if hit {
                return Some(MatchStrategy::Alias);
            }
        }

        let person_sig = significant_tokens(&person);
        let label_sig = significant_tokens(&label);
        if person_sig.len() >= 2 && label_sig.len() >= 2 {
            let overlap = person_sig.iter().filter(|t| label_sig.contains(t)).count();
            if overlap >= 2 {
                return Some(MatchStrategy::TokenOverlap);
            }
        }

        if person_tokens.len() >= 2 && label_tokens.len() >= 2 {
            let (p_first, p_last) = (person_tokens[0], person_tokens[person_tokens.len() - 1]);
            let (l_first, l_last) = (label_tokens[0], label_tokens[label_tokens.len() - 1]);
            if token_related(p_first, l_first) && token_related(p_last, l_last) {
                return Some(MatchStrategy::FirstLast);
            }
        }

        let snippet = context_snippet.to_lowercase();
        let academic = self
            .vocabulary
            .academic_keywords
            .iter()
            .any(|kw| label.contains(kw.as_str()) || snippet.contains(kw.as_str()));
        if academic {
            let folded_snippet = fold_for_matching(context_snippet);
            let corroborated = person_sig
                .iter()
                .any(|t| label.contains(t) && folded_snippet.contains(t));
            if corroborated {
                return Some(MatchStrategy::AcademicContext);
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> NameMatcher {
        NameMatcher::default()
    }

    #[test]
    fn test_alias_match() {
        let m = matcher();
        assert!(m.is_match("Abraham Cohen", "Avi Cohen", "", ""));
        assert_eq!(
            m.match_strategy("Abraham Cohen", "Avi Cohen", ""),
            Some(MatchStrategy::Alias)
        );
        assert!(m.is_match("Mike Jordan", "Michael Jordan", "", ""));
    }

    #[test]
    fn test_parenthetical_match() {
        let m = matcher();
        assert!(m.is_match("Gary King", "Gary King (political scientist)", "", ""));
    }

    #[test]
    fn test_middle_initial_match() {
        let m = matcher();
        assert!(m.is_match("Donald Ingber", "Donald E. Ingber", "", ""));
        assert!(m.is_match("Jeff Lichtman", "Jeffrey W. Lichtman", "", ""));
    }

    #[test]
    fn test_no_match() {
        let m = matcher();
        assert!(!m.is_match("John Smith", "Jane Doe", "", ""));
        assert!(!m.is_match("Ann Lee", "Bob Leeds", "professor", ""));
    }

    #[test]
    fn test_unknown_never_matches() {
        let m = matcher();
        assert!(!m.is_match("Unknown", "Unknown", "", ""));
        assert!(!m.is_match("", "Gary King", "", ""));
        assert!(!m.is_match("Gary King", "", "", ""));
    }

    #[test]
    fn test_containment_is_substring_either_way() {
        let m = matcher();
        assert_eq!(
            m.match_strategy("Gary King", "Gary King Jr. Foundation", ""),
            Some(MatchStrategy::Containment)
        );
        assert!(m.is_match("Ann Lee", "Joann Lee Hospital", "", ""));
        assert_eq!(
            m.match_strategy("Wang", "Wangari Maathai", ""),
            Some(MatchStrategy::Containment)
        );
        assert_eq!(
            m.match_strategy("Jeff W. Lichtman", "W. Lichtman", ""),
            Some(MatchStrategy::Containment)
        );
        assert_eq!(
            m.match_strategy("Ann Lee", "Annette Leeds", ""),
            Some(MatchStrategy::FirstLast)
        );
    }

    #[test]
    fn test_academic_context() {
        let m = matcher();
        assert_eq!(
            m.match_strategy(
                "Marcus Feldman",
                "Feldman lab",
                "Feldman is a professor of biology at Stanford"
            ),
            Some(MatchStrategy::AcademicContext)
        );
        assert_eq!(m.match_strategy("Marcus Feldman", "Feldman lab", "A bakery"), None);
    }

    #[test]
    fn test_university_alone_is_not_academic_context() {
        let m = matcher();
        assert_eq!(
            m.match_strategy(
                "Marcus Feldman",
                "Feldman Hall",
                "Feldman Hall at Stanford University"
            ),
            None
        );
        assert_eq!(
            MatchVocabulary::default().academic_keywords,
            vec!["professor", "researcher", "academic", "scholar", "scientist", "faculty"]
        );
    }

    #[test]
    fn test_variants_and_occupations() {
        let vocab = MatchVocabulary::default();
        let variants = vocab.variants_of("Abraham");
        assert_eq!(variants[0], "abraham");
        assert!(variants.contains(&"avi".to_string()));
        assert_eq!(vocab.variants_of("Zebulon"), vec!["zebulon".to_string()]);

        let found: Vec<&String> = vocab.occupations_in("American physicist and engineer").collect();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_vocabulary_from_json() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("vocab.json");
        std::fs::write(&path, r#"{"aliases": [["zebulon", "zeb"]]}"#)?;

        let vocab = MatchVocabulary::from_json_file(&path)?;
        assert_eq!(vocab.aliases.len(), 1);
        assert!(!vocab.academic_keywords.is_empty());

        let m = NameMatcher::new(vocab);
        assert!(m.is_match("Zebulon Pike", "Zeb Pike", "", ""));
        assert!(!m.is_match("Abraham Cohen", "Avi Cohen", "", ""));
        Ok(())
    }
}

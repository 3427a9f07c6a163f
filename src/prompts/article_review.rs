//! Wikipedia article review prompts.
//!
//! The reviewer answers in four labelled lines that are parsed back by
//! `review::parse_review` and end up in the `info` column of the lead CSVs.

/// Sections a complete academic biography is expected to carry
pub const REQUIRED_SECTIONS: &[&str] = &[
    "Introduction paragraph",
    "Early Life & Education section",
    "Career section",
    "Research section",
    "Awards & Honors section",
    "Selected Publications section",
    "Books (if available)",
    "References",
    "InfoBox with photo & basic info",
];

/// Characters of wikitext sent to the model
pub const MAX_WIKITEXT_CHARS: usize = 8000;

/// System prompt for article review
pub const SYSTEM_PROMPT: &str = r#"You are an expert Wikipedia analyst. Analyze the provided article and give structured feedback.

Rules you MUST follow:
- Write in plain text only. NO Wikipedia markup, citations, templates or formatting.
- Never use commas or semicolons. Use "and" to connect items in lists.
- Answer with exactly the four labelled lines requested, nothing else."#;

/// User prompt template for one article
/// Placeholders: {name}, {sections}, {wikitext}
pub const USER_PROMPT_TEMPLATE: &str = r#"Analyze the following Wikipedia page for {name} and provide a structured assessment.

Required sections to check for:
{sections}

Wikipedia content (truncated):
{wikitext}

Answer in this format:

SUMMARY: [2-3 sentence plain-text summary of this person]
MISSING_SECTIONS: [missing sections from the required list or "All sections present"]
WARNINGS: [Wikipedia warning templates found or "No warnings detected"]
OVERALL_ASSESSMENT: [if all sections are present and no warnings were detected write "Perfect profile - no improvements possible" otherwise give specific recommendations]"#;

/// Build the user prompt, truncating wikitext on a character boundary
pub fn build_user_prompt(name: &str, wikitext: &str) -> String {
    let sections = REQUIRED_SECTIONS
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {}", i + 1, s))
        .collect::<Vec<_>>()
        .join("\n");
    let truncated: String = wikitext.chars().take(MAX_WIKITEXT_CHARS).collect();

    USER_PROMPT_TEMPLATE
        .replace("{name}", name)
        .replace("{sections}", &sections)
        .replace("{wikitext}", &truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_user_prompt() {
        let wikitext = "é".repeat(MAX_WIKITEXT_CHARS + 10);
        let prompt = build_user_prompt("George Church", &wikitext);
        assert!(prompt.contains("page for George Church"));
        assert!(prompt.contains("9. InfoBox with photo & basic info"));
        assert_eq!(prompt.matches('é').count(), MAX_WIKITEXT_CHARS);
    }
}

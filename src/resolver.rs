//! Per-result orchestration: qualify, then enrich.
//!
//! A search result is first checked against the [`QualificationPolicy`] using
//! only its snippet. Qualified results become a [`CandidateProfile`] that is
//! filled in step by step: profile page facts and homepage, Wikipedia page,
//! contact email, summary. No step can fail the profile; failures leave a
//! sentinel in the affected field.

use crate::config::{Credentials, PipelineConfig};
use crate::cse::{CseClient, SearchItem};
use crate::email::EmailResolver;
use crate::error::Result;
use crate::homepage::HomepageResolver;
use crate::matcher::{MatchVocabulary, NameMatcher};
use crate::metrics::{extract_metrics, Metrics, QualificationPolicy, RejectReason, Verdict};
use crate::profile::CandidateProfile;
use crate::review::ArticleReviewer;
use crate::wikipedia::WikipediaResolver;
use tracing::{debug, info, warn};

/// Characters of a Wikipedia intro kept as summary
const MAX_SUMMARY_CHARS: usize = 600;

/// What became of one search result
#[derive(Debug)]
pub enum CandidateOutcome {
    Qualified {
        profile: Box<CandidateProfile>,
        verdict: Verdict,
    },
    Rejected(RejectReason),
}

/// Leading sentences of `text` within `max_chars`, or a hard cut when the
/// first sentence alone is longer.
pub fn first_sentences(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    match cut.rfind(". ") {
        Some(end) => cut[..=end].to_string(),
        None => cut.trim_end().to_string(),
    }
}

/// Summary built from what is known when no article text is available.
pub fn heuristic_summary(profile: &CandidateProfile) -> String {
    let mut parts = vec![profile.name.clone()];
    if let Some(affiliation) = profile.affiliation_text.as_deref().filter(|a| !a.is_empty()) {
        parts.push(affiliation.to_string());
    }
    if let Some(citations) = profile.citations {
        parts.push(format!("Cited by {}", citations));
    }
    if let Some(h_index) = profile.h_index {
        parts.push(format!("h-index {}", h_index));
    }
    format!("{}.", parts.join(". "))
}

/// Runs the resolvers for one search result at a time
pub struct CandidateResolver {
    policy: QualificationPolicy,
    homepage: HomepageResolver,
    wikipedia: WikipediaResolver,
    email: EmailResolver,
    reviewer: Option<ArticleReviewer>,
}

impl CandidateResolver {
    pub fn new(
        policy: QualificationPolicy,
        homepage: HomepageResolver,
        wikipedia: WikipediaResolver,
        email: EmailResolver,
        reviewer: Option<ArticleReviewer>,
    ) -> Self {
        Self {
            policy,
            homepage,
            wikipedia,
            email,
            reviewer,
        }
    }

    /// Wire every resolver from the run configuration.
    pub fn from_config(
        config: &PipelineConfig,
        credentials: &Credentials,
        vocabulary: MatchVocabulary,
        cookie_header: String,
    ) -> Result<Self> {
        let timeout = config.request_timeout_secs;
        let matcher = NameMatcher::new(vocabulary);

        let homepage = HomepageResolver::new(
            config.profile_fetch,
            cookie_header,
            config.affiliations.clone(),
            timeout,
        )?;

        let wikipedia = WikipediaResolver::new(matcher.clone(), timeout)?
            .with_delay_ms(config.wiki_delay_ms)
            .with_affiliations(config.affiliations.clone())
            .with_limits(config.validate_top, config.max_augmented_queries);

        let mut email = EmailResolver::new(matcher, config.max_crawl_pages, timeout)?
            .with_affiliations(config.affiliations.clone());
        if let Some(cx) = &credentials.general_cx {
            let general = CseClient::new(&credentials.api_key, timeout, config.cse_delay_ms)?;
            email = email.with_general_search(general, cx);
        }

        let reviewer = config
            .llm
            .clone()
            .map(|llm| ArticleReviewer::new(llm, timeout))
            .transpose()?;

        Ok(Self::new(config.policy, homepage, wikipedia, email, reviewer))
    }

    pub fn policy(&self) -> &QualificationPolicy {
        &self.policy
    }

    pub fn wikipedia(&self) -> &WikipediaResolver {
        &self.wikipedia
    }

    pub fn email(&self) -> &EmailResolver {
        &self.email
    }

    pub fn reviewer(&self) -> Option<&ArticleReviewer> {
        self.reviewer.as_ref()
    }

    /// Qualify one search result and, if it passes, resolve its profile.
    pub async fn resolve(&self, item: &SearchItem) -> CandidateOutcome {
        let metrics = extract_metrics(&item.snippet);
        let verdict = self.policy.evaluate(&metrics);
        debug!(title = %item.title, citations = ?metrics.citations, h_index = ?metrics.h_index, verdict = ?verdict, "Qualification");

        let awaiting_h_index = matches!(verdict, Verdict::Reject(RejectReason::MissingHIndex));
        if let Verdict::Reject(reason) = verdict {
            if !awaiting_h_index {
                return CandidateOutcome::Rejected(reason);
            }
        }

        let mut profile = CandidateProfile::from_title(&item.title, &item.link);
        profile.citations = metrics.citations;
        profile.h_index = metrics.h_index;

        let (homepage, facts) = self.homepage.resolve(&profile.profile_url).await;
        profile.homepage_url = homepage;
        if profile.h_index.is_none() {
            profile.h_index = facts.h_index;
        }
        profile.affiliation_text = facts.affiliation;

        let verdict = if awaiting_h_index {
            let rechecked = self.policy.evaluate(&Metrics {
                citations: profile.citations,
                h_index: profile.h_index,
            });
            if let Verdict::Reject(reason) = rechecked {
                return CandidateOutcome::Rejected(reason);
            }
            rechecked
        } else {
            verdict
        };

        info!(name = %profile.name, verdict = ?verdict, "Candidate qualifies");
        self.enrich(&mut profile).await;

        CandidateOutcome::Qualified {
            profile: Box::new(profile),
            verdict,
        }
    }

    /// Wikipedia, email and summary for a qualified profile.
    pub async fn enrich(&self, profile: &mut CandidateProfile) {
        profile.wikipedia_url = self.wikipedia.resolve(&profile.name).await;
        profile.email = self
            .email
            .resolve(&profile.name, profile.homepage_url.found())
            .await;
        profile.summary = self.summarize(profile).await;
    }

    /// Bring a lead from an earlier run up to date.
    ///
    /// A missing Wikipedia page is looked up again and the summary is
    /// rebuilt. The email is left alone. A lead that still has no page keeps
    /// its existing summary.
    pub async fn refresh(&self, profile: &mut CandidateProfile) {
        if !profile.has_wikipedia() {
            profile.wikipedia_url = self.wikipedia.resolve(&profile.name).await;
        }
        if profile.has_wikipedia() || profile.summary.is_empty() {
            profile.summary = self.summarize(profile).await;
        }
    }

    async fn summarize(&self, profile: &CandidateProfile) -> String {
        let Some(url) = profile.wikipedia_url.found() else {
            return heuristic_summary(profile);
        };

        let digest = match self.wikipedia.fetch_digest(url).await {
            Ok(digest) => digest,
            Err(e) => {
                warn!(url = url, error = %e, "Failed to fetch article digest");
                return heuristic_summary(profile);
            }
        };

        if let Some(reviewer) = &self.reviewer {
            match reviewer.review(&profile.name, &digest).await {
                Ok(review) => return review.to_info(),
                Err(e) => warn!(name = %profile.name, error = %e, "Article review failed"),
            }
        }

        if digest.extract.is_empty() {
            heuristic_summary(profile)
        } else {
            first_sentences(&digest.extract, MAX_SUMMARY_CHARS)
        }
    }
}

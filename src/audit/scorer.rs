//! Quality scoring for audit candidates

use super::fingerprint::{normalize_tokens, Fingerprint};
use super::models::{
    AuditResult, BusinessContext, CandidateItem, ExistingItem, NOVELTY, RELEVANCE, SPECIFICITY,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};

/// Scorer trait for different evaluation strategies
#[async_trait]
pub trait QualityScorer: Send + Sync {
    /// Score a candidate against the business context and previously seen items.
    ///
    /// `existing` never contains the candidate itself, nor rows sharing its
    /// concept hash or intent signature.
    async fn audit_content(
        &self,
        candidate: &CandidateItem,
        context: &BusinessContext,
        existing: &[&ExistingItem],
    ) -> Result<AuditResult, ScoringError>;
}

/// Scorer errors. Distinct from a low score: callers must not read these as
/// "content is low quality".
#[derive(Debug, Clone, thiserror::Error)]
pub enum ScoringError {
    #[error("Evaluator error: {0}")]
    Evaluator(String),

    #[error("Evaluator timeout: {0}")]
    Timeout(String),

    #[error("Invalid evaluator response: {0}")]
    InvalidResponse(String),

    #[error("Evaluator unavailable: {0}")]
    Unavailable(String),
}

impl ScoringError {
    /// Whether another attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, ScoringError::Evaluator(_) | ScoringError::Timeout(_))
    }
}

/// Neutral relevance when the context carries no keywords
const NEUTRAL_RELEVANCE: f32 = 0.5;

/// Bonus when the candidate's source tag matches the focus area
const SOURCE_TAG_BONUS: f32 = 0.2;

/// Deterministic keyword-based scorer.
///
/// Dimensions: relevance, specificity, novelty. The average is their
/// arithmetic mean.
#[derive(Debug, Clone, Default)]
pub struct HeuristicScorer;

impl HeuristicScorer {
    pub fn new() -> Self {
        Self
    }

    /// Share of context keywords present in the candidate text
    pub fn relevance(&self, candidate: &CandidateItem, context: &BusinessContext) -> f32 {
        let mut keywords: HashSet<String> = HashSet::new();
        if let Some(category) = &context.category {
            keywords.extend(significant_tokens(category));
        }
        keywords.extend(significant_tokens(&context.current_focus_area));

        if keywords.is_empty() {
            return NEUTRAL_RELEVANCE;
        }

        let text: HashSet<String> = significant_tokens(&candidate.title)
            .into_iter()
            .chain(significant_tokens(candidate.description_text()))
            .collect();

        let overlap = keywords.iter().filter(|k| text.contains(*k)).count();
        let mut score = overlap as f32 / keywords.len() as f32;

        let tag_tokens: HashSet<String> = significant_tokens(&candidate.source_tag).into_iter().collect();
        let focus_tokens = significant_tokens(&context.current_focus_area);
        if focus_tokens.iter().any(|t| tag_tokens.contains(t)) {
            score += SOURCE_TAG_BONUS;
        }

        score.clamp(0.0, 1.0)
    }

    /// Rewards concrete, actionable wording
    pub fn specificity(&self, candidate: &CandidateItem) -> f32 {
        let description = candidate.description_text();
        let words = description.split_whitespace().count() + candidate.title.split_whitespace().count();

        let mut score = 0.0;
        if !description.trim().is_empty() {
            score += 0.4;
        }
        if candidate
            .title
            .chars()
            .chain(description.chars())
            .any(|c| c.is_ascii_digit() || c == '%')
        {
            score += 0.3;
        }
        // Length saturates at 30 words
        score += 0.3 * (words as f32 / 30.0).min(1.0);

        score.clamp(0.0, 1.0)
    }

    /// One minus the closest title similarity among existing items.
    ///
    /// Rows sharing either fingerprint with the candidate are skipped: they
    /// are dropped as duplicates and must not count against the first
    /// occurrence.
    pub fn novelty(&self, candidate: &CandidateItem, existing: &[&ExistingItem]) -> f32 {
        let title = normalize_tokens(&candidate.title).join(" ");
        let own = Fingerprint::of(candidate);
        let max_similarity = existing
            .iter()
            .filter(|e| {
                e.id != candidate.id
                    && e.concept_hash != own.concept_hash
                    && e.intent_signature != own.intent_signature
            })
            .map(|e| strsim::normalized_levenshtein(&title, &normalize_tokens(&e.title).join(" ")))
            .fold(0.0_f64, f64::max);

        (1.0 - max_similarity as f32).clamp(0.0, 1.0)
    }
}

/// Normalized tokens worth matching on (at least three characters)
fn significant_tokens(text: &str) -> Vec<String> {
    normalize_tokens(text)
        .into_iter()
        .filter(|t| t.chars().count() >= 3)
        .collect()
}

#[async_trait]
impl QualityScorer for HeuristicScorer {
    async fn audit_content(
        &self,
        candidate: &CandidateItem,
        context: &BusinessContext,
        existing: &[&ExistingItem],
    ) -> Result<AuditResult, ScoringError> {
        let mut scores = BTreeMap::new();
        scores.insert(RELEVANCE.to_string(), self.relevance(candidate, context));
        scores.insert(SPECIFICITY.to_string(), self.specificity(candidate));
        scores.insert(NOVELTY.to_string(), self.novelty(candidate, existing));

        Ok(AuditResult::from_scores(scores))
    }
}

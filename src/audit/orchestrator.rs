//! Orchestrator for the content audit pipeline

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use super::events::{AuditEvent, BlockReason, EventSink};
use super::fingerprint::{Fingerprint, Fingerprinter};
use super::llm_scorer::LlmScorer;
use super::models::{
    AuditReport, AuditResult, AuditedItem, BusinessContext, CandidateItem, ContentKind,
    ExistingItem,
};
use super::scorer::{HeuristicScorer, QualityScorer, ScoringError};
use super::store::{BusinessContextProvider, CachedContextProvider, CandidateStore};
use super::thresholds::ThresholdProfiles;
use crate::config::{Config, ResilienceConfig, ScorerKind};
use crate::error::{AuditError, Result};
use crate::metrics::METRICS;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Runs the fetch → fingerprint → dedup → score → gate pipeline
pub struct AuditOrchestrator {
    store: Arc<dyn CandidateStore>,
    contexts: Arc<dyn BusinessContextProvider>,
    scorer: Arc<dyn QualityScorer>,
    events: Arc<dyn EventSink>,
    thresholds: ThresholdProfiles,
    fingerprinter: Fingerprinter,
    resilience: ResilienceConfig,
    breaker: CircuitBreaker,
    context_cache: Option<Arc<CachedContextProvider>>,
}

impl AuditOrchestrator {
    /// Create an orchestrator; fails if any threshold profile is invalid
    pub fn new(
        store: Arc<dyn CandidateStore>,
        contexts: Arc<dyn BusinessContextProvider>,
        scorer: Arc<dyn QualityScorer>,
        events: Arc<dyn EventSink>,
        thresholds: ThresholdProfiles,
    ) -> Result<Self> {
        thresholds.validate()?;
        let resilience = ResilienceConfig::default();

        Ok(Self {
            store,
            contexts,
            scorer,
            events,
            thresholds,
            fingerprinter: Fingerprinter::default(),
            breaker: CircuitBreaker::new(breaker_config(&resilience)),
            resilience,
            context_cache: None,
        })
    }

    /// Build the scorer and cached context lookup described by `config`
    pub fn from_config(
        config: &Config,
        store: Arc<dyn CandidateStore>,
        contexts: Arc<dyn BusinessContextProvider>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self> {
        config.validate()?;

        let scorer: Arc<dyn QualityScorer> = match config.scorer.kind {
            ScorerKind::Heuristic => Arc::new(HeuristicScorer::new()),
            ScorerKind::Llm => Arc::new(
                LlmScorer::new(config.scorer.clone())
                    .map_err(|e| AuditError::ScorerInit(e.to_string()))?,
            ),
        };

        let cache = Arc::new(CachedContextProvider::new(
            contexts,
            config.context.cache_ttl(),
            config.context.cache_max_capacity,
        ));

        let mut orchestrator =
            Self::new(store, cache.clone(), scorer, events, config.thresholds.clone())?
                .with_fingerprinter(Fingerprinter::new(config.fingerprint.max_intent_tokens))
                .with_resilience(config.resilience.clone());
        orchestrator.context_cache = Some(cache);

        info!(
            "Audit orchestrator initialized with {:?} scorer",
            config.scorer.kind
        );

        Ok(orchestrator)
    }

    pub fn with_fingerprinter(mut self, fingerprinter: Fingerprinter) -> Self {
        self.fingerprinter = fingerprinter;
        self
    }

    pub fn with_resilience(mut self, resilience: ResilienceConfig) -> Self {
        self.breaker = CircuitBreaker::new(breaker_config(&resilience));
        self.resilience = resilience;
        self
    }

    pub fn thresholds(&self) -> &ThresholdProfiles {
        &self.thresholds
    }

    /// Forget the cached business context so the next run sees brain updates
    pub async fn invalidate_context(&self, business_id: &str) {
        if let Some(cache) = &self.context_cache {
            cache.invalidate(business_id).await;
        }
    }

    /// Audit every candidate of `kind` for a business.
    ///
    /// Candidates are processed strictly in fetch order; the first
    /// occurrence of a concept hash or intent signature wins. A fetch failure
    /// aborts the whole run with no partial results.
    pub async fn run(&self, business_id: &str, kind: ContentKind) -> Result<AuditReport> {
        let run_id = Uuid::new_v4();
        let start = Instant::now();

        debug!("Audit run {} for business={} kind={}", run_id, business_id, kind);

        let candidates = match self.store.fetch_candidates(business_id, kind).await {
            Ok(candidates) => candidates,
            Err(e) => {
                error!("Audit run {} failed to fetch candidates: {}", run_id, e);
                self.events.emit(AuditEvent::AuditError {
                    run_id,
                    business_id: business_id.to_string(),
                    kind,
                    error: e.to_string(),
                });
                METRICS.record_run(kind.as_str(), false, start.elapsed().as_secs_f64());
                return Err(AuditError::Fetch(e.to_string()));
            }
        };

        let context = self.contexts.business_context(business_id).await;
        let profile = *self.thresholds.profile(kind);
        let raw_count = candidates.len();

        let fingerprints: Vec<Fingerprint> = candidates
            .iter()
            .map(|c| self.fingerprinter.fingerprint(c))
            .collect();

        // Comparison universe: every fetched row, built once up front
        let existing: Vec<ExistingItem> = candidates
            .iter()
            .zip(&fingerprints)
            .map(|(c, fp)| ExistingItem {
                id: c.id.clone(),
                kind: c.kind,
                title: c.title.clone(),
                description: c.description_text().to_string(),
                concept_hash: fp.concept_hash.clone(),
                intent_signature: fp.intent_signature.clone(),
                created_at: c.created_at,
            })
            .collect();

        let mut seen_concept_hashes: HashSet<String> = HashSet::new();
        let mut seen_intent_signatures: HashSet<String> = HashSet::new();
        let mut accepted = Vec::new();

        for (candidate, fingerprint) in candidates.into_iter().zip(fingerprints) {
            if seen_concept_hashes.contains(&fingerprint.concept_hash)
                || seen_intent_signatures.contains(&fingerprint.intent_signature)
            {
                debug!("Candidate {} is a duplicate", candidate.id);
                self.block(run_id, business_id, &candidate, BlockReason::DuplicateDetected, None, None);
                continue;
            }

            seen_concept_hashes.insert(fingerprint.concept_hash.clone());
            seen_intent_signatures.insert(fingerprint.intent_signature.clone());

            if candidate.title.trim().is_empty() {
                self.block(
                    run_id,
                    business_id,
                    &candidate,
                    BlockReason::FailedQualityGate,
                    None,
                    Some("empty title".to_string()),
                );
                continue;
            }

            // Rows sharing either fingerprint are this candidate's own
            // duplicates and are dropped later; they must not count against it
            let others: Vec<&ExistingItem> = existing
                .iter()
                .filter(|e| {
                    e.id != candidate.id
                        && e.concept_hash != fingerprint.concept_hash
                        && e.intent_signature != fingerprint.intent_signature
                })
                .collect();

            match self.score(&candidate, &context, &others).await {
                Ok(result) if profile.passes(&result) => {
                    debug!(
                        "Candidate {} passed: average={:.3} relevance={:.3}",
                        candidate.id,
                        result.average_score,
                        result.relevance()
                    );
                    METRICS.record_passed(kind.as_str());
                    accepted.push(AuditedItem {
                        audit_score: result.average_score,
                        audit_passed: true,
                        concept_hash: fingerprint.concept_hash,
                        intent_signature: fingerprint.intent_signature,
                        item: candidate,
                    });
                }
                Ok(result) => {
                    self.block(
                        run_id,
                        business_id,
                        &candidate,
                        BlockReason::FailedQualityGate,
                        Some(result),
                        None,
                    );
                }
                Err(e) => {
                    warn!("Scoring failed for candidate {}: {}", candidate.id, e);
                    self.block(
                        run_id,
                        business_id,
                        &candidate,
                        BlockReason::ScoringFailed,
                        None,
                        Some(e.to_string()),
                    );
                }
            }
        }

        let report = AuditReport::new(accepted, raw_count);

        self.events.emit(AuditEvent::AuditComplete {
            run_id,
            business_id: business_id.to_string(),
            kind,
            raw: report.raw_count,
            passed: report.filtered_count,
            blocked: report.blocked_count,
        });
        METRICS.record_run(kind.as_str(), true, start.elapsed().as_secs_f64());

        info!(
            "Audit run {} complete: raw={} passed={} blocked={} in {:?}",
            run_id,
            report.raw_count,
            report.filtered_count,
            report.blocked_count,
            start.elapsed()
        );

        Ok(report)
    }

    /// Score with orchestrator-level retries behind the circuit breaker
    async fn score(
        &self,
        candidate: &CandidateItem,
        context: &BusinessContext,
        existing: &[&ExistingItem],
    ) -> std::result::Result<AuditResult, ScoringError> {
        let key = format!("score:{}", candidate.kind);
        let mut attempt = 0;

        loop {
            if self.breaker.is_open(&key) {
                METRICS.scoring_circuit_open.inc();
                return Err(ScoringError::Unavailable(format!("circuit open for {}", key)));
            }

            attempt += 1;
            let outcome = crate::time_operation!(
                METRICS.scoring_duration,
                candidate.kind.as_str(),
                self.scorer.audit_content(candidate, context, existing).await
            );

            match outcome {
                Ok(result) => {
                    self.breaker.mark_success(&key);
                    return Ok(result);
                }
                Err(e) => {
                    self.breaker.mark_failure(&key);

                    if !e.is_retryable() || attempt > self.resilience.scoring_retries {
                        return Err(e);
                    }

                    let backoff = self.calculate_backoff(attempt);
                    warn!(
                        "Scoring attempt {} for {} failed: {}, retrying in {:?}",
                        attempt, candidate.id, e, backoff
                    );
                    METRICS.scoring_retries.inc();
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    /// Exponential backoff from the configured base
    fn calculate_backoff(&self, attempt: usize) -> Duration {
        let base = self.resilience.retry_backoff();
        let exponent = attempt.saturating_sub(1).min(16) as u32;
        base.saturating_mul(2_u32.pow(exponent))
    }

    fn block(
        &self,
        run_id: Uuid,
        business_id: &str,
        candidate: &CandidateItem,
        reason: BlockReason,
        result: Option<AuditResult>,
        error: Option<String>,
    ) {
        METRICS.record_blocked(candidate.kind.as_str(), reason.as_str());
        self.events.emit(AuditEvent::ContentBlocked {
            run_id,
            business_id: business_id.to_string(),
            kind: candidate.kind,
            item_id: candidate.id.clone(),
            title: candidate.title.clone(),
            reason,
            result,
            error,
        });
    }
}

fn breaker_config(resilience: &ResilienceConfig) -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        failure_threshold: resilience.circuit_breaker_failures.max(1),
        reset_timeout: resilience.breaker_reset_timeout(),
    }
}

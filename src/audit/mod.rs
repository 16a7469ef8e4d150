//! Content audit pipeline
//!
//! Screens candidate missions and insights before they are shown:
//! - Deterministic concept-hash and intent-signature fingerprints
//! - Earliest-wins duplicate filtering in fetch order
//! - Pluggable quality scorers (heuristic or LLM-backed)
//! - Per-kind threshold gating, failing closed on scorer errors

pub mod circuit_breaker;
pub mod events;
pub mod feed;
pub mod fingerprint;
pub mod llm_scorer;
pub mod models;
pub mod orchestrator;
pub mod scorer;
pub mod store;
pub mod thresholds;

pub use events::{AuditEvent, BlockReason, ChannelSink, EventSink, FanoutSink, RecordingSink, TracingSink};
pub use feed::{AuditedFeed, FeedScope, FeedSnapshot};
pub use fingerprint::{generate_concept_hash, generate_intent_signature, Fingerprint, Fingerprinter};
pub use llm_scorer::LlmScorer;
pub use models::{
    AuditReport, AuditResult, AuditedItem, BusinessContext, CandidateItem, ContentKind, ExistingItem,
};
pub use orchestrator::AuditOrchestrator;
pub use scorer::{HeuristicScorer, QualityScorer, ScoringError};
pub use store::{
    BusinessContextProvider, CachedContextProvider, CandidateStore, InMemoryCandidateStore,
    StaticContextProvider,
};
pub use thresholds::{ThresholdProfile, ThresholdProfiles};

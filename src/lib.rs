//! Content audit and deduplication pipeline
//!
//! Screens AI-generated business recommendations (missions and learning
//! insights) before they reach the end user:
//! - Concept-hash and intent-signature fingerprinting
//! - Earliest-wins duplicate filtering
//! - Per-kind quality gating over pluggable scorers
//! - Fire-and-forget observability events

pub mod audit;
pub mod config;
pub mod error;
pub mod metrics;
pub mod telemetry;

pub use audit::{
    AuditOrchestrator, AuditReport, AuditedFeed, AuditedItem, BusinessContext, CandidateItem,
    ContentKind, FeedScope, FeedSnapshot,
};
pub use crate::config::Config;
pub use error::{AuditError, Result};

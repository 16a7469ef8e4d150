//! Observability events emitted by the orchestrator
//!
//! Delivery is fire-and-forget: sinks never fail back into the pipeline and
//! never block it.

use super::models::{AuditResult, ContentKind};
use crate::config::EventsConfig;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Why a candidate was kept out of the audited set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    DuplicateDetected,
    FailedQualityGate,
    ScoringFailed,
}

impl BlockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockReason::DuplicateDetected => "duplicate_detected",
            BlockReason::FailedQualityGate => "failed_quality_gate",
            BlockReason::ScoringFailed => "scoring_failed",
        }
    }
}

/// Audit observability event, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    ContentBlocked {
        run_id: Uuid,
        business_id: String,
        kind: ContentKind,
        item_id: String,
        title: String,
        reason: BlockReason,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<AuditResult>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    AuditComplete {
        run_id: Uuid,
        business_id: String,
        kind: ContentKind,
        raw: usize,
        passed: usize,
        blocked: usize,
    },
    AuditError {
        run_id: Uuid,
        business_id: String,
        kind: ContentKind,
        error: String,
    },
}

impl AuditEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            AuditEvent::ContentBlocked { .. } => "content_blocked",
            AuditEvent::AuditComplete { .. } => "audit_complete",
            AuditEvent::AuditError { .. } => "audit_error",
        }
    }

    pub fn run_id(&self) -> Uuid {
        match self {
            AuditEvent::ContentBlocked { run_id, .. }
            | AuditEvent::AuditComplete { run_id, .. }
            | AuditEvent::AuditError { run_id, .. } => *run_id,
        }
    }
}

/// Fire-and-forget event sink
pub trait EventSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

/// Writes events as structured tracing records
#[derive(Debug, Clone, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: AuditEvent) {
        match &event {
            AuditEvent::ContentBlocked {
                run_id,
                business_id,
                kind,
                item_id,
                reason,
                result,
                error,
                ..
            } => {
                info!(
                    event = "content_blocked",
                    %run_id,
                    business_id = %business_id,
                    kind = %kind,
                    item_id = %item_id,
                    reason = reason.as_str(),
                    average_score = result.as_ref().map(|r| r.average_score),
                    error = error.as_deref(),
                    "Content blocked"
                );
            }
            AuditEvent::AuditComplete {
                run_id,
                business_id,
                kind,
                raw,
                passed,
                blocked,
            } => {
                info!(
                    event = "audit_complete",
                    %run_id,
                    business_id = %business_id,
                    kind = %kind,
                    raw,
                    passed,
                    blocked,
                    "Audit complete"
                );
            }
            AuditEvent::AuditError {
                run_id,
                business_id,
                kind,
                error,
            } => {
                warn!(
                    event = "audit_error",
                    %run_id,
                    business_id = %business_id,
                    kind = %kind,
                    error = %error,
                    "Audit failed"
                );
            }
        }
    }
}

/// Forwards events to a bounded channel, dropping them when it is full
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<AuditEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiving end of its channel
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<AuditEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    pub fn from_config(config: &EventsConfig) -> (Self, mpsc::Receiver<AuditEvent>) {
        Self::new(config.channel_capacity)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: AuditEvent) {
        if let Err(e) = self.sender.try_send(event) {
            warn!("Dropping audit event: {}", e);
        }
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Events of one `type`
    pub fn events_of(&self, event_type: &str) -> Vec<AuditEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: AuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Delivers each event to several sinks
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: AuditEvent) {
        for sink in &self.sinks {
            sink.emit(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> AuditEvent {
        AuditEvent::AuditComplete {
            run_id: Uuid::nil(),
            business_id: "biz".to_string(),
            kind: ContentKind::Mission,
            raw: 3,
            passed: 1,
            blocked: 2,
        }
    }

    #[test]
    fn test_event_is_tagged_by_type() {
        let json = serde_json::to_value(complete()).unwrap();
        assert_eq!(json["type"], "audit_complete");
        assert_eq!(json["kind"], "mission");
        assert_eq!(json["blocked"], 2);
    }

    #[tokio::test]
    async fn test_channel_sink_from_config() {
        let (sink, mut receiver) = ChannelSink::from_config(&EventsConfig::default());
        for _ in 0..3 {
            sink.emit(complete());
        }
        for _ in 0..3 {
            assert_eq!(receiver.recv().await, Some(complete()));
        }
    }

    #[test]
    fn test_block_reason_wire_names() {
        let json = serde_json::to_value(BlockReason::DuplicateDetected).unwrap();
        assert_eq!(json, "duplicate_detected");
        assert_eq!(BlockReason::FailedQualityGate.as_str(), "failed_quality_gate");
    }

    #[test]
    fn test_blocked_event_omits_empty_detail() {
        let event = AuditEvent::ContentBlocked {
            run_id: Uuid::nil(),
            business_id: "biz".to_string(),
            kind: ContentKind::Insight,
            item_id: "1".to_string(),
            title: "t".to_string(),
            reason: BlockReason::DuplicateDetected,
            result: None,
            error: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "content_blocked");
        assert!(json.get("result").is_none());
        assert!(json.get("error").is_none());
    }

    #[tokio::test]
    async fn test_channel_sink_drops_when_full() {
        let (sink, mut receiver) = ChannelSink::new(1);
        sink.emit(complete());
        sink.emit(complete());

        assert!(receiver.recv().await.is_some());
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_channel_sink_survives_closed_receiver() {
        let (sink, receiver) = ChannelSink::new(4);
        drop(receiver);
        sink.emit(complete());
    }

    #[test]
    fn test_fanout_reaches_every_sink() {
        let a = Arc::new(RecordingSink::new());
        let b = Arc::new(RecordingSink::new());
        let fanout = FanoutSink::default().with(a.clone()).with(b.clone());

        fanout.emit(complete());

        assert_eq!(a.events().len(), 1);
        assert_eq!(b.events_of("audit_complete").len(), 1);
    }
}

//! Audited feed consumed by presentation layers
//!
//! Holds the latest audit snapshot for one content kind and re-runs the
//! pipeline when the business or its brain revision changes. When several
//! runs overlap, only the most recently requested one may publish.

use super::models::{AuditReport, AuditedItem, ContentKind};
use super::orchestrator::AuditOrchestrator;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{debug, warn};

/// What the feed is currently audited for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeedScope {
    pub business_id: String,
    /// Bumped whenever the business brain is updated
    pub brain_revision: u64,
}

impl FeedScope {
    pub fn new(business_id: impl Into<String>, brain_revision: u64) -> Self {
        Self {
            business_id: business_id.into(),
            brain_revision,
        }
    }
}

/// Published feed state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedSnapshot {
    pub items: Vec<AuditedItem>,
    pub raw_count: usize,
    pub filtered_count: usize,
    pub blocked_count: usize,
    /// True while a run is in flight; items must not be displayed
    pub loading: bool,
}

impl FeedSnapshot {
    fn loading(previous: Option<&FeedSnapshot>) -> Self {
        let mut snapshot = previous.cloned().unwrap_or_default();
        snapshot.loading = true;
        snapshot
    }
}

impl From<AuditReport> for FeedSnapshot {
    fn from(report: AuditReport) -> Self {
        Self {
            items: report.items,
            raw_count: report.raw_count,
            filtered_count: report.filtered_count,
            blocked_count: report.blocked_count,
            loading: false,
        }
    }
}

/// Audit-gated feed for a single content kind
pub struct AuditedFeed {
    orchestrator: Arc<AuditOrchestrator>,
    kind: ContentKind,
    scope: Mutex<Option<FeedScope>>,
    generation: AtomicU64,
    state: watch::Sender<FeedSnapshot>,
}

impl AuditedFeed {
    pub fn new(orchestrator: Arc<AuditOrchestrator>, kind: ContentKind) -> Self {
        let (state, _) = watch::channel(FeedSnapshot::default());
        Self {
            orchestrator,
            kind,
            scope: Mutex::new(None),
            generation: AtomicU64::new(0),
            state,
        }
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    pub fn scope(&self) -> Option<FeedScope> {
        self.scope
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Current snapshot
    pub fn snapshot(&self) -> FeedSnapshot {
        self.state.borrow().clone()
    }

    /// Receive every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.state.subscribe()
    }

    /// Point the feed at a business/revision and audit it.
    ///
    /// An unchanged scope is a no-op. Switching businesses clears the
    /// previous items immediately so they are never shown under the new one.
    pub async fn set_scope(&self, scope: FeedScope) -> FeedSnapshot {
        let (generation, business_changed) = {
            let mut current = self
                .scope
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if current.as_ref() == Some(&scope) {
                return self.snapshot();
            }
            let changed = current
                .as_ref()
                .map_or(true, |c| c.business_id != scope.business_id);
            *current = Some(scope.clone());
            (self.next_generation(), changed)
        };

        self.orchestrator.invalidate_context(&scope.business_id).await;
        self.load(scope, business_changed, generation).await
    }

    /// Re-run the audit for the current scope; no-op without one
    pub async fn refetch(&self) -> FeedSnapshot {
        let claimed = {
            let current = self
                .scope
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            current
                .clone()
                .map(|scope| (scope, self.next_generation()))
        };

        match claimed {
            Some((scope, generation)) => self.load(scope, false, generation).await,
            None => self.snapshot(),
        }
    }

    /// Must be called with the scope lock held so generations follow scope order
    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    async fn load(&self, scope: FeedScope, clear: bool, generation: u64) -> FeedSnapshot {
        self.state.send_if_modified(|snapshot| {
            if !self.is_current(generation) {
                return false;
            }
            *snapshot = if clear {
                FeedSnapshot::loading(None)
            } else {
                FeedSnapshot::loading(Some(&*snapshot))
            };
            true
        });

        let next = match self.orchestrator.run(&scope.business_id, self.kind).await {
            Ok(report) => FeedSnapshot::from(report),
            Err(e) => {
                warn!(
                    "Audit of {} feed for business {} failed: {}",
                    self.kind, scope.business_id, e
                );
                FeedSnapshot::default()
            }
        };

        let published = self.state.send_if_modified(|snapshot| {
            if !self.is_current(generation) {
                return false;
            }
            *snapshot = next;
            true
        });

        if !published {
            debug!(
                "Discarding superseded audit results for business {}",
                scope.business_id
            );
        }

        self.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::events::RecordingSink;
    use crate::audit::models::CandidateItem;
    use crate::audit::scorer::HeuristicScorer;
    use crate::audit::store::{InMemoryCandidateStore, StaticContextProvider};
    use crate::audit::thresholds::{ThresholdProfile, ThresholdProfiles};

    async fn feed_with(items: Vec<CandidateItem>) -> (AuditedFeed, Arc<InMemoryCandidateStore>) {
        let store = Arc::new(InMemoryCandidateStore::new());
        store.insert_many("biz-1", items).await;

        let orchestrator = AuditOrchestrator::new(
            store.clone(),
            Arc::new(StaticContextProvider::new("ventas")),
            Arc::new(HeuristicScorer::new()),
            Arc::new(RecordingSink::new()),
            ThresholdProfiles::uniform(ThresholdProfile::new(0.0, 0.0)),
        )
        .unwrap();

        (AuditedFeed::new(Arc::new(orchestrator), ContentKind::Mission), store)
    }

    #[test]
    fn test_refetch_without_scope_is_noop() {
        tokio_test::block_on(async {
            let (feed, _) = feed_with(vec![]).await;
            let snapshot = feed.refetch().await;
            assert_eq!(snapshot, FeedSnapshot::default());
            assert!(feed.scope().is_none());
        });
    }

    #[tokio::test]
    async fn test_set_scope_publishes_report() {
        let (feed, _) = feed_with(vec![
            CandidateItem::new("1", ContentKind::Mission, "Aumentar ventas"),
            CandidateItem::new("2", ContentKind::Mission, "aumentar ventas"),
        ])
        .await;
        let mut rx = feed.subscribe();

        let snapshot = feed.set_scope(FeedScope::new("biz-1", 1)).await;

        assert!(!snapshot.loading);
        assert_eq!(snapshot.raw_count, 2);
        assert_eq!(snapshot.filtered_count, 1);
        assert_eq!(snapshot.blocked_count, 1);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), snapshot);
    }

    #[tokio::test]
    async fn test_same_scope_does_not_rerun() {
        let (feed, store) = feed_with(vec![CandidateItem::new(
            "1",
            ContentKind::Mission,
            "Aumentar ventas",
        )])
        .await;

        feed.set_scope(FeedScope::new("biz-1", 1)).await;
        store
            .insert("biz-1", CandidateItem::new("2", ContentKind::Mission, "Reducir costos"))
            .await;

        let unchanged = feed.set_scope(FeedScope::new("biz-1", 1)).await;
        assert_eq!(unchanged.raw_count, 1);

        let bumped = feed.set_scope(FeedScope::new("biz-1", 2)).await;
        assert_eq!(bumped.raw_count, 2);

        store
            .insert("biz-1", CandidateItem::new("3", ContentKind::Mission, "Abrir los domingos"))
            .await;
        assert_eq!(feed.refetch().await.raw_count, 3);
    }

    #[tokio::test]
    async fn test_superseded_generation_never_publishes() {
        let (feed, _) = feed_with(vec![CandidateItem::new(
            "1",
            ContentKind::Mission,
            "Aumentar ventas",
        )])
        .await;

        let current = feed.set_scope(FeedScope::new("biz-1", 1)).await;
        let mut rx = feed.subscribe();

        let stale = feed.load(FeedScope::new("biz-2", 1), true, 0).await;

        assert_eq!(stale, current);
        assert!(!stale.loading);
        assert_eq!(stale.filtered_count, 1);
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_refetch_claims_generation_in_scope_order() {
        let (feed, _) = feed_with(vec![CandidateItem::new(
            "1",
            ContentKind::Mission,
            "Aumentar ventas",
        )])
        .await;

        feed.set_scope(FeedScope::new("biz-1", 1)).await;
        let before = feed.generation.load(Ordering::SeqCst);
        feed.refetch().await;
        assert_eq!(feed.generation.load(Ordering::SeqCst), before + 1);
        assert!(feed.is_current(before + 1));
    }

    #[tokio::test]
    async fn test_switching_business_clears_items() {
        let (feed, _) = feed_with(vec![CandidateItem::new(
            "1",
            ContentKind::Mission,
            "Aumentar ventas",
        )])
        .await;

        feed.set_scope(FeedScope::new("biz-1", 1)).await;
        assert_eq!(feed.snapshot().filtered_count, 1);

        let other = feed.set_scope(FeedScope::new("biz-2", 1)).await;
        assert!(other.items.is_empty());
        assert_eq!(other.raw_count, 0);
        assert!(!other.loading);
    }
}

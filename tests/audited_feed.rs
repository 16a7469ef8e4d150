//! Audited feed concurrency tests

use async_trait::async_trait;
use content_audit::audit::{
    AuditOrchestrator, CandidateItem, CandidateStore, ContentKind, HeuristicScorer,
    InMemoryCandidateStore, RecordingSink, StaticContextProvider, ThresholdProfile,
    ThresholdProfiles,
};
use content_audit::{AuditedFeed, FeedScope};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Holds fetches for one business until released
struct GatedStore {
    inner: InMemoryCandidateStore,
    gated_business: String,
    entered: Notify,
    release: Notify,
    fail: AtomicBool,
}

#[async_trait]
impl CandidateStore for GatedStore {
    async fn fetch_candidates(
        &self,
        business_id: &str,
        kind: ContentKind,
    ) -> anyhow::Result<Vec<CandidateItem>> {
        if business_id == self.gated_business {
            self.entered.notify_one();
            self.release.notified().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("store offline");
        }
        self.inner.fetch_candidates(business_id, kind).await
    }
}

async fn setup() -> (Arc<AuditedFeed>, Arc<GatedStore>) {
    let inner = InMemoryCandidateStore::new();
    inner
        .insert_many(
            "slow",
            vec![
                CandidateItem::new("s1", ContentKind::Insight, "Abrir los domingos"),
                CandidateItem::new("s2", ContentKind::Insight, "Reducir costos fijos"),
            ],
        )
        .await;
    inner
        .insert("fast", CandidateItem::new("f1", ContentKind::Insight, "Aumentar ventas"))
        .await;

    let store = Arc::new(GatedStore {
        inner,
        gated_business: "slow".to_string(),
        entered: Notify::new(),
        release: Notify::new(),
        fail: AtomicBool::new(false),
    });

    let orchestrator = AuditOrchestrator::new(
        store.clone(),
        Arc::new(StaticContextProvider::new("ventas")),
        Arc::new(HeuristicScorer::new()),
        Arc::new(RecordingSink::new()),
        ThresholdProfiles::uniform(ThresholdProfile::new(0.0, 0.0)),
    )
    .unwrap();

    let feed = Arc::new(AuditedFeed::new(Arc::new(orchestrator), ContentKind::Insight));
    (feed, store)
}

#[tokio::test]
async fn test_latest_scope_wins_over_slower_run() {
    let (feed, store) = setup().await;

    let slow = tokio::spawn({
        let feed = feed.clone();
        async move { feed.set_scope(FeedScope::new("slow", 1)).await }
    });
    store.entered.notified().await;

    // The slow run is in flight: the feed must not show anything yet
    assert!(feed.snapshot().loading);
    assert!(feed.snapshot().items.is_empty());

    let fast = feed.set_scope(FeedScope::new("fast", 1)).await;
    assert_eq!(fast.items.len(), 1);
    assert_eq!(fast.items[0].item.id, "f1");

    store.release.notify_one();
    slow.await.unwrap();

    let current = feed.snapshot();
    assert_eq!(current, fast);
    assert!(!current.loading);
    assert_eq!(feed.scope(), Some(FeedScope::new("fast", 1)));
}

#[tokio::test]
async fn test_failed_run_publishes_empty_snapshot() {
    let (feed, store) = setup().await;

    let first = feed.set_scope(FeedScope::new("fast", 1)).await;
    assert_eq!(first.filtered_count, 1);

    store.fail.store(true, Ordering::SeqCst);
    let failed = feed.refetch().await;

    assert!(failed.items.is_empty());
    assert_eq!(failed.raw_count, 0);
    assert!(!failed.loading);
}

#[tokio::test]
async fn test_subscribers_see_loading_then_result() {
    let (feed, store) = setup().await;
    let mut rx = feed.subscribe();

    let run = tokio::spawn({
        let feed = feed.clone();
        async move { feed.set_scope(FeedScope::new("slow", 7)).await }
    });
    store.entered.notified().await;

    rx.changed().await.unwrap();
    assert!(rx.borrow_and_update().loading);

    store.release.notify_one();
    let done = run.await.unwrap();

    rx.changed().await.unwrap();
    let published = rx.borrow_and_update().clone();
    assert_eq!(published, done);
    assert_eq!(published.raw_count, 2);
}

#[tokio::test]
async fn test_scope_switch_supersedes_inflight_refetch() {
    let (feed, store) = setup().await;

    let first = tokio::spawn({
        let feed = feed.clone();
        async move { feed.set_scope(FeedScope::new("slow", 1)).await }
    });
    store.entered.notified().await;
    store.release.notify_one();
    assert_eq!(first.await.unwrap().raw_count, 2);

    let refetch = tokio::spawn({
        let feed = feed.clone();
        async move { feed.refetch().await }
    });
    store.entered.notified().await;

    let fast = feed.set_scope(FeedScope::new("fast", 1)).await;
    assert_eq!(fast.raw_count, 1);

    store.release.notify_one();
    refetch.await.unwrap();

    let current = feed.snapshot();
    assert_eq!(current, fast);
    assert!(current.items.iter().all(|i| i.item.id == "f1"));
    assert_eq!(feed.scope(), Some(FeedScope::new("fast", 1)));
}

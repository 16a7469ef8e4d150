//! Collaborator seams: candidate storage and business context lookup

use super::models::{BusinessContext, CandidateItem, ContentKind, DEFAULT_FOCUS_AREA};
use crate::config::ContextConfig;
use async_trait::async_trait;
use moka::future::Cache;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// Read-only source of candidate rows
#[async_trait]
pub trait CandidateStore: Send + Sync {
    /// Candidates for a business and kind, newest first
    async fn fetch_candidates(
        &self,
        business_id: &str,
        kind: ContentKind,
    ) -> anyhow::Result<Vec<CandidateItem>>;
}

/// In-process candidate store keyed by business
#[derive(Debug, Default)]
pub struct InMemoryCandidateStore {
    rows: RwLock<HashMap<String, Vec<CandidateItem>>>,
}

impl InMemoryCandidateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, business_id: &str, item: CandidateItem) {
        self.rows
            .write()
            .await
            .entry(business_id.to_string())
            .or_default()
            .push(item);
    }

    pub async fn insert_many(&self, business_id: &str, items: impl IntoIterator<Item = CandidateItem>) {
        self.rows
            .write()
            .await
            .entry(business_id.to_string())
            .or_default()
            .extend(items);
    }

    pub async fn len(&self, business_id: &str) -> usize {
        self.rows
            .read()
            .await
            .get(business_id)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl CandidateStore for InMemoryCandidateStore {
    async fn fetch_candidates(
        &self,
        business_id: &str,
        kind: ContentKind,
    ) -> anyhow::Result<Vec<CandidateItem>> {
        let rows = self.rows.read().await;
        let mut items: Vec<CandidateItem> = rows
            .get(business_id)
            .map(|items| items.iter().filter(|i| i.kind == kind).cloned().collect())
            .unwrap_or_default();

        // Stable: rows sharing a timestamp keep insertion order
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }
}

/// Business context lookup. Never fails: unknown businesses degrade to a
/// fallback context.
#[async_trait]
pub trait BusinessContextProvider: Send + Sync {
    async fn business_context(&self, business_id: &str) -> BusinessContext;
}

/// Context provider backed by a fixed map
#[derive(Debug, Clone)]
pub struct StaticContextProvider {
    contexts: HashMap<String, BusinessContext>,
    fallback_focus_area: String,
}

impl Default for StaticContextProvider {
    fn default() -> Self {
        Self::new(DEFAULT_FOCUS_AREA)
    }
}

impl StaticContextProvider {
    pub fn new(fallback_focus_area: impl Into<String>) -> Self {
        Self {
            contexts: HashMap::new(),
            fallback_focus_area: fallback_focus_area.into(),
        }
    }

    /// Provider whose fallback topic comes from `[context] fallback_focus_area`
    pub fn from_config(config: &ContextConfig) -> Self {
        Self::new(config.fallback_focus_area.clone())
    }

    pub fn with_context(mut self, context: BusinessContext) -> Self {
        self.contexts.insert(context.business_id.clone(), context);
        self
    }
}

#[async_trait]
impl BusinessContextProvider for StaticContextProvider {
    async fn business_context(&self, business_id: &str) -> BusinessContext {
        match self.contexts.get(business_id) {
            Some(context) => context.clone(),
            None => {
                debug!("No enriched context for {}, using fallback", business_id);
                BusinessContext::fallback(business_id, self.fallback_focus_area.clone())
            }
        }
    }
}

/// TTL cache in front of another context provider
pub struct CachedContextProvider {
    inner: Arc<dyn BusinessContextProvider>,
    cache: Cache<String, BusinessContext>,
}

impl CachedContextProvider {
    pub fn new(inner: Arc<dyn BusinessContextProvider>, ttl: Duration, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();
        Self { inner, cache }
    }

    /// Drop the cached context, e.g. after a brain update
    pub async fn invalidate(&self, business_id: &str) {
        self.cache.invalidate(business_id).await;
    }
}

#[async_trait]
impl BusinessContextProvider for CachedContextProvider {
    async fn business_context(&self, business_id: &str) -> BusinessContext {
        let inner = self.inner.clone();
        let id = business_id.to_string();
        self.cache
            .get_with(business_id.to_string(), async move {
                inner.business_context(&id).await
            })
            .await
    }
}

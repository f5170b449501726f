//! Source fetch isolation.
//!
//! Each source is fetched independently and concurrently. One source's
//! failure degrades to an empty item list for that source — recorded in
//! `missing_sources` so the composed feed can mark itself partial — and
//! never blocks or corrupts the others.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::task::JoinSet;

use crate::cache::{CacheKey, ReadThroughCache};
use crate::error::FeedError;
use crate::records::{SourceBatch, SourceRecords};
use crate::types::SourceType;

/// One raw-record source. Implementations own their storage/query concerns;
/// the engine only sees the fetched batch.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source_type(&self) -> SourceType;
    async fn fetch(&self) -> Result<SourceBatch, FeedError>;
}

/// Fetch every source concurrently and fold the results. Failed or panicked
/// sources are logged and listed in `missing_sources`.
pub async fn gather_sources(adapters: &[Arc<dyn SourceAdapter>]) -> SourceRecords {
    let expected: Vec<SourceType> = adapters.iter().map(|a| a.source_type()).collect();

    let mut tasks = JoinSet::new();
    for adapter in adapters {
        let adapter = Arc::clone(adapter);
        tasks.spawn(async move { (adapter.source_type(), adapter.fetch().await) });
    }

    let mut records = SourceRecords::default();
    let mut delivered = Vec::new();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((source, Ok(batch))) => {
                records.absorb(batch);
                delivered.push(source);
            }
            Ok((source, Err(e))) => {
                log::warn!("source {} failed, degrading to empty: {}", source, e);
            }
            Err(e) => {
                // A panicked task can't name its source; the missing-source
                // diff below still attributes it.
                log::warn!("source fetch task aborted: {}", e);
            }
        }
    }

    let mut missing: Vec<SourceType> = expected
        .into_iter()
        .filter(|s| !delivered.contains(s))
        .collect();
    missing.sort_by_key(|s| s.as_str());
    missing.dedup();
    records.missing_sources = missing;
    records
}

/// Read-through caching wrapper around an adapter (keyed by source +
/// fetch parameters). An optimization only — a cold or absent cache just
/// means a real fetch.
pub struct CachingAdapter<A> {
    inner: A,
    cache: Arc<ReadThroughCache<SourceBatch>>,
    params: String,
}

impl<A: SourceAdapter> CachingAdapter<A> {
    pub fn new(inner: A, cache: Arc<ReadThroughCache<SourceBatch>>, params: &str) -> Self {
        CachingAdapter {
            inner,
            cache,
            params: params.to_string(),
        }
    }
}

#[async_trait]
impl<A: SourceAdapter> SourceAdapter for CachingAdapter<A> {
    fn source_type(&self) -> SourceType {
        self.inner.source_type()
    }

    async fn fetch(&self) -> Result<SourceBatch, FeedError> {
        let key = CacheKey::new(self.inner.source_type(), self.params.clone());
        let now = Utc::now();

        if let Some(batch) = self.cache.get(&key, now) {
            log::debug!("cache hit for {} ({})", key.source, self.params);
            return Ok(batch);
        }

        let batch = self.inner.fetch().await?;
        self.cache.put(key, batch.clone(), now);
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::records::RawIdea;
    use crate::types::IdeaStage;

    fn idea(id: &str) -> RawIdea {
        RawIdea {
            id: id.to_string(),
            entity_id: Some("acme".to_string()),
            portfolio_ids: vec![],
            title: None,
            stage: Some(IdeaStage::Draft),
            expected_return: None,
            created_at: None,
            updated_at: None,
        }
    }

    struct OkIdeas;
    #[async_trait]
    impl SourceAdapter for OkIdeas {
        fn source_type(&self) -> SourceType {
            SourceType::Idea
        }
        async fn fetch(&self) -> Result<SourceBatch, FeedError> {
            Ok(SourceBatch::Ideas(vec![idea("idea-1")]))
        }
    }

    struct FailingDeliverables;
    #[async_trait]
    impl SourceAdapter for FailingDeliverables {
        fn source_type(&self) -> SourceType {
            SourceType::Deliverable
        }
        async fn fetch(&self) -> Result<SourceBatch, FeedError> {
            Err(FeedError::SourceFetch {
                source: SourceType::Deliverable,
                message: "upstream timeout".to_string(),
            })
        }
    }

    struct CountingIdeas {
        fetches: Arc<AtomicUsize>,
    }
    #[async_trait]
    impl SourceAdapter for CountingIdeas {
        fn source_type(&self) -> SourceType {
            SourceType::Idea
        }
        async fn fetch(&self) -> Result<SourceBatch, FeedError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(SourceBatch::Ideas(vec![idea("idea-1")]))
        }
    }

    #[tokio::test]
    async fn one_failing_source_does_not_block_the_others() {
        let adapters: Vec<Arc<dyn SourceAdapter>> =
            vec![Arc::new(OkIdeas), Arc::new(FailingDeliverables)];
        let records = gather_sources(&adapters).await;

        assert_eq!(records.ideas.len(), 1);
        assert!(records.deliverables.is_empty());
        assert_eq!(records.missing_sources, vec![SourceType::Deliverable]);
    }

    #[tokio::test]
    async fn all_sources_healthy_means_nothing_missing() {
        let adapters: Vec<Arc<dyn SourceAdapter>> = vec![Arc::new(OkIdeas)];
        let records = gather_sources(&adapters).await;
        assert!(records.missing_sources.is_empty());
    }

    #[tokio::test]
    async fn caching_adapter_serves_repeat_fetches_from_cache() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(ReadThroughCache::new(300));
        let adapter = CachingAdapter::new(
            CountingIdeas {
                fetches: Arc::clone(&fetches),
            },
            cache,
            "portfolio=alpha",
        );

        let first = adapter.fetch().await.unwrap();
        let second = adapter.fetch().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }
}

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info};
use urlvet_model::ScanRecord;
use uuid::Uuid;

use crate::metrics::ScanMetrics;
use crate::store::ScanStore;
use crate::Result;

/// Request-time dedup/cache decisions.
///
/// Given a `(url, user)` submission, decides in order:
/// 1. the owner already has a recent record for this URL — return it
///    unchanged whatever its status;
/// 2. any owner has a recent completed scan of this URL — copy it into
///    a new `DONE` record for the requester;
/// 3. otherwise enqueue a fresh `SUBMITTED` record for the worker.
pub struct ScanResolver {
    store: Arc<dyn ScanStore>,
    metrics: Arc<ScanMetrics>,
    cache_ttl: Duration,
}

impl std::fmt::Debug for ScanResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanResolver")
            .field("cache_ttl", &self.cache_ttl)
            .finish_non_exhaustive()
    }
}

impl ScanResolver {
    pub fn new(store: Arc<dyn ScanStore>, metrics: Arc<ScanMetrics>, cache_ttl: Duration) -> Self {
        Self {
            store,
            metrics,
            cache_ttl,
        }
    }

    pub async fn resolve(&self, url: &str, user_id: Uuid) -> Result<ScanRecord> {
        let since = Utc::now() - self.cache_ttl;

        if let Some(existing) = self
            .store
            .find_by_owner_and_url_since(user_id, url, since)
            .await?
        {
            self.metrics.record_user_cache_hit();
            debug!(%user_id, url, scan_id = %existing.id, "owner dedup hit");
            return Ok(existing);
        }

        if let Some(cached) = self.store.find_global_cached_since(url, since).await? {
            self.metrics.record_global_cache_hit();
            let record = ScanRecord::from_cache(url, user_id, &cached);
            let saved = self.store.save(&record).await?;
            info!(%user_id, url, scan_id = %saved.id, source = %cached.id, "global cache hit");
            return Ok(saved);
        }

        self.metrics.record_new_submission();
        let record = ScanRecord::new(url, user_id);
        let saved = self.store.save(&record).await?;
        info!(%user_id, url, scan_id = %saved.id, "scan queued for submission");
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryScanStore;
    use serde_json::json;
    use urlvet_model::ScanStatus;

    const URL: &str = "https://example.com/page";

    fn resolver(store: &Arc<InMemoryScanStore>) -> (ScanResolver, Arc<ScanMetrics>) {
        let metrics = Arc::new(ScanMetrics::new());
        let resolver = ScanResolver::new(
            store.clone() as Arc<dyn ScanStore>,
            metrics.clone(),
            Duration::hours(24),
        );
        (resolver, metrics)
    }

    #[tokio::test]
    async fn cache_miss_creates_submitted_record() {
        let store = Arc::new(InMemoryScanStore::new());
        let (resolver, metrics) = resolver(&store);
        let user = Uuid::new_v4();

        let record = resolver.resolve(URL, user).await.unwrap();
        assert_eq!(record.status, ScanStatus::Submitted);
        assert_eq!(record.user_id, user);
        assert_eq!(record.url, URL);
        assert_eq!(store.len(), 1);
        assert_eq!(metrics.snapshot().new_submissions, 1);
    }

    #[tokio::test]
    async fn owner_dedup_returns_same_record_without_new_row() {
        let store = Arc::new(InMemoryScanStore::new());
        let (resolver, metrics) = resolver(&store);
        let user = Uuid::new_v4();

        let first = resolver.resolve(URL, user).await.unwrap();
        let second = resolver.resolve(URL, user).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.len(), 1);
        assert_eq!(metrics.snapshot().user_cache_hits, 1);
    }

    #[tokio::test]
    async fn owner_dedup_applies_regardless_of_status() {
        let store = Arc::new(InMemoryScanStore::new());
        let (resolver, _) = resolver(&store);
        let user = Uuid::new_v4();

        let mut failed = ScanRecord::new(URL, user);
        failed.mark_failed("submission_error: provider rejected").unwrap();
        store.save(&failed).await.unwrap();

        let returned = resolver.resolve(URL, user).await.unwrap();
        assert_eq!(returned.id, failed.id);
        assert_eq!(returned.status, ScanStatus::Failed);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn global_cache_copies_done_record_for_new_owner() {
        let store = Arc::new(InMemoryScanStore::new());
        let (resolver, metrics) = resolver(&store);
        let original_owner = Uuid::new_v4();
        let requester = Uuid::new_v4();

        let mut done = ScanRecord::new(URL, original_owner);
        done.mark_processing("ext-42").unwrap();
        done.mark_done(json!({"verdict": "clean"})).unwrap();
        store.save(&done).await.unwrap();

        let record = resolver.resolve(URL, requester).await.unwrap();
        assert_eq!(record.status, ScanStatus::Done);
        assert_eq!(record.user_id, requester);
        assert_ne!(record.id, done.id);
        assert_eq!(record.external_scan_id.as_deref(), Some("ext-42"));
        assert_eq!(record.result, done.result);
        assert_eq!(store.len(), 2);
        assert_eq!(metrics.snapshot().global_cache_hits, 1);
    }

    #[tokio::test]
    async fn non_done_foreign_records_are_not_cache_hits() {
        let store = Arc::new(InMemoryScanStore::new());
        let (resolver, metrics) = resolver(&store);

        let mut processing = ScanRecord::new(URL, Uuid::new_v4());
        processing.mark_processing("ext-1").unwrap();
        store.save(&processing).await.unwrap();

        let record = resolver.resolve(URL, Uuid::new_v4()).await.unwrap();
        assert_eq!(record.status, ScanStatus::Submitted);
        assert_eq!(metrics.snapshot().new_submissions, 1);
        assert_eq!(metrics.snapshot().global_cache_hits, 0);
    }

    #[tokio::test]
    async fn records_older_than_ttl_are_ignored() {
        let store = Arc::new(InMemoryScanStore::new());
        let (resolver, _) = resolver(&store);
        let user = Uuid::new_v4();

        let mut stale = ScanRecord::new(URL, user);
        stale.created_at = Utc::now() - Duration::hours(25);
        store.save(&stale).await.unwrap();

        let record = resolver.resolve(URL, user).await.unwrap();
        assert_ne!(record.id, stale.id);
        assert_eq!(record.status, ScanStatus::Submitted);
        assert_eq!(store.len(), 2);
    }
}

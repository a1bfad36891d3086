use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use urlvet_model::{PageOf, PageRequest, ScanRecord, ScanStatus, User};
use uuid::Uuid;

use super::{ScanClaimSession, ScanStore, UserStore};
use crate::Result;

#[derive(Debug, Default)]
struct ScanState {
    records: HashMap<Uuid, ScanRecord>,
    locked: HashSet<Uuid>,
}

/// In-memory [`ScanStore`] with simulated skip-locked claiming.
///
/// Rows claimed by any open session are invisible to further claims
/// until that session commits or is dropped; staged writes only become
/// visible at commit. Mirrors the Postgres store closely enough to
/// exercise the resolver and worker without a database.
#[derive(Clone, Debug, Default)]
pub struct InMemoryScanStore {
    state: Arc<Mutex<ScanState>>,
}

impl InMemoryScanStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, for assertions on row creation.
    pub fn len(&self) -> usize {
        self.state.lock().expect("scan store mutex poisoned").records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Direct lookup bypassing ownership scoping.
    pub fn get(&self, id: Uuid) -> Option<ScanRecord> {
        self.state
            .lock()
            .expect("scan store mutex poisoned")
            .records
            .get(&id)
            .cloned()
    }
}

#[async_trait]
impl ScanStore for InMemoryScanStore {
    async fn save(&self, record: &ScanRecord) -> Result<ScanRecord> {
        let mut state = self.state.lock().expect("scan store mutex poisoned");
        let mut stored = record.clone();
        stored.updated_at = Utc::now();
        state.records.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_by_owner_and_url_since(
        &self,
        user_id: Uuid,
        url: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<ScanRecord>> {
        let state = self.state.lock().expect("scan store mutex poisoned");
        Ok(state
            .records
            .values()
            .filter(|r| r.user_id == user_id && r.url == url && r.created_at >= since)
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn find_global_cached_since(
        &self,
        url: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<ScanRecord>> {
        let state = self.state.lock().expect("scan store mutex poisoned");
        Ok(state
            .records
            .values()
            .filter(|r| r.url == url && r.status == ScanStatus::Done && r.created_at >= since)
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn list_by_owner(&self, user_id: Uuid, page: PageRequest) -> Result<PageOf<ScanRecord>> {
        let page = page.clamped();
        let state = self.state.lock().expect("scan store mutex poisoned");

        let mut owned: Vec<ScanRecord> = state
            .records
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = owned.len() as i64;
        let items = owned
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect();

        Ok(PageOf {
            items,
            page: page.page,
            per_page: page.per_page,
            total,
        })
    }

    async fn find_by_id_and_owner(&self, id: Uuid, user_id: Uuid) -> Result<Option<ScanRecord>> {
        let state = self.state.lock().expect("scan store mutex poisoned");
        Ok(state
            .records
            .get(&id)
            .filter(|r| r.user_id == user_id)
            .cloned())
    }

    async fn delete_by_id_and_owner(&self, id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut state = self.state.lock().expect("scan store mutex poisoned");
        let owned = state
            .records
            .get(&id)
            .is_some_and(|r| r.user_id == user_id);
        if owned {
            state.records.remove(&id);
        }
        Ok(owned)
    }

    async fn count_by_status(&self, status: ScanStatus) -> Result<i64> {
        let state = self.state.lock().expect("scan store mutex poisoned");
        Ok(state
            .records
            .values()
            .filter(|r| r.status == status)
            .count() as i64)
    }

    async fn distinct_owners_with_status(&self, status: ScanStatus) -> Result<Vec<Uuid>> {
        let state = self.state.lock().expect("scan store mutex poisoned");
        let owners: HashSet<Uuid> = state
            .records
            .values()
            .filter(|r| r.status == status)
            .map(|r| r.user_id)
            .collect();
        Ok(owners.into_iter().collect())
    }

    async fn begin_claim(&self) -> Result<Box<dyn ScanClaimSession>> {
        Ok(Box::new(InMemoryClaimSession {
            state: self.state.clone(),
            claimed: HashSet::new(),
            staged: HashMap::new(),
        }))
    }
}

struct InMemoryClaimSession {
    state: Arc<Mutex<ScanState>>,
    claimed: HashSet<Uuid>,
    staged: HashMap<Uuid, ScanRecord>,
}

impl InMemoryClaimSession {
    fn claim_where<F>(&mut self, limit: i64, predicate: F) -> Vec<ScanRecord>
    where
        F: Fn(&ScanRecord) -> bool,
    {
        let mut state = self.state.lock().expect("scan store mutex poisoned");
        let mut candidates: Vec<ScanRecord> = state
            .records
            .values()
            .filter(|r| predicate(r) && !state.locked.contains(&r.id))
            .cloned()
            .collect();
        candidates.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        candidates.truncate(limit.max(0) as usize);

        for record in &candidates {
            state.locked.insert(record.id);
            self.claimed.insert(record.id);
        }
        candidates
    }

    fn release(&mut self) {
        let mut state = self.state.lock().expect("scan store mutex poisoned");
        for id in self.claimed.drain() {
            state.locked.remove(&id);
        }
    }
}

#[async_trait]
impl ScanClaimSession for InMemoryClaimSession {
    async fn claim_by_status(&mut self, status: ScanStatus, limit: i64) -> Result<Vec<ScanRecord>> {
        Ok(self.claim_where(limit, |r| r.status == status))
    }

    async fn claim_by_owner_and_status(
        &mut self,
        user_id: Uuid,
        status: ScanStatus,
        limit: i64,
    ) -> Result<Vec<ScanRecord>> {
        Ok(self.claim_where(limit, |r| r.user_id == user_id && r.status == status))
    }

    async fn distinct_owners(&mut self, status: ScanStatus) -> Result<Vec<Uuid>> {
        let state = self.state.lock().expect("scan store mutex poisoned");
        let mut owners: Vec<Uuid> = state
            .records
            .values()
            .filter(|r| r.status == status)
            .map(|r| r.user_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        owners.sort();
        Ok(owners)
    }

    async fn persist(&mut self, record: &ScanRecord) -> Result<()> {
        self.staged.insert(record.id, record.clone());
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<()> {
        let staged = std::mem::take(&mut self.staged);
        {
            let mut state = self.state.lock().expect("scan store mutex poisoned");
            for (id, mut record) in staged {
                record.updated_at = Utc::now();
                state.records.insert(id, record);
            }
        }
        self.release();
        Ok(())
    }
}

impl Drop for InMemoryClaimSession {
    fn drop(&mut self) {
        // Uncommitted sessions roll back: staged writes vanish, locks lift.
        self.release();
    }
}

/// In-memory [`UserStore`] counterpart for handler-level tests.
#[derive(Clone, Debug, Default)]
pub struct InMemoryUserStore {
    users: Arc<Mutex<HashMap<Uuid, User>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn create(&self, user: &User) -> Result<()> {
        let mut users = self.users.lock().expect("user store mutex poisoned");
        if users.values().any(|u| u.email == user.email) {
            return Err(crate::ScanError::Conflict(
                "Email is already in use".to_string(),
            ));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self.users.lock().expect("user store mutex poisoned");
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let users = self.users.lock().expect("user store mutex poisoned");
        Ok(users.get(&id).cloned())
    }

    async fn email_exists(&self, email: &str) -> Result<bool> {
        let users = self.users.lock().expect("user store mutex poisoned");
        Ok(users.values().any(|u| u.email == email))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(n: usize, user_id: Uuid) -> InMemoryScanStore {
        let store = InMemoryScanStore::new();
        let mut state = store.state.lock().unwrap();
        for i in 0..n {
            let mut record = ScanRecord::new(format!("https://example.com/{i}"), user_id);
            // Spread creation times so claim ordering is deterministic.
            record.created_at = record.created_at + chrono::Duration::milliseconds(i as i64);
            state.records.insert(record.id, record);
        }
        drop(state);
        store
    }

    #[tokio::test]
    async fn concurrent_claims_are_disjoint() {
        let store = seeded(10, Uuid::new_v4());

        let mut first = store.begin_claim().await.unwrap();
        let mut second = store.begin_claim().await.unwrap();

        let a = first.claim_by_status(ScanStatus::Submitted, 6).await.unwrap();
        let b = second.claim_by_status(ScanStatus::Submitted, 6).await.unwrap();

        let a_ids: HashSet<Uuid> = a.iter().map(|r| r.id).collect();
        let b_ids: HashSet<Uuid> = b.iter().map(|r| r.id).collect();
        assert_eq!(a.len(), 6);
        assert_eq!(b.len(), 4);
        assert!(a_ids.is_disjoint(&b_ids));
    }

    #[tokio::test]
    async fn dropped_session_releases_locks_and_discards_writes() {
        let store = seeded(2, Uuid::new_v4());

        {
            let mut session = store.begin_claim().await.unwrap();
            let mut batch = session.claim_by_status(ScanStatus::Submitted, 2).await.unwrap();
            let record = &mut batch[0];
            record.mark_processing("ext-1").unwrap();
            session.persist(record).await.unwrap();
            // Dropped without commit: a crash mid-batch.
        }

        assert_eq!(store.count_by_status(ScanStatus::Submitted).await.unwrap(), 2);
        let mut retry = store.begin_claim().await.unwrap();
        let batch = retry.claim_by_status(ScanStatus::Submitted, 10).await.unwrap();
        assert_eq!(batch.len(), 2);
    }

    #[tokio::test]
    async fn commit_applies_staged_writes_and_releases_locks() {
        let store = seeded(1, Uuid::new_v4());

        let mut session = store.begin_claim().await.unwrap();
        let mut batch = session.claim_by_status(ScanStatus::Submitted, 1).await.unwrap();
        batch[0].mark_processing("ext-7").unwrap();
        session.persist(&batch[0]).await.unwrap();
        session.commit().await.unwrap();

        let stored = store.get(batch[0].id).unwrap();
        assert_eq!(stored.status, ScanStatus::Processing);
        assert_eq!(stored.external_scan_id.as_deref(), Some("ext-7"));
        assert_eq!(store.count_by_status(ScanStatus::Submitted).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn owner_scoped_access_hides_foreign_records() {
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let store = InMemoryScanStore::new();
        let record = store
            .save(&ScanRecord::new("https://example.com", owner))
            .await
            .unwrap();

        assert!(store
            .find_by_id_and_owner(record.id, stranger)
            .await
            .unwrap()
            .is_none());
        assert!(!store.delete_by_id_and_owner(record.id, stranger).await.unwrap());
        assert!(store.delete_by_id_and_owner(record.id, owner).await.unwrap());
    }

    #[tokio::test]
    async fn user_store_rejects_duplicate_email() {
        let users = InMemoryUserStore::new();
        let user = User::new("a@example.com", "hash", "Ada", "Lovelace");
        users.create(&user).await.unwrap();

        let dup = User::new("a@example.com", "hash2", "Grace", "Hopper");
        assert!(matches!(
            users.create(&dup).await,
            Err(crate::ScanError::Conflict(_))
        ));
        assert!(users.email_exists("a@example.com").await.unwrap());
        assert!(users.find_by_email("b@example.com").await.unwrap().is_none());
    }
}

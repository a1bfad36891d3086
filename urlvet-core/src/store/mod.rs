//! Persistence contracts for scan and user storage.
//!
//! The batch worker claims records through a [`ScanClaimSession`]: an
//! exclusive, non-blocking claim over a batch of rows whose locks are
//! held until the session commits (or is dropped, which releases the
//! locks without applying staged writes). Concurrent sessions always
//! receive disjoint batches and never wait on each other's locks.

mod memory;
mod postgres;

pub use memory::{InMemoryScanStore, InMemoryUserStore};
pub use postgres::{PostgresScanStore, PostgresUserStore};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use urlvet_model::{PageOf, PageRequest, ScanRecord, ScanStatus, User};
use uuid::Uuid;

use crate::Result;

/// A claim transaction over scan records.
///
/// Within one session, a row claimed earlier may be returned again by a
/// later overlapping claim (the session itself holds the lock); callers
/// that must process each row once track claimed ids themselves.
#[async_trait]
pub trait ScanClaimSession: Send {
    /// Claim up to `limit` records in `status`, skipping rows locked by
    /// concurrent claimants. Never blocks.
    async fn claim_by_status(&mut self, status: ScanStatus, limit: i64) -> Result<Vec<ScanRecord>>;

    /// Same as [`ScanClaimSession::claim_by_status`], scoped to one owner.
    async fn claim_by_owner_and_status(
        &mut self,
        user_id: Uuid,
        status: ScanStatus,
        limit: i64,
    ) -> Result<Vec<ScanRecord>>;

    /// Owners currently holding at least one record in `status`.
    async fn distinct_owners(&mut self, status: ScanStatus) -> Result<Vec<Uuid>>;

    /// Stage an update for a claimed record; applied at commit.
    async fn persist(&mut self, record: &ScanRecord) -> Result<()>;

    /// Apply staged writes and release all claimed locks.
    async fn commit(self: Box<Self>) -> Result<()>;
}

/// Durable, queryable, lockable storage of scan records.
#[async_trait]
pub trait ScanStore: Send + Sync {
    /// Insert or update; `updated_at` is refreshed on every call.
    async fn save(&self, record: &ScanRecord) -> Result<ScanRecord>;

    /// Most recent record for the exact `(user_id, url)` pair created at
    /// or after `since`.
    async fn find_by_owner_and_url_since(
        &self,
        user_id: Uuid,
        url: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<ScanRecord>>;

    /// Most recent `DONE` record for `url` across all owners created at
    /// or after `since`.
    async fn find_global_cached_since(
        &self,
        url: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<ScanRecord>>;

    async fn list_by_owner(&self, user_id: Uuid, page: PageRequest) -> Result<PageOf<ScanRecord>>;

    async fn find_by_id_and_owner(&self, id: Uuid, user_id: Uuid) -> Result<Option<ScanRecord>>;

    /// Returns whether a row was deleted. A record owned by someone else
    /// is indistinguishable from a missing one.
    async fn delete_by_id_and_owner(&self, id: Uuid, user_id: Uuid) -> Result<bool>;

    async fn count_by_status(&self, status: ScanStatus) -> Result<i64>;

    async fn distinct_owners_with_status(&self, status: ScanStatus) -> Result<Vec<Uuid>>;

    /// Open a claim session holding its locks until commit or drop.
    async fn begin_claim(&self) -> Result<Box<dyn ScanClaimSession>>;
}

/// Account storage for registration, login, and token validation.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, user: &User) -> Result<()>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;

    async fn email_exists(&self, email: &str) -> Result<bool>;
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::info;
use urlvet_model::{PageOf, PageRequest, ScanRecord, ScanStatus, User};
use uuid::Uuid;

use super::{ScanClaimSession, ScanStore, UserStore};
use crate::{Result, ScanError};

const SCAN_COLUMNS: &str =
    "id, url, user_id, status, external_scan_id, result, failure_reason, created_at, updated_at";

/// PostgreSQL-backed implementation of the [`ScanStore`] port.
///
/// Claim sessions map directly onto `FOR UPDATE SKIP LOCKED` inside a
/// transaction: locks are held until the session commits, and rows
/// locked by a concurrent worker are silently excluded from the batch.
#[derive(Clone, Debug)]
pub struct PostgresScanStore {
    pool: PgPool,
}

impl PostgresScanStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        info!("Connecting to PostgreSQL");
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(database_url)
            .await
            .map_err(|e| ScanError::Database(format!("failed to connect to PostgreSQL: {e}")))?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Verify connectivity with a trivial round-trip.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| ScanError::Database(format!("health check failed: {e}")))?;
        Ok(())
    }

    /// Create tables and indexes if they do not exist yet.
    pub async fn initialize_schema(&self) -> Result<()> {
        info!("Initializing database schema");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY,
                email TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                CONSTRAINT users_email_key UNIQUE (email)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(ScanError::db)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS url_scans (
                id UUID PRIMARY KEY,
                url TEXT NOT NULL,
                user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                status TEXT NOT NULL,
                external_scan_id TEXT,
                result JSONB,
                failure_reason TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(ScanError::db)?;

        for ddl in [
            "CREATE INDEX IF NOT EXISTS idx_url_scans_owner_url_created
             ON url_scans (user_id, url, created_at DESC)",
            "CREATE INDEX IF NOT EXISTS idx_url_scans_url_status_created
             ON url_scans (url, status, created_at DESC)",
            "CREATE INDEX IF NOT EXISTS idx_url_scans_status_created
             ON url_scans (status, created_at)",
        ] {
            sqlx::query(ddl)
                .execute(&self.pool)
                .await
                .map_err(ScanError::db)?;
        }

        info!("Database schema initialized");
        Ok(())
    }
}

fn record_from_row(row: &PgRow) -> Result<ScanRecord> {
    let status: String = row.try_get("status").map_err(ScanError::db)?;
    Ok(ScanRecord {
        id: row.try_get("id").map_err(ScanError::db)?,
        url: row.try_get("url").map_err(ScanError::db)?,
        user_id: row.try_get("user_id").map_err(ScanError::db)?,
        status: status.parse()?,
        external_scan_id: row.try_get("external_scan_id").map_err(ScanError::db)?,
        result: row.try_get("result").map_err(ScanError::db)?,
        failure_reason: row.try_get("failure_reason").map_err(ScanError::db)?,
        created_at: row.try_get("created_at").map_err(ScanError::db)?,
        updated_at: row.try_get("updated_at").map_err(ScanError::db)?,
    })
}

fn user_from_row(row: &PgRow) -> Result<User> {
    Ok(User {
        id: row.try_get("id").map_err(ScanError::db)?,
        email: row.try_get("email").map_err(ScanError::db)?,
        password_hash: row.try_get("password_hash").map_err(ScanError::db)?,
        first_name: row.try_get("first_name").map_err(ScanError::db)?,
        last_name: row.try_get("last_name").map_err(ScanError::db)?,
        created_at: row.try_get("created_at").map_err(ScanError::db)?,
        updated_at: row.try_get("updated_at").map_err(ScanError::db)?,
    })
}

#[async_trait]
impl ScanStore for PostgresScanStore {
    async fn save(&self, record: &ScanRecord) -> Result<ScanRecord> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO url_scans
                (id, url, user_id, status, external_scan_id, result, failure_reason, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                external_scan_id = EXCLUDED.external_scan_id,
                result = EXCLUDED.result,
                failure_reason = EXCLUDED.failure_reason,
                updated_at = NOW()
            RETURNING {SCAN_COLUMNS}
            "#
        ))
        .bind(record.id)
        .bind(&record.url)
        .bind(record.user_id)
        .bind(record.status.as_str())
        .bind(&record.external_scan_id)
        .bind(&record.result)
        .bind(&record.failure_reason)
        .bind(record.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ScanError::Database(format!("failed to save scan: {e}")))?;

        record_from_row(&row)
    }

    async fn find_by_owner_and_url_since(
        &self,
        user_id: Uuid,
        url: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<ScanRecord>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {SCAN_COLUMNS}
            FROM url_scans
            WHERE user_id = $1 AND url = $2 AND created_at >= $3
            ORDER BY created_at DESC
            LIMIT 1
            "#
        ))
        .bind(user_id)
        .bind(url)
        .bind(since)
        .fetch_optional(&self.pool)
        .await
        .map_err(ScanError::db)?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn find_global_cached_since(
        &self,
        url: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<ScanRecord>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {SCAN_COLUMNS}
            FROM url_scans
            WHERE url = $1 AND status = $2 AND created_at >= $3
            ORDER BY created_at DESC
            LIMIT 1
            "#
        ))
        .bind(url)
        .bind(ScanStatus::Done.as_str())
        .bind(since)
        .fetch_optional(&self.pool)
        .await
        .map_err(ScanError::db)?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn list_by_owner(&self, user_id: Uuid, page: PageRequest) -> Result<PageOf<ScanRecord>> {
        let page = page.clamped();

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM url_scans WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(ScanError::db)?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT {SCAN_COLUMNS}
            FROM url_scans
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(ScanError::db)?;

        let items = rows
            .iter()
            .map(record_from_row)
            .collect::<Result<Vec<_>>>()?;

        Ok(PageOf {
            items,
            page: page.page,
            per_page: page.per_page,
            total,
        })
    }

    async fn find_by_id_and_owner(&self, id: Uuid, user_id: Uuid) -> Result<Option<ScanRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {SCAN_COLUMNS} FROM url_scans WHERE id = $1 AND user_id = $2",
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ScanError::db)?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn delete_by_id_and_owner(&self, id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM url_scans WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(ScanError::db)?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_by_status(&self, status: ScanStatus) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM url_scans WHERE status = $1")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(ScanError::db)
    }

    async fn distinct_owners_with_status(&self, status: ScanStatus) -> Result<Vec<Uuid>> {
        let rows = sqlx::query("SELECT DISTINCT user_id FROM url_scans WHERE status = $1")
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(ScanError::db)?;

        rows.iter()
            .map(|row| row.try_get("user_id").map_err(ScanError::db))
            .collect()
    }

    async fn begin_claim(&self) -> Result<Box<dyn ScanClaimSession>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ScanError::Database(format!("failed to begin claim transaction: {e}")))?;
        Ok(Box::new(PostgresClaimSession { tx }))
    }
}

/// One claim transaction; dropping it without commit rolls back staged
/// writes and releases every row lock.
struct PostgresClaimSession {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ScanClaimSession for PostgresClaimSession {
    async fn claim_by_status(&mut self, status: ScanStatus, limit: i64) -> Result<Vec<ScanRecord>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {SCAN_COLUMNS}
            FROM url_scans
            WHERE status = $1
            ORDER BY created_at
            LIMIT $2
            FOR UPDATE SKIP LOCKED
            "#
        ))
        .bind(status.as_str())
        .bind(limit)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| ScanError::Database(format!("claim by status failed: {e}")))?;

        rows.iter().map(record_from_row).collect()
    }

    async fn claim_by_owner_and_status(
        &mut self,
        user_id: Uuid,
        status: ScanStatus,
        limit: i64,
    ) -> Result<Vec<ScanRecord>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {SCAN_COLUMNS}
            FROM url_scans
            WHERE user_id = $1 AND status = $2
            ORDER BY created_at
            LIMIT $3
            FOR UPDATE SKIP LOCKED
            "#
        ))
        .bind(user_id)
        .bind(status.as_str())
        .bind(limit)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| ScanError::Database(format!("claim by owner failed: {e}")))?;

        rows.iter().map(record_from_row).collect()
    }

    async fn distinct_owners(&mut self, status: ScanStatus) -> Result<Vec<Uuid>> {
        let rows = sqlx::query("SELECT DISTINCT user_id FROM url_scans WHERE status = $1")
            .bind(status.as_str())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(ScanError::db)?;

        rows.iter()
            .map(|row| row.try_get("user_id").map_err(ScanError::db))
            .collect()
    }

    async fn persist(&mut self, record: &ScanRecord) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE url_scans
            SET status = $2,
                external_scan_id = $3,
                result = $4,
                failure_reason = $5,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(record.id)
        .bind(record.status.as_str())
        .bind(&record.external_scan_id)
        .bind(&record.result)
        .bind(&record.failure_reason)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| ScanError::Database(format!("failed to persist claimed scan: {e}")))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| ScanError::Database(format!("failed to commit claim transaction: {e}")))
    }
}

/// PostgreSQL-backed implementation of the [`UserStore`] port.
#[derive(Clone, Debug)]
pub struct PostgresUserStore {
    pool: PgPool,
}

impl PostgresUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PostgresUserStore {
    async fn create(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, first_name, last_name, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error() {
                if db_err.constraint() == Some("users_email_key") {
                    return ScanError::Conflict("Email is already in use".to_string());
                }
            }
            ScanError::Database(format!("failed to create user: {e}"))
        })?;

        info!("Created user {} ({})", user.email, user.id);
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, email, password_hash, first_name, last_name, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(ScanError::db)?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, email, password_hash, first_name, last_name, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ScanError::db)?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn email_exists(&self, email: &str) -> Result<bool> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = $1")
                .bind(email)
                .fetch_one(&self.pool)
                .await
                .map_err(ScanError::db)?;
        Ok(count > 0)
    }
}

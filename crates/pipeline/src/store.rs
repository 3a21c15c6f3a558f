//! Usage datastore seam.
//!
//! The gate and ledger talk to counters, balances, and the usage log
//! through [`UsageStore`] so the whole pipeline runs against in-memory
//! fakes in tests. [`PgUsageStore`] is the production implementation over
//! the repositories in `pixshop-db`.

use async_trait::async_trait;

use pixshop_core::types::DbId;
use pixshop_db::models::usage_log::CreateUsageLog;
use pixshop_db::repositories::{AnonymousUsageRepo, CreditAccountRepo, UsageLogRepo};
use pixshop_db::DbPool;

/// Error from the usage datastore. The pipeline only ever logs these or
/// fails open, so the payload is a plain message.
#[derive(Debug, thiserror::Error)]
#[error("Usage store error: {0}")]
pub struct UsageStoreError(pub String);

impl From<sqlx::Error> for UsageStoreError {
    fn from(e: sqlx::Error) -> Self {
        UsageStoreError(e.to_string())
    }
}

/// Counter, balance, and usage-log operations the pipeline needs.
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Current balance for a user, creating the account with the signup
    /// grant on first sight.
    async fn credit_balance(&self, user_id: DbId, signup_grant: i64)
        -> Result<i64, UsageStoreError>;

    /// Current request count for an anonymous (session, IP) pair; zero if
    /// the pair has never been seen.
    async fn anonymous_count(
        &self,
        session_id: &str,
        ip_address: &str,
    ) -> Result<i64, UsageStoreError>;

    /// Increment the anonymous counter, returning the new count.
    async fn increment_anonymous(
        &self,
        session_id: &str,
        ip_address: &str,
    ) -> Result<i64, UsageStoreError>;

    /// Conditionally deduct one credit; `None` means the balance was
    /// already empty and nothing changed.
    async fn deduct_one_credit(&self, user_id: DbId) -> Result<Option<i64>, UsageStoreError>;

    /// Append an immutable usage-log entry.
    async fn append_usage_log(&self, entry: CreateUsageLog) -> Result<(), UsageStoreError>;
}

/// Production [`UsageStore`] over the PostgreSQL repositories.
pub struct PgUsageStore {
    pool: DbPool,
}

impl PgUsageStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsageStore for PgUsageStore {
    async fn credit_balance(
        &self,
        user_id: DbId,
        signup_grant: i64,
    ) -> Result<i64, UsageStoreError> {
        let account = CreditAccountRepo::get_or_create(&self.pool, user_id, signup_grant).await?;
        Ok(account.balance)
    }

    async fn anonymous_count(
        &self,
        session_id: &str,
        ip_address: &str,
    ) -> Result<i64, UsageStoreError> {
        let record = AnonymousUsageRepo::find(&self.pool, session_id, ip_address).await?;
        Ok(record.map(|r| r.request_count).unwrap_or(0))
    }

    async fn increment_anonymous(
        &self,
        session_id: &str,
        ip_address: &str,
    ) -> Result<i64, UsageStoreError> {
        Ok(AnonymousUsageRepo::increment(&self.pool, session_id, ip_address).await?)
    }

    async fn deduct_one_credit(&self, user_id: DbId) -> Result<Option<i64>, UsageStoreError> {
        Ok(CreditAccountRepo::deduct_one(&self.pool, user_id).await?)
    }

    async fn append_usage_log(&self, entry: CreateUsageLog) -> Result<(), UsageStoreError> {
        UsageLogRepo::create(&self.pool, &entry).await?;
        Ok(())
    }
}

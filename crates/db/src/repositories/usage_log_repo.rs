//! Repository for the `usage_log` table.

use sqlx::PgPool;
use pixshop_core::types::DbId;

use crate::models::usage_log::{CreateUsageLog, UsageLog};

/// Column list for usage_log queries.
const COLUMNS: &str = "id, user_id, session_id, provider, kind, duration_ms, \
    outcome, credits_charged, created_at";

/// Append-only access to the immutable usage log.
pub struct UsageLogRepo;

impl UsageLogRepo {
    /// Append a usage entry, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateUsageLog) -> Result<UsageLog, sqlx::Error> {
        let query = format!(
            "INSERT INTO usage_log
                (user_id, session_id, provider, kind, duration_ms, outcome, credits_charged)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UsageLog>(&query)
            .bind(input.user_id)
            .bind(&input.session_id)
            .bind(&input.provider)
            .bind(&input.kind)
            .bind(input.duration_ms)
            .bind(&input.outcome)
            .bind(input.credits_charged)
            .fetch_one(pool)
            .await
    }

    /// List a user's most recent entries, newest first.
    pub async fn list_recent_for_user(
        pool: &PgPool,
        user_id: DbId,
        limit: i64,
    ) -> Result<Vec<UsageLog>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM usage_log
             WHERE user_id = $1
             ORDER BY created_at DESC
             LIMIT $2"
        );
        sqlx::query_as::<_, UsageLog>(&query)
            .bind(user_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}

//! Repository for the `anonymous_usage` table.

use sqlx::PgPool;

use crate::models::anonymous_usage::AnonymousUsage;

/// Column list for anonymous_usage queries.
const COLUMNS: &str = "id, session_id, ip_address, request_count, created_at, updated_at";

/// Read/increment operations for per-session free-quota counters.
pub struct AnonymousUsageRepo;

impl AnonymousUsageRepo {
    /// Find the counter for a (session, IP) pair.
    pub async fn find(
        pool: &PgPool,
        session_id: &str,
        ip_address: &str,
    ) -> Result<Option<AnonymousUsage>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM anonymous_usage
             WHERE session_id = $1 AND ip_address = $2"
        );
        sqlx::query_as::<_, AnonymousUsage>(&query)
            .bind(session_id)
            .bind(ip_address)
            .fetch_optional(pool)
            .await
    }

    /// Fetch the counter, creating a zero row on first sight.
    pub async fn get_or_create(
        pool: &PgPool,
        session_id: &str,
        ip_address: &str,
    ) -> Result<AnonymousUsage, sqlx::Error> {
        let query = format!(
            "INSERT INTO anonymous_usage (session_id, ip_address, request_count)
             VALUES ($1, $2, 0)
             ON CONFLICT (session_id, ip_address)
                 DO UPDATE SET updated_at = anonymous_usage.updated_at
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AnonymousUsage>(&query)
            .bind(session_id)
            .bind(ip_address)
            .fetch_one(pool)
            .await
    }

    /// Increment the counter by one, returning the new count.
    ///
    /// Creates the row first if it does not exist yet, so an increment on a
    /// fresh session yields 1.
    pub async fn increment(
        pool: &PgPool,
        session_id: &str,
        ip_address: &str,
    ) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "INSERT INTO anonymous_usage (session_id, ip_address, request_count)
             VALUES ($1, $2, 1)
             ON CONFLICT (session_id, ip_address)
                 DO UPDATE SET request_count = anonymous_usage.request_count + 1,
                               updated_at = now()
             RETURNING request_count",
        )
        .bind(session_id)
        .bind(ip_address)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }
}

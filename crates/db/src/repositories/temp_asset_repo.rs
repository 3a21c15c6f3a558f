//! Repository for the `temporary_assets` table.

use sqlx::PgPool;
use pixshop_core::types::Timestamp;

use crate::models::temp_asset::TempAsset;

/// Column list for temporary_assets queries.
const COLUMNS: &str = "id, object_key, public_url, owner_tag, created_at";

/// Metadata tracking for provider-visible uploads.
pub struct TempAssetRepo;

impl TempAssetRepo {
    /// Record a freshly uploaded object.
    pub async fn create(
        pool: &PgPool,
        object_key: &str,
        public_url: &str,
        owner_tag: &str,
    ) -> Result<TempAsset, sqlx::Error> {
        let query = format!(
            "INSERT INTO temporary_assets (object_key, public_url, owner_tag)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TempAsset>(&query)
            .bind(object_key)
            .bind(public_url)
            .bind(owner_tag)
            .fetch_one(pool)
            .await
    }

    /// Remove the row for a deleted object. Returns `true` if a row existed.
    pub async fn delete_by_key(pool: &PgPool, object_key: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM temporary_assets WHERE object_key = $1")
            .bind(object_key)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List assets older than the cutoff, oldest first.
    ///
    /// Feeds the background sweep that reclaims anything a request failed
    /// to clean up.
    pub async fn find_older_than(
        pool: &PgPool,
        cutoff: Timestamp,
    ) -> Result<Vec<TempAsset>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM temporary_assets
             WHERE created_at < $1
             ORDER BY created_at ASC"
        );
        sqlx::query_as::<_, TempAsset>(&query)
            .bind(cutoff)
            .fetch_all(pool)
            .await
    }
}

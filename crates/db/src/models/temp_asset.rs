//! Temporary asset metadata models.

use serde::Serialize;
use sqlx::FromRow;
use pixshop_core::types::{DbId, Timestamp};

/// A provider-visible uploaded object, tracked so the background sweep can
/// reclaim anything a request failed to clean up.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TempAsset {
    pub id: DbId,
    pub object_key: String,
    pub public_url: String,
    pub owner_tag: String,
    pub created_at: Timestamp,
}

//! Anonymous usage counter models.

use serde::Serialize;
use sqlx::FromRow;
use pixshop_core::types::{DbId, Timestamp};

/// A per-session counter row from the `anonymous_usage` table.
///
/// Keyed by (session id, IP address); created lazily on first use and only
/// ever incremented.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AnonymousUsage {
    pub id: DbId,
    pub session_id: String,
    pub ip_address: String,
    pub request_count: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

//! Usage log models.
//!
//! Immutable per-generation entries written before any credit deduction so
//! billing records and operational logs never silently disagree.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use pixshop_core::types::{DbId, Timestamp};

/// A usage log row from the `usage_log` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UsageLog {
    pub id: DbId,
    pub user_id: Option<DbId>,
    pub session_id: Option<String>,
    pub provider: String,
    pub kind: String,
    pub duration_ms: i64,
    pub outcome: String,
    pub credits_charged: i64,
    pub created_at: Timestamp,
}

/// Input for appending a usage log entry.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUsageLog {
    pub user_id: Option<DbId>,
    pub session_id: Option<String>,
    pub provider: String,
    pub kind: String,
    pub duration_ms: i64,
    pub outcome: String,
    pub credits_charged: i64,
}

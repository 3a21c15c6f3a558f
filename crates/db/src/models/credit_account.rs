//! Credit account models.
//!
//! One row per authenticated user. Balances are topped up out of band by
//! the payment webhook and drained one credit at a time by the ledger.

use serde::Serialize;
use sqlx::FromRow;
use pixshop_core::types::{DbId, Timestamp};

/// A credit account row from the `credit_accounts` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CreditAccount {
    pub id: DbId,
    pub user_id: DbId,
    pub balance: i64,
    pub lifetime_purchased: i64,
    pub last_purchase_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

//! Repository for the `credit_accounts` table.

use sqlx::PgPool;
use pixshop_core::types::DbId;

use crate::models::credit_account::CreditAccount;

/// Column list for credit_accounts queries.
const COLUMNS: &str = "id, user_id, balance, lifetime_purchased, last_purchase_at, \
    created_at, updated_at";

/// CRUD operations for per-user credit balances.
pub struct CreditAccountRepo;

impl CreditAccountRepo {
    /// Find an account by the owning user id.
    pub async fn find_by_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Option<CreditAccount>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM credit_accounts WHERE user_id = $1");
        sqlx::query_as::<_, CreditAccount>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Fetch the account for a user, creating it with the signup grant on
    /// first sight. Concurrent first requests are resolved by the unique
    /// constraint: the losing insert is a no-op and the existing row wins.
    pub async fn get_or_create(
        pool: &PgPool,
        user_id: DbId,
        signup_grant: i64,
    ) -> Result<CreditAccount, sqlx::Error> {
        let query = format!(
            "INSERT INTO credit_accounts (user_id, balance)
             VALUES ($1, $2)
             ON CONFLICT (user_id) DO UPDATE SET updated_at = credit_accounts.updated_at
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CreditAccount>(&query)
            .bind(user_id)
            .bind(signup_grant)
            .fetch_one(pool)
            .await
    }

    /// Conditionally deduct exactly one credit.
    ///
    /// Returns the new balance if a credit was available, `None` if the
    /// balance was already zero (no row mutated). The `balance >= 1` guard
    /// is what keeps balances non-negative under concurrent requests.
    pub async fn deduct_one(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Option<i64>, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as(
            "UPDATE credit_accounts
             SET balance = balance - 1, updated_at = now()
             WHERE user_id = $1 AND balance >= 1
             RETURNING balance",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(|(balance,)| balance))
    }

    /// Add purchased credits, bumping the lifetime total and purchase
    /// timestamp. Called by the payment webhook after checkout completes.
    pub async fn add_credits(
        pool: &PgPool,
        user_id: DbId,
        amount: i64,
    ) -> Result<Option<i64>, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as(
            "UPDATE credit_accounts
             SET balance = balance + $2,
                 lifetime_purchased = lifetime_purchased + $2,
                 last_purchase_at = now(),
                 updated_at = now()
             WHERE user_id = $1
             RETURNING balance",
        )
        .bind(user_id)
        .bind(amount)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(|(balance,)| balance))
    }
}

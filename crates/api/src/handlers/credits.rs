//! Handlers for the `/credits` resource.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use pixshop_core::types::Timestamp;
use pixshop_db::models::usage_log::UsageLog;
use pixshop_db::repositories::{CreditAccountRepo, UsageLogRepo};

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// Number of usage-log entries returned with the balance.
const RECENT_USAGE_LIMIT: i64 = 20;

/// Credit balance plus recent usage for the signed-in user.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditsResponse {
    pub balance: i64,
    pub lifetime_purchased: i64,
    pub last_purchase_at: Option<Timestamp>,
    pub recent_usage: Vec<UsageLog>,
}

/// GET /api/v1/credits
///
/// Creates the account with the signup grant if this is the first time
/// the user shows up.
pub async fn get_credits(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<CreditsResponse>> {
    let account =
        CreditAccountRepo::get_or_create(&state.pool, user.user_id, state.config.signup_grant)
            .await?;
    let recent_usage =
        UsageLogRepo::list_recent_for_user(&state.pool, user.user_id, RECENT_USAGE_LIMIT).await?;

    Ok(Json(CreditsResponse {
        balance: account.balance,
        lifetime_purchased: account.lifetime_purchased,
        last_purchase_at: account.last_purchase_at,
        recent_usage,
    }))
}

//! Handlers for inbound webhooks.
//!
//! The payment processor settles checkouts asynchronously and notifies us
//! here; this is the only path that adds credits to a balance.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use pixshop_core::error::CoreError;
use pixshop_core::types::DbId;
use pixshop_db::repositories::CreditAccountRepo;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Header carrying the shared webhook secret.
const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

/// Payload of a settled checkout.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCompleted {
    pub user_id: DbId,
    pub credits: i64,
}

/// POST /api/v1/webhooks/payment
///
/// Authenticated by a shared secret header, not a user token -- the
/// caller is the payment processor.
pub async fn payment_completed(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<PaymentCompleted>,
) -> AppResult<StatusCode> {
    let secret = headers
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if secret != state.config.payment_webhook_secret {
        return Err(AppError::Core(CoreError::Forbidden(
            "Invalid webhook secret".into(),
        )));
    }

    if input.credits <= 0 {
        return Err(AppError::BadRequest(
            "credits must be a positive amount".into(),
        ));
    }

    // Make sure the account exists before topping it up; a user can buy
    // credits before their first generation.
    CreditAccountRepo::get_or_create(&state.pool, input.user_id, state.config.signup_grant)
        .await?;
    let balance = CreditAccountRepo::add_credits(&state.pool, input.user_id, input.credits)
        .await?
        .ok_or_else(|| AppError::InternalError("Credit top-up found no account row".into()))?;

    tracing::info!(
        user_id = input.user_id,
        credits = input.credits,
        balance,
        "Payment webhook credited account",
    );

    Ok(StatusCode::NO_CONTENT)
}

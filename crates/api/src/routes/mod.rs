//! Route tables.

use axum::Router;

use crate::state::AppState;

pub mod credits;
pub mod generation;
pub mod health;
pub mod webhooks;

/// All routes mounted under `/api/v1`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(generation::router())
        .merge(credits::router())
        .merge(webhooks::router())
}

use axum::routing::get;
use axum::Router;

use crate::handlers::credits;
use crate::state::AppState;

/// Mount the credit balance endpoint.
pub fn router() -> Router<AppState> {
    Router::new().route("/credits", get(credits::get_credits))
}

use axum::routing::post;
use axum::Router;

use crate::handlers::webhooks;
use crate::state::AppState;

/// Mount inbound webhook endpoints.
pub fn router() -> Router<AppState> {
    Router::new().route("/webhooks/payment", post(webhooks::payment_completed))
}

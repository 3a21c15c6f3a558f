use axum::extract::DefaultBodyLimit;
use axum::routing::post;
use axum::Router;

use crate::handlers::generation;
use crate::state::AppState;

/// Upper bound on a generation upload. Combine can carry up to eight
/// phone-camera images, so the default 2 MiB axum limit is far too small.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Mount the four generation endpoints.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/generate/edit", post(generation::edit))
        .route("/generate/filter", post(generation::filter))
        .route("/generate/adjust", post(generation::adjust))
        .route("/generate/combine", post(generation::combine))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

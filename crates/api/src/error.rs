use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use pixshop_core::error::CoreError;
use pixshop_core::usage::DenyReason;
use pixshop_pipeline::PipelineError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and [`PipelineError`] for
/// generation failures, and implements [`IntoResponse`] to produce the
/// `{ error, message, details? }` JSON shape with the right status code.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `pixshop_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A generation pipeline failure.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Pipeline(e) => pipeline_response(e),

            AppError::Core(core) => {
                let (status, code, message) = classify_core_error(&core);
                simple_response(status, code, message)
            }

            AppError::Database(err) => {
                let (status, code, message) = classify_sqlx_error(&err);
                simple_response(status, code, message)
            }

            AppError::BadRequest(msg) => {
                simple_response(StatusCode::BAD_REQUEST, "BAD_REQUEST", msg)
            }

            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                simple_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        }
    }
}

/// Render a `{ error, message }` body.
fn simple_response(status: StatusCode, code: &'static str, message: String) -> Response {
    let body = json!({
        "error": code,
        "message": message,
    });
    (status, axum::Json(body)).into_response()
}

/// Map a pipeline failure onto the HTTP contract.
///
/// Gate denials carry their remediation payloads (`creditsRemaining`,
/// `requiresAuth`, ...); everything past the gate collapses into a
/// provider-agnostic 500 whose technical detail is only attached outside
/// production.
fn pipeline_response(e: PipelineError) -> Response {
    match e {
        PipelineError::Denied(DenyReason::InsufficientCredits { balance, required }) => {
            let body = json!({
                "error": "INSUFFICIENT_CREDITS",
                "message": "Not enough credits for this generation. Buy credits to continue.",
                "creditsRemaining": balance,
                "creditsRequired": required,
            });
            (StatusCode::PAYMENT_REQUIRED, axum::Json(body)).into_response()
        }
        PipelineError::Denied(DenyReason::QuotaExceeded { limit, used }) => {
            let body = json!({
                "error": "QUOTA_EXCEEDED",
                "message": "Free generation limit reached. Sign in to continue.",
                "limit": limit,
                "used": used,
                "requiresAuth": true,
            });
            (StatusCode::TOO_MANY_REQUESTS, axum::Json(body)).into_response()
        }
        PipelineError::Denied(DenyReason::SessionRequired) => simple_response(
            StatusCode::UNAUTHORIZED,
            "SESSION_REQUIRED",
            "A session id is required. Retry with an x-session-id header.".to_string(),
        ),
        PipelineError::BuildRequest(msg) => {
            simple_response(StatusCode::BAD_REQUEST, "BAD_REQUEST", msg)
        }
        failure @ (PipelineError::Upload(_)
        | PipelineError::Provider(_)
        | PipelineError::Timeout { .. }
        | PipelineError::Normalize(_)
        | PipelineError::Conversion(_)) => {
            let mut body = json!({
                "error": "GENERATION_FAILED",
                "message": "Failed to generate image. Please try again.",
            });
            if expose_error_details() {
                body["details"] = json!({
                    "stage": failure.stage().as_str(),
                    "cause": failure.to_string(),
                });
            }
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response()
        }
    }
}

/// Developer detail payloads are suppressed in production.
fn expose_error_details() -> bool {
    std::env::var("APP_ENV").map(|v| v != "production").unwrap_or(true)
}

fn classify_core_error(core: &CoreError) -> (StatusCode, &'static str, String) {
    match core {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
        CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique constraint violations (constraint name starting with `uq_`) map to 409.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) => {
            // PostgreSQL unique constraint violation: error code 23505
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown");
                if constraint.starts_with("uq_") {
                    return (
                        StatusCode::CONFLICT,
                        "CONFLICT",
                        format!("Duplicate value violates unique constraint: {constraint}"),
                    );
                }
            }
            tracing::error!(error = %db_err, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
        other => {
            tracing::error!(error = %other, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;

    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn insufficient_credits_is_402_with_remediation_payload() {
        let err = AppError::Pipeline(PipelineError::Denied(DenyReason::InsufficientCredits {
            balance: 0,
            required: 2,
        }));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);

        let json = body_json(response).await;
        assert_eq!(json["error"], "INSUFFICIENT_CREDITS");
        assert_eq!(json["creditsRemaining"], 0);
        assert_eq!(json["creditsRequired"], 2);
    }

    #[tokio::test]
    async fn quota_exceeded_is_429_and_signals_auth() {
        let err = AppError::Pipeline(PipelineError::Denied(DenyReason::QuotaExceeded {
            limit: 20,
            used: 20,
        }));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let json = body_json(response).await;
        assert_eq!(json["error"], "QUOTA_EXCEEDED");
        assert_eq!(json["limit"], 20);
        assert_eq!(json["used"], 20);
        assert_eq!(json["requiresAuth"], true);
    }

    #[tokio::test]
    async fn missing_session_is_401() {
        let err = AppError::Pipeline(PipelineError::Denied(DenyReason::SessionRequired));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn build_failure_is_400() {
        let err = AppError::Pipeline(PipelineError::BuildRequest("too many images".into()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert_eq!(json["error"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn timeout_is_a_generic_500_with_tagged_stage() {
        let err = AppError::Pipeline(PipelineError::Timeout { attempts: 300 });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["error"], "GENERATION_FAILED");
        // Outside production the failing stage is attached for debugging.
        assert_eq!(json["details"]["stage"], "execute");
    }

    #[tokio::test]
    async fn provider_failure_message_is_provider_agnostic() {
        let err = AppError::Pipeline(PipelineError::Provider(
            "Provider API error (500): boom".into(),
        ));
        let response = err.into_response();
        let json = body_json(response).await;
        assert_eq!(json["message"], "Failed to generate image. Please try again.");
    }
}

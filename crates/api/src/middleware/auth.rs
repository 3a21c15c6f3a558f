//! Caller-identity extractors for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use pixshop_core::error::CoreError;
use pixshop_core::types::DbId;
use pixshop_pipeline::Caller;

use crate::auth::jwt::validate_token;
use crate::error::AppError;
use crate::state::AppState;

/// Header anonymous clients use to identify their session.
pub const SESSION_HEADER: &str = "x-session-id";

/// Authenticated user extracted from a JWT Bearer token in the
/// `Authorization` header. Use on endpoints that require sign-in.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user's stable id (from `claims.sub`).
    pub user_id: DbId,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(
                    "Missing Authorization header".into(),
                ))
            })?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Invalid Authorization format. Expected: Bearer <token>".into(),
            ))
        })?;

        let claims = validate_token(token, &state.config.jwt).map_err(|_| {
            AppError::Core(CoreError::Unauthorized("Invalid or expired token".into()))
        })?;

        Ok(AuthUser {
            user_id: claims.sub,
        })
    }
}

/// Caller identity for the generation endpoints, where authentication is
/// optional: a valid Bearer token yields an authenticated caller, no
/// token yields an anonymous one keyed by session header + client IP.
///
/// A *present but invalid* token is still a 401 -- silently downgrading a
/// signed-in user to the anonymous quota would be surprising.
#[derive(Debug, Clone)]
pub struct CallerIdentity(pub Caller);

impl FromRequestParts<AppState> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if parts.headers.contains_key("authorization") {
            let user = AuthUser::from_request_parts(parts, state).await?;
            return Ok(CallerIdentity(Caller::User {
                user_id: user.user_id,
            }));
        }

        let session_id = parts
            .headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(CallerIdentity(Caller::Anonymous {
            session_id,
            ip_address: client_ip(parts),
        }))
    }
}

/// Best-effort client IP: first hop of `x-forwarded-for` when behind a
/// proxy, else the literal peer is unknown at this layer.
fn client_ip(parts: &Parts) -> String {
    parts
        .headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

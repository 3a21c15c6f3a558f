//! Typed response payloads for the generation endpoints.

use base64::Engine;
use serde::Serialize;
use pixshop_pipeline::{Caller, GenerationOutcome};

/// Successful generation response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub success: bool,
    pub image: ImagePayload,
    /// Wall-clock pipeline time in milliseconds.
    pub processing_time: i64,
    /// Remaining credit balance, for authenticated callers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits_remaining: Option<i64>,
    /// Free-quota usage, for anonymous callers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<QuotaUsage>,
}

/// The generated image as inline base64.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
    pub data: String,
    pub mime_type: String,
}

/// Anonymous free-quota usage after this request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaUsage {
    pub limit: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<i64>,
}

impl GenerateResponse {
    /// Assemble the response for a delivered generation.
    pub fn from_outcome(outcome: GenerationOutcome, caller: &Caller, quota: i64) -> Self {
        let (credits_remaining, usage) = match caller {
            Caller::User { .. } => (outcome.remaining, None),
            Caller::Anonymous { .. } => (
                None,
                Some(QuotaUsage {
                    limit: quota,
                    remaining: outcome.remaining,
                }),
            ),
        };

        Self {
            success: true,
            image: ImagePayload {
                data: base64::engine::general_purpose::STANDARD.encode(&outcome.data),
                mime_type: outcome.mime,
            },
            processing_time: outcome.processing_ms,
            credits_remaining,
            usage,
        }
    }
}

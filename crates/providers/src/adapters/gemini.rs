//! Adapter for the synchronous inline provider.
//!
//! Unlike the task providers this one takes source images as base64
//! `inline_data` parts (no upload step) and answers in the same HTTP
//! response. Aspect ratio is not a free-form parameter: when the caller
//! did not request one it is derived from the first source image's pixel
//! dimensions, snapped to the nearest supported ratio.

use base64::Engine;
use pixshop_core::intent::{
    probe_dimensions, AspectRatio, GenerationIntent, GenerationKind, GenerationResult, SourceImage,
};

use crate::error::ProviderError;

pub struct GeminiAdapter;

impl GeminiAdapter {
    /// Upstream model identifier.
    pub const MODEL: &'static str = "gemini-2.5-flash-image";

    pub fn build_edit_request(intent: &GenerationIntent) -> Result<serde_json::Value, ProviderError> {
        let mut prompt = intent.instruction.clone();
        if let Some(focal) = intent.focal {
            prompt.push_str(&format!(
                " Limit the change to the region around {:.0}% across, {:.0}% down.",
                focal.x * 100.0,
                focal.y * 100.0
            ));
        }
        Self::build_request(intent, prompt)
    }

    pub fn build_filter_request(
        intent: &GenerationIntent,
    ) -> Result<serde_json::Value, ProviderError> {
        let prompt = format!(
            "Re-render the image in this style, keeping the composition: {}",
            intent.instruction
        );
        Self::build_request(intent, prompt)
    }

    pub fn build_adjust_request(
        intent: &GenerationIntent,
    ) -> Result<serde_json::Value, ProviderError> {
        let prompt = format!(
            "Change only this global property of the image: {}",
            intent.instruction
        );
        Self::build_request(intent, prompt)
    }

    pub fn build_combine_request(
        intent: &GenerationIntent,
    ) -> Result<serde_json::Value, ProviderError> {
        Self::build_request(intent, intent.instruction.clone())
    }

    /// Extract the first inline image from a generateContent response.
    pub fn normalize_response(
        payload: &serde_json::Value,
    ) -> Result<GenerationResult, ProviderError> {
        let parts = payload["candidates"]
            .as_array()
            .and_then(|c| c.first())
            .and_then(|c| c["content"]["parts"].as_array())
            .ok_or_else(|| {
                ProviderError::Normalize("Expected candidates[0].content.parts".into())
            })?;

        for part in parts {
            let inline = &part["inlineData"];
            if let Some(b64) = inline["data"].as_str() {
                let data = base64::engine::general_purpose::STANDARD
                    .decode(b64)
                    .map_err(|e| {
                        ProviderError::Normalize(format!("Invalid base64 image data: {e}"))
                    })?;
                let mime = inline["mimeType"].as_str().unwrap_or("image/png").to_string();
                return Ok(GenerationResult::Inline { data, mime });
            }
        }

        Err(ProviderError::Normalize(
            "Response contained no inline image part".into(),
        ))
    }

    // ---- private helpers ----

    fn build_request(
        intent: &GenerationIntent,
        prompt: String,
    ) -> Result<serde_json::Value, ProviderError> {
        let mut parts = vec![serde_json::json!({ "text": prompt })];

        for source in &intent.sources {
            let SourceImage::Bytes { data, mime } = source else {
                return Err(ProviderError::BuildRequest(
                    "This provider takes inline sources, not URLs".into(),
                ));
            };
            parts.push(serde_json::json!({
                "inlineData": {
                    "mimeType": mime,
                    "data": base64::engine::general_purpose::STANDARD.encode(data),
                }
            }));
        }

        Ok(serde_json::json!({
            "contents": [{ "parts": parts }],
            "generationConfig": {
                "responseModalities": ["IMAGE"],
                "imageConfig": { "aspectRatio": Self::aspect_ratio(intent) },
            },
        }))
    }

    /// The requested ratio, or one derived from the first source image's
    /// pixel dimensions. Unreadable headers fall back to square rather
    /// than failing a request the model may still handle.
    fn aspect_ratio(intent: &GenerationIntent) -> &'static str {
        if let Some(aspect) = intent.aspect {
            return aspect.as_ratio_str();
        }
        intent
            .sources
            .first()
            .and_then(|s| match s {
                SourceImage::Bytes { data, .. } => probe_dimensions(data).ok(),
                SourceImage::Url(_) => None,
            })
            .map(|(w, h)| AspectRatio::nearest(w, h))
            .unwrap_or(AspectRatio::Square)
            .as_ratio_str()
    }
}

/// Pick the builder matching the intent's kind.
pub fn build_request(intent: &GenerationIntent) -> Result<serde_json::Value, ProviderError> {
    match intent.kind {
        GenerationKind::Edit => GeminiAdapter::build_edit_request(intent),
        GenerationKind::Filter => GeminiAdapter::build_filter_request(intent),
        GenerationKind::Adjust => GeminiAdapter::build_adjust_request(intent),
        GenerationKind::Combine => GeminiAdapter::build_combine_request(intent),
    }
}

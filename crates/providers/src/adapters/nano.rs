//! Adapter for the default fast task provider.
//!
//! Speaks the gateway's `nano-banana-edit` model: URL-based source images,
//! aspect ratio as a `"W:H"` string (or `"auto"`), and output resolution
//! as the `1K | 2K | 4K` string enum. Results come back as a list of
//! fetchable URLs.

use pixshop_core::intent::{GenerationIntent, GenerationKind, GenerationResult, ResolutionTier};

use crate::error::ProviderError;

pub struct NanoAdapter;

impl NanoAdapter {
    /// Gateway model identifier.
    pub const MODEL: &'static str = "nano-banana-edit";

    /// Build the request body for an edit.
    ///
    /// A focal point, when present, is folded into the prompt since the
    /// model takes no coordinate parameters.
    pub fn build_edit_request(intent: &GenerationIntent) -> Result<serde_json::Value, ProviderError> {
        let mut prompt = intent.instruction.clone();
        if let Some(focal) = intent.focal {
            prompt.push_str(&format!(
                " (apply the change around the point {:.0}% from the left, {:.0}% from the top)",
                focal.x * 100.0,
                focal.y * 100.0
            ));
        }
        Self::build_request(intent, prompt)
    }

    /// Build the request body for a global style filter.
    pub fn build_filter_request(
        intent: &GenerationIntent,
    ) -> Result<serde_json::Value, ProviderError> {
        let prompt = format!(
            "Apply this style across the entire image: {}",
            intent.instruction
        );
        Self::build_request(intent, prompt)
    }

    /// Build the request body for a global adjustment.
    pub fn build_adjust_request(
        intent: &GenerationIntent,
    ) -> Result<serde_json::Value, ProviderError> {
        let prompt = format!("Adjust the image as follows: {}", intent.instruction);
        Self::build_request(intent, prompt)
    }

    /// Build the request body for a multi-image combine.
    pub fn build_combine_request(
        intent: &GenerationIntent,
    ) -> Result<serde_json::Value, ProviderError> {
        Self::build_request(intent, intent.instruction.clone())
    }

    /// Extract the normalized result from a terminal success payload.
    pub fn normalize_response(
        payload: &serde_json::Value,
    ) -> Result<GenerationResult, ProviderError> {
        let url = payload["resultUrls"]
            .as_array()
            .and_then(|urls| urls.first())
            .and_then(|u| u.as_str())
            .ok_or_else(|| {
                ProviderError::Normalize("Expected a non-empty resultUrls array".into())
            })?;
        Ok(GenerationResult::Remote { url: url.into() })
    }

    // ---- private helpers ----

    fn build_request(
        intent: &GenerationIntent,
        prompt: String,
    ) -> Result<serde_json::Value, ProviderError> {
        let image_urls = intent
            .source_urls()
            .map_err(|e| ProviderError::BuildRequest(e.to_string()))?;

        let image_size = intent
            .aspect
            .map(|a| a.as_ratio_str())
            .unwrap_or("auto");

        Ok(serde_json::json!({
            "prompt": prompt,
            "image_urls": image_urls,
            "image_size": image_size,
            "resolution": Self::resolution_label(intent.resolution),
            "output_format": "png",
        }))
    }

    /// The gateway's resolution string enum.
    fn resolution_label(tier: Option<ResolutionTier>) -> &'static str {
        match tier {
            None | Some(ResolutionTier::Standard) => "1K",
            Some(ResolutionTier::High) => "2K",
            Some(ResolutionTier::Ultra) => "4K",
        }
    }
}

/// Pick the builder matching the intent's kind.
pub fn build_request(intent: &GenerationIntent) -> Result<serde_json::Value, ProviderError> {
    match intent.kind {
        GenerationKind::Edit => NanoAdapter::build_edit_request(intent),
        GenerationKind::Filter => NanoAdapter::build_filter_request(intent),
        GenerationKind::Adjust => NanoAdapter::build_adjust_request(intent),
        GenerationKind::Combine => NanoAdapter::build_combine_request(intent),
    }
}

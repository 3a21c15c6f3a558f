//! Adapter for the higher-quality task provider.
//!
//! Speaks the gateway's `gpt-image-1` model: URL-based sources under
//! `filesUrl`, aspect expressed as a pixel size template computed from the
//! requested ratio, and output fidelity as a `low | medium | high` quality
//! tier. Results come back as an `images` array of URL objects.

use pixshop_core::intent::{
    AspectRatio, GenerationIntent, GenerationKind, GenerationResult, ResolutionTier,
};

use crate::error::ProviderError;

pub struct GptImageAdapter;

impl GptImageAdapter {
    /// Gateway model identifier.
    pub const MODEL: &'static str = "gpt-image-1";

    pub fn build_edit_request(intent: &GenerationIntent) -> Result<serde_json::Value, ProviderError> {
        let mut prompt = intent.instruction.clone();
        if let Some(focal) = intent.focal {
            prompt.push_str(&format!(
                " Focus the edit near the point {:.0}% across, {:.0}% down.",
                focal.x * 100.0,
                focal.y * 100.0
            ));
        }
        Self::build_request(intent, prompt)
    }

    pub fn build_filter_request(
        intent: &GenerationIntent,
    ) -> Result<serde_json::Value, ProviderError> {
        let prompt = format!("Restyle the whole image: {}", intent.instruction);
        Self::build_request(intent, prompt)
    }

    pub fn build_adjust_request(
        intent: &GenerationIntent,
    ) -> Result<serde_json::Value, ProviderError> {
        let prompt = format!("Apply this adjustment to the image: {}", intent.instruction);
        Self::build_request(intent, prompt)
    }

    pub fn build_combine_request(
        intent: &GenerationIntent,
    ) -> Result<serde_json::Value, ProviderError> {
        Self::build_request(intent, intent.instruction.clone())
    }

    /// Extract the normalized result from a terminal success payload.
    pub fn normalize_response(
        payload: &serde_json::Value,
    ) -> Result<GenerationResult, ProviderError> {
        let url = payload["images"]
            .as_array()
            .and_then(|images| images.first())
            .and_then(|image| image["url"].as_str())
            .ok_or_else(|| {
                ProviderError::Normalize("Expected a non-empty images array with url fields".into())
            })?;
        Ok(GenerationResult::Remote { url: url.into() })
    }

    // ---- private helpers ----

    fn build_request(
        intent: &GenerationIntent,
        prompt: String,
    ) -> Result<serde_json::Value, ProviderError> {
        let files_url = intent
            .source_urls()
            .map_err(|e| ProviderError::BuildRequest(e.to_string()))?;

        Ok(serde_json::json!({
            "filesUrl": files_url,
            "prompt": prompt,
            "size": Self::size_template(intent.aspect),
            "quality": Self::quality_tier(intent.resolution),
            "nVariants": 1,
        }))
    }

    /// Map the neutral ratio onto one of the model's three canvas
    /// templates. The model only renders square, landscape, and portrait
    /// canvases, so every supported ratio collapses onto the nearest one.
    fn size_template(aspect: Option<AspectRatio>) -> &'static str {
        match aspect {
            None | Some(AspectRatio::Square) => "1024x1024",
            Some(AspectRatio::Wide) | Some(AspectRatio::Classic) | Some(AspectRatio::Photo) => {
                "1536x1024"
            }
            Some(AspectRatio::Tall)
            | Some(AspectRatio::ClassicTall)
            | Some(AspectRatio::PhotoTall) => "1024x1536",
        }
    }

    /// The gateway's quality tier vocabulary.
    fn quality_tier(tier: Option<ResolutionTier>) -> &'static str {
        match tier {
            None | Some(ResolutionTier::Standard) => "low",
            Some(ResolutionTier::High) => "medium",
            Some(ResolutionTier::Ultra) => "high",
        }
    }
}

/// Pick the builder matching the intent's kind.
pub fn build_request(intent: &GenerationIntent) -> Result<serde_json::Value, ProviderError> {
    match intent.kind {
        GenerationKind::Edit => GptImageAdapter::build_edit_request(intent),
        GenerationKind::Filter => GptImageAdapter::build_filter_request(intent),
        GenerationKind::Adjust => GptImageAdapter::build_adjust_request(intent),
        GenerationKind::Combine => GptImageAdapter::build_combine_request(intent),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pixshop_core::intent::SourceImage;

    use super::*;

    fn uploaded_intent(kind: GenerationKind, n: usize) -> GenerationIntent {
        let sources = (0..n)
            .map(|i| SourceImage::Url(format!("https://assets.example/{i}.png")))
            .collect();
        GenerationIntent::new(kind, sources, "blend the scenes").unwrap()
    }

    #[test]
    fn request_uses_files_url_vocabulary() {
        let body =
            GptImageAdapter::build_combine_request(&uploaded_intent(GenerationKind::Combine, 4))
                .unwrap();
        assert_eq!(body["filesUrl"].as_array().unwrap().len(), 4);
        assert_eq!(body["nVariants"], 1);
    }

    #[test]
    fn aspect_collapses_onto_canvas_templates() {
        for (aspect, size) in [
            (AspectRatio::Square, "1024x1024"),
            (AspectRatio::Wide, "1536x1024"),
            (AspectRatio::Photo, "1536x1024"),
            (AspectRatio::Tall, "1024x1536"),
            (AspectRatio::PhotoTall, "1024x1536"),
        ] {
            let intent = uploaded_intent(GenerationKind::Edit, 1).with_aspect(Some(aspect));
            let body = GptImageAdapter::build_edit_request(&intent).unwrap();
            assert_eq!(body["size"], size, "aspect {aspect:?}");
        }
    }

    #[test]
    fn resolution_maps_to_quality_tier() {
        use pixshop_core::intent::ResolutionTier::*;
        for (tier, quality) in [(Standard, "low"), (High, "medium"), (Ultra, "high")] {
            let intent = uploaded_intent(GenerationKind::Filter, 1).with_resolution(Some(tier));
            let body = GptImageAdapter::build_filter_request(&intent).unwrap();
            assert_eq!(body["quality"], quality);
        }
    }

    #[test]
    fn normalize_extracts_first_image_url() {
        let payload = serde_json::json!({
            "images": [{"url": "https://cdn.example/out.png", "seed": 7}]
        });
        let result = GptImageAdapter::normalize_response(&payload).unwrap();
        assert_matches!(result, GenerationResult::Remote { url } => {
            assert_eq!(url, "https://cdn.example/out.png");
        });
    }

    #[test]
    fn normalize_rejects_wrong_shape() {
        // A nano-style payload must not be accepted here.
        let err = GptImageAdapter::normalize_response(&serde_json::json!({
            "resultUrls": ["https://cdn.example/out.png"]
        }))
        .unwrap_err();
        assert_matches!(err, ProviderError::Normalize(_));
    }
}

//! Normalized generation request and result model.
//!
//! A [`GenerationIntent`] is built once per incoming request, validated
//! before any network call, and threaded immutably through the pipeline.
//! Provider adapters consume it to build wire bodies and produce a
//! [`GenerationResult`] -- the single normalized output shape.

use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Generation kinds
// ---------------------------------------------------------------------------

/// The four supported generation operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationKind {
    /// Localized change anchored at an optional focal point.
    Edit,
    /// Global style transfer described by a style descriptor.
    Filter,
    /// Global property change (lighting, color balance, etc.).
    Adjust,
    /// Merge multiple source images into one.
    Combine,
}

impl GenerationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationKind::Edit => "edit",
            GenerationKind::Filter => "filter",
            GenerationKind::Adjust => "adjust",
            GenerationKind::Combine => "combine",
        }
    }
}

impl fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Optional parameters
// ---------------------------------------------------------------------------

/// Normalized focal coordinates for an edit, in the unit square.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FocalPoint {
    pub x: f64,
    pub y: f64,
}

impl FocalPoint {
    /// Build a focal point, rejecting coordinates outside `0.0..=1.0`.
    pub fn new(x: f64, y: f64) -> Result<Self, CoreError> {
        if !(0.0..=1.0).contains(&x) || !(0.0..=1.0).contains(&y) {
            return Err(CoreError::Validation(format!(
                "Focal coordinates must be within 0.0..=1.0, got ({x}, {y})"
            )));
        }
        Ok(Self { x, y })
    }
}

/// Target aspect ratio for the generated image.
///
/// Each provider expresses this differently (ratio string, size template,
/// or derived from pixel dimensions); this enum is the provider-neutral
/// vocabulary the adapters translate from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    Square,
    Wide,
    Tall,
    Classic,
    ClassicTall,
    Photo,
    PhotoTall,
}

/// All supported ratios with their numeric width/height values.
const RATIO_TABLE: &[(AspectRatio, &str, f64)] = &[
    (AspectRatio::Square, "1:1", 1.0),
    (AspectRatio::Wide, "16:9", 16.0 / 9.0),
    (AspectRatio::Tall, "9:16", 9.0 / 16.0),
    (AspectRatio::Classic, "4:3", 4.0 / 3.0),
    (AspectRatio::ClassicTall, "3:4", 3.0 / 4.0),
    (AspectRatio::Photo, "3:2", 3.0 / 2.0),
    (AspectRatio::PhotoTall, "2:3", 2.0 / 3.0),
];

impl AspectRatio {
    /// The `"W:H"` ratio string form (e.g. `"16:9"`).
    pub fn as_ratio_str(&self) -> &'static str {
        RATIO_TABLE
            .iter()
            .find(|(r, _, _)| r == self)
            .map(|(_, s, _)| *s)
            .unwrap_or("1:1")
    }

    /// Pick the supported ratio closest to the given pixel dimensions.
    ///
    /// Returns [`AspectRatio::Square`] for degenerate (zero) dimensions.
    pub fn nearest(width: u32, height: u32) -> Self {
        if width == 0 || height == 0 {
            return AspectRatio::Square;
        }
        let actual = width as f64 / height as f64;
        RATIO_TABLE
            .iter()
            .min_by(|(_, _, a), (_, _, b)| (a - actual).abs().total_cmp(&(b - actual).abs()))
            .map(|(r, _, _)| *r)
            .unwrap_or(AspectRatio::Square)
    }
}

impl FromStr for AspectRatio {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RATIO_TABLE
            .iter()
            .find(|(_, label, _)| *label == s)
            .map(|(r, _, _)| *r)
            .ok_or_else(|| {
                let supported: Vec<&str> = RATIO_TABLE.iter().map(|(_, s, _)| *s).collect();
                CoreError::Validation(format!(
                    "Unsupported aspect ratio '{s}'. Must be one of: {}",
                    supported.join(", ")
                ))
            })
    }
}

/// Output resolution tier, translated per provider (resolution string enum
/// for one, quality tier for another).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionTier {
    Standard,
    High,
    Ultra,
}

impl FromStr for ResolutionTier {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(ResolutionTier::Standard),
            "high" => Ok(ResolutionTier::High),
            "ultra" => Ok(ResolutionTier::Ultra),
            other => Err(CoreError::Validation(format!(
                "Unsupported resolution tier '{other}'. Must be one of: standard, high, ultra"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Source images
// ---------------------------------------------------------------------------

/// One source image, either as raw bytes (as received from the caller) or
/// as a fetchable URL (after upload to the temporary asset store).
#[derive(Debug, Clone)]
pub enum SourceImage {
    Bytes { data: Vec<u8>, mime: String },
    Url(String),
}

impl SourceImage {
    /// The public URL, if this source has been uploaded.
    pub fn url(&self) -> Option<&str> {
        match self {
            SourceImage::Url(url) => Some(url),
            SourceImage::Bytes { .. } => None,
        }
    }
}

/// Read the pixel dimensions from an image header without decoding pixels.
pub fn probe_dimensions(data: &[u8]) -> Result<(u32, u32), CoreError> {
    image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| CoreError::Validation(format!("Unrecognized image data: {e}")))?
        .into_dimensions()
        .map_err(|e| CoreError::Validation(format!("Failed to read image dimensions: {e}")))
}

// ---------------------------------------------------------------------------
// Intent
// ---------------------------------------------------------------------------

/// Smallest number of images a combine request may carry.
pub const MIN_COMBINE_IMAGES: usize = 2;

/// The normalized, validated generation request.
///
/// Immutable once constructed. Single-image kinds carry exactly one source;
/// combine carries two or more (the per-provider ceiling is enforced
/// separately via [`GenerationIntent::check_image_ceiling`] because it
/// differs by provider).
#[derive(Debug, Clone)]
pub struct GenerationIntent {
    pub kind: GenerationKind,
    pub sources: Vec<SourceImage>,
    pub instruction: String,
    pub focal: Option<FocalPoint>,
    pub aspect: Option<AspectRatio>,
    pub resolution: Option<ResolutionTier>,
}

impl GenerationIntent {
    /// Build and validate an intent.
    ///
    /// Rejects empty instructions, missing images, and image counts that
    /// are wrong for the kind. Provider-specific ceilings are checked later.
    pub fn new(
        kind: GenerationKind,
        sources: Vec<SourceImage>,
        instruction: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let instruction = instruction.into();
        if instruction.trim().is_empty() {
            return Err(CoreError::Validation(
                "Instruction text must not be empty".into(),
            ));
        }
        match kind {
            GenerationKind::Edit | GenerationKind::Filter | GenerationKind::Adjust => {
                if sources.len() != 1 {
                    return Err(CoreError::Validation(format!(
                        "{kind} requires exactly one image, got {}",
                        sources.len()
                    )));
                }
            }
            GenerationKind::Combine => {
                if sources.len() < MIN_COMBINE_IMAGES {
                    return Err(CoreError::Validation(format!(
                        "combine requires at least {MIN_COMBINE_IMAGES} images, got {}",
                        sources.len()
                    )));
                }
            }
        }
        Ok(Self {
            kind,
            sources,
            instruction,
            focal: None,
            aspect: None,
            resolution: None,
        })
    }

    /// Attach an optional focal point (edit only; ignored by other kinds).
    pub fn with_focal(mut self, focal: Option<FocalPoint>) -> Self {
        self.focal = focal;
        self
    }

    /// Attach an optional target aspect ratio.
    pub fn with_aspect(mut self, aspect: Option<AspectRatio>) -> Self {
        self.aspect = aspect;
        self
    }

    /// Attach an optional output resolution tier.
    pub fn with_resolution(mut self, resolution: Option<ResolutionTier>) -> Self {
        self.resolution = resolution;
        self
    }

    /// Enforce a provider's maximum image count.
    pub fn check_image_ceiling(&self, max_images: usize) -> Result<(), CoreError> {
        if self.sources.len() > max_images {
            return Err(CoreError::Validation(format!(
                "Too many images: {} exceeds the provider maximum of {max_images}",
                self.sources.len()
            )));
        }
        Ok(())
    }

    /// Replace byte sources with their uploaded URLs, preserving order.
    ///
    /// The caller must supply exactly one URL per source.
    pub fn with_uploaded_urls(mut self, urls: Vec<String>) -> Result<Self, CoreError> {
        if urls.len() != self.sources.len() {
            return Err(CoreError::Internal(format!(
                "Upload produced {} URLs for {} sources",
                urls.len(),
                self.sources.len()
            )));
        }
        self.sources = urls.into_iter().map(SourceImage::Url).collect();
        Ok(self)
    }

    /// URLs of all sources. Errors if any source has not been uploaded.
    pub fn source_urls(&self) -> Result<Vec<&str>, CoreError> {
        self.sources
            .iter()
            .map(|s| {
                s.url().ok_or_else(|| {
                    CoreError::Internal("Source image has not been uploaded".into())
                })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Normalized output of a provider call.
///
/// Exactly one representation is populated: inline bytes ready to return to
/// the caller, or a remote URL that still needs a fetch-and-encode step.
#[derive(Debug, Clone)]
pub enum GenerationResult {
    Inline { data: Vec<u8>, mime: String },
    Remote { url: String },
}

impl GenerationResult {
    /// Whether a follow-up URL-to-bytes conversion is still required.
    pub fn needs_conversion(&self) -> bool {
        matches!(self, GenerationResult::Remote { .. })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn png_source() -> SourceImage {
        SourceImage::Bytes {
            data: vec![0u8; 16],
            mime: "image/png".into(),
        }
    }

    // -- Intent validation --

    #[test]
    fn edit_requires_exactly_one_image() {
        assert!(GenerationIntent::new(GenerationKind::Edit, vec![png_source()], "x").is_ok());
        assert!(GenerationIntent::new(GenerationKind::Edit, vec![], "x").is_err());
        assert!(GenerationIntent::new(
            GenerationKind::Edit,
            vec![png_source(), png_source()],
            "x"
        )
        .is_err());
    }

    #[test]
    fn combine_requires_at_least_two_images() {
        assert!(GenerationIntent::new(GenerationKind::Combine, vec![png_source()], "x").is_err());
        assert!(GenerationIntent::new(
            GenerationKind::Combine,
            vec![png_source(), png_source()],
            "x"
        )
        .is_ok());
    }

    #[test]
    fn empty_instruction_rejected() {
        assert!(GenerationIntent::new(GenerationKind::Filter, vec![png_source()], "  ").is_err());
    }

    #[test]
    fn image_ceiling_enforced() {
        let intent = GenerationIntent::new(
            GenerationKind::Combine,
            vec![png_source(), png_source(), png_source()],
            "merge",
        )
        .unwrap();
        assert!(intent.check_image_ceiling(5).is_ok());
        assert!(intent.check_image_ceiling(2).is_err());
    }

    #[test]
    fn uploaded_urls_must_match_source_count() {
        let intent = GenerationIntent::new(
            GenerationKind::Combine,
            vec![png_source(), png_source()],
            "merge",
        )
        .unwrap();
        assert!(intent
            .clone()
            .with_uploaded_urls(vec!["http://a".into()])
            .is_err());
        let uploaded = intent
            .with_uploaded_urls(vec!["http://a".into(), "http://b".into()])
            .unwrap();
        assert_eq!(uploaded.source_urls().unwrap(), vec!["http://a", "http://b"]);
    }

    #[test]
    fn source_urls_fail_before_upload() {
        let intent =
            GenerationIntent::new(GenerationKind::Edit, vec![png_source()], "x").unwrap();
        assert!(intent.source_urls().is_err());
    }

    // -- Focal point --

    #[test]
    fn focal_point_bounds() {
        assert!(FocalPoint::new(0.0, 1.0).is_ok());
        assert!(FocalPoint::new(0.5, 0.5).is_ok());
        assert!(FocalPoint::new(-0.1, 0.5).is_err());
        assert!(FocalPoint::new(0.5, 1.1).is_err());
    }

    // -- Aspect ratio --

    #[test]
    fn aspect_ratio_parses_ratio_strings() {
        assert_eq!("16:9".parse::<AspectRatio>().unwrap(), AspectRatio::Wide);
        assert_eq!("1:1".parse::<AspectRatio>().unwrap(), AspectRatio::Square);
        assert!("17:3".parse::<AspectRatio>().is_err());
    }

    #[test]
    fn aspect_ratio_round_trips_labels() {
        assert_eq!(AspectRatio::Photo.as_ratio_str(), "3:2");
        assert_eq!(
            AspectRatio::Photo.as_ratio_str().parse::<AspectRatio>().unwrap(),
            AspectRatio::Photo
        );
    }

    #[test]
    fn nearest_ratio_from_dimensions() {
        assert_eq!(AspectRatio::nearest(1024, 1024), AspectRatio::Square);
        assert_eq!(AspectRatio::nearest(1920, 1080), AspectRatio::Wide);
        assert_eq!(AspectRatio::nearest(1080, 1920), AspectRatio::Tall);
        assert_eq!(AspectRatio::nearest(3000, 2000), AspectRatio::Photo);
        // Degenerate dimensions fall back to square.
        assert_eq!(AspectRatio::nearest(0, 100), AspectRatio::Square);
    }

    // -- Resolution tier --

    #[test]
    fn resolution_tier_parses() {
        assert_eq!(
            "ultra".parse::<ResolutionTier>().unwrap(),
            ResolutionTier::Ultra
        );
        assert!("8k".parse::<ResolutionTier>().is_err());
    }

    // -- Result union --

    #[test]
    fn result_conversion_flag() {
        let inline = GenerationResult::Inline {
            data: vec![1, 2, 3],
            mime: "image/png".into(),
        };
        let remote = GenerationResult::Remote {
            url: "https://cdn.example.com/out.png".into(),
        };
        assert!(!inline.needs_conversion());
        assert!(remote.needs_conversion());
    }
}

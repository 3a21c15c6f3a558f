//! Handlers for the `/generate/*` endpoints.
//!
//! All four accept `multipart/form-data` (one or more image parts plus
//! text fields), build a validated [`GenerationIntent`], and hand it to
//! the provider's orchestrator. Which provider runs is a form field
//! (`provider`), defaulting to the platform's fast provider.

use std::collections::HashMap;

use axum::extract::{Multipart, State};
use axum::Json;
use pixshop_core::intent::{
    AspectRatio, FocalPoint, GenerationIntent, GenerationKind, ResolutionTier, SourceImage,
};
use pixshop_core::provider::ProviderId;
use pixshop_pipeline::Caller;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::CallerIdentity;
use crate::response::GenerateResponse;
use crate::state::AppState;

/// POST /api/v1/generate/edit
///
/// Fields: `image`, `prompt`, optional `focal_x`/`focal_y`,
/// `aspect_ratio`, `resolution`, `provider`.
pub async fn edit(
    State(state): State<AppState>,
    CallerIdentity(caller): CallerIdentity,
    multipart: Multipart,
) -> AppResult<Json<GenerateResponse>> {
    let form = GenerationForm::read(multipart).await?;
    let prompt = form.required("prompt")?.to_string();
    let provider = form.provider()?;
    let focal = form.focal()?;
    let aspect = form.aspect()?;
    let resolution = form.resolution()?;

    let intent = GenerationIntent::new(GenerationKind::Edit, form.into_sources(), prompt)
        .map_err(AppError::Core)?
        .with_focal(focal)
        .with_aspect(aspect)
        .with_resolution(resolution);

    run(state, caller, provider, intent).await
}

/// POST /api/v1/generate/filter
///
/// Fields: `image`, `style` (the style descriptor), optional `provider`.
pub async fn filter(
    State(state): State<AppState>,
    CallerIdentity(caller): CallerIdentity,
    multipart: Multipart,
) -> AppResult<Json<GenerateResponse>> {
    let form = GenerationForm::read(multipart).await?;
    let style = form.required("style")?.to_string();
    let provider = form.provider()?;

    let intent = GenerationIntent::new(GenerationKind::Filter, form.into_sources(), style)
        .map_err(AppError::Core)?;

    run(state, caller, provider, intent).await
}

/// POST /api/v1/generate/adjust
///
/// Fields: `image`, `instruction`, optional `provider`.
pub async fn adjust(
    State(state): State<AppState>,
    CallerIdentity(caller): CallerIdentity,
    multipart: Multipart,
) -> AppResult<Json<GenerateResponse>> {
    let form = GenerationForm::read(multipart).await?;
    let instruction = form.required("instruction")?.to_string();
    let provider = form.provider()?;

    let intent = GenerationIntent::new(GenerationKind::Adjust, form.into_sources(), instruction)
        .map_err(AppError::Core)?;

    run(state, caller, provider, intent).await
}

/// POST /api/v1/generate/combine
///
/// Fields: `images` (repeated, 2 up to the provider's ceiling), `prompt`,
/// optional `aspect_ratio`, `resolution`, `provider`.
pub async fn combine(
    State(state): State<AppState>,
    CallerIdentity(caller): CallerIdentity,
    multipart: Multipart,
) -> AppResult<Json<GenerateResponse>> {
    let form = GenerationForm::read(multipart).await?;
    let prompt = form.required("prompt")?.to_string();
    let provider = form.provider()?;
    let aspect = form.aspect()?;
    let resolution = form.resolution()?;

    let intent = GenerationIntent::new(GenerationKind::Combine, form.into_sources(), prompt)
        .map_err(AppError::Core)?
        .with_aspect(aspect)
        .with_resolution(resolution);

    run(state, caller, provider, intent).await
}

/// Hand the intent to the provider's pipeline and shape the response.
async fn run(
    state: AppState,
    caller: Caller,
    provider: ProviderId,
    intent: GenerationIntent,
) -> AppResult<Json<GenerateResponse>> {
    let orchestrator = state.orchestrator(provider).ok_or_else(|| {
        AppError::InternalError(format!("Provider {provider} is not configured"))
    })?;

    let outcome = orchestrator.run(caller.clone(), intent).await?;

    Ok(Json(GenerateResponse::from_outcome(
        outcome,
        &caller,
        state.config.anonymous_quota,
    )))
}

// ---------------------------------------------------------------------------
// Multipart parsing
// ---------------------------------------------------------------------------

/// A parsed generation form: image parts in arrival order plus text fields.
struct GenerationForm {
    images: Vec<(Vec<u8>, String)>,
    fields: HashMap<String, String>,
}

impl GenerationForm {
    /// Drain the multipart stream. Parts named `image` / `images` are
    /// treated as image uploads; everything else is a text field.
    async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut images = Vec::new();
        let mut fields = HashMap::new();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?
        {
            let name = field.name().unwrap_or("").to_string();
            if name == "image" || name == "images" || name == "images[]" {
                let mime = field
                    .content_type()
                    .unwrap_or("image/png")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?
                    .to_vec();
                if data.is_empty() {
                    return Err(AppError::BadRequest("Empty image upload".into()));
                }
                images.push((data, mime));
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                fields.insert(name, value);
            }
        }

        Ok(Self { images, fields })
    }

    fn required(&self, name: &str) -> Result<&str, AppError> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| AppError::BadRequest(format!("Missing required field '{name}'")))
    }

    fn provider(&self) -> Result<ProviderId, AppError> {
        match self.fields.get("provider") {
            None => Ok(ProviderId::Nano),
            Some(raw) => raw.parse().map_err(AppError::Core),
        }
    }

    fn aspect(&self) -> Result<Option<AspectRatio>, AppError> {
        self.fields
            .get("aspect_ratio")
            .map(|raw| raw.parse())
            .transpose()
            .map_err(AppError::Core)
    }

    fn resolution(&self) -> Result<Option<ResolutionTier>, AppError> {
        self.fields
            .get("resolution")
            .map(|raw| raw.parse())
            .transpose()
            .map_err(AppError::Core)
    }

    /// Focal coordinates must come as a pair or not at all.
    fn focal(&self) -> Result<Option<FocalPoint>, AppError> {
        let x = self.fields.get("focal_x");
        let y = self.fields.get("focal_y");
        match (x, y) {
            (None, None) => Ok(None),
            (Some(x), Some(y)) => {
                let x: f64 = x
                    .parse()
                    .map_err(|_| AppError::BadRequest("focal_x must be a number".into()))?;
                let y: f64 = y
                    .parse()
                    .map_err(|_| AppError::BadRequest("focal_y must be a number".into()))?;
                Ok(Some(FocalPoint::new(x, y).map_err(AppError::Core)?))
            }
            _ => Err(AppError::BadRequest(
                "focal_x and focal_y must be provided together".into(),
            )),
        }
    }

    fn into_sources(self) -> Vec<SourceImage> {
        self.images
            .into_iter()
            .map(|(data, mime)| SourceImage::Bytes { data, mime })
            .collect()
    }
}

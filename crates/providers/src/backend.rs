//! Execution backends: one per provider, all behind [`GenerationBackend`].
//!
//! A backend owns the full provider round-trip -- build the request via
//! its adapter, execute (submit + poll for task providers, one call for
//! the synchronous one), and normalize the payload. The orchestrator only
//! ever sees the trait.

use async_trait::async_trait;

use pixshop_core::intent::{GenerationIntent, GenerationResult};
use pixshop_core::provider::ProviderId;

use crate::adapters::{gemini, gpt_image, nano};
use crate::adapters::gemini::GeminiAdapter;
use crate::adapters::gpt_image::GptImageAdapter;
use crate::adapters::nano::NanoAdapter;
use crate::error::ProviderError;
use crate::task::JobClient;

/// One provider's request-to-result round-trip.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Which provider this backend talks to.
    fn id(&self) -> ProviderId;

    /// Run one generation to a normalized result.
    async fn generate(&self, intent: &GenerationIntent) -> Result<GenerationResult, ProviderError>;
}

// ---------------------------------------------------------------------------
// Task providers
// ---------------------------------------------------------------------------

/// Backend for the default fast task provider.
pub struct NanoBackend {
    job: JobClient,
}

impl NanoBackend {
    pub fn new(job: JobClient) -> Self {
        Self { job }
    }
}

#[async_trait]
impl GenerationBackend for NanoBackend {
    fn id(&self) -> ProviderId {
        ProviderId::Nano
    }

    async fn generate(&self, intent: &GenerationIntent) -> Result<GenerationResult, ProviderError> {
        let input = nano::build_request(intent)?;
        let payload = self.job.run(self.id(), NanoAdapter::MODEL, &input).await?;
        NanoAdapter::normalize_response(&payload)
    }
}

/// Backend for the higher-quality task provider.
pub struct GptImageBackend {
    job: JobClient,
}

impl GptImageBackend {
    pub fn new(job: JobClient) -> Self {
        Self { job }
    }
}

#[async_trait]
impl GenerationBackend for GptImageBackend {
    fn id(&self) -> ProviderId {
        ProviderId::GptImage
    }

    async fn generate(&self, intent: &GenerationIntent) -> Result<GenerationResult, ProviderError> {
        let input = gpt_image::build_request(intent)?;
        let payload = self
            .job
            .run(self.id(), GptImageAdapter::MODEL, &input)
            .await?;
        GptImageAdapter::normalize_response(&payload)
    }
}

// ---------------------------------------------------------------------------
// Synchronous provider
// ---------------------------------------------------------------------------

/// Backend for the synchronous inline provider. No job client: one POST
/// carries the sources and returns the image.
pub struct GeminiBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeminiBackend {
    /// * `base_url` - e.g. `https://generativelanguage.googleapis.com`.
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    fn id(&self) -> ProviderId {
        ProviderId::Gemini
    }

    async fn generate(&self, intent: &GenerationIntent) -> Result<GenerationResult, ProviderError> {
        let body = gemini::build_request(intent)?;

        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url,
                GeminiAdapter::MODEL
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let payload = response.json::<serde_json::Value>().await?;
        GeminiAdapter::normalize_response(&payload)
    }
}

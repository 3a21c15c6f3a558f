//! End-to-end sequencing of one generation request.

use std::sync::Arc;

use pixshop_core::intent::{GenerationIntent, GenerationResult, SourceImage};
use pixshop_core::provider::ProviderProfile;
use pixshop_core::usage::GateDecision;
use pixshop_providers::convert;
use pixshop_providers::GenerationBackend;
use pixshop_store::{AssetStore, StoredAsset};

use crate::caller::Caller;
use crate::context::RequestContext;
use crate::error::PipelineError;
use crate::gate::UsageGate;
use crate::ledger::CreditLedger;
use crate::store::UsageStore;

/// A delivered generation: inline image plus accounting information.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub data: Vec<u8>,
    pub mime: String,
    /// Wall-clock pipeline time in milliseconds.
    pub processing_ms: i64,
    /// Credits or free generations left after the commit; `None` when the
    /// accounting mutation failed and the true remainder is unknown.
    pub remaining: Option<i64>,
    /// Credits actually deducted (0 for anonymous callers).
    pub credits_charged: i64,
}

/// Drives one provider's pipeline: gate, upload, execute, normalize,
/// convert, clean up, account. One instance per provider; the four
/// generation kinds all flow through [`Orchestrator::run`].
pub struct Orchestrator {
    profile: ProviderProfile,
    backend: Arc<dyn GenerationBackend>,
    assets: Arc<dyn AssetStore>,
    usage: Arc<dyn UsageStore>,
    gate: UsageGate,
    ledger: CreditLedger,
    http: reqwest::Client,
}

/// Result of one slot in the concurrent upload batch.
enum UploadSlot {
    Uploaded(StoredAsset),
    Passthrough(String),
}

impl Orchestrator {
    pub fn new(
        profile: ProviderProfile,
        backend: Arc<dyn GenerationBackend>,
        assets: Arc<dyn AssetStore>,
        usage: Arc<dyn UsageStore>,
        gate: UsageGate,
        ledger: CreditLedger,
    ) -> Self {
        Self {
            profile,
            backend,
            assets,
            usage,
            gate,
            ledger,
            http: reqwest::Client::new(),
        }
    }

    /// Run one generation request to completion.
    ///
    /// Gate denials return before any side effect. After the gate, every
    /// temporary upload is deleted on the way out -- success, provider
    /// failure, timeout, or conversion failure alike -- and the usage
    /// commit happens exactly once, only on success.
    pub async fn run(
        &self,
        caller: Caller,
        intent: GenerationIntent,
    ) -> Result<GenerationOutcome, PipelineError> {
        let mut ctx = RequestContext::new(caller, intent.kind, self.profile.id);

        intent
            .check_image_ceiling(self.profile.max_combine_images)
            .map_err(|e| PipelineError::BuildRequest(e.to_string()))?;

        match self
            .gate
            .check(self.usage.as_ref(), &ctx.caller, self.profile.credit_cost)
            .await
        {
            GateDecision::Allow { remaining } => ctx.remaining_before = remaining,
            GateDecision::Deny(reason) => return Err(PipelineError::Denied(reason)),
        }

        // Steps 2-5 run inside one fallible block; cleanup below is the
        // single join point both paths pass through.
        let generated = self.generate(&mut ctx, intent).await;
        self.cleanup(&ctx).await;

        match generated {
            Ok((data, mime)) => {
                let duration_ms = ctx.elapsed_ms();
                let committed = self
                    .ledger
                    .commit(
                        self.usage.as_ref(),
                        &ctx.caller,
                        &self.profile,
                        ctx.kind,
                        duration_ms,
                    )
                    .await;

                tracing::info!(
                    provider = %ctx.provider,
                    kind = %ctx.kind,
                    duration_ms,
                    credits_charged = committed.charged,
                    "Generation succeeded",
                );

                Ok(GenerationOutcome {
                    data,
                    mime,
                    processing_ms: duration_ms,
                    remaining: committed.remaining,
                    credits_charged: committed.charged,
                })
            }
            Err(e) => {
                tracing::warn!(
                    provider = %ctx.provider,
                    kind = %ctx.kind,
                    stage = e.stage().as_str(),
                    duration_ms = ctx.elapsed_ms(),
                    error = %e,
                    "Generation failed",
                );
                Err(e)
            }
        }
    }

    // ---- pipeline steps ----

    /// Upload (if the provider needs URLs), execute, normalize, convert.
    async fn generate(
        &self,
        ctx: &mut RequestContext,
        intent: GenerationIntent,
    ) -> Result<(Vec<u8>, String), PipelineError> {
        let intent = if self.profile.needs_remote_urls {
            self.upload_sources(ctx, intent).await?
        } else {
            intent
        };

        let result = self.backend.generate(&intent).await?;
        let result = convert::into_inline(&self.http, result).await?;

        match result {
            GenerationResult::Inline { data, mime } => Ok((data, mime)),
            GenerationResult::Remote { url } => Err(PipelineError::Conversion(format!(
                "Result still remote after conversion: {url}"
            ))),
        }
    }

    /// Upload all byte sources as one unordered concurrent batch.
    ///
    /// Completed siblings of a failed upload are recorded in the context
    /// so cleanup still reclaims them; the batch as a whole fails and no
    /// provider call is made.
    async fn upload_sources(
        &self,
        ctx: &mut RequestContext,
        intent: GenerationIntent,
    ) -> Result<GenerationIntent, PipelineError> {
        let owner_tag = ctx.caller.owner_tag();

        let uploads = intent.sources.iter().map(|source| {
            let owner_tag = owner_tag.clone();
            async move {
                match source {
                    SourceImage::Bytes { data, mime } => self
                        .assets
                        .upload(data.clone(), mime, &owner_tag)
                        .await
                        .map(UploadSlot::Uploaded),
                    SourceImage::Url(url) => Ok(UploadSlot::Passthrough(url.clone())),
                }
            }
        });

        let slots = futures::future::join_all(uploads).await;

        let mut urls = Vec::with_capacity(slots.len());
        let mut first_error = None;
        for slot in slots {
            match slot {
                Ok(UploadSlot::Uploaded(asset)) => {
                    urls.push(asset.url.clone());
                    ctx.uploaded.push(asset);
                }
                Ok(UploadSlot::Passthrough(url)) => urls.push(url),
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if let Some(e) = first_error {
            return Err(PipelineError::Upload(e.to_string()));
        }

        intent
            .with_uploaded_urls(urls)
            .map_err(|e| PipelineError::Upload(e.to_string()))
    }

    /// Delete every temporary upload this request created. Best-effort:
    /// failures are logged and left to the background sweep.
    async fn cleanup(&self, ctx: &RequestContext) {
        for asset in &ctx.uploaded {
            if let Err(e) = self.assets.delete(&asset.key).await {
                tracing::warn!(
                    key = %asset.key,
                    error = %e,
                    "Temporary asset cleanup failed; sweep will reclaim it",
                );
            }
        }
    }
}

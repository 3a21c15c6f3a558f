//! Pipeline failure taxonomy and stage tagging.

use pixshop_core::usage::DenyReason;
use pixshop_providers::ProviderError;

/// The pipeline stage a failure belongs to, used for structured failure
/// logs so operators can see where requests die without reading messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Gate,
    Upload,
    BuildRequest,
    Execute,
    Normalize,
    Convert,
    Ledger,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Gate => "gate",
            Stage::Upload => "upload",
            Stage::BuildRequest => "build_request",
            Stage::Execute => "execute",
            Stage::Normalize => "normalize",
            Stage::Convert => "convert",
            Stage::Ledger => "ledger",
        }
    }
}

/// One generation request's failure modes.
///
/// Gate denials and build failures are expected control flow and map to
/// 4xx responses with no provider spend; everything else is a 500 with a
/// provider-agnostic message.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The usage gate said no. Carries the data the HTTP layer needs to
    /// render an actionable response (sign in / buy credits).
    #[error("Request denied: {0:?}")]
    Denied(DenyReason),

    /// A temporary upload failed before any provider call was made.
    #[error("Upload failed: {0}")]
    Upload(String),

    /// The intent could not be turned into a provider request.
    #[error("Invalid request: {0}")]
    BuildRequest(String),

    /// The provider itself failed (transport error, API error, or the
    /// provider's own terminal failure state).
    #[error("Provider failure: {0}")]
    Provider(String),

    /// The poll budget ran out without a terminal state.
    #[error("Generation timed out after {attempts} polls")]
    Timeout { attempts: u32 },

    /// The provider answered in an unexpected shape.
    #[error("Provider response could not be interpreted: {0}")]
    Normalize(String),

    /// The generated image exists but could not be fetched.
    #[error("Generated image could not be delivered: {0}")]
    Conversion(String),
}

impl PipelineError {
    /// The stage this failure is attributed to.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Denied(_) => Stage::Gate,
            PipelineError::Upload(_) => Stage::Upload,
            PipelineError::BuildRequest(_) => Stage::BuildRequest,
            PipelineError::Provider(_) | PipelineError::Timeout { .. } => Stage::Execute,
            PipelineError::Normalize(_) => Stage::Normalize,
            PipelineError::Conversion(_) => Stage::Convert,
        }
    }
}

impl From<ProviderError> for PipelineError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::BuildRequest(msg) => PipelineError::BuildRequest(msg),
            ProviderError::Timeout { attempts } => PipelineError::Timeout { attempts },
            ProviderError::Normalize(msg) => PipelineError::Normalize(msg),
            ProviderError::Conversion(msg) => PipelineError::Conversion(msg),
            other @ (ProviderError::Request(_)
            | ProviderError::Api { .. }
            | ProviderError::TaskFailed { .. }) => PipelineError::Provider(other.to_string()),
        }
    }
}

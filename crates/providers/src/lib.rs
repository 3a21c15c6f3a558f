//! Provider protocol layer.
//!
//! Everything provider-specific lives here: the task-API HTTP client, the
//! polling job client for asynchronous providers, one adapter per provider
//! (request building + response normalization), the [`GenerationBackend`]
//! seam the orchestrator executes through, and the URL-to-bytes conversion
//! for results delivered as remote URLs.

pub mod adapters;
pub mod api;
pub mod backend;
pub mod convert;
pub mod error;
pub mod task;

pub use backend::GenerationBackend;
pub use error::ProviderError;

//! Provider-layer error taxonomy.
//!
//! The variants mirror the pipeline stages so failures stay
//! distinguishable all the way to the HTTP mapping: a provider saying
//! "no" ([`ProviderError::TaskFailed`]) is not the same as never hearing
//! back ([`ProviderError::Timeout`]) or not understanding the answer
//! ([`ProviderError::Normalize`]).

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Malformed intent for this provider, caught before any network call.
    #[error("Failed to build provider request: {0}")]
    BuildRequest(String),

    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider returned a non-success status or error envelope.
    #[error("Provider API error ({status}): {body}")]
    Api {
        /// HTTP (or envelope) status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The provider reached its own terminal failure state.
    #[error("Provider reported failure: {message}")]
    TaskFailed {
        /// Provider-specific failure code, when given.
        code: Option<String>,
        message: String,
    },

    /// The poll budget ran out before any terminal state was reported.
    #[error("Task did not reach a terminal state within {attempts} polls")]
    Timeout { attempts: u32 },

    /// The provider responded, but not in the shape the adapter expects.
    /// Signals contract drift rather than a one-off request problem.
    #[error("Unexpected provider payload: {0}")]
    Normalize(String),

    /// The generated image exists at a URL but could not be fetched.
    #[error("Result conversion failed: {0}")]
    Conversion(String),
}

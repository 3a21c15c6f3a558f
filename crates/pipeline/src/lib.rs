//! Generation pipeline: gate, execute, clean up, account.
//!
//! The [`orchestrator::Orchestrator`] sequences one generation request
//! end to end: usage gate, temporary uploads, provider execution,
//! normalization, guaranteed cleanup, and the single post-success
//! accounting commit. Its dependencies (usage store, asset store,
//! provider backend) are trait objects so every failure path is
//! exercised in tests with in-memory fakes.

pub mod caller;
pub mod context;
pub mod error;
pub mod gate;
pub mod ledger;
pub mod orchestrator;
pub mod store;

pub use caller::Caller;
pub use error::{PipelineError, Stage};
pub use orchestrator::{GenerationOutcome, Orchestrator};

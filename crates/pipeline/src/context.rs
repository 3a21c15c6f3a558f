//! Per-request state threaded through the pipeline.

use std::time::Instant;

use pixshop_core::intent::GenerationKind;
use pixshop_core::provider::ProviderId;
use pixshop_store::StoredAsset;

use crate::caller::Caller;

/// Explicit per-request context passed between pipeline steps.
///
/// Replaces any temptation to stash values on shared mutable state: the
/// gate result, upload handles, and timing all live here and die with the
/// request.
#[derive(Debug)]
pub struct RequestContext {
    pub caller: Caller,
    pub kind: GenerationKind,
    pub provider: ProviderId,
    /// Credits or free generations left as observed by the gate, before
    /// this request is accounted.
    pub remaining_before: i64,
    /// Temporary uploads this request created; every one of them is
    /// deleted on the way out, whatever the outcome.
    pub uploaded: Vec<StoredAsset>,
    started: Instant,
}

impl RequestContext {
    pub fn new(caller: Caller, kind: GenerationKind, provider: ProviderId) -> Self {
        Self {
            caller,
            kind,
            provider,
            remaining_before: 0,
            uploaded: Vec::new(),
            started: Instant::now(),
        }
    }

    /// Milliseconds since the request entered the pipeline.
    pub fn elapsed_ms(&self) -> i64 {
        self.started.elapsed().as_millis() as i64
    }
}

//! Polling job client for asynchronous providers.
//!
//! A task moves through `waiting -> queuing -> generating` and ends in
//! `success` or `fail`. [`JobClient`] submits a task and polls on a fixed
//! interval until a terminal state or the attempt budget runs out, at which
//! point it raises a synthetic timeout distinct from a provider-reported
//! failure. The HTTP transport is behind [`TaskTransport`] so the loop is
//! exercised in tests with scripted fakes.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pixshop_core::provider::ProviderId;

use crate::error::ProviderError;

/// Log task progress every this many polls, not on every poll, to bound
/// log volume on long-running jobs.
pub const PROGRESS_LOG_EVERY: u32 = 10;

// ---------------------------------------------------------------------------
// Task states
// ---------------------------------------------------------------------------

/// Gateway-reported task state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Waiting,
    Queuing,
    Generating,
    Success,
    Fail,
}

impl TaskState {
    /// Whether no further transition will occur.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Success | TaskState::Fail)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Waiting => "waiting",
            TaskState::Queuing => "queuing",
            TaskState::Generating => "generating",
            TaskState::Success => "success",
            TaskState::Fail => "fail",
        }
    }
}

impl FromStr for TaskState {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(TaskState::Waiting),
            "queuing" => Ok(TaskState::Queuing),
            "generating" => Ok(TaskState::Generating),
            "success" => Ok(TaskState::Success),
            "fail" => Ok(TaskState::Fail),
            other => Err(ProviderError::Normalize(format!(
                "Unknown task state '{other}'"
            ))),
        }
    }
}

/// One observation of a task: its state plus any terminal payload.
#[derive(Debug, Clone)]
pub struct TaskSnapshot {
    pub state: TaskState,
    /// Result payload, present once the state is `success`.
    pub result: Option<serde_json::Value>,
    pub fail_code: Option<String>,
    pub fail_msg: Option<String>,
}

/// Transport seam between the poll loop and the gateway HTTP client.
#[async_trait]
pub trait TaskTransport: Send + Sync {
    /// Submit a task, returning its gateway-assigned id.
    async fn submit(
        &self,
        model: &str,
        input: &serde_json::Value,
    ) -> Result<String, ProviderError>;

    /// Fetch the current state of a task.
    async fn poll(&self, task_id: &str) -> Result<TaskSnapshot, ProviderError>;
}

// ---------------------------------------------------------------------------
// Job client
// ---------------------------------------------------------------------------

/// Submit-and-poll driver for one provider's tasks.
pub struct JobClient {
    transport: Arc<dyn TaskTransport>,
    poll_interval: Duration,
    max_attempts: u32,
}

impl JobClient {
    pub fn new(transport: Arc<dyn TaskTransport>, poll_interval: Duration, max_attempts: u32) -> Self {
        Self {
            transport,
            poll_interval,
            max_attempts,
        }
    }

    /// Submit `input` for `model` and poll until a terminal state.
    ///
    /// Returns the result payload on `success`. A provider-reported `fail`
    /// becomes [`ProviderError::TaskFailed`]; exhausting the attempt budget
    /// becomes [`ProviderError::Timeout`]. A failed poll request counts
    /// against the budget and the loop keeps going -- transient gateway
    /// blips must not kill a generation that is still running.
    pub async fn run(
        &self,
        provider: ProviderId,
        model: &str,
        input: &serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError> {
        let task_id = self.transport.submit(model, input).await?;
        tracing::info!(provider = %provider, task_id = %task_id, "Task submitted");

        for attempt in 1..=self.max_attempts {
            tokio::time::sleep(self.poll_interval).await;

            let snapshot = match self.transport.poll(&task_id).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    tracing::warn!(
                        provider = %provider,
                        task_id = %task_id,
                        attempt,
                        error = %e,
                        "Poll attempt failed, continuing",
                    );
                    continue;
                }
            };

            match snapshot.state {
                TaskState::Success => {
                    tracing::info!(
                        provider = %provider,
                        task_id = %task_id,
                        attempt,
                        "Task completed",
                    );
                    return snapshot.result.ok_or_else(|| {
                        ProviderError::Normalize(
                            "Task reported success without a result payload".into(),
                        )
                    });
                }
                TaskState::Fail => {
                    return Err(ProviderError::TaskFailed {
                        code: snapshot.fail_code,
                        message: snapshot
                            .fail_msg
                            .unwrap_or_else(|| "Provider gave no failure message".into()),
                    });
                }
                state => {
                    if attempt % PROGRESS_LOG_EVERY == 0 {
                        tracing::info!(
                            provider = %provider,
                            task_id = %task_id,
                            state = state.as_str(),
                            attempt,
                            max_attempts = self.max_attempts,
                            "Task still in progress",
                        );
                    } else {
                        tracing::trace!(
                            task_id = %task_id,
                            state = state.as_str(),
                            attempt,
                            "Polled task",
                        );
                    }
                }
            }
        }

        Err(ProviderError::Timeout {
            attempts: self.max_attempts,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

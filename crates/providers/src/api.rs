//! REST client for the task-based provider gateway.
//!
//! Both asynchronous providers are fronted by the same gateway protocol:
//! `POST /api/v1/jobs/createTask` queues a task for a named model and
//! `GET /api/v1/jobs/recordInfo` reports its state. Responses use a
//! `{ code, message, data }` envelope where `code == 200` means success.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ProviderError;
use crate::task::{TaskSnapshot, TaskState, TaskTransport};

/// HTTP client for one task gateway (one base URL + API key).
pub struct TaskApi {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

/// JSON envelope wrapping every gateway response.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

/// Payload of a successful task submission.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitData {
    /// Gateway-assigned identifier for the queued task.
    pub task_id: String,
}

/// Raw task status record returned by the gateway.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub task_id: String,
    /// One of `waiting`, `queuing`, `generating`, `success`, `fail`.
    pub state: String,
    /// JSON-encoded result payload, present once `state == "success"`.
    #[serde(default)]
    pub result_json: Option<String>,
    #[serde(default)]
    pub fail_code: Option<String>,
    #[serde(default)]
    pub fail_msg: Option<String>,
}

impl TaskApi {
    /// Create a client for a gateway instance.
    ///
    /// * `base_url` - e.g. `https://api.taskgw.example`.
    /// * `api_key`  - bearer token attached to every request.
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }

    /// Create a client reusing an existing [`reqwest::Client`]
    /// (useful for connection pooling across providers).
    pub fn with_client(client: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }

    /// Queue a task for `model` with the given input body.
    pub async fn submit_task(
        &self,
        model: &str,
        input: &serde_json::Value,
    ) -> Result<SubmitData, ProviderError> {
        let body = serde_json::json!({
            "model": model,
            "input": input,
        });

        let response = self
            .client
            .post(format!("{}/api/v1/jobs/createTask", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch the current status record for a task.
    pub async fn get_task(&self, task_id: &str) -> Result<TaskRecord, ProviderError> {
        let response = self
            .client
            .get(format!("{}/api/v1/jobs/recordInfo", self.base_url))
            .query(&[("taskId", task_id)])
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the response
    /// unchanged on success, or a [`ProviderError::Api`] containing the
    /// status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ProviderError> {
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
        Ok(response)
    }

    /// Parse a successful response body, unwrapping the gateway envelope.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ProviderError> {
        let response = Self::ensure_success(response).await?;
        let envelope = response.json::<Envelope<T>>().await?;
        if envelope.code != 200 {
            return Err(ProviderError::Api {
                status: envelope.code as u16,
                body: envelope.message,
            });
        }
        envelope.data.ok_or_else(|| {
            ProviderError::Normalize("Gateway envelope carried no data field".into())
        })
    }
}

#[async_trait]
impl TaskTransport for TaskApi {
    async fn submit(
        &self,
        model: &str,
        input: &serde_json::Value,
    ) -> Result<String, ProviderError> {
        Ok(self.submit_task(model, input).await?.task_id)
    }

    async fn poll(&self, task_id: &str) -> Result<TaskSnapshot, ProviderError> {
        let record = self.get_task(task_id).await?;
        let state = record.state.parse::<TaskState>()?;

        let result = match record.result_json {
            Some(ref raw) => Some(serde_json::from_str(raw).map_err(|e| {
                ProviderError::Normalize(format!("Result payload is not valid JSON: {e}"))
            })?),
            None => None,
        };

        Ok(TaskSnapshot {
            state,
            result,
            fail_code: record.fail_code,
            fail_msg: record.fail_msg,
        })
    }
}

//! Networked assignment client
//!
//! Speaks the assignment service's JSON wire format over `reqwest`.
//! Transport failures and 5xx replies surface as errors the host falls back
//! on; 4xx replies are reported as they are.

use crate::config::HostConfig;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use study_assign::{
    AssignError, AssignRequest, Assignment, AssignmentClient, StoreError, SubmissionPayload,
    SubmitRequest, SubmitResponse,
};
use tracing::debug;

/// Assignment service reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpAssignmentClient {
    http: reqwest::Client,
    assign_url: String,
    submit_url: String,
}

impl HttpAssignmentClient {
    /// Create client for explicit endpoints
    ///
    /// # Errors
    /// The HTTP client cannot be constructed (e.g. TLS backend failure)
    pub fn new(
        assign_url: impl Into<String>,
        submit_url: impl Into<String>,
        timeout: std::time::Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to create HTTP client")?;
        Ok(Self {
            http,
            assign_url: assign_url.into(),
            submit_url: submit_url.into(),
        })
    }

    /// Create client from host configuration
    ///
    /// # Errors
    /// Missing endpoint URLs or client construction failure
    pub fn from_config(config: &HostConfig) -> Result<Self> {
        let assign_url = config.assign_url.clone().context("assign_url is not set")?;
        let submit_url = config.submit_url.clone().context("submit_url is not set")?;
        Self::new(assign_url, submit_url, config.request_timeout())
    }

    async fn post<B, T>(&self, url: &str, body: &B) -> Result<T, AssignError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned + Send,
    {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| AssignError::AllocationUnavailable(StoreError::Unavailable(e.to_string())))?;

        let status = response.status();
        debug!(url, status = status.as_u16(), "assignment service replied");
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AssignError::Remote {
                status: status.as_u16(),
                message: detail_of(&message),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AssignError::AllocationUnavailable(StoreError::Corrupt(e.to_string())))
    }
}

/// `detail` field of a JSON error body, else the body itself
fn detail_of(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[async_trait::async_trait]
impl AssignmentClient for HttpAssignmentClient {
    async fn assign(&self, request: &AssignRequest) -> Result<Assignment, AssignError> {
        request.validate()?;
        self.post(&self.assign_url, request).await
    }

    async fn submit(&self, payload: SubmissionPayload) -> Result<SubmitResponse, AssignError> {
        let body = SubmitRequest {
            p_payload: Some(payload),
        };
        match self.post(&self.submit_url, &body).await {
            Err(AssignError::AllocationUnavailable(e)) => Err(AssignError::ResponseWrite(e)),
            other => other,
        }
    }
}

//! Domo Stream API client.
//!
//! Every method performs exactly one HTTP request and classifies the outcome
//! as either success, `AppError::Api` (non-2xx), or
//! `AppError::ConnectionFailed` (transport). Retrying failed part uploads is
//! the pipeline's job, not the client's.

use std::sync::Arc;

use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::AppError;

// ─────────────────────────────────────────────────────────────────────────────
// Wire Types
// ─────────────────────────────────────────────────────────────────────────────

/// A single stream execution as returned by the Domo API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamExecution {
    /// Server-assigned execution identifier.
    pub id: u64,
    /// Execution state, e.g. "ACTIVE" or "SUCCESS". Only populated on listing.
    #[serde(default)]
    pub current_state: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// DomoClient
// ─────────────────────────────────────────────────────────────────────────────

/// Authenticated client for the Domo Stream and DataSet APIs.
///
/// Cheap to clone: the token and base URL are read-only shared values across
/// all upload workers.
#[derive(Clone)]
pub struct DomoClient {
    /// Shared HTTP client.
    http: Arc<Client>,
    /// API base URL (e.g. "https://api.domo.com").
    base_url: Url,
    /// OAuth access token.
    access_token: String,
}

impl DomoClient {
    /// Creates a new client from a shared HTTP client, base URL, and token.
    pub fn new(http: Arc<Client>, base_url: Url, access_token: String) -> Self {
        Self {
            http,
            base_url,
            access_token,
        }
    }

    /// Creates a new execution on a stream.
    ///
    /// # Errors
    ///
    /// - `AppError::Api` - non-2xx response
    /// - `AppError::ConnectionFailed` - network error
    pub async fn create_execution(&self, stream_id: u64) -> Result<StreamExecution, AppError> {
        let url = self.url(&format!("/v1/streams/{}/executions", stream_id))?;

        debug!("POST /v1/streams/{}/executions", stream_id);
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| AppError::ConnectionFailed(format!("Execution create failed: {}", e)))?;

        let status = response.status();
        debug!("POST /v1/streams/{}/executions -> {}", stream_id, status.as_u16());

        if !status.is_success() {
            return Err(error_from_response(response, status).await);
        }

        response.json().await.map_err(|e| {
            AppError::Api {
                status: status.as_u16(),
                body: format!("Failed to parse execution response: {}", e),
            }
        })
    }

    /// Uploads one chunk as a numbered part of an execution.
    ///
    /// The body is sent as `text/csv`. A single attempt only.
    pub async fn upload_part(
        &self,
        stream_id: u64,
        execution_id: u64,
        part_id: u64,
        chunk: Bytes,
    ) -> Result<(), AppError> {
        let url = self.url(&format!(
            "/v1/streams/{}/executions/{}/part/{}",
            stream_id, execution_id, part_id
        ))?;

        debug!(
            "PUT /v1/streams/{}/executions/{}/part/{} ({} bytes)",
            stream_id,
            execution_id,
            part_id,
            chunk.len()
        );
        let response = self
            .http
            .put(url)
            .bearer_auth(&self.access_token)
            .header("Content-Type", "text/csv")
            .body(chunk)
            .send()
            .await
            .map_err(|e| AppError::ConnectionFailed(format!("Part upload failed: {}", e)))?;

        let status = response.status();
        debug!(
            "PUT /v1/streams/{}/executions/{}/part/{} -> {}",
            stream_id,
            execution_id,
            part_id,
            status.as_u16()
        );

        if !status.is_success() {
            return Err(error_from_response(response, status).await);
        }

        Ok(())
    }

    /// Commits an execution, finalizing all uploaded parts.
    pub async fn commit_execution(
        &self,
        stream_id: u64,
        execution_id: u64,
    ) -> Result<(), AppError> {
        self.put_lifecycle(stream_id, execution_id, "commit").await
    }

    /// Aborts an execution, discarding all uploaded parts.
    pub async fn abort_execution(
        &self,
        stream_id: u64,
        execution_id: u64,
    ) -> Result<(), AppError> {
        self.put_lifecycle(stream_id, execution_id, "abort").await
    }

    /// Lists executions on a stream, one page at a time.
    pub async fn list_executions(
        &self,
        stream_id: u64,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<StreamExecution>, AppError> {
        let url = self.url(&format!(
            "/v1/streams/{}/executions?limit={}&offset={}",
            stream_id, limit, offset
        ))?;

        debug!("GET /v1/streams/{}/executions", stream_id);
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| AppError::ConnectionFailed(format!("Execution listing failed: {}", e)))?;

        let status = response.status();
        debug!("GET /v1/streams/{}/executions -> {}", stream_id, status.as_u16());

        if !status.is_success() {
            return Err(error_from_response(response, status).await);
        }

        response.json().await.map_err(|e| AppError::Api {
            status: status.as_u16(),
            body: format!("Failed to parse executions response: {}", e),
        })
    }

    /// Fetches a dataset definition, used as a template for `create`.
    pub async fn get_dataset(&self, dataset_id: &str) -> Result<Value, AppError> {
        let url = self.url(&format!("/v1/datasets/{}", dataset_id))?;

        debug!("GET /v1/datasets/{}", dataset_id);
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| AppError::ConnectionFailed(format!("Dataset fetch failed: {}", e)))?;

        let status = response.status();
        debug!("GET /v1/datasets/{} -> {}", dataset_id, status.as_u16());

        if !status.is_success() {
            return Err(error_from_response(response, status).await);
        }

        response.json().await.map_err(|e| AppError::Api {
            status: status.as_u16(),
            body: format!("Failed to parse dataset response: {}", e),
        })
    }

    /// Creates a new stream (and its backing dataset).
    pub async fn create_stream(&self, body: &Value) -> Result<Value, AppError> {
        let url = self.url("/v1/streams")?;

        debug!("POST /v1/streams");
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::ConnectionFailed(format!("Stream create failed: {}", e)))?;

        let status = response.status();
        debug!("POST /v1/streams -> {}", status.as_u16());

        if !status.is_success() {
            return Err(error_from_response(response, status).await);
        }

        response.json().await.map_err(|e| AppError::Api {
            status: status.as_u16(),
            body: format!("Failed to parse stream response: {}", e),
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Private Helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// PUTs to a terminal lifecycle endpoint ("commit" or "abort").
    async fn put_lifecycle(
        &self,
        stream_id: u64,
        execution_id: u64,
        action: &str,
    ) -> Result<(), AppError> {
        let url = self.url(&format!(
            "/v1/streams/{}/executions/{}/{}",
            stream_id, execution_id, action
        ))?;

        debug!(
            "PUT /v1/streams/{}/executions/{}/{}",
            stream_id, execution_id, action
        );
        let response = self
            .http
            .put(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| AppError::ConnectionFailed(format!("Execution {} failed: {}", action, e)))?;

        let status = response.status();
        debug!(
            "PUT /v1/streams/{}/executions/{}/{} -> {}",
            stream_id,
            execution_id,
            action,
            status.as_u16()
        );

        if !status.is_success() {
            return Err(error_from_response(response, status).await);
        }

        Ok(())
    }

    /// Joins a path (and optional query) onto the base URL.
    fn url(&self, path: &str) -> Result<Url, AppError> {
        self.base_url
            .join(path)
            .map_err(|e| AppError::Internal(format!("Failed to build URL {}: {}", path, e)))
    }
}

/// Maps a non-2xx response into `AppError::Api`, preserving the body text.
async fn error_from_response(response: reqwest::Response, status: reqwest::StatusCode) -> AppError {
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| String::from("Unable to read error body"));
    AppError::Api {
        status: status.as_u16(),
        body,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

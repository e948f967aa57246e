// runlog-cli/src/client.rs
// ============================================================================
// Module: HTTP Client
// Description: Thin reqwest wrapper over every non-serve CLI subcommand's
//              target route.
// Purpose: Lets the CLI talk to a running runlog-server without each
//          subcommand hand-rolling its own request plumbing.
// Dependencies: reqwest, serde_json
// ============================================================================

//! ## Overview
//! One struct holding a configured [`reqwest::Client`] plus base URL and
//! bearer token, one method per route, each returning the parsed JSON body
//! or a [`ClientError`] built from the server's `ApiError` envelope.

use reqwest::header::HeaderValue;
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Errors raised while talking to a runlog-server instance.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request could not be sent or the response could not be read.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The bearer token contained bytes invalid in an HTTP header.
    #[error("invalid token: {0}")]
    InvalidToken(#[from] reqwest::header::InvalidHeaderValue),
    /// The server replied with a non-2xx status.
    #[error("server error ({status}): {code}: {message}")]
    Api {
        /// HTTP status code.
        status: StatusCode,
        /// The `ApiError` envelope's `code` field.
        code: String,
        /// The `ApiError` envelope's `message` field.
        message: String,
    },
}

/// The server's error envelope shape, per `runlog_server::error::ApiError`'s
/// JSON body.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    code: String,
    message: String,
}

/// A configured HTTP client for one runlog-server base URL.
pub struct RunlogClient {
    http: reqwest::Client,
    base_url: String,
}

impl RunlogClient {
    /// Builds a client that sends `Authorization: Bearer {token}` on every
    /// request, or no such header when `token` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if `token` is not a valid header value.
    pub fn new(base_url: impl Into<String>, token: Option<&str>) -> Result<Self, ClientError> {
        let mut builder = reqwest::Client::builder();
        if let Some(token) = token {
            let mut headers = reqwest::header::HeaderMap::new();
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
            builder = builder.default_headers(headers);
        }
        Ok(Self {
            http: builder.build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn send<T: for<'de> Deserialize<'de>>(&self, request: reqwest::RequestBuilder) -> Result<T, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let envelope = response.json::<ErrorEnvelope>().await.unwrap_or(ErrorEnvelope {
                code: "unknown".to_string(),
                message: status.to_string(),
            });
            Err(ClientError::Api { status, code: envelope.code, message: envelope.message })
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// `POST /runs`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport or server failure.
    pub async fn create_run(&self, body: &CreateRunRequest) -> Result<Value, ClientError> {
        self.send(self.http.post(self.url("/runs")).json(body)).await
    }

    /// `GET /runs/{run_id}`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport or server failure.
    pub async fn get_run(&self, run_id: &str) -> Result<Value, ClientError> {
        self.send(self.http.get(self.url(&format!("/runs/{run_id}")))).await
    }

    /// `GET /runs/{run_id}/summary`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport or server failure.
    pub async fn get_run_summary(&self, run_id: &str) -> Result<Value, ClientError> {
        self.send(self.http.get(self.url(&format!("/runs/{run_id}/summary")))).await
    }

    /// `PUT /runs/{run_id}/status`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport or server failure.
    pub async fn update_run_status(&self, run_id: &str, status: &str) -> Result<Value, ClientError> {
        self.send(self.http.put(self.url(&format!("/runs/{run_id}/status"))).json(&serde_json::json!({ "status": status })))
            .await
    }

    /// `GET /threads/{thread_id}/runs`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport or server failure.
    pub async fn list_runs_in_thread(&self, thread_id: &str) -> Result<Value, ClientError> {
        self.send(self.http.get(self.url(&format!("/threads/{thread_id}/runs")))).await
    }

    /// `POST /runs/{run_id}/events`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport or server failure.
    pub async fn append_event(&self, run_id: &str, body: &AppendEventRequest) -> Result<Value, ClientError> {
        self.send(self.http.post(self.url(&format!("/runs/{run_id}/events"))).json(body)).await
    }

    /// `GET /runs/{run_id}/events`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport or server failure.
    pub async fn list_events(&self, run_id: &str, after_seq: u64) -> Result<Value, ClientError> {
        self.send(self.http.get(self.url(&format!("/runs/{run_id}/events"))).query(&[("after_seq", after_seq)])).await
    }

    /// `GET /tools`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport or server failure.
    pub async fn list_tools(&self) -> Result<Value, ClientError> {
        self.send(self.http.get(self.url("/tools"))).await
    }

    /// `GET /tools/{tool_id}/manifest`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport or server failure.
    pub async fn get_manifest(&self, tool_id: &str, version: Option<&str>) -> Result<Value, ClientError> {
        let mut request = self.http.get(self.url(&format!("/tools/{tool_id}/manifest")));
        if let Some(version) = version {
            request = request.query(&[("version", version)]);
        }
        self.send(request).await
    }

    /// `POST /tools/invoke`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport or server failure.
    pub async fn invoke_tool(&self, body: &InvokeToolRequest) -> Result<Value, ClientError> {
        self.send(self.http.post(self.url("/tools/invoke")).json(body)).await
    }

    /// `GET /runs/{run_id}/approvals`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport or server failure.
    pub async fn list_approvals(&self, run_id: &str) -> Result<Value, ClientError> {
        self.send(self.http.get(self.url(&format!("/runs/{run_id}/approvals")))).await
    }

    /// `POST /approvals/{approval_id}/approve`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport or server failure.
    pub async fn approve(&self, approval_id: &str) -> Result<Value, ClientError> {
        self.send(self.http.post(self.url(&format!("/approvals/{approval_id}/approve")))).await
    }

    /// `POST /approvals/{approval_id}/deny`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport or server failure.
    pub async fn deny(&self, approval_id: &str) -> Result<Value, ClientError> {
        self.send(self.http.post(self.url(&format!("/approvals/{approval_id}/deny")))).await
    }

    /// `GET /system/health`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport or server failure.
    pub async fn system_health(&self) -> Result<Value, ClientError> {
        self.send(self.http.get(self.url("/system/health"))).await
    }

    /// `GET /system/stats`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport or server failure.
    pub async fn system_stats(&self) -> Result<Value, ClientError> {
        self.send(self.http.get(self.url("/system/stats"))).await
    }

    /// `GET /system/config`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport or server failure.
    pub async fn system_config(&self) -> Result<Value, ClientError> {
        self.send(self.http.get(self.url("/system/config"))).await
    }
}

/// Body for `POST /runs`, mirroring `routes::runs::CreateRunRequest`.
#[derive(Debug, Serialize)]
pub struct CreateRunRequest {
    /// Owning thread.
    pub thread_id: String,
    /// Model configuration snapshot, opaque to the substrate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_config: Option<Value>,
    /// Tool id/version pins at run start.
    #[serde(default)]
    pub tool_versions: std::collections::BTreeMap<String, String>,
    /// Executor version at run start.
    pub executor_version: String,
}

/// Body for `POST /runs/{run_id}/events`, mirroring
/// `routes::events::AppendEventRequest`.
#[derive(Debug, Serialize)]
pub struct AppendEventRequest {
    /// Event kind, selects the payload schema.
    pub kind: String,
    /// Canonical JSON payload, validated against `kind`'s schema.
    pub payload: Value,
    /// Causal parent, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_event_id: Option<String>,
    /// Correlation group, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

/// Body for `POST /tools/invoke`, mirroring `routes::tools::InvokeToolRequest`.
#[derive(Debug, Serialize)]
pub struct InvokeToolRequest {
    /// Owning run.
    pub run_id: String,
    /// Owning project, consulted by `PolicyEngine`.
    pub project_id: String,
    /// Tool id to invoke.
    pub tool_id: String,
    /// Explicit version; defaults to the project's pin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Tool inputs, validated against the manifest's inputs schema.
    pub inputs: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = RunlogClient::new("http://localhost:8080/", None).expect("builds");
        assert_eq!(client.url("/runs"), "http://localhost:8080/runs");
    }

    #[test]
    fn rejects_a_token_with_invalid_header_bytes() {
        let result = RunlogClient::new("http://localhost:8080", Some("bad\nvalue"));
        assert!(result.is_err());
    }
}

// runlog-providers/src/remote.rs
// ============================================================================
// Module: Remote Bindings
// Description: ToolBinding implementations for `mcp_remote` and
//              `openapi_proxy` manifests.
// Purpose: POST validated inputs to a fixed URL and return the parsed JSON
//          response, under strict scheme/host/size discipline.
// Dependencies: runlog-core, reqwest
// ============================================================================

//! ## Overview
//! Both binding types share one implementation: an HTTP POST of the tool's
//! `inputs` as a JSON body, returning the parsed JSON response body.
//! `mcp_remote` and `openapi_proxy` differ only in how their manifest's URL
//! was obtained upstream, not in the transport. Redirects are disabled,
//! `https` is required unless `allow_http` is set, and the response body is
//! read under a byte cap before being parsed.

use std::collections::BTreeSet;
use std::io::Read;
use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use runlog_core::InprocContext;
use runlog_core::ToolBinding;
use runlog_core::ToolBindingError;
use serde_json::Value;
use tracing::warn;

/// Configuration shared by every [`RemoteBinding`].
#[derive(Debug, Clone)]
pub struct RemoteBindingConfig {
    /// Allow cleartext `http://` URLs (disabled by default).
    pub allow_http: bool,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum response body size allowed, in bytes.
    pub max_response_bytes: usize,
    /// Optional host allowlist; `None` permits any host passing the
    /// scheme check.
    pub allowed_hosts: Option<BTreeSet<String>>,
    /// User agent string for outbound requests.
    pub user_agent: String,
}

impl Default for RemoteBindingConfig {
    fn default() -> Self {
        Self {
            allow_http: false,
            timeout_ms: 10_000,
            max_response_bytes: 1024 * 1024,
            allowed_hosts: None,
            user_agent: "runlog-providers/0.1".to_string(),
        }
    }
}

/// A [`ToolBinding`] that dispatches to a fixed remote URL over HTTP.
pub struct RemoteBinding {
    /// Fixed dispatch target, validated against `config` at construction.
    url: Url,
    /// Transport policy applied to every request.
    config: RemoteBindingConfig,
    /// Pre-built client carrying the configured timeout and redirect policy.
    client: Client,
}

impl RemoteBinding {
    /// Builds a binding targeting `url`, validating its scheme and host
    /// against `config` up front so a misconfigured manifest fails at
    /// registration time rather than at dispatch time.
    ///
    /// # Errors
    ///
    /// Returns [`ToolBindingError`] when `url` is malformed, fails policy,
    /// or the HTTP client cannot be built.
    pub fn new(url: &str, config: RemoteBindingConfig) -> Result<Self, ToolBindingError> {
        let parsed = Url::parse(url).map_err(|err| ToolBindingError::ExecutionFailed(format!("invalid url: {err}")))?;
        validate_url(&parsed, &config)?;
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .redirect(Policy::none())
            .build()
            .map_err(|err| ToolBindingError::ExecutionFailed(format!("http client build failed: {err}")))?;
        Ok(Self {
            url: parsed,
            config,
            client,
        })
    }
}

impl ToolBinding for RemoteBinding {
    fn invoke(&self, inputs: &Value, _ctx: &InprocContext) -> Result<Value, ToolBindingError> {
        let mut response = self
            .client
            .post(self.url.clone())
            .json(inputs)
            .send()
            .map_err(|err| ToolBindingError::McpError(format!("request failed: {err}")))?;
        if !response.status().is_success() {
            warn!(url = %self.url, status = %response.status(), "remote binding returned non-success status");
            return Err(ToolBindingError::McpError(format!("remote returned status {}", response.status())));
        }
        let body = read_response_limited(&mut response, self.config.max_response_bytes)?;
        serde_json::from_slice(&body).map_err(|err| ToolBindingError::McpError(format!("response is not valid json: {err}")))
    }
}

/// Validates URL scheme and host allowlist policy.
fn validate_url(url: &Url, config: &RemoteBindingConfig) -> Result<(), ToolBindingError> {
    match url.scheme() {
        "https" => {}
        "http" if config.allow_http => {}
        other => return Err(ToolBindingError::UnsafePath(format!("unsupported url scheme: {other}"))),
    }
    if let Some(allowlist) = &config.allowed_hosts {
        let host = url
            .host_str()
            .ok_or_else(|| ToolBindingError::UnsafePath("url host required".to_string()))?;
        if !allowlist.contains(host) {
            return Err(ToolBindingError::UnsafePath(format!("url host not allowed: {host}")));
        }
    }
    Ok(())
}

/// Reads the response body while enforcing a byte limit.
fn read_response_limited(response: &mut reqwest::blocking::Response, max_bytes: usize) -> Result<Vec<u8>, ToolBindingError> {
    let expected_len = response.content_length();
    let max_bytes_u64 =
        u64::try_from(max_bytes).map_err(|_| ToolBindingError::ExecutionFailed("response size limit exceeds u64".to_string()))?;
    if let Some(expected) = expected_len
        && expected > max_bytes_u64
    {
        return Err(ToolBindingError::McpError("response exceeds size limit".to_string()));
    }
    let mut buf = Vec::new();
    let limit = max_bytes_u64.saturating_add(1);
    let mut handle = response.take(limit);
    handle
        .read_to_end(&mut buf)
        .map_err(|err| ToolBindingError::McpError(format!("failed to read response: {err}")))?;
    if buf.len() > max_bytes {
        return Err(ToolBindingError::McpError("response exceeds size limit".to_string()));
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::missing_docs_in_private_items,
        clippy::missing_panics_doc,
        missing_docs,
        reason = "Test-only assertions and helpers are permitted."
    )]

    use std::thread;

    use tiny_http::Response;
    use tiny_http::Server;

    use super::*;

    fn ctx() -> InprocContext {
        InprocContext {
            workspace_root: std::env::temp_dir(),
        }
    }

    #[test]
    fn http_scheme_is_rejected_by_default() {
        let err = RemoteBinding::new("http://example.com/rpc", RemoteBindingConfig::default()).unwrap_err();
        assert!(matches!(err, ToolBindingError::UnsafePath(_)));
    }

    #[test]
    fn disallowed_host_is_rejected() {
        let mut config = RemoteBindingConfig::default();
        config.allowed_hosts = Some(BTreeSet::from(["allowed.example.com".to_string()]));
        let err = RemoteBinding::new("https://blocked.example.com/rpc", config).unwrap_err();
        assert!(matches!(err, ToolBindingError::UnsafePath(_)));
    }

    #[test]
    fn posts_inputs_and_parses_json_response() {
        let server = Server::http("127.0.0.1:0").expect("bind loopback");
        let addr = server.server_addr().to_ip().expect("ip addr");
        let url = format!("http://{addr}/rpc");
        let handle = thread::spawn(move || {
            if let Ok(request) = server.recv() {
                let response = Response::from_string("{\"ok\":true}")
                    .with_header("Content-Type: application/json".parse::<tiny_http::Header>().expect("header parses"));
                let _ = request.respond(response);
            }
        });

        let mut config = RemoteBindingConfig::default();
        config.allow_http = true;
        let binding = RemoteBinding::new(&url, config).expect("binding builds");
        let result = binding.invoke(&serde_json::json!({"x": 1}), &ctx()).expect("request succeeds");
        assert_eq!(result, serde_json::json!({"ok": true}));
        handle.join().expect("server thread joins");
    }
}

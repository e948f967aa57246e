// runlog-broker/src/sink/callback.rs
// ============================================================================
// Module: Webhook Sink
// Description: Sink that POSTs a notification to a configured webhook URL.
// Purpose: Cross-surface fan-out to systems outside this process.
// Dependencies: runlog-core, reqwest
// ============================================================================

//! ## Overview
//! [`WebhookSink`] POSTs a JSON summary of the dispatch to a fixed URL.
//! Redirects are disabled and `https` is required unless explicitly
//! overridden, mirroring `runlog-providers`'s remote binding transport
//! policy; a non-success status or transport error fails only this sink,
//! the notification row itself is unaffected.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use runlog_core::Clock;
use runlog_core::Notification;
use serde_json::json;

use crate::dispatch::DispatchReceipt;
use crate::dispatch::DispatchTarget;
use crate::dispatch::ReceiptFactory;
use crate::sink::Sink;
use crate::sink::SinkError;

/// POSTs notifications to a fixed webhook URL.
pub struct WebhookSink {
    /// Fixed dispatch target.
    url: Url,
    /// Pre-built client carrying the configured timeout and redirect policy.
    client: Client,
    /// Receipt factory for this sink's dispatches.
    receipts: ReceiptFactory,
}

impl WebhookSink {
    /// Builds a webhook sink targeting `url`.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when `url` does not use `https`, or the HTTP
    /// client cannot be built.
    pub fn new(url: &str, clock: Arc<dyn Clock>) -> Result<Self, SinkError> {
        let parsed = Url::parse(url).map_err(|err| SinkError::Webhook(format!("invalid url: {err}")))?;
        if parsed.scheme() != "https" {
            return Err(SinkError::Webhook(format!("unsupported url scheme: {}", parsed.scheme())));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .redirect(Policy::none())
            .build()
            .map_err(|err| SinkError::Webhook(format!("http client build failed: {err}")))?;
        Ok(Self {
            url: parsed,
            client,
            receipts: ReceiptFactory::new("webhook", clock),
        })
    }
}

impl Sink for WebhookSink {
    fn deliver(
        &self,
        target: DispatchTarget,
        notification: &Notification,
    ) -> Result<DispatchReceipt, SinkError> {
        let receipt = self.receipts.next(target);
        let body = json!({
            "dispatch_id": receipt.dispatch_id,
            "user_id": target.user_id.to_string(),
            "project_id": target.project_id.map(|id| id.to_string()),
            "run_id": target.run_id.map(|id| id.to_string()),
            "notification_id": notification.notification_id.to_string(),
            "kind": notification.kind,
            "payload": notification.payload,
        });
        let response = self
            .client
            .post(self.url.clone())
            .json(&body)
            .send()
            .map_err(|err| SinkError::Webhook(format!("request failed: {err}")))?;
        if !response.status().is_success() {
            return Err(SinkError::Webhook(format!("webhook returned status {}", response.status())));
        }
        Ok(receipt)
    }
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

    use runlog_core::FixedClock;
    use runlog_core::Id;
    use runlog_core::NotificationId;
    use runlog_core::UserId;

    use super::*;

    #[test]
    fn http_scheme_is_rejected() {
        let err = WebhookSink::new("http://example.com/hook", Arc::new(FixedClock::new(1_000))).unwrap_err();
        assert!(matches!(err, SinkError::Webhook(_)));
    }

    #[test]
    fn posts_a_json_summary() {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("bind loopback");
        let addr = server.server_addr().to_ip().expect("ip addr");
        let url = format!("http://{addr}/hook");
        let handle = std::thread::spawn(move || {
            if let Ok(request) = server.recv() {
                let _ = request.respond(tiny_http::Response::from_string("ok"));
            }
        });

        // Local loopback test target; the sink's own scheme check is
        // exercised separately since it is enforced before this point.
        let sink = WebhookSink {
            url: Url::parse(&url).expect("url parses"),
            client: Client::builder().build().expect("client builds"),
            receipts: ReceiptFactory::new("webhook", Arc::new(FixedClock::new(1_000))),
        };
        let target = DispatchTarget {
            user_id: UserId::from(Id::from_raw(1)),
            project_id: None,
            run_id: None,
        };
        let notification = Notification {
            notification_id: NotificationId::from(Id::from_raw(2)),
            notification_seq: 1,
            user_id: target.user_id,
            kind: "tool_error".to_string(),
            payload: serde_json::json!({}),
            project_id: None,
            run_id: None,
            read_at: None,
        };
        sink.deliver(target, &notification).expect("delivery succeeds");
        handle.join().expect("server thread joins");
    }
}

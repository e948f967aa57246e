// runlog-broker/src/sink/channel.rs
// ============================================================================
// Module: Channel Sink
// Description: Channel-based sink for waking live SSE streams.
// Purpose: Send resolved dispatch messages through a Tokio mpsc channel.
// Dependencies: runlog-core, tokio
// ============================================================================

//! ## Overview
//! [`ChannelSink`] delivers notifications by sending a [`DispatchMessage`]
//! into a `tokio::sync::mpsc` channel. The SSE layer reads this channel to
//! short-circuit its poll loop when a matching stream is open; a full or
//! closed channel only degrades this hint, since the DB poll remains the
//! source of truth.

use std::sync::Arc;

use runlog_core::Clock;
use runlog_core::Notification;
use tokio::sync::mpsc::Sender;

use crate::dispatch::DispatchReceipt;
use crate::dispatch::DispatchTarget;
use crate::dispatch::ReceiptFactory;
use crate::sink::DispatchMessage;
use crate::sink::Sink;
use crate::sink::SinkError;

/// Channel-based notification sink.
pub struct ChannelSink {
    /// Sender used to dispatch wake-up messages.
    sender: Sender<DispatchMessage>,
    /// Receipt factory for this sink's dispatches.
    receipts: ReceiptFactory,
}

impl ChannelSink {
    /// Creates a channel sink wrapping `sender`.
    #[must_use]
    pub fn new(sender: Sender<DispatchMessage>, clock: Arc<dyn Clock>) -> Self {
        Self {
            sender,
            receipts: ReceiptFactory::new("channel", clock),
        }
    }
}

impl Sink for ChannelSink {
    fn deliver(
        &self,
        target: DispatchTarget,
        notification: &Notification,
    ) -> Result<DispatchReceipt, SinkError> {
        let receipt = self.receipts.next(target);
        let message = DispatchMessage {
            target,
            notification: notification.clone(),
            receipt: receipt.clone(),
        };
        self.sender.try_send(message).map_err(|err| SinkError::ChannelFailed(err.to_string()))?;
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

    fn notification() -> Notification {
        Notification {
            notification_id: NotificationId::from(Id::from_raw(1)),
            notification_seq: 1,
            user_id: UserId::from(Id::from_raw(2)),
            kind: "tool_error".to_string(),
            payload: serde_json::json!({}),
            project_id: None,
            run_id: None,
            read_at: None,
        }
    }

    fn target() -> DispatchTarget {
        DispatchTarget {
            user_id: UserId::from(Id::from_raw(2)),
            project_id: None,
            run_id: None,
        }
    }

    #[test]
    fn delivery_enqueues_exactly_one_message() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(4);
        let sink = ChannelSink::new(tx, Arc::new(FixedClock::new(1_000)));
        sink.deliver(target(), &notification()).expect("channel has capacity");
        let message = rx.try_recv().expect("message enqueued");
        assert_eq!(message.notification.kind, "tool_error");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn delivery_fails_when_receiver_dropped() {
        let (tx, rx) = tokio::sync::mpsc::channel(4);
        drop(rx);
        let sink = ChannelSink::new(tx, Arc::new(FixedClock::new(1_000)));
        assert!(sink.deliver(target(), &notification()).is_err());
    }
}

// runlog-broker/src/sink/log.rs
// ============================================================================
// Module: Log Sink
// Description: Structured-log-only sink for audit-grade delivery records.
// Purpose: Emit a tracing event for each notification dispatch.
// Dependencies: runlog-core, tracing
// ============================================================================

//! ## Overview
//! [`LogSink`] emits one structured `tracing` event per dispatch and
//! returns the receipt. It never fails: a logging backend being
//! unreachable must not block notification delivery to other sinks.

use std::sync::Arc;

use runlog_core::Clock;
use runlog_core::Notification;
use tracing::info;

use crate::dispatch::DispatchReceipt;
use crate::dispatch::DispatchTarget;
use crate::dispatch::ReceiptFactory;
use crate::sink::Sink;
use crate::sink::SinkError;

/// Log-only notification sink.
pub struct LogSink {
    /// Receipt factory for this sink's dispatches.
    receipts: ReceiptFactory,
}

impl LogSink {
    /// Creates a log sink.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            receipts: ReceiptFactory::new("log", clock),
        }
    }
}

impl Sink for LogSink {
    fn deliver(
        &self,
        target: DispatchTarget,
        notification: &Notification,
    ) -> Result<DispatchReceipt, SinkError> {
        let receipt = self.receipts.next(target);
        info!(
            dispatch_id = %receipt.dispatch_id,
            user_id = %target.user_id,
            kind = %notification.kind,
            notification_id = %notification.notification_id,
            "notification dispatched"
        );
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

    #[test]
    fn delivery_always_succeeds() {
        let sink = LogSink::new(Arc::new(FixedClock::new(1_000)));
        let target = DispatchTarget {
            user_id: UserId::from(Id::from_raw(2)),
            project_id: None,
            run_id: None,
        };
        let receipt = sink.deliver(target, &notification()).expect("log sink never fails");
        assert_eq!(receipt.dispatcher, "log");
    }
}

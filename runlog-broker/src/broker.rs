// runlog-broker/src/broker.rs
// ============================================================================
// Module: Composite Broker
// Description: Fans a notification out to every configured sink.
// Purpose: Deliver NotificationRouter's persisted rows and give StreamBroker
//          a wake-up hint, without any sink's failure affecting the others.
// Dependencies: runlog-core, tracing
// ============================================================================

//! ## Overview
//! [`CompositeBroker`] holds every configured [`Sink`] and delivers to all
//! of them on each [`CompositeBroker::dispatch`] call. A sink's delivery
//! failure is logged and skipped; it never prevents the remaining sinks
//! from running, since the notification row these sinks are fanning out is
//! already durable by the time the broker sees it.

use std::sync::Arc;

use runlog_core::Notification;
use thiserror::Error;
use tracing::warn;

use crate::dispatch::DispatchReceipt;
use crate::dispatch::DispatchTarget;
use crate::sink::Sink;

/// Errors raised while building a composite broker.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// No sinks were registered.
    #[error("composite broker has no sinks configured")]
    NoSinks,
}

/// Builder for a [`CompositeBroker`].
#[derive(Default)]
pub struct CompositeBrokerBuilder {
    /// Sinks accumulated so far, in registration order.
    sinks: Vec<Arc<dyn Sink>>,
}

impl CompositeBrokerBuilder {
    /// Registers a sink. Sinks run in registration order.
    #[must_use]
    pub fn sink(mut self, sink: impl Sink + 'static) -> Self {
        self.sinks.push(Arc::new(sink));
        self
    }

    /// Builds the composite broker.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::NoSinks`] when no sink was registered.
    pub fn build(self) -> Result<CompositeBroker, BrokerError> {
        if self.sinks.is_empty() {
            return Err(BrokerError::NoSinks);
        }
        Ok(CompositeBroker {
            sinks: self.sinks,
        })
    }
}

/// Fans a notification out to every configured sink.
pub struct CompositeBroker {
    /// Configured sinks, run in registration order.
    sinks: Vec<Arc<dyn Sink>>,
}

impl CompositeBroker {
    /// Returns a builder for the composite broker.
    #[must_use]
    pub fn builder() -> CompositeBrokerBuilder {
        CompositeBrokerBuilder::default()
    }

    /// Delivers `notification` to `target` through every configured sink.
    ///
    /// Returns the receipts of sinks that succeeded; a failing sink is
    /// logged and excluded from the result rather than aborting the fan-out.
    pub fn dispatch(&self, target: DispatchTarget, notification: &Notification) -> Vec<DispatchReceipt> {
        self.sinks
            .iter()
            .filter_map(|sink| match sink.deliver(target, notification) {
                Ok(receipt) => Some(receipt),
                Err(err) => {
                    warn!(user_id = %target.user_id, error = %err, "notification sink delivery failed");
                    None
                }
            })
            .collect()
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
    use crate::sink::LogSink;
    use crate::sink::SinkError;

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

    struct FailingSink;

    impl Sink for FailingSink {
        fn deliver(&self, _target: DispatchTarget, _notification: &Notification) -> Result<DispatchReceipt, SinkError> {
            Err(SinkError::ChannelFailed("always fails".to_string()))
        }
    }

    #[test]
    fn building_without_sinks_fails() {
        let err = CompositeBroker::builder().build().unwrap_err();
        assert!(matches!(err, BrokerError::NoSinks));
    }

    #[test]
    fn a_failing_sink_does_not_block_the_others() {
        let broker = CompositeBroker::builder()
            .sink(FailingSink)
            .sink(LogSink::new(Arc::new(FixedClock::new(1_000))))
            .build()
            .expect("has sinks");
        let receipts = broker.dispatch(target(), &notification());
        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].dispatcher, "log");
    }
}

// runlog-broker/src/dispatch.rs
// ============================================================================
// Module: Dispatch Targets & Receipts
// Description: Identifies who a notification dispatch is addressed to and
//              records that a sink accepted it.
// Purpose: Shared vocabulary every sink and the composite broker build on.
// Dependencies: runlog-core
// ============================================================================

//! ## Overview
//! [`DispatchTarget`] names the recipient a delivery is addressed to.
//! [`ReceiptFactory`] mints a [`DispatchReceipt`] per delivery attempt so
//! callers (and tests) can assert a sink actually ran, without that receipt
//! ever being written to the durable store itself -- the notification row
//! was already persisted by `NotificationRouter` before the broker sees it.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use runlog_core::Clock;
use runlog_core::ProjectId;
use runlog_core::RunId;
use runlog_core::Timestamp;
use runlog_core::UserId;

/// Identifies who a notification dispatch is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchTarget {
    /// Recipient user.
    pub user_id: UserId,
    /// Related project, if any.
    pub project_id: Option<ProjectId>,
    /// Related run, if any.
    pub run_id: Option<RunId>,
}

/// Records that a sink accepted a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReceipt {
    /// Opaque id unique within this process's lifetime, not persisted.
    pub dispatch_id: String,
    /// Name of the sink that produced this receipt.
    pub dispatcher: String,
    /// Recipient this dispatch was addressed to.
    pub target: DispatchTarget,
    /// When the sink accepted the dispatch.
    pub dispatched_at: Timestamp,
}

/// Mints monotonically numbered [`DispatchReceipt`]s for one sink.
pub struct ReceiptFactory {
    /// Name reported on every receipt this factory mints.
    dispatcher: String,
    /// Clock used to stamp `dispatched_at`.
    clock: Arc<dyn Clock>,
    /// Monotonic counter forming the tail of `dispatch_id`.
    counter: AtomicU64,
}

impl ReceiptFactory {
    /// Creates a receipt factory for a sink named `dispatcher`.
    #[must_use]
    pub fn new(dispatcher: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            dispatcher: dispatcher.into(),
            clock,
            counter: AtomicU64::new(0),
        }
    }

    /// Mints the next receipt for a dispatch to `target`.
    #[must_use]
    pub fn next(&self, target: DispatchTarget) -> DispatchReceipt {
        let seq = self.counter.fetch_add(1, Ordering::SeqCst);
        DispatchReceipt {
            dispatch_id: format!("{}-{seq}", self.dispatcher),
            dispatcher: self.dispatcher.clone(),
            target,
            dispatched_at: self.clock.now(),
        }
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

    use super::*;

    fn target() -> DispatchTarget {
        DispatchTarget {
            user_id: UserId::from(Id::from_raw(1)),
            project_id: None,
            run_id: None,
        }
    }

    #[test]
    fn receipts_carry_a_monotonically_increasing_dispatch_id() {
        let factory = ReceiptFactory::new("log", Arc::new(FixedClock::new(1_000)));
        let first = factory.next(target());
        let second = factory.next(target());
        assert_eq!(first.dispatch_id, "log-0");
        assert_eq!(second.dispatch_id, "log-1");
        assert_eq!(first.dispatcher, "log");
    }
}

// runlog-broker/src/sink/mod.rs
// ============================================================================
// Module: Notification Sinks
// Description: Sink trait and reference implementations for notification
//              delivery.
// Purpose: Deliver an already-persisted Notification to one surface (log,
//          in-process channel, webhook).
// Dependencies: runlog-core, thiserror
// ============================================================================

//! ## Overview
//! A [`Sink`] delivers one already-persisted [`runlog_core::Notification`]
//! to one surface. Sinks never decide *whether* to notify -- that is
//! `NotificationRouter`'s job -- and a sink failing never undoes the
//! notification row it was handed, since that row is already durable by
//! the time a sink sees it.

use runlog_core::Notification;
use thiserror::Error;

use crate::dispatch::DispatchReceipt;
use crate::dispatch::DispatchTarget;

/// Errors returned by broker sinks.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The log sink failed to emit its record.
    #[error("log sink failed: {0}")]
    LogWriteFailed(String),
    /// The channel sink's receiver has been dropped or the channel is full.
    #[error("channel delivery failed: {0}")]
    ChannelFailed(String),
    /// The webhook sink's HTTP request failed or returned a non-success status.
    #[error("webhook delivery failed: {0}")]
    Webhook(String),
}

/// Delivers a notification to one external or in-process surface.
pub trait Sink: Send + Sync {
    /// Delivers `notification` to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when delivery fails. A failure here does not
    /// retract the notification row; it only means this surface missed it.
    fn deliver(
        &self,
        target: DispatchTarget,
        notification: &Notification,
    ) -> Result<DispatchReceipt, SinkError>;
}

/// Message enqueued into a [`channel::ChannelSink`]'s channel, read by the
/// SSE layer to short-circuit its poll.
#[derive(Debug, Clone)]
pub struct DispatchMessage {
    /// Recipient this dispatch was addressed to.
    pub target: DispatchTarget,
    /// The delivered notification.
    pub notification: Notification,
    /// Receipt minted for this delivery.
    pub receipt: DispatchReceipt,
}

pub mod callback;
pub mod channel;
pub mod log;

pub use callback::WebhookSink;
pub use channel::ChannelSink;
pub use log::LogSink;

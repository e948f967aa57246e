// runlog-broker/src/lib.rs
// ============================================================================
// Module: Notification Broker
// Description: Reference sinks and a composite dispatcher for notification
//              delivery.
// Purpose: Fan out an already-persisted Notification to log, in-process
//          channel, and webhook surfaces.
// Dependencies: runlog-core, reqwest, tokio, tracing
// ============================================================================

//! ## Overview
//! `runlog-broker` is the delivery layer behind `NotificationRouter`:
//! [`CompositeBroker`] fans a persisted [`runlog_core::Notification`] out
//! to every configured [`Sink`]. Delivery here is best-effort -- the
//! notification row is already durable by the time a broker sees it, so a
//! sink failing only means that surface missed the hint.

pub mod broker;
pub mod dispatch;
pub mod sink;

pub use broker::CompositeBroker;
pub use broker::CompositeBrokerBuilder;
pub use dispatch::DispatchReceipt;
pub use dispatch::DispatchTarget;
pub use dispatch::ReceiptFactory;
pub use sink::ChannelSink;
pub use sink::DispatchMessage;
pub use sink::LogSink;
pub use sink::Sink;
pub use sink::SinkError;
pub use sink::WebhookSink;

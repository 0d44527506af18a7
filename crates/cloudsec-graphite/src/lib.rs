//! Graphite sink for the collected security metrics.
//!
//! [`metrics`] turns collected values into named [`MetricPoint`]s and
//! [`sender::GraphiteSender`] writes them using the plaintext protocol.
//!
//! [`MetricPoint`]: cloudsec_common::types::MetricPoint

pub mod error;
pub mod metrics;
pub mod sender;

pub use sender::GraphiteSender;

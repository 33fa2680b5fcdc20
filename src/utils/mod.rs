//! # Utility Modules
//!
//! Supporting utilities for logging and observability.
//!
//! ## Components
//! - **Logging**: Structured logging configuration
//! - **Metrics**: Per-interface packet counters

pub mod logging;
pub mod metrics;

pub use metrics::{CountersSnapshot, PacketCounters};

//! # Utility Modules
//!
//! Supporting utilities for logging and observability.
//!
//! ## Components
//! - **Logging**: Structured logging configuration
//! - **Metrics**: Thread-safe per-protocol counters

pub mod logging;
pub mod metrics;

pub use metrics::{MetricsSnapshot, RegistryMetrics};

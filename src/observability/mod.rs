//! # Observability
//!
//! Prometheus metrics and logging setup for the platform backend.

pub mod logging;
pub mod metrics;

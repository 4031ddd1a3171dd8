//! Monitoring Module
//!
//! Engine health checks. Counters live in `crate::stats`.

pub mod health;

pub use health::{HealthInputs, HealthReport, HealthStatus};

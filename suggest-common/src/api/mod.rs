//! Shared HTTP API bodies
//!
//! Pure serde types used by every service's handlers and by the upstream
//! health probes. No HTTP framework dependencies.

pub mod types;

pub use types::{BuildInfo, HealthCheckResult, HealthReport, MessageResponse};

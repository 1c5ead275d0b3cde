//! Shared API request/response types

use serde::{Deserialize, Serialize};

/// Error body returned for client and server errors
///
/// # Examples
///
/// ```
/// use suggest_common::api::MessageResponse;
///
/// let body = MessageResponse::new("Payload should be a non-empty JSON object");
/// let json = serde_json::to_string(&body).unwrap();
/// assert_eq!(json, r#"{"message":"Payload should be a non-empty JSON object"}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Outcome of one dependency health check
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckResult {
    /// Stable system id of the checked dependency
    pub id: String,
    /// Human readable check name
    pub name: String,
    pub ok: bool,
    /// 1 = critical, 2 = degraded functionality, 3 = minor
    pub severity: u8,
    pub business_impact: String,
    pub technical_summary: String,
    /// Success message or failure reason
    pub check_output: String,
}

/// Aggregate health report for a service
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HealthReport {
    pub name: String,
    pub description: String,
    /// True only when every check passed
    pub ok: bool,
    pub checks: Vec<HealthCheckResult>,
}

impl HealthReport {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        checks: Vec<HealthCheckResult>,
    ) -> Self {
        let ok = checks.iter().all(|c| c.ok);
        Self {
            name: name.into(),
            description: description.into(),
            ok,
            checks,
        }
    }
}

/// Build identification captured at compile time
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BuildInfo {
    pub version: String,
    pub git_hash: String,
    pub build_timestamp: String,
    pub build_profile: String,
}

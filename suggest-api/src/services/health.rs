//! Dependency health checks
//!
//! Every upstream (providers, concordance, broader concepts, denylist) exposes
//! a liveness probe. The service runs them concurrently for `GET /__health`.

use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use suggest_common::api::HealthCheckResult;

/// Static description of a health check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckDescriptor {
    /// Stable system id, e.g. `tme-suggestion-api`
    pub id: String,
    pub name: String,
    /// 1 = critical, 2 = degraded functionality, 3 = minor
    pub severity: u8,
    pub business_impact: String,
}

impl CheckDescriptor {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        severity: u8,
        business_impact: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            severity,
            business_impact: business_impact.into(),
        }
    }
}

#[async_trait]
pub trait HealthCheck: Send + Sync {
    fn descriptor(&self) -> &CheckDescriptor;

    /// Ok carries the success message, Err the failure reason
    async fn check(&self) -> Result<String, String>;
}

/// Run all checks concurrently, preserving registration order
pub async fn run_checks(checks: &[Arc<dyn HealthCheck>]) -> Vec<HealthCheckResult> {
    let futures = checks.iter().map(|check| async move {
        let descriptor = check.descriptor();
        let outcome = check.check().await;
        if let Err(reason) = &outcome {
            tracing::warn!(check = %descriptor.id, reason = %reason, "Health check failed");
        }
        let (ok, check_output) = match outcome {
            Ok(message) => (true, message),
            Err(reason) => (false, reason),
        };
        HealthCheckResult {
            id: descriptor.id.clone(),
            name: format!("{} Healthcheck", descriptor.name),
            ok,
            severity: descriptor.severity,
            business_impact: descriptor.business_impact.clone(),
            technical_summary: format!("{} is not available", descriptor.name),
            check_output,
        }
    });

    join_all(futures).await
}

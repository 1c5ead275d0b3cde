//! Shared outbound HTTP plumbing
//!
//! One `reqwest::Client` is built at startup and cloned into every upstream
//! client. All calls carry the transaction id and honor the request's
//! cancellation token.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::services::health::{CheckDescriptor, HealthCheck};

pub const USER_AGENT: &str = concat!("suggest-api/", env!("CARGO_PKG_VERSION"));

/// Build the shared HTTP client with the configured per-call timeout
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
}

/// Run `fut` unless `cancel` fires first
///
/// Returns `None` when cancelled. The losing future is dropped, which aborts
/// the in-flight request.
pub async fn with_cancel<F>(cancel: &CancellationToken, fut: F) -> Option<F::Output>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        output = fut => Some(output),
    }
}

/// Join a base URL and an endpoint path without doubling slashes
pub fn join_url(base_url: &str, endpoint: &str) -> String {
    match (base_url.ends_with('/'), endpoint.starts_with('/')) {
        (true, true) => format!("{}{}", base_url, &endpoint[1..]),
        (false, false) if !endpoint.is_empty() => format!("{}/{}", base_url, endpoint),
        _ => format!("{}{}", base_url, endpoint),
    }
}

/// Liveness probe against an upstream's `/__gtg` endpoint
#[derive(Debug, Clone)]
pub struct UpstreamProbe {
    descriptor: CheckDescriptor,
    base_url: String,
    client: reqwest::Client,
}

impl UpstreamProbe {
    pub fn new(descriptor: CheckDescriptor, base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            descriptor,
            base_url: base_url.into(),
            client,
        }
    }
}

#[async_trait]
impl HealthCheck for UpstreamProbe {
    fn descriptor(&self) -> &CheckDescriptor {
        &self.descriptor
    }

    async fn check(&self) -> Result<String, String> {
        let response = self
            .client
            .get(join_url(&self.base_url, "/__gtg"))
            .send()
            .await
            .map_err(|e| format!("{} is unreachable: {}", self.descriptor.name, e))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(format!(
                "Health check returned a non-200 HTTP status: {}",
                status.as_u16()
            ));
        }
        Ok(format!("{} is healthy", self.descriptor.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://a", "/b"), "http://a/b");
        assert_eq!(join_url("http://a/", "/b"), "http://a/b");
        assert_eq!(join_url("http://a/", "b"), "http://a/b");
        assert_eq!(join_url("http://a", "b"), "http://a/b");
        assert_eq!(join_url("http://a", ""), "http://a");
    }

    #[tokio::test]
    async fn test_with_cancel_returns_output_when_not_cancelled() {
        let token = CancellationToken::new();
        assert_eq!(with_cancel(&token, async { 7 }).await, Some(7));
    }

    #[tokio::test]
    async fn test_with_cancel_returns_none_when_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let slow = async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            7
        };
        assert_eq!(with_cancel(&token, slow).await, None);
    }

    #[test]
    fn test_client_creation() {
        assert!(build_client(Duration::from_secs(5)).is_ok());
    }
}

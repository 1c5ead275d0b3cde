//! Concordance resolution
//!
//! Maps the raw identifiers providers return onto canonical concept records.
//! One batched lookup per request; identifiers absent from the response are
//! simply not resolvable and their suggestions get dropped by the caller.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use suggest_common::transaction::TRANSACTION_ID_HEADER;
use thiserror::Error;

use crate::services::health::CheckDescriptor;
use crate::services::http::{join_url, with_cancel, UpstreamProbe};
use crate::types::{Concept, RequestContext};

const IDS_PARAM: &str = "ids";

/// Concordance lookup failures; any of these aborts the request
#[derive(Debug, Error)]
pub enum ConcordanceError {
    #[error("Network error calling concordances: {0}")]
    Network(String),

    #[error("Concordances returned HTTP {0}")]
    UnexpectedStatus(u16),

    #[error("Parse error reading concordances response: {0}")]
    Parse(String),

    #[error("Concordance lookup cancelled")]
    Cancelled,
}

/// `{"concepts": {id: Concept}}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConcordanceResponse {
    #[serde(default)]
    pub concepts: HashMap<String, Concept>,
}

#[async_trait]
pub trait ConcordanceResolver: Send + Sync {
    /// Resolve a batch of base identifiers
    ///
    /// The returned map contains only the identifiers that were found.
    async fn resolve(
        &self,
        ids: &[String],
        ctx: &RequestContext,
    ) -> Result<HashMap<String, Concept>, ConcordanceError>;
}

/// Order-preserving de-duplication
pub fn dedup(ids: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

/// HTTP client for the internal concordances service
pub struct ConcordanceService {
    base_url: String,
    endpoint: String,
    client: reqwest::Client,
}

impl ConcordanceService {
    pub fn new(base_url: impl Into<String>, endpoint: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            endpoint: endpoint.into(),
            client,
        }
    }

    pub fn health_check(&self) -> UpstreamProbe {
        UpstreamProbe::new(
            CheckDescriptor::new(
                "internal-concordances",
                "Internal Concordances",
                1,
                "Suggestions won't work",
            ),
            &self.base_url,
            self.client.clone(),
        )
    }

    async fn lookup(&self, ids: &[String], tid: &str) -> Result<HashMap<String, Concept>, ConcordanceError> {
        let mut query: Vec<(&str, &str)> = ids.iter().map(|id| (IDS_PARAM, id.as_str())).collect();
        query.push(("include_deprecated", "false"));

        let response = self
            .client
            .get(join_url(&self.base_url, &self.endpoint))
            .query(&query)
            .header(ACCEPT, "application/json")
            .header(TRANSACTION_ID_HEADER, tid)
            .send()
            .await
            .map_err(|e| ConcordanceError::Network(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ConcordanceError::UnexpectedStatus(status.as_u16()));
        }

        let body: ConcordanceResponse = response
            .json()
            .await
            .map_err(|e| ConcordanceError::Parse(e.to_string()))?;
        Ok(body.concepts)
    }
}

#[async_trait]
impl ConcordanceResolver for ConcordanceService {
    async fn resolve(
        &self,
        ids: &[String],
        ctx: &RequestContext,
    ) -> Result<HashMap<String, Concept>, ConcordanceError> {
        let ids = dedup(ids);
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        tracing::debug!(tid = %ctx.tid, count = ids.len(), "Calling internal concordances");

        with_cancel(&ctx.cancel, self.lookup(&ids, &ctx.tid))
            .await
            .unwrap_or(Err(ConcordanceError::Cancelled))
    }
}

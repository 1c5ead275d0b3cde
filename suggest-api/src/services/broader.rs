//! Broader-concept exclusion
//!
//! When two suggested concepts are related (one is broader than the other),
//! tagging both is redundant. The excluder looks up the relationships of every
//! concept in the cross-provider result and drops one side of each related
//! pair. Which side is dropped depends on the relationship type, through an
//! [`ExclusionPolicy`]; by default the broader concept goes, since it is
//! implied by the narrower one.
//!
//! Upstream contract: `GET` with repeated `uuid` parameters and
//! `showRelationship=broader`, expecting
//! `{"things": {uuid: {"id": ..., "broaderConcepts": [{"id": ..., "predicate": ...}]}}}`.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use suggest_common::transaction::TRANSACTION_ID_HEADER;
use thiserror::Error;

use crate::services::health::CheckDescriptor;
use crate::services::http::{join_url, with_cancel, UpstreamProbe};
use crate::types::{base_id, ProviderSlots, RequestContext};

pub const SKOS_BROADER: &str = "http://www.w3.org/2004/02/skos/core#broader";

#[derive(Debug, Error)]
pub enum BroaderError {
    #[error("Network error calling broader concepts source: {0}")]
    Network(String),

    #[error("Broader concepts source returned HTTP {0}")]
    UnexpectedStatus(u16),

    #[error("Parse error reading broader concepts response: {0}")]
    Parse(String),

    #[error("Broader concepts lookup cancelled")]
    Cancelled,
}

/// Which side of a related pair to drop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionDirection {
    #[default]
    DropBroader,
    DropNarrower,
    KeepBoth,
}

/// Exclusion direction per relationship type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionPolicy {
    default: ExclusionDirection,
    by_relationship: HashMap<String, ExclusionDirection>,
}

impl Default for ExclusionPolicy {
    fn default() -> Self {
        Self::new(ExclusionDirection::default())
    }
}

impl ExclusionPolicy {
    pub fn new(default: ExclusionDirection) -> Self {
        Self {
            default,
            by_relationship: HashMap::new(),
        }
    }

    /// Override the direction for one relationship predicate
    pub fn with_relationship(mut self, predicate: impl Into<String>, direction: ExclusionDirection) -> Self {
        self.by_relationship.insert(predicate.into(), direction);
        self
    }

    pub fn direction(&self, predicate: &str) -> ExclusionDirection {
        self.by_relationship
            .get(predicate)
            .copied()
            .unwrap_or(self.default)
    }
}

/// A broader concept of some concept, and how they relate
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Relation {
    pub id: String,
    #[serde(default = "default_predicate")]
    pub predicate: String,
}

fn default_predicate() -> String {
    SKOS_BROADER.to_string()
}

#[async_trait]
pub trait RelationshipLookup: Send + Sync {
    /// Broader relations for each of `ids` (base identifiers), keyed by identifier
    async fn broader_concepts(
        &self,
        ids: &[String],
        ctx: &RequestContext,
    ) -> Result<HashMap<String, Vec<Relation>>, BroaderError>;
}

#[derive(Debug, Deserialize)]
struct ThingsResponse {
    #[serde(default)]
    things: HashMap<String, Thing>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Thing {
    #[serde(default)]
    broader_concepts: Vec<Relation>,
}

/// HTTP client for the concept relationships (things) service
pub struct ThingsRelationshipLookup {
    base_url: String,
    endpoint: String,
    client: reqwest::Client,
}

impl ThingsRelationshipLookup {
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
                "public-things-api",
                "Public Things API",
                3,
                "Suggestions may include broader concepts alongside narrower ones",
            ),
            &self.base_url,
            self.client.clone(),
        )
    }

    async fn lookup(&self, ids: &[String], tid: &str) -> Result<HashMap<String, Vec<Relation>>, BroaderError> {
        let mut query: Vec<(&str, &str)> = ids.iter().map(|id| ("uuid", id.as_str())).collect();
        query.push(("showRelationship", "broader"));

        let response = self
            .client
            .get(join_url(&self.base_url, &self.endpoint))
            .query(&query)
            .header(ACCEPT, "application/json")
            .header(TRANSACTION_ID_HEADER, tid)
            .send()
            .await
            .map_err(|e| BroaderError::Network(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(BroaderError::UnexpectedStatus(status.as_u16()));
        }

        let body: ThingsResponse = response
            .json()
            .await
            .map_err(|e| BroaderError::Parse(e.to_string()))?;

        Ok(body
            .things
            .into_iter()
            .map(|(id, thing)| (id, thing.broader_concepts))
            .collect())
    }
}

#[async_trait]
impl RelationshipLookup for ThingsRelationshipLookup {
    async fn broader_concepts(
        &self,
        ids: &[String],
        ctx: &RequestContext,
    ) -> Result<HashMap<String, Vec<Relation>>, BroaderError> {
        with_cancel(&ctx.cancel, self.lookup(ids, &ctx.tid))
            .await
            .unwrap_or(Err(BroaderError::Cancelled))
    }
}

/// Removes suggestions made redundant by a related concept elsewhere in the result
pub struct BroaderConceptExcluder {
    lookup: Arc<dyn RelationshipLookup>,
    policy: ExclusionPolicy,
}

impl BroaderConceptExcluder {
    pub fn new(lookup: Arc<dyn RelationshipLookup>, policy: ExclusionPolicy) -> Self {
        Self { lookup, policy }
    }

    /// Filter the full cross-provider mapping
    ///
    /// On error the caller keeps its input; nothing here mutates it.
    pub async fn exclude(
        &self,
        per_provider: &ProviderSlots,
        ctx: &RequestContext,
    ) -> Result<ProviderSlots, BroaderError> {
        let present: BTreeSet<String> = per_provider
            .values()
            .flatten()
            .map(|s| s.concept.base_id().to_string())
            .collect();
        if present.len() < 2 {
            return Ok(per_provider.clone());
        }

        let ids: Vec<String> = present.iter().cloned().collect();
        let relations = self.lookup.broader_concepts(&ids, ctx).await?;
        let excluded = self.excluded_ids(&present, &relations);

        if !excluded.is_empty() {
            tracing::debug!(
                tid = %ctx.tid,
                excluded = ?excluded,
                "Excluding concepts implied by related suggestions"
            );
        }

        Ok(per_provider
            .iter()
            .map(|(index, suggestions)| {
                let kept = suggestions
                    .iter()
                    .filter(|s| !excluded.contains(s.concept.base_id()))
                    .cloned()
                    .collect();
                (*index, kept)
            })
            .collect())
    }

    fn excluded_ids(
        &self,
        present: &BTreeSet<String>,
        relations: &HashMap<String, Vec<Relation>>,
    ) -> HashSet<String> {
        let mut excluded = HashSet::new();
        for (narrower, broader) in relations {
            let narrower = base_id(narrower);
            if !present.contains(narrower) {
                continue;
            }
            for relation in broader {
                let broader_id = base_id(&relation.id);
                if broader_id == narrower || !present.contains(broader_id) {
                    continue;
                }
                match self.policy.direction(&relation.predicate) {
                    ExclusionDirection::DropBroader => {
                        excluded.insert(broader_id.to_string());
                    }
                    ExclusionDirection::DropNarrower => {
                        excluded.insert(narrower.to_string());
                    }
                    ExclusionDirection::KeepBoth => {}
                }
            }
        }
        excluded
    }
}

//! Suggestion providers
//!
//! Each provider is a polymorphic unit carrying its own activation predicate
//! (which source flag enables it) and its own post-resolution filter. The
//! aggregator never branches on provider names.
//!
//! Upstream contract: `POST` the normalized content, expect
//! - 200 with `{"suggestions": [...]}`
//! - 204 when there is nothing to suggest (not an error for aggregation)
//! - 400 when the provider rejects the content (not fatal either)
//! - anything else is a generic failure

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use std::collections::BTreeSet;
use suggest_common::transaction::TRANSACTION_ID_HEADER;
use thiserror::Error;

use crate::services::health::CheckDescriptor;
use crate::services::http::{join_url, with_cancel, UpstreamProbe};
use crate::types::{RequestContext, Source, SourceFlags, Suggestion, SuggestionsResponse};

/// Header forwarding the caller's debug token
pub const DEBUG_HEADER: &str = "debug";

/// Provider call failures
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{0} returned HTTP 204")]
    NoContent(String),

    #[error("{0} returned HTTP 400")]
    BadRequest(String),

    #[error("{0} returned HTTP {1}")]
    UnexpectedStatus(String, u16),

    #[error("Network error calling {0}: {1}")]
    Network(String, String),

    #[error("Parse error reading {0} response: {1}")]
    Parse(String, String),

    #[error("Call to {0} cancelled")]
    Cancelled(String),
}

impl ProviderError {
    /// Empty or rejected content: expected, logged at warn rather than error
    pub fn is_expected(&self) -> bool {
        matches!(self, ProviderError::NoContent(_) | ProviderError::BadRequest(_))
    }
}

/// What a provider's filter may look at besides its own suggestions
#[derive(Debug, Clone)]
pub struct FilterContext<'a> {
    pub flags: &'a SourceFlags,
    /// Sources whose resolved contribution is non-empty
    pub contributing: &'a BTreeSet<Source>,
}

#[async_trait]
pub trait SuggestionProvider: Send + Sync {
    /// Display name used in logs and errors
    fn name(&self) -> &str;

    fn source(&self) -> Source;

    /// Activation predicate over the request's source flags
    fn is_enabled(&self, flags: &SourceFlags) -> bool {
        flags.has(self.source())
    }

    /// Fetch raw suggestions for the normalized payload
    async fn get_suggestions(
        &self,
        payload: &[u8],
        ctx: &RequestContext,
    ) -> Result<Vec<Suggestion>, ProviderError>;

    /// Provider-specific filter applied after concordance resolution
    fn filter_suggestions(&self, suggestions: Vec<Suggestion>, _ctx: &FilterContext<'_>) -> Vec<Suggestion> {
        suggestions
    }
}

/// Endpoint settings for one HTTP provider
#[derive(Debug, Clone)]
pub struct SuggestionApi {
    name: String,
    source: Source,
    base_url: String,
    endpoint: String,
    system_id: String,
    failure_impact: String,
    client: reqwest::Client,
}

impl SuggestionApi {
    pub fn new(
        name: impl Into<String>,
        source: Source,
        base_url: impl Into<String>,
        endpoint: impl Into<String>,
        system_id: impl Into<String>,
        failure_impact: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            base_url: base_url.into(),
            endpoint: endpoint.into(),
            system_id: system_id.into(),
            failure_impact: failure_impact.into(),
            client,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Liveness probe for the health endpoint
    pub fn health_check(&self) -> UpstreamProbe {
        UpstreamProbe::new(
            CheckDescriptor::new(&self.system_id, &self.name, 2, &self.failure_impact),
            &self.base_url,
            self.client.clone(),
        )
    }

    /// POST the payload and decode the suggestions, tagging each with this source
    pub async fn fetch(&self, payload: &[u8], ctx: &RequestContext) -> Result<Vec<Suggestion>, ProviderError> {
        with_cancel(&ctx.cancel, self.send(payload, ctx))
            .await
            .unwrap_or_else(|| Err(ProviderError::Cancelled(self.name.clone())))
    }

    async fn send(&self, payload: &[u8], ctx: &RequestContext) -> Result<Vec<Suggestion>, ProviderError> {
        let url = join_url(&self.base_url, &self.endpoint);
        let mut request = self
            .client
            .post(&url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .header(TRANSACTION_ID_HEADER, &ctx.tid)
            .body(payload.to_vec());
        if let Some(debug) = &ctx.flags.debug {
            request = request.header(DEBUG_HEADER, debug);
        }

        tracing::debug!(tid = %ctx.tid, provider = %self.name, url = %url, "Calling suggestion provider");

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Network(self.name.clone(), e.to_string()))?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NO_CONTENT => return Err(ProviderError::NoContent(self.name.clone())),
            StatusCode::BAD_REQUEST => return Err(ProviderError::BadRequest(self.name.clone())),
            status => return Err(ProviderError::UnexpectedStatus(self.name.clone(), status.as_u16())),
        }

        let body: SuggestionsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(self.name.clone(), e.to_string()))?;

        Ok(body
            .suggestions
            .into_iter()
            .map(|mut suggestion| {
                suggestion.source = Some(self.source);
                suggestion
            })
            .collect())
    }
}

/// Text-mining engine provider, enabled by the `tme` source
pub struct TmeProvider {
    api: SuggestionApi,
}

impl TmeProvider {
    pub fn new(base_url: impl Into<String>, endpoint: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            api: SuggestionApi::new(
                "TME Suggestion API",
                Source::Tme,
                base_url,
                endpoint,
                "tme-suggestion-api",
                "Suggestions from TME won't work",
                client,
            ),
        }
    }

    pub fn health_check(&self) -> UpstreamProbe {
        self.api.health_check()
    }
}

#[async_trait]
impl SuggestionProvider for TmeProvider {
    fn name(&self) -> &str {
        self.api.name()
    }

    fn source(&self) -> Source {
        Source::Tme
    }

    async fn get_suggestions(&self, payload: &[u8], ctx: &RequestContext) -> Result<Vec<Suggestion>, ProviderError> {
        self.api.fetch(payload, ctx).await
    }

    /// Authors come from the authors provider when it is enabled and found any
    fn filter_suggestions(&self, suggestions: Vec<Suggestion>, ctx: &FilterContext<'_>) -> Vec<Suggestion> {
        if !(ctx.flags.has(Source::Authors) && ctx.contributing.contains(&Source::Authors)) {
            return suggestions;
        }
        suggestions.into_iter().filter(|s| !s.is_author()).collect()
    }
}

/// Authors provider, enabled by the `authors` source
pub struct AuthorsProvider {
    api: SuggestionApi,
}

impl AuthorsProvider {
    pub fn new(base_url: impl Into<String>, endpoint: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            api: SuggestionApi::new(
                "Authors Suggestion API",
                Source::Authors,
                base_url,
                endpoint,
                "authors-suggestion-api",
                "Suggesting authors from Concept Search won't work",
                client,
            ),
        }
    }

    pub fn health_check(&self) -> UpstreamProbe {
        self.api.health_check()
    }
}

#[async_trait]
impl SuggestionProvider for AuthorsProvider {
    fn name(&self) -> &str {
        self.api.name()
    }

    fn source(&self) -> Source {
        Source::Authors
    }

    async fn get_suggestions(&self, payload: &[u8], ctx: &RequestContext) -> Result<Vec<Suggestion>, ProviderError> {
        self.api.fetch(payload, ctx).await
    }
}

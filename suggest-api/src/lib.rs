//! suggest-api library interface
//!
//! Exposes the aggregation pipeline, upstream clients and router for the
//! binary and for integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod types;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::ServiceConfig;
use crate::services::http::build_client;
use crate::services::{
    Aggregator, AuthorsProvider, BroaderConceptExcluder, ConcordanceService, DenylistCache,
    HealthCheck, HttpDenylistSource, SuggestionProvider, ThingsRelationshipLookup, TmeProvider,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
    /// Same cache the aggregator reads; also driven by the refresh endpoint
    pub denylist: Arc<DenylistCache>,
    /// Upstream probes in report order
    pub health_checks: Arc<Vec<Arc<dyn HealthCheck>>>,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        aggregator: Arc<Aggregator>,
        denylist: Arc<DenylistCache>,
        health_checks: Vec<Arc<dyn HealthCheck>>,
    ) -> Self {
        Self {
            aggregator,
            denylist,
            health_checks: Arc::new(health_checks),
            startup_time: Utc::now(),
        }
    }

    /// Wire every upstream client from resolved configuration
    pub fn from_config(config: &ServiceConfig) -> Result<Self, reqwest::Error> {
        let client = build_client(config.http_timeout())?;

        let tme = TmeProvider::new(&config.tme.base_url, &config.tme.endpoint, client.clone());
        let authors = AuthorsProvider::new(&config.authors.base_url, &config.authors.endpoint, client.clone());
        let concordance = ConcordanceService::new(
            &config.concordance.base_url,
            &config.concordance.endpoint,
            client.clone(),
        );
        let lookup = ThingsRelationshipLookup::new(&config.broader.base_url, &config.broader.endpoint, client.clone());
        let denylist_source = HttpDenylistSource::new(&config.denylist.base_url, &config.denylist.endpoint, client);

        let health_checks: Vec<Arc<dyn HealthCheck>> = vec![
            Arc::new(tme.health_check()),
            Arc::new(authors.health_check()),
            Arc::new(concordance.health_check()),
            Arc::new(lookup.health_check()),
            Arc::new(denylist_source.health_check()),
        ];

        // Index order here is response order
        let providers: Vec<Arc<dyn SuggestionProvider>> = vec![Arc::new(tme), Arc::new(authors)];

        let denylist = Arc::new(DenylistCache::new(Arc::new(denylist_source), config.denylist_max_age()));
        let broader = BroaderConceptExcluder::new(Arc::new(lookup), config.broader_policy.to_policy());
        let aggregator = Aggregator::new(providers, Arc::new(concordance), Arc::new(broader), Arc::clone(&denylist));

        Ok(Self::new(Arc::new(aggregator), denylist, health_checks))
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::suggest_routes())
        .merge(api::health_routes())
        .merge(api::denylist_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

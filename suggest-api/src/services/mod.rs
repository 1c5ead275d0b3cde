//! Aggregation pipeline and upstream clients

pub mod aggregator;
pub mod broader;
pub mod concordance;
pub mod denylist;
pub mod health;
pub mod http;
pub mod preprocess;
pub mod provider;

pub use aggregator::{AggregateError, Aggregator};
pub use broader::{BroaderConceptExcluder, ExclusionDirection, ExclusionPolicy, ThingsRelationshipLookup};
pub use concordance::{ConcordanceResolver, ConcordanceService};
pub use denylist::{DenylistCache, DenylistSource, HttpDenylistSource};
pub use health::{run_checks, CheckDescriptor, HealthCheck};
pub use provider::{AuthorsProvider, SuggestionProvider, TmeProvider};

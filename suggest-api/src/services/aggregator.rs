//! Suggestions aggregation pipeline
//!
//! Fans the normalized content out to every enabled provider, resolves the
//! union of returned identifiers through the concordance service in one batch,
//! applies provider filters and broader-concept exclusion, then suppresses
//! denylisted concepts.
//!
//! Provider results land in index-keyed slots, so the response is grouped by
//! configured provider order no matter which provider answered first.

use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;

use crate::services::broader::BroaderConceptExcluder;
use crate::services::concordance::{dedup, ConcordanceError, ConcordanceResolver};
use crate::services::denylist::{Denylist, DenylistCache};
use crate::services::preprocess::prepare_payload;
use crate::services::provider::{FilterContext, SuggestionProvider};
use crate::types::{ProviderSlots, RequestContext, Source, Suggestion, SuggestionsResponse};

/// Failures that abort a whole aggregation
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("Concordance resolution failed: {0}")]
    Concordance(#[from] ConcordanceError),
}

/// Pipeline over a fixed, ordered list of providers
pub struct Aggregator {
    providers: Vec<Arc<dyn SuggestionProvider>>,
    concordance: Arc<dyn ConcordanceResolver>,
    broader: Arc<BroaderConceptExcluder>,
    denylist: Arc<DenylistCache>,
}

impl Aggregator {
    pub fn new(
        providers: Vec<Arc<dyn SuggestionProvider>>,
        concordance: Arc<dyn ConcordanceResolver>,
        broader: Arc<BroaderConceptExcluder>,
        denylist: Arc<DenylistCache>,
    ) -> Self {
        Self {
            providers,
            concordance,
            broader,
            denylist,
        }
    }

    /// Run the full pipeline for one piece of content
    ///
    /// Only a concordance failure is returned as an error; every other stage
    /// degrades to fewer (or unfiltered) suggestions.
    pub async fn get_suggestions(
        &self,
        raw: &[u8],
        ctx: &RequestContext,
    ) -> Result<SuggestionsResponse, AggregateError> {
        let payload: Arc<[u8]> = match prepare_payload(raw) {
            Ok(prepared) => Arc::from(prepared),
            Err(e) => {
                tracing::warn!(tid = %ctx.tid, error = %e, "Content preprocessing failed, sending raw payload");
                Arc::from(raw)
            }
        };

        if let Some(token) = &ctx.flags.debug {
            tracing::info!(
                tid = %ctx.tid,
                debug = %token,
                payload = %String::from_utf8_lossy(&payload),
                "Prepared payload"
            );
        }

        // Joined only at suppression time
        let denylist_task = {
            let cache = Arc::clone(&self.denylist);
            let cancel = ctx.cancel.clone();
            let tid = ctx.tid.clone();
            tokio::spawn(async move { cache.refresh_or_fetch(&cancel, &tid).await })
        };

        let raw_slots = self.fan_out(payload, ctx).await;

        let ids: Vec<String> = raw_slots
            .values()
            .flatten()
            .map(|s| s.concept.base_id())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();
        let ids = dedup(&ids);

        let resolved = if ids.is_empty() {
            Default::default()
        } else {
            self.concordance.resolve(&ids, ctx).await.map_err(|e| {
                tracing::error!(tid = %ctx.tid, error = %e, "Concordance resolution failed");
                e
            })?
        };

        let canonical: ProviderSlots = raw_slots
            .iter()
            .map(|(index, suggestions)| {
                let kept = suggestions
                    .iter()
                    .filter_map(|s| {
                        resolved
                            .get(s.concept.base_id())
                            .map(|concept| s.with_concept(concept.clone()))
                    })
                    .collect();
                (*index, kept)
            })
            .collect();

        let filtered = self.apply_filters(canonical, ctx);

        let narrowed = match self.broader.exclude(&filtered, ctx).await {
            Ok(narrowed) => narrowed,
            Err(e) => {
                tracing::warn!(tid = %ctx.tid, error = %e, "Broader concept exclusion failed, keeping all suggestions");
                filtered
            }
        };

        let denylist = match denylist_task.await {
            Ok(Ok(denylist)) => denylist,
            Ok(Err(e)) => {
                tracing::error!(tid = %ctx.tid, error = %e, "Denylist refresh failed, not suppressing");
                Denylist::empty()
            }
            Err(e) => {
                tracing::error!(tid = %ctx.tid, error = %e, "Denylist task did not complete, not suppressing");
                Denylist::empty()
            }
        };

        Ok(SuggestionsResponse {
            suggestions: suppress(narrowed, &denylist, &ctx.tid),
        })
    }

    /// One task per enabled provider; failures contribute an empty list
    async fn fan_out(&self, payload: Arc<[u8]>, ctx: &RequestContext) -> ProviderSlots {
        let mut tasks = JoinSet::new();
        for (index, provider) in self.providers.iter().enumerate() {
            if !provider.is_enabled(&ctx.flags) {
                continue;
            }
            let provider = Arc::clone(provider);
            let payload = Arc::clone(&payload);
            let ctx = ctx.clone();
            tasks.spawn(async move { (index, provider.get_suggestions(&payload, &ctx).await) });
        }

        let mut slots = ProviderSlots::new();
        while let Some(joined) = tasks.join_next().await {
            let (index, outcome) = match joined {
                Ok(done) => done,
                Err(e) => {
                    tracing::error!(tid = %ctx.tid, error = %e, "Provider task did not complete");
                    continue;
                }
            };
            let suggestions = match outcome {
                Ok(suggestions) => suggestions,
                Err(e) if e.is_expected() => {
                    tracing::warn!(tid = %ctx.tid, provider = %self.providers[index].name(), error = %e, "No suggestions from provider");
                    Vec::new()
                }
                Err(e) => {
                    tracing::error!(tid = %ctx.tid, provider = %self.providers[index].name(), error = %e, "Provider call failed");
                    Vec::new()
                }
            };
            slots.insert(index, suggestions);
        }
        slots
    }

    fn apply_filters(&self, slots: ProviderSlots, ctx: &RequestContext) -> ProviderSlots {
        let contributing: BTreeSet<Source> = slots
            .iter()
            .filter(|(_, suggestions)| !suggestions.is_empty())
            .map(|(index, _)| self.providers[*index].source())
            .collect();
        let filter_ctx = FilterContext {
            flags: &ctx.flags,
            contributing: &contributing,
        };

        slots
            .into_iter()
            .map(|(index, suggestions)| {
                let kept = self.providers[index].filter_suggestions(suggestions, &filter_ctx);
                (index, kept)
            })
            .collect()
    }
}

/// Flatten in provider order, dropping denylisted concepts
fn suppress(slots: ProviderSlots, denylist: &Denylist, tid: &str) -> Vec<Suggestion> {
    let mut suggestions = Vec::new();
    for suggestion in slots.into_values().flatten() {
        if denylist.is_denied(&suggestion.concept.id) {
            tracing::info!(tid = %tid, concept = %suggestion.concept.id, "Suppressing denylisted concept");
            continue;
        }
        suggestions.push(suggestion);
    }
    suggestions
}

//! Denylist cache
//!
//! Process-wide set of vetoed concept identifiers. Reads are synchronous and
//! take a shared lock; a refresh fetches the new list without holding any lock
//! and then swaps it in under the write lock, so readers see either the old or
//! the new list, never a mix.
//!
//! Refresh is single-flight: a trigger arriving while another refresh is in
//! progress waits for that refresh and shares its outcome instead of issuing a
//! second upstream call.
//!
//! Matching is containment: a vetoed id matches any suggestion id that
//! contains it, which tolerates identifier-scheme prefixes.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use suggest_common::transaction::TRANSACTION_ID_HEADER;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::services::health::CheckDescriptor;
use crate::services::http::{join_url, with_cancel, UpstreamProbe};

#[derive(Debug, Clone, Error)]
pub enum DenylistError {
    #[error("Network error calling denylist source: {0}")]
    Network(String),

    #[error("Denylist source returned HTTP {0}")]
    UnexpectedStatus(u16),

    #[error("Parse error reading denylist response: {0}")]
    Parse(String),

    #[error("Denylist refresh cancelled")]
    Cancelled,

    /// A concurrent refresh this call waited on failed
    #[error("Concurrent denylist refresh failed: {0}")]
    ConcurrentRefreshFailed(String),
}

/// Immutable snapshot of vetoed identifiers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Denylist {
    ids: Arc<Vec<String>>,
}

impl Denylist {
    pub fn new(ids: Vec<String>) -> Self {
        let ids = ids
            .into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        Self { ids: Arc::new(ids) }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// True if any vetoed id is contained in `concept_id`
    pub fn is_denied(&self, concept_id: &str) -> bool {
        self.ids.iter().any(|denied| concept_id.contains(denied.as_str()))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[async_trait]
pub trait DenylistSource: Send + Sync {
    async fn fetch(&self, tid: &str) -> Result<Vec<String>, DenylistError>;
}

#[derive(Debug, Deserialize)]
struct DenylistResponse {
    #[serde(default)]
    uuids: Vec<String>,
}

/// HTTP client for the denylist service
pub struct HttpDenylistSource {
    base_url: String,
    endpoint: String,
    client: reqwest::Client,
}

impl HttpDenylistSource {
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
                "concept-suggestions-denylister",
                "Concept Suggestions Denylister",
                2,
                "Suggestions vetoing will not work",
            ),
            &self.base_url,
            self.client.clone(),
        )
    }
}

#[async_trait]
impl DenylistSource for HttpDenylistSource {
    async fn fetch(&self, tid: &str) -> Result<Vec<String>, DenylistError> {
        let response = self
            .client
            .get(join_url(&self.base_url, &self.endpoint))
            .query(&[("refresh", "true")])
            .header(ACCEPT, "application/json")
            .header(TRANSACTION_ID_HEADER, tid)
            .send()
            .await
            .map_err(|e| DenylistError::Network(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(DenylistError::UnexpectedStatus(status.as_u16()));
        }

        let body: DenylistResponse = response
            .json()
            .await
            .map_err(|e| DenylistError::Parse(e.to_string()))?;
        Ok(body.uuids)
    }
}

struct CacheState {
    denylist: Denylist,
    refreshed_at: Option<Instant>,
}

/// Lock-guarded, single-flight denylist cache
pub struct DenylistCache {
    source: Arc<dyn DenylistSource>,
    state: RwLock<CacheState>,
    /// Serializes refreshes
    refresh_gate: tokio::sync::Mutex<()>,
    /// Bumped after every refresh that reached the source and got an answer
    attempts: AtomicU64,
    last_error: Mutex<Option<String>>,
    max_age: Duration,
}

impl DenylistCache {
    /// Empty cache; `max_age` bounds how long a snapshot is served without refreshing
    pub fn new(source: Arc<dyn DenylistSource>, max_age: Duration) -> Self {
        Self {
            source,
            state: RwLock::new(CacheState {
                denylist: Denylist::empty(),
                refreshed_at: None,
            }),
            refresh_gate: tokio::sync::Mutex::new(()),
            attempts: AtomicU64::new(0),
            last_error: Mutex::new(None),
            max_age,
        }
    }

    /// Containment check against the current contents
    pub fn is_denied(&self, concept_id: &str) -> bool {
        self.state.read().denylist.is_denied(concept_id)
    }

    pub fn snapshot(&self) -> Denylist {
        self.state.read().denylist.clone()
    }

    /// Error of the most recent refresh attempt, if it failed
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    fn is_fresh(&self) -> bool {
        match self.state.read().refreshed_at {
            Some(at) => at.elapsed() < self.max_age,
            None => false,
        }
    }

    /// Serve the cached snapshot while it is younger than `max_age`, otherwise refresh
    pub async fn refresh_or_fetch(&self, cancel: &CancellationToken, tid: &str) -> Result<Denylist, DenylistError> {
        if self.is_fresh() {
            return Ok(self.snapshot());
        }
        self.refresh(cancel, tid).await
    }

    /// Fetch the denylist and atomically replace the cached contents
    ///
    /// On failure the previous contents stay in place. A cancelled call is not
    /// an outcome: callers queued behind it fetch for themselves.
    pub async fn refresh(&self, cancel: &CancellationToken, tid: &str) -> Result<Denylist, DenylistError> {
        let observed = self.attempts.load(Ordering::SeqCst);

        let _gate = match with_cancel(cancel, self.refresh_gate.lock()).await {
            Some(guard) => guard,
            None => return Err(DenylistError::Cancelled),
        };

        // Another refresh finished while this call waited: share its outcome
        if self.attempts.load(Ordering::SeqCst) != observed {
            return match self.last_error() {
                None => Ok(self.snapshot()),
                Some(message) => Err(DenylistError::ConcurrentRefreshFailed(message)),
            };
        }

        let outcome = match with_cancel(cancel, self.source.fetch(tid)).await {
            Some(outcome) => outcome,
            None => return Err(DenylistError::Cancelled),
        };

        let result = match outcome {
            Ok(ids) => {
                let denylist = Denylist::new(ids);
                {
                    let mut state = self.state.write();
                    state.denylist = denylist.clone();
                    state.refreshed_at = Some(Instant::now());
                }
                *self.last_error.lock() = None;
                tracing::info!(tid = %tid, entries = denylist.len(), "Denylist refreshed");
                Ok(denylist)
            }
            Err(e) => {
                *self.last_error.lock() = Some(e.to_string());
                Err(e)
            }
        };
        self.attempts.fetch_add(1, Ordering::SeqCst);
        result
    }
}

//! Core types shared across the aggregation pipeline
//!
//! Wire shapes follow the upstream contracts:
//! - providers return `{"suggestions": [Suggestion...]}`
//! - the concordance service returns `{"concepts": {id: Concept}}`
//! - callers receive `{"suggestions": [Suggestion...]}`, always present

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use tokio_util::sync::CancellationToken;

/// Ontology type of a person concept
pub const PERSON_TYPE: &str = "http://www.ft.com/ontology/person/Person";

/// Predicate linking content to its author
pub const HAS_AUTHOR_PREDICATE: &str = "http://www.ft.com/ontology/annotation/hasAuthor";

// ============================================================================
// Concepts and suggestions
// ============================================================================

/// Canonical concept record
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Concept {
    /// Canonical, URI-shaped identifier
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_url: String,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub concept_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pref_label: String,
    #[serde(rename = "isFTAuthor", default, skip_serializing_if = "is_false")]
    pub is_ft_author: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Concept {
    /// Last path segment of the identifier
    ///
    /// Providers and the concordance service agree on this segment even when
    /// they disagree on the URI prefix.
    pub fn base_id(&self) -> &str {
        base_id(&self.id)
    }
}

/// Last non-empty path segment of a URI-shaped identifier
pub fn base_id(id: &str) -> &str {
    id.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(id)
}

/// A single predicate/concept suggestion
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Suggestion {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub predicate: String,
    #[serde(flatten)]
    pub concept: Concept,
    /// Provider that produced this suggestion; never serialized
    #[serde(skip)]
    pub source: Option<Source>,
}

impl Suggestion {
    pub fn new(predicate: impl Into<String>, concept: Concept, source: Source) -> Self {
        Self {
            predicate: predicate.into(),
            concept,
            source: Some(source),
        }
    }

    /// Same predicate and provenance, canonical concept
    pub fn with_concept(&self, concept: Concept) -> Self {
        Self {
            predicate: self.predicate.clone(),
            concept,
            source: self.source,
        }
    }

    pub fn is_author(&self) -> bool {
        self.predicate == HAS_AUTHOR_PREDICATE && self.concept.concept_type == PERSON_TYPE
    }
}

/// Suggestions body returned to callers and by providers
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct SuggestionsResponse {
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
}

impl SuggestionsResponse {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Per-provider suggestion lists keyed by configured provider index
///
/// Iteration order is provider order, whatever order the lists were filled in.
pub type ProviderSlots = BTreeMap<usize, Vec<Suggestion>>;

// ============================================================================
// Sources and request context
// ============================================================================

/// Suggestion source a caller can enable
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Source {
    /// Text-mining engine, the primary source
    Tme,
    /// Authors lookup
    Authors,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Tme => "tme",
            Source::Authors => "authors",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = UnknownSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tme" => Ok(Source::Tme),
            "authors" => Ok(Source::Authors),
            other => Err(UnknownSource(other.to_string())),
        }
    }
}

/// Source name not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown suggestion source '{0}'")]
pub struct UnknownSource(pub String);

/// Request-scoped set of enabled sources plus the optional debug token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFlags {
    sources: BTreeSet<Source>,
    pub debug: Option<String>,
}

impl Default for SourceFlags {
    /// Primary source only
    fn default() -> Self {
        Self {
            sources: BTreeSet::from([Source::Tme]),
            debug: None,
        }
    }
}

impl SourceFlags {
    pub fn new(sources: impl IntoIterator<Item = Source>, debug: Option<String>) -> Self {
        Self {
            sources: sources.into_iter().collect(),
            debug,
        }
    }

    /// Parse `sources` query values
    ///
    /// Each value may itself be a comma separated list. No values at all means
    /// the default (primary source only).
    pub fn parse<I, S>(values: I, debug: Option<String>) -> Result<Self, UnknownSource>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut sources = BTreeSet::new();
        for value in values {
            for name in value.as_ref().split(',').map(str::trim) {
                if name.is_empty() {
                    continue;
                }
                sources.insert(name.parse::<Source>()?);
            }
        }

        if sources.is_empty() {
            return Ok(Self {
                debug,
                ..Self::default()
            });
        }
        Ok(Self { sources, debug })
    }

    pub fn has(&self, source: Source) -> bool {
        self.sources.contains(&source)
    }
}

/// Everything a pipeline stage needs to know about the current request
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Transaction id, forwarded upstream as `X-Request-Id`
    pub tid: String,
    pub flags: SourceFlags,
    /// Cancelled when the caller goes away; every outbound call honors it
    pub cancel: CancellationToken,
}

impl RequestContext {
    pub fn new(tid: impl Into<String>, flags: SourceFlags) -> Self {
        Self {
            tid: tid.into(),
            flags,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

use crate::domain::error::QueryError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// One primitive component of a query key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyPart {
    Bool(bool),
    Int(i64),
    Str(String),
    Null,
}

impl From<&str> for KeyPart {
    fn from(value: &str) -> Self {
        KeyPart::Str(value.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(value: String) -> Self {
        KeyPart::Str(value)
    }
}

impl From<i64> for KeyPart {
    fn from(value: i64) -> Self {
        KeyPart::Int(value)
    }
}

impl From<bool> for KeyPart {
    fn from(value: bool) -> Self {
        KeyPart::Bool(value)
    }
}

/// Identity of a cacheable request: an ordered list of primitives.
///
/// Two keys are the same query iff their parts are deep-equal, which is
/// exactly when their [`QueryKey::hash`] strings match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryKey(Vec<KeyPart>);

impl QueryKey {
    pub fn new<I, P>(parts: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<KeyPart>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// Append one more part, e.g. `["pokemon"]` -> `["pokemon", 1]`.
    pub fn with(mut self, part: impl Into<KeyPart>) -> Self {
        self.0.push(part.into());
        self
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    /// Canonical JSON encoding, used as the map key.
    pub fn hash(&self) -> String {
        // A Vec of untagged primitives always serializes.
        serde_json::to_string(&self.0).unwrap_or_default()
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hash())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    Pending,
    Success,
    Error,
}

/// Durable part of an entry: everything except the in-flight flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryState {
    pub status: QueryStatus,
    pub data: Option<Value>,
    pub error: Option<QueryError>,
    pub data_updated_at: Option<DateTime<Utc>>,
    pub error_updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fetch_failure_count: u32,
    #[serde(default)]
    pub is_invalidated: bool,
}

impl QueryState {
    pub fn pending() -> Self {
        Self {
            status: QueryStatus::Pending,
            data: None,
            error: None,
            data_updated_at: None,
            error_updated_at: None,
            fetch_failure_count: 0,
            is_invalidated: false,
        }
    }
}

/// Cached state of one key as seen by observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryEntry {
    pub key: QueryKey,
    #[serde(flatten)]
    pub state: QueryState,
    pub is_fetching: bool,
}

impl QueryEntry {
    pub fn new(key: QueryKey) -> Self {
        Self {
            key,
            state: QueryState::pending(),
            is_fetching: false,
        }
    }

    pub fn status(&self) -> QueryStatus {
        self.state.status
    }

    pub fn data(&self) -> Option<&Value> {
        self.state.data.as_ref()
    }

    pub fn error(&self) -> Option<&QueryError> {
        self.state.error.as_ref()
    }

    /// Timestamp of the last successful fetch.
    pub fn last_fetched_at(&self) -> Option<DateTime<Utc>> {
        self.state.data_updated_at
    }

    /// Whether `get` must refetch. `stale_time = None` means data never goes
    /// stale on its own; only invalidation or a missing value trigger a fetch.
    pub fn is_stale(&self, stale_time: Option<Duration>, now: DateTime<Utc>) -> bool {
        if self.state.data.is_none() || self.state.is_invalidated {
            return true;
        }
        match (stale_time, self.state.data_updated_at) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(window), Some(updated)) => now
                .signed_duration_since(updated)
                .to_std()
                .map(|age| age >= window)
                .unwrap_or(false),
        }
    }
}

/// One query inside a persisted snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DehydratedQuery {
    pub query_key: QueryKey,
    pub query_hash: String,
    pub state: QueryState,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DehydratedState {
    pub queries: Vec<DehydratedQuery>,
}

/// Full snapshot of the cache as written to durable storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedClient {
    /// Milliseconds since the Unix epoch at the time of the write.
    pub timestamp: i64,
    pub buster: String,
    pub client_state: DehydratedState,
}

// 宝可梦种类
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pokemon {
    pub name: String,
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesData {
    pub gen1_species: Vec<Pokemon>,
}

/// Body returned by the GraphQL endpoint, cached verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesResponse {
    pub data: SpeciesData,
}

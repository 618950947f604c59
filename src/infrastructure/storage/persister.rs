use crate::domain::error::DexError;
use crate::domain::model::PersistedClient;
use crate::domain::traits::{Persister, Storage};
use crate::infrastructure::storage::cache::QueryClient;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Persists the whole cache snapshot as JSON under one storage key.
pub struct SyncStoragePersister {
    storage: Arc<dyn Storage>,
    key: String,
}

impl SyncStoragePersister {
    pub fn new(storage: Arc<dyn Storage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Persister for SyncStoragePersister {
    fn persist_client(&self, client: &PersistedClient) -> Result<(), DexError> {
        let mut snapshot = client.clone();
        loop {
            let serialized = serde_json::to_string(&snapshot)?;
            match self.storage.set_item(&self.key, &serialized) {
                Ok(()) => return Ok(()),
                Err(DexError::QuotaExceeded { .. }) if !snapshot.client_state.queries.is_empty() => {
                    remove_oldest_query(&mut snapshot);
                    debug!(
                        "Storage quota exceeded, retrying with {} queries",
                        snapshot.client_state.queries.len()
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn restore_client(&self) -> Result<Option<PersistedClient>, DexError> {
        match self.storage.get_item(&self.key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn remove_client(&self) -> Result<(), DexError> {
        self.storage.remove_item(&self.key)
    }
}

/// Drop the query whose data is oldest; never-fetched queries go first.
fn remove_oldest_query(snapshot: &mut PersistedClient) {
    let queries = &mut snapshot.client_state.queries;
    if let Some((idx, _)) = queries
        .iter()
        .enumerate()
        .min_by_key(|(_, q)| q.state.data_updated_at)
    {
        let removed = queries.remove(idx);
        debug!("Dropped {} from snapshot", removed.query_hash);
    }
}

#[derive(Debug, Clone)]
pub struct RestoreOptions {
    /// Snapshots older than this are discarded.
    pub max_age: Duration,
    /// Snapshots written under a different buster are discarded.
    pub buster: String,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(24 * 60 * 60),
            buster: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    Empty,
    Restored { queries: usize },
    Expired,
    Busted,
    Discarded,
}

/// Seed `client` from the persisted snapshot, once, before the first render.
///
/// Nothing here is fatal: unusable snapshots are removed and the cache starts empty.
pub fn restore(
    client: &QueryClient,
    persister: &dyn Persister,
    options: &RestoreOptions,
) -> RestoreOutcome {
    let persisted = match persister.restore_client() {
        Ok(Some(persisted)) => persisted,
        Ok(None) => return RestoreOutcome::Empty,
        Err(e) => {
            warn!("Discarding unreadable cache snapshot: {}", e);
            discard(persister);
            return RestoreOutcome::Discarded;
        }
    };

    let age_ms = Utc::now().timestamp_millis() - persisted.timestamp;
    let max_age_ms = i64::try_from(options.max_age.as_millis()).unwrap_or(i64::MAX);
    if age_ms > max_age_ms {
        info!("Cache snapshot expired ({}s old)", age_ms / 1000);
        discard(persister);
        return RestoreOutcome::Expired;
    }

    if persisted.buster != options.buster {
        info!(
            "Cache snapshot buster mismatch ({:?} != {:?})",
            persisted.buster, options.buster
        );
        discard(persister);
        return RestoreOutcome::Busted;
    }

    let queries = client.hydrate(persisted.client_state);
    info!("Restored {} queries from snapshot", queries);
    RestoreOutcome::Restored { queries }
}

fn discard(persister: &dyn Persister) {
    if let Err(e) = persister.remove_client() {
        warn!("Failed to remove cache snapshot: {}", e);
    }
}

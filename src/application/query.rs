use crate::domain::error::DexError;
use crate::domain::model::{Pokemon, QueryEntry, QueryKey, QueryStatus, SpeciesResponse};
use crate::infrastructure::storage::cache::QueryObserver;
use crate::state::AppState;
use serde::Deserialize;
use tracing::debug;

/// Key of the species list query.
pub fn species_key() -> QueryKey {
    QueryKey::new(["pokemon"])
}

/// Key a per-species detail query would use. Nothing fetches under it yet.
pub fn species_detail_key(id: i64) -> QueryKey {
    species_key().with(id)
}

/// Subscribe to the species list, fetching it if needed.
pub fn use_species(state: &AppState) -> QueryObserver {
    state.client.get(&species_key(), state.fetcher.clone())
}

/// Whether a detail entry for `id` holds data. Drives the highlighted link style.
pub fn is_species_cached(state: &AppState, id: i64) -> bool {
    state
        .client
        .peek(&species_detail_key(id))
        .is_some_and(|entry| entry.data().is_some())
}

/// Read the species list out of an entry's cached response body.
pub fn decode_species(entry: &QueryEntry) -> Result<Vec<Pokemon>, DexError> {
    match entry.data() {
        Some(data) => {
            let response = SpeciesResponse::deserialize(data)?;
            Ok(response.data.gen1_species)
        }
        None => Ok(Vec::new()),
    }
}

/// Observe the species list until its fetch settles.
///
/// `on_frame` sees the settled entry; with `live` it also sees every
/// intermediate state (loading, background refresh). Without `live`, cached
/// data being refreshed is shown once up front so it never waits on the network.
pub async fn watch_species<F>(
    state: &AppState,
    refetch: bool,
    live: bool,
    mut on_frame: F,
) -> QueryEntry
where
    F: FnMut(&QueryEntry),
{
    if refetch && state.client.invalidate(&species_key()) {
        debug!("Invalidated species list");
    }

    let mut observer = use_species(state);
    let mut entry = observer.current();
    if live || (entry.is_fetching && entry.status() == QueryStatus::Success) {
        on_frame(&entry);
    }

    while entry.is_fetching {
        match observer.changed().await {
            Some(next) => {
                entry = next;
                if live {
                    on_frame(&entry);
                }
            }
            None => break,
        }
    }

    if !live {
        on_frame(&entry);
    }
    entry
}

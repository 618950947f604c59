use crate::domain::error::DexError;
use crate::domain::model::PersistedClient;
use async_trait::async_trait;
use serde_json::Value;

/// Zero-argument fetch operation behind a query key.
///
/// The query cache owns when and how often this runs; implementations only
/// produce the value.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self) -> Result<Value, DexError>;
}

/// Synchronous string key-value store, shaped like the browser's local storage.
pub trait Storage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, DexError>;

    /// Overwrite `key`. Either the whole value is stored or nothing changes.
    fn set_item(&self, key: &str, value: &str) -> Result<(), DexError>;

    fn remove_item(&self, key: &str) -> Result<(), DexError>;
}

/// Snapshot/restore bridge between the query cache and durable storage.
pub trait Persister: Send + Sync {
    fn persist_client(&self, client: &PersistedClient) -> Result<(), DexError>;

    /// `Ok(None)` when nothing usable is stored.
    fn restore_client(&self) -> Result<Option<PersistedClient>, DexError>;

    fn remove_client(&self) -> Result<(), DexError>;
}

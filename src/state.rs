use crate::domain::error::DexError;
use crate::domain::traits::{Fetcher, Persister, Storage};
use crate::infrastructure::config::{get_storage_path, Config};
use crate::infrastructure::network::client::GraphQlFetcher;
use crate::infrastructure::network::http::create_client;
use crate::infrastructure::network::retry::RetryConfig;
use crate::infrastructure::storage::cache::{QueryClient, QueryClientOptions};
use crate::infrastructure::storage::db::SqliteStorage;
use crate::infrastructure::storage::memory::MemoryStorage;
use crate::infrastructure::storage::persister::{
    restore, RestoreOptions, RestoreOutcome, SyncStoragePersister,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub client: QueryClient,
    pub fetcher: Arc<dyn Fetcher>,
    pub persister: Arc<SyncStoragePersister>,
    pub config: Arc<Config>,
    /// `None` when persistence is disabled and storage lives in memory.
    pub storage_path: Option<PathBuf>,
}

impl AppState {
    /// Wire the cache to durable storage and the GraphQL endpoint from `config`.
    pub fn new(config: Config) -> Result<Self, DexError> {
        let http_client = create_client(&config)?;
        let fetcher: Arc<dyn Fetcher> =
            Arc::new(GraphQlFetcher::gen1_species(http_client, config.endpoint.clone()));

        let mut storage_path = None;
        let storage: Arc<dyn Storage> = if config.persist.enable {
            let path = get_storage_path(&config);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let storage = SqliteStorage::open(&path, config.persist.quota_bytes)?;
            storage_path = Some(path);
            Arc::new(storage)
        } else {
            Arc::new(MemoryStorage::new())
        };

        Ok(Self::with_parts(config, storage, fetcher, storage_path))
    }

    /// Assemble from explicit parts; tests swap in memory storage and fake fetchers here.
    pub fn with_parts(
        config: Config,
        storage: Arc<dyn Storage>,
        fetcher: Arc<dyn Fetcher>,
        storage_path: Option<PathBuf>,
    ) -> Self {
        let persister = Arc::new(SyncStoragePersister::new(storage, config.persist.key.clone()));
        let client = QueryClient::with_persister(client_options(&config), persister.clone());

        Self {
            client,
            fetcher,
            persister,
            config: Arc::new(config),
            storage_path,
        }
    }

    /// Seed the cache from the persisted snapshot. Call once before the first render.
    pub fn restore(&self) -> RestoreOutcome {
        let options = RestoreOptions {
            max_age: self.config.persist.max_age(),
            buster: self.config.persist.buster.clone(),
        };
        restore(&self.client, self.persister.as_ref(), &options)
    }

    /// Empty the cache and the stored snapshot.
    pub fn clear_cache(&self) -> Result<(), DexError> {
        self.client.clear();
        self.persister.remove_client()
    }
}

pub fn client_options(config: &Config) -> QueryClientOptions {
    QueryClientOptions {
        gc_time: config.query.gc_time(),
        stale_time: config.query.stale_time(),
        retry: RetryConfig {
            max_retries: config.query.retry,
            initial_delay: Duration::from_millis(config.query.retry_delay_ms),
            max_delay: Duration::from_millis(config.query.max_retry_delay_ms),
        },
        buster: config.persist.buster.clone(),
    }
}

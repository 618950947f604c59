#![allow(dead_code)]

use async_trait::async_trait;
use dex::domain::error::DexError;
use dex::domain::traits::{Fetcher, Storage};
use dex::infrastructure::config::Config;
use dex::infrastructure::storage::memory::MemoryStorage;
use dex::state::AppState;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

pub fn species_body() -> Value {
    json!({
        "data": {
            "gen1_species": [
                { "name": "bulbasaur", "id": 1 },
                { "name": "ivysaur", "id": 2 }
            ]
        }
    })
}

/// Fake fetcher that counts calls and can be held until released.
pub struct FakeFetcher {
    calls: AtomicUsize,
    result: Result<Value, String>,
    gate: Option<Notify>,
}

impl FakeFetcher {
    pub fn ok(body: Value) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            result: Ok(body),
            gate: None,
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            result: Err(message.to_string()),
            gate: None,
        })
    }

    /// Succeeds only after `release` is called.
    pub fn gated(body: Value) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            result: Ok(body),
            gate: Some(Notify::new()),
        })
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_waiters();
            gate.notify_one();
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self) -> Result<Value, DexError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match &self.result {
            Ok(body) => Ok(body.clone()),
            Err(message) => Err(DexError::Api(message.clone())),
        }
    }
}

/// Config with retries off so failures settle immediately.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.query.retry = 0;
    config
}

pub fn app_state(storage: Arc<MemoryStorage>, fetcher: Arc<FakeFetcher>) -> AppState {
    let storage: Arc<dyn Storage> = storage;
    let fetcher: Arc<dyn Fetcher> = fetcher;
    AppState::with_parts(test_config(), storage, fetcher, None)
}

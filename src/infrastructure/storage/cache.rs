// In-memory query cache: one observable entry per query key
use crate::domain::error::{DexError, QueryError};
use crate::domain::model::{
    DehydratedQuery, DehydratedState, PersistedClient, QueryEntry, QueryKey, QueryStatus,
};
use crate::domain::traits::{Fetcher, Persister};
use crate::infrastructure::network::retry::{with_retry, RetryConfig};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct QueryClientOptions {
    /// How long an entry without observers is retained.
    pub gc_time: Duration,
    /// `None`: successful data never goes stale on its own.
    pub stale_time: Option<Duration>,
    pub retry: RetryConfig,
    /// Written into every snapshot; restore discards snapshots with a different one.
    pub buster: String,
}

impl Default for QueryClientOptions {
    fn default() -> Self {
        Self {
            gc_time: Duration::from_secs(60 * 60),
            stale_time: None,
            retry: RetryConfig::default(),
            buster: String::new(),
        }
    }
}

struct Slot {
    sender: watch::Sender<QueryEntry>,
    observers: usize,
    inactive_since: Option<DateTime<Utc>>,
    /// Set for entries seeded from a snapshot until they are fetched again.
    hydrated: bool,
}

impl Slot {
    fn new(entry: QueryEntry, now: DateTime<Utc>) -> Self {
        let (sender, _) = watch::channel(entry);
        Self {
            sender,
            observers: 0,
            inactive_since: Some(now),
            hydrated: false,
        }
    }

    fn entry(&self) -> QueryEntry {
        self.sender.borrow().clone()
    }

    fn is_fetching(&self) -> bool {
        self.sender.borrow().is_fetching
    }
}

struct ClientInner {
    queries: DashMap<String, Slot>,
    options: QueryClientOptions,
    persister: Option<Arc<dyn Persister>>,
    /// Serializes snapshot-then-write so a newer snapshot is never overwritten by an older one.
    persist_lock: Mutex<()>,
}

/// Process-wide query cache.
///
/// Cloning is cheap and every clone shares the same entries. Every state
/// transition is followed by a full snapshot write to the attached persister.
#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<ClientInner>,
}

impl QueryClient {
    pub fn new(options: QueryClientOptions) -> Self {
        Self::build(options, None)
    }

    pub fn with_persister(options: QueryClientOptions, persister: Arc<dyn Persister>) -> Self {
        Self::build(options, Some(persister))
    }

    fn build(options: QueryClientOptions, persister: Option<Arc<dyn Persister>>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                queries: DashMap::new(),
                options,
                persister,
                persist_lock: Mutex::new(()),
            }),
        }
    }

    pub fn options(&self) -> &QueryClientOptions {
        &self.inner.options
    }

    pub fn len(&self) -> usize {
        self.inner.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.queries.is_empty()
    }

    /// Non-subscribing lookup; never starts a fetch.
    pub fn peek(&self, key: &QueryKey) -> Option<QueryEntry> {
        self.inner
            .queries
            .get(&key.hash())
            .map(|slot| slot.entry())
    }

    pub fn get_query_data(&self, key: &QueryKey) -> Option<Value> {
        self.peek(key).and_then(|entry| entry.state.data)
    }

    /// Number of live observers of `key`.
    pub fn observer_count(&self, key: &QueryKey) -> usize {
        self.inner
            .queries
            .get(&key.hash())
            .map(|slot| slot.observers)
            .unwrap_or(0)
    }

    /// Subscribe to `key`, fetching it in the background when it is missing or stale.
    ///
    /// Must be called inside a tokio runtime. The fetch is never cancelled:
    /// dropping the observer does not stop it from settling into the cache.
    pub fn get(&self, key: &QueryKey, fetcher: Arc<dyn Fetcher>) -> QueryObserver {
        let hash = key.hash();
        let now = Utc::now();

        let (receiver, created, started) = {
            let mut created = false;
            let mut slot = self
                .inner
                .queries
                .entry(hash.clone())
                .or_insert_with(|| {
                    created = true;
                    Slot::new(QueryEntry::new(key.clone()), now)
                });
            slot.observers += 1;
            slot.inactive_since = None;
            let started = self.begin_fetch(&mut slot, false, now);
            (slot.sender.subscribe(), created, started)
        };

        if created {
            debug!("Cache miss for {}", hash);
        } else if !started {
            debug!("Cache hit for {}", hash);
        }
        if started {
            self.spawn_fetch(hash.clone(), fetcher);
        }
        if created || started {
            self.persist();
        }

        QueryObserver {
            client: self.clone(),
            hash,
            receiver,
        }
    }

    /// Resolve `key` without subscribing: cached data if fresh, otherwise the
    /// outcome of a fetch (joining one already in flight).
    pub async fn fetch_query(
        &self,
        key: &QueryKey,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Value, QueryError> {
        self.resolve(key, fetcher, false).await
    }

    /// Fetch `key` even if its data is fresh. Existing data stays readable meanwhile.
    pub async fn refetch(
        &self,
        key: &QueryKey,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Value, QueryError> {
        self.resolve(key, fetcher, true).await
    }

    async fn resolve(
        &self,
        key: &QueryKey,
        fetcher: Arc<dyn Fetcher>,
        force: bool,
    ) -> Result<Value, QueryError> {
        let hash = key.hash();
        let now = Utc::now();

        let (mut receiver, created, started) = {
            let mut created = false;
            let mut slot = self
                .inner
                .queries
                .entry(hash.clone())
                .or_insert_with(|| {
                    created = true;
                    Slot::new(QueryEntry::new(key.clone()), now)
                });
            let started = self.begin_fetch(&mut slot, force, now);
            (slot.sender.subscribe(), created, started)
        };

        if started {
            self.spawn_fetch(hash, fetcher);
        }
        if created || started {
            self.persist();
        }

        let entry = match receiver.wait_for(|entry| !entry.is_fetching).await {
            Ok(entry) => entry.clone(),
            Err(_) => return Err(QueryError::new("query was removed while fetching")),
        };
        outcome(&entry)
    }

    /// Mark `slot` as fetching if it needs a fetch. Returns whether the caller must start one.
    fn begin_fetch(&self, slot: &mut Slot, force: bool, now: DateTime<Utc>) -> bool {
        {
            let entry = slot.sender.borrow();
            if entry.is_fetching {
                return false;
            }
            if !force && !slot.hydrated && !entry.is_stale(self.inner.options.stale_time, now) {
                return false;
            }
        }
        slot.sender.send_modify(|entry| entry.is_fetching = true);
        true
    }

    fn spawn_fetch(&self, hash: String, fetcher: Arc<dyn Fetcher>) {
        let client = self.clone();
        tokio::spawn(async move {
            let retry = client.inner.options.retry.clone();
            let (result, failures) = with_retry(&retry, || fetcher.fetch()).await;
            client.settle(&hash, result, failures);
        });
    }

    /// Apply a finished fetch to its entry. Last completed fetch wins.
    fn settle(&self, hash: &str, result: Result<Value, DexError>, failures: u32) {
        let now = Utc::now();
        let updated = match self.inner.queries.get_mut(hash) {
            Some(mut slot) => {
                match result {
                    Ok(data) => {
                        info!("Fetched {}", hash);
                        slot.hydrated = false;
                        slot.sender.send_modify(|entry| {
                            entry.state.status = QueryStatus::Success;
                            entry.state.data = Some(data);
                            entry.state.error = None;
                            entry.state.data_updated_at = Some(now);
                            entry.state.fetch_failure_count = 0;
                            entry.state.is_invalidated = false;
                            entry.is_fetching = false;
                        });
                    }
                    Err(err) => {
                        warn!("Fetching {} failed: {}", hash, err);
                        slot.sender.send_modify(|entry| {
                            // Data from an earlier success stays visible.
                            if entry.state.data.is_none() {
                                entry.state.status = QueryStatus::Error;
                            }
                            entry.state.error = Some(QueryError::from(err));
                            entry.state.error_updated_at = Some(now);
                            entry.state.fetch_failure_count = failures;
                            entry.is_fetching = false;
                        });
                    }
                }
                true
            }
            None => {
                debug!("Dropping result for removed query {}", hash);
                false
            }
        };

        if updated {
            self.persist();
        }
    }

    /// Write `data` locally as if it had just been fetched.
    pub fn set_query_data(&self, key: &QueryKey, data: Value) {
        let now = Utc::now();
        {
            let mut slot = self
                .inner
                .queries
                .entry(key.hash())
                .or_insert_with(|| Slot::new(QueryEntry::new(key.clone()), now));
            slot.hydrated = false;
            slot.sender.send_modify(|entry| {
                entry.state.status = QueryStatus::Success;
                entry.state.data = Some(data);
                entry.state.error = None;
                entry.state.data_updated_at = Some(now);
                entry.state.is_invalidated = false;
            });
        }
        self.persist();
    }

    /// Mark `key` stale so the next `get` refetches it. Returns false if absent.
    pub fn invalidate(&self, key: &QueryKey) -> bool {
        let found = match self.inner.queries.get(&key.hash()) {
            Some(slot) => {
                slot.sender
                    .send_modify(|entry| entry.state.is_invalidated = true);
                true
            }
            None => false,
        };
        if found {
            self.persist();
        }
        found
    }

    pub fn remove(&self, key: &QueryKey) -> bool {
        let removed = self.inner.queries.remove(&key.hash()).is_some();
        if removed {
            self.persist();
        }
        removed
    }

    pub fn clear(&self) {
        self.inner.queries.clear();
        self.persist();
    }

    /// Drop entries that have had no observer for longer than `gc_time` as of `now`.
    ///
    /// Entries with a fetch in flight are kept until it settles.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let gc_time = chrono::Duration::from_std(self.inner.options.gc_time)
            .unwrap_or(chrono::Duration::MAX);
        let before = self.inner.queries.len();

        self.inner.queries.retain(|hash, slot| {
            let expired = slot.observers == 0
                && !slot.is_fetching()
                && slot
                    .inactive_since
                    .and_then(|since| since.checked_add_signed(gc_time))
                    .is_some_and(|deadline| deadline <= now);
            if expired {
                debug!("Evicting {}", hash);
            }
            !expired
        });

        let evicted = before.saturating_sub(self.inner.queries.len());
        if evicted > 0 {
            info!("Evicted {} unobserved queries", evicted);
            self.persist();
        }
        evicted
    }

    /// Run `evict_expired` every `interval` until the handle is aborted.
    pub fn spawn_gc(&self, interval: Duration) -> JoinHandle<()> {
        let client = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                client.evict_expired(Utc::now());
            }
        })
    }

    /// Serialize every entry. In-flight flags are not part of the snapshot.
    pub fn snapshot(&self) -> PersistedClient {
        let mut queries: Vec<DehydratedQuery> = self
            .inner
            .queries
            .iter()
            .map(|slot| {
                let entry = slot.entry();
                DehydratedQuery {
                    query_hash: slot.key().clone(),
                    query_key: entry.key,
                    state: entry.state,
                }
            })
            .collect();
        queries.sort_by(|a, b| a.query_hash.cmp(&b.query_hash));

        PersistedClient {
            timestamp: Utc::now().timestamp_millis(),
            buster: self.inner.options.buster.clone(),
            client_state: DehydratedState { queries },
        }
    }

    /// Seed entries from a snapshot. Newer in-memory data wins over restored data.
    ///
    /// Restored entries are unobserved (their retention window starts now) and
    /// are refetched on their first `get`. Hydration itself is not persisted.
    pub fn hydrate(&self, state: DehydratedState) -> usize {
        let now = Utc::now();
        let mut restored = 0;

        for query in state.queries {
            let hash = query.query_key.hash();
            let incoming = query.state;

            match self.inner.queries.get_mut(&hash) {
                Some(mut slot) => {
                    let current = slot.sender.borrow().state.data_updated_at;
                    if current >= incoming.data_updated_at {
                        continue;
                    }
                    slot.hydrated = true;
                    slot.sender.send_modify(|entry| entry.state = incoming);
                }
                None => {
                    let entry = QueryEntry {
                        key: query.query_key,
                        state: incoming,
                        is_fetching: false,
                    };
                    let mut slot = Slot::new(entry, now);
                    slot.hydrated = true;
                    self.inner.queries.insert(hash, slot);
                }
            }
            restored += 1;
        }

        restored
    }

    /// Write the current snapshot now, reporting failure to the caller.
    pub fn flush(&self) -> Result<(), DexError> {
        let Some(persister) = &self.inner.persister else {
            return Ok(());
        };
        let _guard = self
            .inner
            .persist_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        persister.persist_client(&self.snapshot())
    }

    /// Snapshot after a mutation. Durability failures never reach the UI.
    fn persist(&self) {
        if let Err(e) = self.flush() {
            warn!("Failed to persist query cache: {}", e);
        }
    }

    fn release(&self, hash: &str) {
        if let Some(mut slot) = self.inner.queries.get_mut(hash) {
            slot.observers = slot.observers.saturating_sub(1);
            if slot.observers == 0 {
                slot.inactive_since = Some(Utc::now());
            }
        }
    }
}

/// Result of the most recent fetch recorded in `entry`.
fn outcome(entry: &QueryEntry) -> Result<Value, QueryError> {
    let failed_last = match (entry.state.error_updated_at, entry.state.data_updated_at) {
        (Some(failed), Some(succeeded)) => failed > succeeded,
        (Some(_), None) => true,
        _ => false,
    };
    if failed_last {
        if let Some(err) = &entry.state.error {
            return Err(err.clone());
        }
    }
    entry
        .state
        .data
        .clone()
        .ok_or_else(|| QueryError::new("query has no data"))
}

/// Live view of one cache entry. Counts as an active subscriber until dropped.
pub struct QueryObserver {
    client: QueryClient,
    hash: String,
    receiver: watch::Receiver<QueryEntry>,
}

impl QueryObserver {
    pub fn current(&self) -> QueryEntry {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change. `None` once the entry has been removed.
    pub async fn changed(&mut self) -> Option<QueryEntry> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    /// Wait until no fetch is in flight and return the entry.
    pub async fn settled(&mut self) -> QueryEntry {
        if let Ok(entry) = self.receiver.wait_for(|entry| !entry.is_fetching).await {
            return entry.clone();
        }
        self.receiver.borrow().clone()
    }
}

impl Drop for QueryObserver {
    fn drop(&mut self) {
        self.client.release(&self.hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use crate::domain::traits::Storage;
    use crate::infrastructure::storage::memory::MemoryStorage;
    use crate::infrastructure::storage::persister::SyncStoragePersister;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Fetcher for Counting {
        async fn fetch(&self) -> Result<Value, DexError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail {
                Err(DexError::Api("offline".to_string()))
            } else {
                Ok(json!({ "call": n }))
            }
        }
    }

    fn counting(fail: bool) -> Arc<Counting> {
        Arc::new(Counting {
            calls: AtomicUsize::new(0),
            fail,
        })
    }

    fn client() -> QueryClient {
        QueryClient::new(QueryClientOptions {
            retry: RetryConfig::none(),
            ..QueryClientOptions::default()
        })
    }

    #[tokio::test]
    async fn test_get_starts_pending_then_succeeds() {
        let client = client();
        let fetcher = counting(false);
        let key = QueryKey::new(["pokemon"]);

        let mut observer = client.get(&key, fetcher.clone());
        let first = observer.current();
        assert_eq!(first.status(), QueryStatus::Pending);
        assert!(first.is_fetching);

        let settled = observer.settled().await;
        assert_eq!(settled.status(), QueryStatus::Success);
        assert_eq!(settled.data(), Some(&json!({ "call": 1 })));
        assert!(settled.last_fetched_at().is_some());
        assert_eq!(client.observer_count(&key), 1);
    }

    #[tokio::test]
    async fn test_observer_drop_starts_retention_window() {
        let client = client();
        let key = QueryKey::new(["pokemon"]);
        let mut observer = client.get(&key, counting(false));
        observer.settled().await;
        drop(observer);

        assert_eq!(client.observer_count(&key), 0);
        assert_eq!(client.evict_expired(Utc::now()), 0);
        let later = Utc::now() + chrono::Duration::seconds(3601);
        assert_eq!(client.evict_expired(later), 1);
        assert!(client.peek(&key).is_none());
    }

    #[tokio::test]
    async fn test_failed_refetch_keeps_data() {
        let client = client();
        let key = QueryKey::new(["pokemon"]);
        client.set_query_data(&key, json!([1, 2]));

        let err = client.refetch(&key, counting(true)).await.unwrap_err();
        assert_eq!(err.message, "GraphQL error: offline");

        let entry = client.peek(&key).unwrap();
        assert_eq!(entry.status(), QueryStatus::Success);
        assert_eq!(entry.data(), Some(&json!([1, 2])));
        assert_eq!(entry.state.fetch_failure_count, 1);
        assert!(!entry.is_fetching);
    }

    /// Memory storage whose first write stalls.
    struct SlowFirstWrite {
        inner: MemoryStorage,
        first: AtomicBool,
    }

    impl Storage for SlowFirstWrite {
        fn get_item(&self, key: &str) -> Result<Option<String>, DexError> {
            self.inner.get_item(key)
        }

        fn set_item(&self, key: &str, value: &str) -> Result<(), DexError> {
            if self.first.swap(false, Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(300));
            }
            self.inner.set_item(key, value)
        }

        fn remove_item(&self, key: &str) -> Result<(), DexError> {
            self.inner.remove_item(key)
        }
    }

    #[test]
    fn test_concurrent_writes_keep_latest_snapshot() {
        let storage = Arc::new(SlowFirstWrite {
            inner: MemoryStorage::new(),
            first: AtomicBool::new(true),
        });
        let persister = Arc::new(SyncStoragePersister::new(storage, "slot"));
        let client = QueryClient::with_persister(QueryClientOptions::default(), persister.clone());

        let slow = {
            let client = client.clone();
            std::thread::spawn(move || client.set_query_data(&QueryKey::new(["a"]), json!(1)))
        };
        std::thread::sleep(Duration::from_millis(50));
        client.set_query_data(&QueryKey::new(["b"]), json!(2));
        slow.join().unwrap();

        let stored = persister.restore_client().unwrap().unwrap();
        let hashes: Vec<_> = stored
            .client_state
            .queries
            .iter()
            .map(|q| q.query_hash.as_str())
            .collect();
        assert_eq!(client.len(), 2);
        assert_eq!(hashes, vec![r#"["a"]"#, r#"["b"]"#]);
    }

    #[test]
    fn test_outcome_prefers_latest() {
        let now = Utc::now();
        let mut entry = QueryEntry::new(QueryKey::new(["k"]));
        entry.state.data = Some(json!(1));
        entry.state.data_updated_at = Some(now);
        assert_eq!(outcome(&entry), Ok(json!(1)));

        entry.state.error = Some(QueryError::new("late failure"));
        entry.state.error_updated_at = Some(now + chrono::Duration::seconds(1));
        assert_eq!(outcome(&entry), Err(QueryError::new("late failure")));
    }
}

// In-memory storage implementation using DashMap
use crate::domain::error::DexError;
use crate::domain::traits::Storage;
use dashmap::DashMap;

/// Non-durable storage with an optional quota.
///
/// Used when persistence is disabled and in tests.
pub struct MemoryStorage {
    map: DashMap<String, String>,
    quota_bytes: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            map: DashMap::new(),
            quota_bytes: None,
        }
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            map: DashMap::new(),
            quota_bytes: Some(quota_bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&self) {
        self.map.clear();
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, DexError> {
        Ok(self.map.get(key).map(|entry| entry.value().clone()))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), DexError> {
        if let Some(quota) = self.quota_bytes {
            let used: usize = self
                .map
                .iter()
                .filter(|entry| entry.key() != key)
                .map(|entry| entry.value().len())
                .sum();
            let needed = used + value.len();
            if needed > quota {
                return Err(DexError::QuotaExceeded { needed, quota });
            }
        }
        self.map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), DexError> {
        self.map.remove(key);
        Ok(())
    }
}

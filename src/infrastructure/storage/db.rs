use crate::domain::error::DexError;
use crate::domain::traits::Storage;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Durable key-value storage in a single SQLite table.
///
/// Writes are synchronous and all-or-nothing per key, and the total size of
/// stored values is capped like a browser storage quota.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
    quota_bytes: usize,
}

impl SqliteStorage {
    pub fn open(db_path: &Path, quota_bytes: usize) -> Result<Self, DexError> {
        let conn = Connection::open(db_path)?;
        Self::init(conn, quota_bytes)
    }

    pub fn open_in_memory(quota_bytes: usize) -> Result<Self, DexError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, quota_bytes)
    }

    fn init(conn: Connection, quota_bytes: usize) -> Result<Self, DexError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS storage (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_storage_updated ON storage(updated_at)",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            quota_bytes,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock cannot leave a half-written row behind.
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Total bytes of every value except the one stored under `key`.
    fn used_bytes_excluding(conn: &Connection, key: &str) -> Result<usize, DexError> {
        let used: i64 = conn.query_row(
            "SELECT COALESCE(SUM(LENGTH(CAST(value AS BLOB))), 0) FROM storage WHERE key != ?",
            params![key],
            |row| row.get(0),
        )?;
        Ok(used.max(0) as usize)
    }

    pub fn len(&self) -> Result<usize, DexError> {
        let count: i64 = self
            .lock()
            .query_row("SELECT COUNT(*) FROM storage", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool, DexError> {
        Ok(self.len()? == 0)
    }
}

impl Storage for SqliteStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, DexError> {
        let value = self
            .lock()
            .query_row(
                "SELECT value FROM storage WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), DexError> {
        let mut conn = self.lock();

        let needed = Self::used_bytes_excluding(&conn, key)? + value.len();
        if needed > self.quota_bytes {
            return Err(DexError::QuotaExceeded {
                needed,
                quota: self.quota_bytes,
            });
        }

        let now = chrono::Utc::now().timestamp();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO storage (key, value, updated_at) VALUES (?, ?, ?)",
            params![key, value, now],
        )?;
        tx.commit()?;

        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), DexError> {
        self.lock()
            .execute("DELETE FROM storage WHERE key = ?", params![key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_set_get_remove() {
        let storage = SqliteStorage::open_in_memory(1024).unwrap();
        assert_eq!(storage.get_item("a").unwrap(), None);

        storage.set_item("a", "one").unwrap();
        storage.set_item("a", "two").unwrap();
        assert_eq!(storage.get_item("a").unwrap(), Some("two".to_string()));
        assert_eq!(storage.len().unwrap(), 1);

        storage.remove_item("a").unwrap();
        assert_eq!(storage.get_item("a").unwrap(), None);
        assert!(storage.is_empty().unwrap());
    }

    #[test]
    fn test_quota_counts_other_keys_only() {
        let storage = SqliteStorage::open_in_memory(10).unwrap();
        storage.set_item("a", "123456").unwrap();
        // Overwriting the same key only needs room for the new value.
        storage.set_item("a", "1234567890").unwrap();

        let err = storage.set_item("b", "x").unwrap_err();
        assert!(matches!(err, DexError::QuotaExceeded { needed: 11, quota: 10 }));
        assert_eq!(
            storage.get_item("a").unwrap(),
            Some("1234567890".to_string())
        );
    }

    #[test]
    fn test_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("storage.db");

        {
            let storage = SqliteStorage::open(&path, 1024).unwrap();
            storage.set_item("slot", "{\"v\":1}").unwrap();
        }

        let storage = SqliteStorage::open(&path, 1024).unwrap();
        assert_eq!(
            storage.get_item("slot").unwrap(),
            Some("{\"v\":1}".to_string())
        );
    }
}

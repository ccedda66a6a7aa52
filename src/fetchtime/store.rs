//! Metadata store boundary for the incremental exporter.
//!
//! The relational store itself lives outside this crate; the exporter
//! only needs a cursor table and one join query for newly fetched rows,
//! so that surface is a pair of traits. `MemoryStore` implements them
//! in-process for tests and embedding.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::{AppError, Result};
use crate::models::FetchRecord;

/// Handle to a metadata store; each export run opens its own connection.
pub trait MetadataStore {
    fn connect(&self) -> Result<Box<dyn StoreConnection + '_>>;
}

/// One store connection, scoped to a single export run.
pub trait StoreConnection {
    /// Schema version of the underlying store.
    fn schema_version(&mut self) -> Result<u32>;

    /// Persisted cursor value under `label`, if one exists.
    fn read_cursor(&mut self, label: &str) -> Result<Option<i64>>;

    /// Create the cursor row. First-run initialization only.
    fn init_cursor(&mut self, label: &str, value: i64) -> Result<()>;

    /// Persist a new cursor value. Must not be called before the batch
    /// it covers has been fully written.
    fn update_cursor(&mut self, label: &str, value: i64) -> Result<()>;

    /// Rows with id greater than `after`, ascending by id, at most `max`.
    fn fetched_after(&mut self, after: i64, max: usize) -> Result<Vec<FetchRecord>>;
}

/// In-memory metadata store with injectable connection failure.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    schema_version: u32,
    rows: Vec<FetchRecord>,
    cursors: HashMap<String, i64>,
    fail_connect: bool,
}

impl MemoryStore {
    /// A panic in one caller poisons the mutex; later callers recover
    /// the guard instead of panicking in turn.
    fn lock(&self) -> MutexGuard<'_, MemoryStoreInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn new(schema_version: u32) -> Self {
        Self {
            inner: Mutex::new(MemoryStoreInner {
                schema_version,
                ..Default::default()
            }),
        }
    }

    /// Insert a row, keeping the id order ascending.
    pub fn push_row(&self, row: FetchRecord) {
        let mut inner = self.lock();
        inner.rows.push(row);
        inner.rows.sort_by_key(|r| r.id);
    }

    /// Make subsequent `connect` calls fail.
    pub fn set_fail_connect(&self, fail: bool) {
        self.lock().fail_connect = fail;
    }

    /// Current cursor value for a label, for assertions.
    pub fn cursor(&self, label: &str) -> Option<i64> {
        self.lock().cursors.get(label).copied()
    }
}

impl MetadataStore for MemoryStore {
    fn connect(&self) -> Result<Box<dyn StoreConnection + '_>> {
        if self.lock().fail_connect {
            return Err(AppError::store("cannot connect to the metadata store"));
        }
        Ok(Box::new(MemoryConnection { store: self }))
    }
}

struct MemoryConnection<'a> {
    store: &'a MemoryStore,
}

impl StoreConnection for MemoryConnection<'_> {
    fn schema_version(&mut self) -> Result<u32> {
        Ok(self.store.lock().schema_version)
    }

    fn read_cursor(&mut self, label: &str) -> Result<Option<i64>> {
        Ok(self.store.lock().cursors.get(label).copied())
    }

    fn init_cursor(&mut self, label: &str, value: i64) -> Result<()> {
        let mut inner = self.store.lock();
        if inner.cursors.contains_key(label) {
            return Err(AppError::store(format!("cursor '{label}' already exists")));
        }
        inner.cursors.insert(label.to_string(), value);
        Ok(())
    }

    fn update_cursor(&mut self, label: &str, value: i64) -> Result<()> {
        let mut inner = self.store.lock();
        match inner.cursors.get_mut(label) {
            Some(cursor) => {
                *cursor = value;
                Ok(())
            }
            None => Err(AppError::store(format!("cursor '{label}' does not exist"))),
        }
    }

    fn fetched_after(&mut self, after: i64, max: usize) -> Result<Vec<FetchRecord>> {
        let inner = self.store.lock();
        Ok(inner
            .rows
            .iter()
            .filter(|r| r.id > after)
            .take(max)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64) -> FetchRecord {
        FetchRecord {
            id,
            fetch_time: id * 1000,
            ..Default::default()
        }
    }

    #[test]
    fn scan_is_ascending_and_capped() {
        let store = MemoryStore::new(10);
        for id in [5, 1, 3, 2, 4] {
            store.push_row(row(id));
        }
        let mut conn = store.connect().unwrap();
        let rows = conn.fetched_after(1, 2).unwrap();
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn cursor_lifecycle() {
        let store = MemoryStore::new(10);
        let mut conn = store.connect().unwrap();
        assert_eq!(conn.read_cursor("label").unwrap(), None);
        conn.init_cursor("label", -1).unwrap();
        assert_eq!(conn.read_cursor("label").unwrap(), Some(-1));
        conn.update_cursor("label", 7).unwrap();
        assert_eq!(store.cursor("label"), Some(7));
    }

    #[test]
    fn connect_failure_is_injectable() {
        let store = MemoryStore::new(10);
        store.set_fail_connect(true);
        assert!(store.connect().is_err());
    }

    #[test]
    fn poisoned_lock_does_not_cascade() {
        let store = std::sync::Arc::new(MemoryStore::new(10));
        let poisoner = std::sync::Arc::clone(&store);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.inner.lock().unwrap();
            panic!("hold the lock while panicking");
        })
        .join();

        store.push_row(row(1));
        let mut conn = store.connect().unwrap();
        assert_eq!(conn.schema_version().unwrap(), 10);
        assert_eq!(conn.fetched_after(0, 10).unwrap().len(), 1);
    }
}

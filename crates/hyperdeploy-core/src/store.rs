//! Flat-File Document Store
//!
//! A small JSON-backed document store: records live in an in-memory map
//! behind a single `RwLock`, and every mutation rewrites the backing file
//! atomically (temp file in the same directory, then rename). Check-then-act
//! operations run entirely under the write lock, so callers get
//! compare-and-set semantics without their own locking.
//!
//! The on-disk shape is a pretty-printed JSON object keyed by record id,
//! which doubles as the export format.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{CoreError, Result};

/// Serialize `value` to pretty JSON and write it to `path` atomically.
///
/// Writes to a sibling `.tmp` file first and renames over the target, so
/// readers never observe a half-written snapshot.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// JSON-backed document store keyed by string id
pub struct JsonStore<T> {
    path: PathBuf,
    records: RwLock<BTreeMap<String, T>>,
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    /// Open a store at `path`, loading existing records.
    ///
    /// A missing file is materialized as an empty store immediately.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let records: BTreeMap<String, T> = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            serde_json::from_str(&raw)
                .map_err(|e| CoreError::Storage(format!("{}: {}", path.display(), e)))?
        } else {
            BTreeMap::new()
        };

        let store = Self {
            path,
            records: RwLock::new(records),
        };

        if !store.path.exists() {
            store.persist(&store.records.read().unwrap())?;
        }

        tracing::debug!(
            path = %store.path.display(),
            records = store.len(),
            "Store opened"
        );
        Ok(store)
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, records: &BTreeMap<String, T>) -> Result<()> {
        write_json_atomic(&self.path, records)
    }

    /// Get a record by key
    pub fn get(&self, key: &str) -> Option<T> {
        self.records.read().unwrap().get(key).cloned()
    }

    /// Check whether a key exists
    pub fn contains(&self, key: &str) -> bool {
        self.records.read().unwrap().contains_key(key)
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    /// Whether the store holds no records
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert or replace a record and persist
    pub fn insert(&self, key: impl Into<String>, value: T) -> Result<()> {
        let mut records = self.records.write().unwrap();
        records.insert(key.into(), value);
        self.persist(&records)
    }

    /// Insert only if the key is absent (compare-and-set).
    ///
    /// Returns `true` if the record was inserted, `false` if the key was
    /// already taken. The presence check and the insert happen under one
    /// write lock.
    pub fn insert_if_absent(&self, key: impl Into<String>, value: T) -> Result<bool> {
        let key = key.into();
        let mut records = self.records.write().unwrap();
        if records.contains_key(&key) {
            return Ok(false);
        }
        records.insert(key, value);
        self.persist(&records)?;
        Ok(true)
    }

    /// Remove a record and persist. Returns the removed value, if any.
    pub fn remove(&self, key: &str) -> Result<Option<T>> {
        let mut records = self.records.write().unwrap();
        let removed = records.remove(key);
        if removed.is_some() {
            self.persist(&records)?;
        }
        Ok(removed)
    }

    /// Mutate a single record in place under the write lock.
    ///
    /// Returns `false` if the key is absent. The snapshot is persisted only
    /// when the record existed.
    pub fn update<F>(&self, key: &str, f: F) -> Result<bool>
    where
        F: FnOnce(&mut T),
    {
        let mut records = self.records.write().unwrap();
        match records.get_mut(key) {
            Some(record) => {
                f(record);
                self.persist(&records)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Run an arbitrary mutation over the whole map under the write lock,
    /// then persist.
    ///
    /// This is the escape hatch for multi-record sweeps and conditional
    /// transitions that need to read and write in one critical section.
    pub fn mutate<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut BTreeMap<String, T>) -> R,
    {
        let mut records = self.records.write().unwrap();
        let out = f(&mut records);
        self.persist(&records)?;
        Ok(out)
    }

    /// Snapshot of all records
    pub fn values(&self) -> Vec<T> {
        self.records.read().unwrap().values().cloned().collect()
    }

    /// Snapshot of all keys
    pub fn keys(&self) -> Vec<String> {
        self.records.read().unwrap().keys().cloned().collect()
    }

    /// Snapshot of records matching a predicate
    pub fn filter<P>(&self, pred: P) -> Vec<T>
    where
        P: Fn(&T) -> bool,
    {
        self.records
            .read()
            .unwrap()
            .values()
            .filter(|r| pred(r))
            .cloned()
            .collect()
    }

    /// Export the exact on-disk JSON snapshot
    pub fn export_json(&self) -> Result<String> {
        let records = self.records.read().unwrap();
        Ok(serde_json::to_string_pretty(&*records)?)
    }
}

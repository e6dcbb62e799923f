// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent key-value store contract.
//!
//! Auth state and the offline mutation queue both persist through a
//! [`KeyValueStore`]. Every call is atomic on its own; multi-key calls apply
//! all of their keys or none of them.
//!
//! Two implementations ship with the crate:
//! - [`MemoryStore`] - process-local map, lost on exit
//! - [`FileStore`] - a single JSON document on disk, replaced atomically on
//!   every write and guarded by an advisory lock file

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Error, Result};

const STORE_FILE_NAME: &str = "store.json";
const APP_DIR_NAME: &str = "tether";

/// Durable string-to-string storage.
pub trait KeyValueStore: Send + Sync {
    /// Reads a single key.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Reads several keys at once, preserving the order of `keys`.
    fn multi_get(&self, keys: &[&str]) -> Result<Vec<(String, Option<String>)>>;

    /// Writes a single key.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Writes several keys at once.
    fn multi_set(&self, pairs: &[(&str, String)]) -> Result<()>;

    /// Removes a single key. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<()>;

    /// Removes several keys at once.
    fn multi_remove(&self, keys: &[&str]) -> Result<()>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn multi_get(&self, keys: &[&str]) -> Result<Vec<(String, Option<String>)>> {
        (**self).multi_get(keys)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn multi_set(&self, pairs: &[(&str, String)]) -> Result<()> {
        (**self).multi_set(pairs)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }

    fn multi_remove(&self, keys: &[&str]) -> Result<()> {
        (**self).multi_remove(keys)
    }
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn multi_get(&self, keys: &[&str]) -> Result<Vec<(String, Option<String>)>> {
        let entries = self.entries();
        Ok(keys.iter().map(|k| (k.to_string(), entries.get(*k).cloned())).collect())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn multi_set(&self, pairs: &[(&str, String)]) -> Result<()> {
        let mut entries = self.entries();
        for (key, value) in pairs {
            entries.insert(key.to_string(), value.clone());
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries().remove(key);
        Ok(())
    }

    fn multi_remove(&self, keys: &[&str]) -> Result<()> {
        let mut entries = self.entries();
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }
}

/// File-backed store.
///
/// The whole map lives in one JSON object. Writes go to a sibling temp file
/// which is fsynced and renamed over the original, so a crash leaves either
/// the old or the new document, never a torn one.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock_path: PathBuf,
    /// Serializes callers within this process; the lock file covers others.
    guard: Mutex<()>,
}

impl FileStore {
    /// Opens (or prepares to create) a store at the given path.
    ///
    /// The file itself is created on first write.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut lock_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        lock_name.push(".lock");
        let lock_path = path.with_file_name(lock_name);

        Ok(FileStore { path, lock_path, guard: Mutex::new(()) })
    }

    /// Default location: `<data dir>/tether/store.json`.
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::data_dir()
            .ok_or_else(|| Error::Storage("could not determine data directory".to_string()))?;
        Ok(base.join(APP_DIR_NAME).join(STORE_FILE_NAME))
    }

    /// Returns the path of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self, exclusive: bool) -> Result<(MutexGuard<'_, ()>, File)> {
        let guard = self.guard.lock().unwrap_or_else(|e| e.into_inner());
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)?;
        if exclusive {
            fs2::FileExt::lock_exclusive(&file)?;
        } else {
            fs2::FileExt::lock_shared(&file)?;
        }
        Ok((guard, file))
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content)
            .map_err(|e| Error::CorruptedData(format!("{}: {}", self.path.display(), e)))
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<()> {
        let mut tmp_name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        let json = serde_json::to_string(map)?;
        let mut file = File::create(&tmp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, &self.path)?;

        Ok(())
    }

    fn update<F>(&self, apply: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> bool,
    {
        let (_guard, _lock) = self.lock(true)?;
        let mut map = self.read_map()?;
        if apply(&mut map) {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let (_guard, _lock) = self.lock(false)?;
        Ok(self.read_map()?.remove(key))
    }

    fn multi_get(&self, keys: &[&str]) -> Result<Vec<(String, Option<String>)>> {
        let (_guard, _lock) = self.lock(false)?;
        let map = self.read_map()?;
        Ok(keys.iter().map(|k| (k.to_string(), map.get(*k).cloned())).collect())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.update(|map| {
            map.insert(key.to_string(), value.to_string());
            true
        })
    }

    fn multi_set(&self, pairs: &[(&str, String)]) -> Result<()> {
        if pairs.is_empty() {
            return Ok(());
        }
        self.update(|map| {
            for (key, value) in pairs {
                map.insert(key.to_string(), value.clone());
            }
            true
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(|map| map.remove(key).is_some())
    }

    fn multi_remove(&self, keys: &[&str]) -> Result<()> {
        self.update(|map| {
            let mut changed = false;
            for key in keys {
                changed |= map.remove(*key).is_some();
            }
            changed
        })
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

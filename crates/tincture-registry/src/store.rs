//! Durable storage for registry entries.
//!
//! # File Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "overlays": {
//!     "com.tincture.overlay.ocean_1760000000000_0": {
//!       "identity": "com.tincture.overlay.ocean_1760000000000_0",
//!       "display_name": "Ocean",
//!       "enabled": true,
//!       "priority": 0,
//!       ...
//!     }
//!   }
//! }
//! ```
//!
//! Writes go to `<file>.json.tmp` and are renamed over the real file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::entry::OverlayEntry;
use crate::error::StoreError;

/// Current file format version.
pub const FORMAT_VERSION: u64 = 1;

pub type Table = BTreeMap<String, OverlayEntry>;

/// Keyed persistence for [`OverlayEntry`] records.
///
/// `put` and `remove` are durable when they return `Ok`.
pub trait RegistryStore: Send + Sync {
    fn load(&self) -> Result<Table, StoreError>;
    fn put(&self, entry: &OverlayEntry) -> Result<(), StoreError>;
    fn remove(&self, identity: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct RegistryFile {
    version: u64,
    #[serde(default)]
    overlays: Table,
}

/// One JSON document holding every entry.
///
/// The store keeps a mirror of the file so each write rewrites the whole
/// document without re-reading it.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    mirror: Mutex<Table>,
}

impl JsonFileStore {
    /// Nothing is read until [`load`](RegistryStore::load).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mirror: Mutex::new(Table::new()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn mirror(&self) -> MutexGuard<'_, Table> {
        self.mirror.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn read_file(&self) -> Result<Table, StoreError> {
        if !self.path.exists() {
            return Ok(Table::new());
        }
        let contents = std::fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        let file: RegistryFile =
            serde_json::from_str(&contents).map_err(|e| StoreError::Parse {
                path: self.path.clone(),
                message: e.to_string(),
            })?;
        if file.version != FORMAT_VERSION {
            return Err(StoreError::Version {
                found: file.version,
                expected: FORMAT_VERSION,
            });
        }
        Ok(file.overlays)
    }

    fn write_file(&self, overlays: &Table) -> Result<(), StoreError> {
        #[derive(Serialize)]
        struct Borrowed<'a> {
            version: u64,
            overlays: &'a Table,
        }
        let json = serde_json::to_string_pretty(&Borrowed {
            version: FORMAT_VERSION,
            overlays,
        })
        .map_err(StoreError::Serialize)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let temp = self.path.with_extension("json.tmp");
        std::fs::write(&temp, json).map_err(|e| self.io_error(e))?;
        std::fs::rename(&temp, &self.path).map_err(|e| self.io_error(e))?;
        Ok(())
    }

    /// Apply `change` to a copy of the mirror, persist it, then keep it.
    fn commit(&self, change: impl FnOnce(&mut Table)) -> Result<(), StoreError> {
        let mut mirror = self.mirror();
        let mut next = mirror.clone();
        change(&mut next);
        self.write_file(&next)?;
        *mirror = next;
        Ok(())
    }
}

impl RegistryStore for JsonFileStore {
    fn load(&self) -> Result<Table, StoreError> {
        let overlays = self.read_file()?;
        *self.mirror() = overlays.clone();
        Ok(overlays)
    }

    fn put(&self, entry: &OverlayEntry) -> Result<(), StoreError> {
        self.commit(|table| {
            table.insert(entry.identity.clone(), entry.clone());
        })
    }

    fn remove(&self, identity: &str) -> Result<(), StoreError> {
        self.commit(|table| {
            table.remove(identity);
        })
    }
}

/// Volatile store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<Table>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing entries.
    #[must_use]
    pub fn with_entries(entries: impl IntoIterator<Item = OverlayEntry>) -> Self {
        let store = Self::new();
        store
            .lock()
            .extend(entries.into_iter().map(|e| (e.identity.clone(), e)));
        store
    }

    /// Make subsequent writes fail with [`StoreError::Unavailable`].
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Current contents.
    #[must_use]
    pub fn snapshot(&self) -> Table {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }
}

impl RegistryStore for MemoryStore {
    fn load(&self) -> Result<Table, StoreError> {
        Ok(self.snapshot())
    }

    fn put(&self, entry: &OverlayEntry) -> Result<(), StoreError> {
        self.check_writable()?;
        self.lock().insert(entry.identity.clone(), entry.clone());
        Ok(())
    }

    fn remove(&self, identity: &str) -> Result<(), StoreError> {
        self.check_writable()?;
        self.lock().remove(identity);
        Ok(())
    }
}

impl<S: RegistryStore + ?Sized> RegistryStore for std::sync::Arc<S> {
    fn load(&self) -> Result<Table, StoreError> {
        (**self).load()
    }

    fn put(&self, entry: &OverlayEntry) -> Result<(), StoreError> {
        (**self).put(entry)
    }

    fn remove(&self, identity: &str) -> Result<(), StoreError> {
        (**self).remove(identity)
    }
}

//! Durable unread counters.
//!
//! The counters live in a single JSON file so they survive a restart. Every
//! mutation goes through [`UnreadLedger::update`], which applies the change to
//! a copy, writes the copy through to storage, and only then commits it in
//! memory. A failed write therefore leaves memory and disk in agreement.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::{debug, warn};

use support_chat_core::{AdminId, UnreadCounts};

/// Errors that can occur when reading or writing unread counters.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem error.
    #[error("unread storage I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stored data is not a valid counter map.
    #[error("unread storage at {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Storage refused the write.
    #[error("unread storage unavailable: {0}")]
    Unavailable(String),
}

/// Backing store for the unread counter map.
pub trait UnreadStorage: Send {
    /// Read the stored counters. Missing storage reads as empty.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the storage cannot be read or parsed.
    fn load(&self) -> Result<UnreadCounts, StorageError>;

    /// Replace the stored counters.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    fn save(&self, counts: &UnreadCounts) -> Result<(), StorageError>;
}

/// Counters stored as a JSON object in one file.
///
/// Writes go to a sibling temp file and are renamed into place, so a crash
/// mid-write never leaves a truncated file behind.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl UnreadStorage for JsonFileStorage {
    fn load(&self) -> Result<UnreadCounts, StorageError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(UnreadCounts::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        if raw.trim().is_empty() {
            return Ok(UnreadCounts::new());
        }

        serde_json::from_str(&raw).map_err(|source| StorageError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, counts: &UnreadCounts) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let json = serde_json::to_vec_pretty(counts).map_err(|source| StorageError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;

        debug!(path = %self.path.display(), admins = counts.len(), "Unread counters saved");
        Ok(())
    }
}

/// In-memory storage, shared between clones.
///
/// Used when persistence is disabled and in tests; writes can be made to fail
/// to exercise rollback.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<MemoryStorageInner>>,
}

#[derive(Debug, Default)]
struct MemoryStorageInner {
    counts: UnreadCounts,
    fail_writes: bool,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated storage.
    #[must_use]
    pub fn with_counts(counts: UnreadCounts) -> Self {
        let storage = Self::new();
        storage.lock().counts = counts;
        storage
    }

    /// Make subsequent writes fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Current stored counters.
    #[must_use]
    pub fn stored(&self) -> UnreadCounts {
        self.lock().counts.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryStorageInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl UnreadStorage for MemoryStorage {
    fn load(&self) -> Result<UnreadCounts, StorageError> {
        Ok(self.stored())
    }

    fn save(&self, counts: &UnreadCounts) -> Result<(), StorageError> {
        let mut inner = self.lock();
        if inner.fail_writes {
            return Err(StorageError::Unavailable("writes disabled".to_string()));
        }
        inner.counts = counts.clone();
        Ok(())
    }
}

/// Unread counters kept in memory and written through to storage.
pub struct UnreadLedger {
    storage: Box<dyn UnreadStorage>,
    counts: UnreadCounts,
}

impl std::fmt::Debug for UnreadLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnreadLedger")
            .field("counts", &self.counts)
            .finish_non_exhaustive()
    }
}

impl UnreadLedger {
    /// Open the ledger, reading the stored counters.
    ///
    /// Unreadable storage is logged and treated as empty; the next successful
    /// write replaces it.
    pub fn open(storage: impl UnreadStorage + 'static) -> Self {
        let counts = storage.load().unwrap_or_else(|e| {
            warn!(error = %e, "Could not read unread counters, starting empty");
            UnreadCounts::new()
        });
        Self {
            storage: Box::new(storage),
            counts,
        }
    }

    /// Current counters.
    #[must_use]
    pub const fn counts(&self) -> &UnreadCounts {
        &self.counts
    }

    /// Apply a mutation transactionally.
    ///
    /// Returns `Ok(false)` when the mutation changed nothing (no write is
    /// issued), `Ok(true)` after a successful write.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails; in-memory counters are left
    /// untouched in that case.
    pub fn update<F>(&mut self, mutate: F) -> Result<bool, StorageError>
    where
        F: FnOnce(&mut UnreadCounts),
    {
        let mut next = self.counts.clone();
        mutate(&mut next);
        if next == self.counts {
            return Ok(false);
        }

        self.storage.save(&next)?;
        self.counts = next;
        Ok(true)
    }

    /// Add `by` unread messages for an admin.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    pub fn increment(&mut self, admin: &AdminId, by: u32) -> Result<bool, StorageError> {
        self.update(|counts| counts.increment(admin, by))
    }

    /// Remove an admin's counter entirely.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    pub fn clear(&mut self, admin: &AdminId) -> Result<bool, StorageError> {
        self.update(|counts| {
            counts.remove(admin);
        })
    }

    /// Replace every counter.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    pub fn replace(&mut self, replacement: UnreadCounts) -> Result<bool, StorageError> {
        self.update(|counts| *counts = replacement)
    }
}

//! JSON file storage for the daily rate history.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{Days, NaiveDate};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::model::{RateHistory, RateRecord};

/// Days of history kept by default.
pub const DEFAULT_RETENTION_DAYS: u64 = 14;

/// Errors that can occur while persisting the rate history.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to access rates file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize rates: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Rates file {} is corrupted: {source}", .path.display())]
    Corrupted {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Rate history stored as a pretty-printed JSON object keyed by date.
///
/// Writes go to a temporary file in the same directory which is then renamed
/// over the target, so the bot never reads a half-written file while the
/// fetcher is saving.
#[derive(Debug)]
pub struct RateStorage {
    path: PathBuf,
    retention_days: u64,
    write_lock: Mutex<()>,
}

impl RateStorage {
    /// Opens the storage, creating an empty history file if none exists.
    pub fn open(path: impl Into<PathBuf>, retention_days: u64) -> Result<Self, StorageError> {
        let storage = Self::at(path, retention_days);
        if !storage.path.exists() {
            storage.save(&RateHistory::new())?;
            info!("Created new file: {}", storage.path.display());
        }
        Ok(storage)
    }

    /// Creates a read-oriented handle without touching the filesystem.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>, retention_days: u64) -> Self {
        Self {
            path: path.into(),
            retention_days,
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the history file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the history.
    ///
    /// A missing, empty, or corrupted file yields an empty history.
    #[must_use]
    pub fn load(&self) -> RateHistory {
        debug!("Loading rates from {}", self.path.display());

        self.read_existing().unwrap_or_else(|e| {
            warn!("{}. Starting with an empty dataset.", e);
            RateHistory::new()
        })
    }

    /// Reads the history, treating only a missing or empty file as empty.
    fn read_existing(&self) -> Result<RateHistory, StorageError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(RateHistory::new()),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(RateHistory::new());
        }

        serde_json::from_str(&content).map_err(|source| StorageError::Corrupted {
            path: self.path.clone(),
            source,
        })
    }

    /// Replaces the history file with `history`.
    pub fn save(&self, history: &RateHistory) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        let mut serializer = serde_json::Serializer::with_formatter(
            &mut tmp,
            serde_json::ser::PrettyFormatter::with_indent(b"    "),
        );
        history.serialize(&mut serializer)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        info!("Data saved successfully to {}", self.path.display());
        Ok(())
    }

    /// Stores `record` as the entry for `date`, replacing any existing one,
    /// and drops entries older than the retention window.
    ///
    /// A history file that exists but cannot be parsed is left untouched
    /// and [`StorageError::Corrupted`] is returned.
    pub fn upsert(&self, date: NaiveDate, record: RateRecord) -> Result<RateHistory, StorageError> {
        info!("Updating or adding record for date: {}", date);

        let mut history = self.read_existing()?;
        history.insert(date, record);
        let removed = prune(&mut history, date, self.retention_days);
        if removed > 0 {
            debug!("Removed {} expired records", removed);
        }

        self.save(&history)?;
        Ok(history)
    }
}

/// Removes records dated before `today - retention_days`.
///
/// Returns the number of removed records.
pub fn prune(history: &mut RateHistory, today: NaiveDate, retention_days: u64) -> usize {
    let Some(cutoff) = today.checked_sub_days(Days::new(retention_days)) else {
        return 0;
    };
    let before = history.len();
    history.retain(|date, _| *date >= cutoff);
    before - history.len()
}

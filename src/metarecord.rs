//! The index over a managed root
//!
//! A [`MetaRecord`] tracks every snapshot [`Record`](crate::record::Record)
//! created under one destination folder (the *managed root*), by name and
//! timestamp, plus a pointer to the most recent one. It is created on the
//! first managed backup of a root and loaded on every subsequent operation
//! against that root.
//!
//! The index lives at `<root>/records/metarecord.rec.json`; a root is
//! "managed" exactly when that file exists.

use crate::error::{Result, VaultError};
use crate::record::{self, Record, RECORD_FOLDER};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Filename of the index under the records folder
pub const METARECORD_NAME: &str = "metarecord.rec.json";

/// Reference to a record by name and creation timestamp
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordRef {
    /// The record's unique name
    pub name: String,
    /// The record's creation timestamp
    pub timestamp: DateTime<Utc>,
}

impl RecordRef {
    fn of(record: &Record) -> Self {
        Self {
            name: record.name.clone(),
            timestamp: record.timestamp,
        }
    }
}

/// Index of all records for one managed root
///
/// Invariant: `latest` is the reference with the maximum timestamp among
/// `records`; on equal timestamps the most recently added wins. The index
/// owns the set of record identities for its root - records are registered
/// here once saved, and never removed (cleaning deletes physical
/// duplication, not history).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaRecord {
    #[serde(skip)]
    root: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    latest: Option<RecordRef>,
    records: Vec<RecordRef>,
}

impl MetaRecord {
    /// Create a fresh, empty index for a root (not yet persisted)
    pub fn create_new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            latest: None,
            records: Vec::new(),
        }
    }

    /// Path of the index file under a root
    pub fn index_path(root: &Path) -> PathBuf {
        root.join(RECORD_FOLDER).join(METARECORD_NAME)
    }

    /// Whether a root is managed (its index file exists)
    pub fn is_managed(root: &Path) -> bool {
        Self::index_path(root).is_file()
    }

    /// Load the index of a managed root
    ///
    /// Returns `Ok(None)` when the root is not managed - absence is a
    /// state, not an error.
    pub fn load_from(root: &Path) -> Result<Option<MetaRecord>> {
        let path = Self::index_path(root);
        if !path.is_file() {
            return Ok(None);
        }
        let data = fs::read_to_string(&path)?;
        let mut meta: MetaRecord = serde_json::from_str(&data)?;
        meta.root = root.to_path_buf();
        Ok(Some(meta))
    }

    /// Load the index, or create an empty one for a not-yet-managed root
    pub fn load_or_create(root: &Path) -> Result<MetaRecord> {
        Ok(Self::load_from(root)?.unwrap_or_else(|| Self::create_new(root)))
    }

    /// The managed root this index belongs to
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All registered record references, in registration order
    pub fn records(&self) -> &[RecordRef] {
        &self.records
    }

    /// Reference to the most recent record, if any
    pub fn latest(&self) -> Option<&RecordRef> {
        self.latest.as_ref()
    }

    /// Load the most recent record from disk
    ///
    /// # Errors
    ///
    /// [`VaultError::NoRecord`] when no record has ever been registered -
    /// the legitimate first-run state.
    pub fn latest_record(&self) -> Result<Record> {
        match &self.latest {
            Some(latest) => Record::load_from(&self.root, &latest.name),
            None => Err(VaultError::NoRecord),
        }
    }

    /// Load every registered record from disk, in registration order
    pub fn load_all_records(&self) -> Result<Vec<Record>> {
        self.records
            .iter()
            .map(|r| Record::load_from(&self.root, &r.name))
            .collect()
    }

    /// Register a record in the index
    ///
    /// Updates `latest` when the record's timestamp is greater than or
    /// equal to the current latest - on a timestamp tie the newer addition
    /// wins. Registration order is preserved in `records` regardless of
    /// timestamps, so out-of-order additions (e.g. from a rebuild) still
    /// resolve `latest` correctly.
    pub fn add_record(&mut self, record: &Record) {
        let record_ref = RecordRef::of(record);
        let takes_latest = self
            .latest
            .as_ref()
            .map(|l| record_ref.timestamp >= l.timestamp)
            .unwrap_or(true);
        if takes_latest {
            debug!(name = %record_ref.name, "new latest record");
            self.latest = Some(record_ref.clone());
        }
        self.records.push(record_ref);
    }

    /// Persist the index under its root
    ///
    /// Creates the records folder on first use; the index file is replaced
    /// atomically.
    ///
    /// # Errors
    ///
    /// [`VaultError::NotADirectory`] if the root does not exist or is not
    /// a directory.
    pub fn save(&self) -> Result<()> {
        if !self.root.is_dir() {
            return Err(VaultError::NotADirectory(self.root.clone()));
        }
        let record_dir = self.root.join(RECORD_FOLDER);
        if !record_dir.exists() {
            fs::create_dir(&record_dir)?;
        }
        let data = serde_json::to_vec(self)?;
        record::atomic_write(&record_dir.join(METARECORD_NAME), &data)
    }
}

/// Whether a directory entry name is reserved for the index
pub fn is_reserved_folder(name: &str) -> bool {
    name == RECORD_FOLDER
}

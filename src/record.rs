//! Snapshot records and the snapshot diff
//!
//! A [`Record`] is the metadata of one snapshot: its unique name (also its
//! filename in the index folder), the data subfolder holding its physically
//! copied files, its creation timestamp, and one [`FileEntry`] per tracked
//! file. Records are created in memory at the start of a backup run,
//! populated as files are visited, persisted once at the end, and read-only
//! thereafter - except for the cleaner's provenance rewrite.
//!
//! ## Provenance
//!
//! A `FileEntry`'s `source` names the record whose data folder physically
//! holds the bytes for that path. For a freshly copied file that is the
//! owning record itself; for a file unchanged since an earlier snapshot it
//! is whichever older record still owns the bytes. Resolving
//! `(source record's folder, path)` always yields the physical file.
//!
//! ## Persisted layout
//!
//! ```text
//! <root>/records/<RecordName>.rec.json   one file per record
//! <root>/records/metarecord.rec.json    the index (see `metarecord`)
//! <root>/<folder>/...                   physical snapshot contents
//! ```

use crate::error::{Result, VaultError};
use crate::hasher;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Extension of persisted record files
pub const RECORD_EXT: &str = ".rec.json";
/// Reserved subfolder of a managed root holding the index
pub const RECORD_FOLDER: &str = "records";

/// One tracked file within a record
///
/// Identity within a record is the relative `path`; `hash` is the SHA-256
/// content digest; `source` is the name of the record physically holding
/// the bytes (see module docs on provenance).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileEntry {
    /// Path relative to the snapshot data folder, `/`-separated
    #[serde(rename = "file")]
    pub path: String,
    /// SHA-256 content digest, lowercase hex
    pub hash: String,
    /// Name of the record whose data folder holds the bytes
    pub source: String,
}

/// Metadata of one snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Record {
    /// Unique name, also used as the record's filename
    pub name: String,
    /// Data subfolder under the managed root holding this snapshot's files
    pub folder: String,
    /// Creation instant - set when the backup *starts*, not when the record
    /// is saved; latest-resolution and diff ordering depend on this
    pub timestamp: DateTime<Utc>,
    /// Tracked files, in visit order
    pub files: Vec<FileEntry>,
}

/// Difference between two records, computed by [`Record::diff`]
///
/// The four sets are disjoint and cover every path present in either
/// record. Pair entries are ordered `(self, other)`.
#[derive(Debug, Clone, Default)]
pub struct RecordDiff {
    /// Present in `other` only
    pub added: Vec<FileEntry>,
    /// Same path, differing hash
    pub changed: Vec<(FileEntry, FileEntry)>,
    /// Present in `self` only
    pub removed: Vec<FileEntry>,
    /// Same path, same hash
    pub unchanged: Vec<(FileEntry, FileEntry)>,
}

impl Record {
    /// Create a record timestamped now
    pub fn new(name: impl Into<String>, folder: impl Into<String>) -> Self {
        Self::with_timestamp(name, folder, Utc::now())
    }

    /// Create a record with an explicit timestamp
    pub fn with_timestamp(
        name: impl Into<String>,
        folder: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            folder: folder.into(),
            timestamp,
            files: Vec::new(),
        }
    }

    /// Path of a record file under a managed root
    pub fn record_path(root: &Path, name: &str) -> PathBuf {
        root.join(RECORD_FOLDER).join(format!("{name}{RECORD_EXT}"))
    }

    /// Load a record by name from a managed root
    ///
    /// # Errors
    ///
    /// [`VaultError::RecordNotFound`] if no record file of that name
    /// exists; [`VaultError::Json`] if the file is malformed.
    pub fn load_from(root: &Path, name: &str) -> Result<Record> {
        let path = Self::record_path(root, name);
        if !path.is_file() {
            return Err(VaultError::RecordNotFound(name.to_string()));
        }
        let data = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Persist this record under a managed root
    ///
    /// Creates the index folder on first use and replaces any existing
    /// record file atomically (write to a temporary file, then rename).
    /// Registration in the metarecord is a separate, explicit step
    /// ([`crate::metarecord::MetaRecord::add_record`]).
    ///
    /// # Errors
    ///
    /// [`VaultError::NotADirectory`] if the root does not exist or is not
    /// a directory.
    pub fn save(&self, root: &Path) -> Result<()> {
        if !root.is_dir() {
            return Err(VaultError::NotADirectory(root.to_path_buf()));
        }
        let record_dir = root.join(RECORD_FOLDER);
        if !record_dir.exists() {
            fs::create_dir(&record_dir)?;
        }
        let data = serde_json::to_vec(self)?;
        atomic_write(&Self::record_path(root, &self.name), &data)
    }

    /// Absolute path of this record's data folder
    pub fn data_path(&self, root: &Path) -> PathBuf {
        root.join(&self.folder)
    }

    /// Hash a source file and append its entry
    ///
    /// `relative` is the path under the data folder (e.g.
    /// `Documents/file.txt`), `source` the owning record name - defaults to
    /// this record's own name for a freshly copied file.
    ///
    /// # Errors
    ///
    /// Propagates hashing I/O errors; no entry is appended on failure.
    pub fn add_file(
        &mut self,
        abs_path: &Path,
        relative: impl Into<String>,
        source: Option<&str>,
    ) -> Result<&FileEntry> {
        let entry = FileEntry {
            path: relative.into(),
            hash: hasher::hash_file(abs_path)?,
            source: source.unwrap_or(&self.name).to_string(),
        };
        self.files.push(entry);
        Ok(self.files.last().expect("entry just pushed"))
    }

    /// Find an entry by relative path (exact, case-sensitive)
    pub fn find(&self, relative: &str) -> Option<&FileEntry> {
        self.files.iter().find(|f| f.path == relative)
    }

    /// Compute the difference between this record and another
    ///
    /// `self` is the reference point; by the callers' convention it is the
    /// older of the two, but the computation itself is pure metadata
    /// comparison and not time-aware. Entries only in `other` are `added`,
    /// entries only in `self` are `removed`; matching paths are split into
    /// `changed`/`unchanged` by hash, pairs ordered `(self, other)`.
    pub fn diff(&self, other: &Record) -> RecordDiff {
        let mut own: HashMap<&str, &FileEntry> = HashMap::with_capacity(self.files.len());
        for entry in &self.files {
            own.insert(entry.path.as_str(), entry);
        }

        let mut diff = RecordDiff::default();
        for theirs in &other.files {
            match own.remove(theirs.path.as_str()) {
                None => diff.added.push(theirs.clone()),
                Some(ours) if ours.hash != theirs.hash => {
                    diff.changed.push((ours.clone(), theirs.clone()));
                }
                Some(ours) => diff.unchanged.push((ours.clone(), theirs.clone())),
            }
        }
        // Anything left unmatched exists only on our side; report in
        // original file order rather than map order.
        for entry in &self.files {
            if own.contains_key(entry.path.as_str()) {
                diff.removed.push(entry.clone());
            }
        }
        diff
    }
}

/// Write a file atomically by replacement
///
/// The index is always read fully and rewritten whole; writing to a
/// sibling temp file and renaming keeps a crash from leaving a
/// half-written record visible.
pub(crate) fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, content)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, hash: &str, source: &str) -> FileEntry {
        FileEntry {
            path: path.to_string(),
            hash: hash.to_string(),
            source: source.to_string(),
        }
    }

    fn record_with(name: &str, entries: Vec<FileEntry>) -> Record {
        let mut rec = Record::new(name, format!("{name}_data"));
        rec.files = entries;
        rec
    }

    #[test]
    fn test_diff_partitions() {
        let older = record_with(
            "A",
            vec![
                entry("keep.txt", "h1", "A"),
                entry("change.txt", "h2", "A"),
                entry("gone.txt", "h3", "A"),
            ],
        );
        let newer = record_with(
            "B",
            vec![
                entry("keep.txt", "h1", "B"),
                entry("change.txt", "h2x", "B"),
                entry("new.txt", "h4", "B"),
            ],
        );

        let diff = older.diff(&newer);
        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.added[0].path, "new.txt");
        assert_eq!(diff.removed.len(), 1);
        assert_eq!(diff.removed[0].path, "gone.txt");
        assert_eq!(diff.changed.len(), 1);
        let (old, new) = &diff.changed[0];
        assert_eq!(old.path, "change.txt");
        assert_eq!(old.hash, "h2");
        assert_eq!(new.hash, "h2x");
        assert_eq!(diff.unchanged.len(), 1);
        let (old, new) = &diff.unchanged[0];
        assert_eq!(old.path, "keep.txt");
        assert_eq!(old.hash, new.hash);
    }

    #[test]
    fn test_diff_is_asymmetric_consistent() {
        let a = record_with("A", vec![entry("only-a", "h", "A")]);
        let b = record_with("B", vec![entry("only-b", "h", "B")]);

        let ab = a.diff(&b);
        let ba = b.diff(&a);
        assert_eq!(ab.added, ba.removed);
        assert_eq!(ab.removed, ba.added);
    }

    #[test]
    fn test_diff_is_case_sensitive() {
        let a = record_with("A", vec![entry("File.txt", "h", "A")]);
        let b = record_with("B", vec![entry("file.txt", "h", "B")]);

        let diff = a.diff(&b);
        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.removed.len(), 1);
        assert!(diff.unchanged.is_empty());
    }

    #[test]
    fn test_wire_field_names() {
        let rec = record_with("Rec A", vec![entry("dir/f.txt", "abc", "Rec A")]);
        let json = serde_json::to_string(&rec).unwrap();
        assert!(json.contains("\"file\":\"dir/f.txt\""));
        assert!(json.contains("\"hash\":\"abc\""));
        assert!(json.contains("\"source\":\"Rec A\""));
        assert!(json.contains("\"folder\":\"Rec A_data\""));
    }

    #[test]
    fn test_load_missing_record() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let err = Record::load_from(temp_dir.path(), "nope").unwrap_err();
        assert!(matches!(err, VaultError::RecordNotFound(_)));
    }

    #[test]
    fn test_save_requires_directory() {
        let rec = record_with("Rec A", Vec::new());
        let err = rec.save(Path::new("/definitely/not/a/real/root")).unwrap_err();
        assert!(matches!(err, VaultError::NotADirectory(_)));
    }
}

//! Reconstructing history from unmanaged folders
//!
//! A destination may hold snapshot folders the index knows nothing about:
//! manually created copies, or history from before the root was managed.
//! The rebuilder discovers those folders, proposes one candidate
//! [`Record`] per folder (named and timestamped from the directory's
//! creation time), lets the caller rename, retimestamp, or exclude
//! candidates, and then commits: walking each included folder, hashing
//! every file it already contains, and registering the synthesized record
//! in the metarecord.
//!
//! Since the discovered files are pre-existing physical copies, every
//! synthesized entry's provenance is the record's own name - running the
//! [cleaner](crate::cleaner) afterwards collapses the duplication the
//! rebuilt history typically carries.

use crate::error::Result;
use crate::metarecord::{self, MetaRecord};
use crate::progress::Update;
use crate::record::Record;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

/// A discovered folder and its proposed record
#[derive(Debug, Clone)]
pub struct Candidate {
    /// The record that will be synthesized for this folder
    pub record: Record,
    /// Whether the folder takes part in the commit (default: yes)
    pub included: bool,
}

/// Discovers unindexed snapshot folders and synthesizes records for them
#[derive(Debug)]
pub struct Rebuilder {
    meta: MetaRecord,
    candidates: Vec<Candidate>,
}

impl Rebuilder {
    /// Discover candidates under a managed root's index
    ///
    /// Immediate subdirectories of the root are offered, excluding the
    /// reserved index folder and folders an already-registered record
    /// owns as its data folder.
    pub fn new(meta: MetaRecord) -> Result<Self> {
        let mut rebuilder = Self {
            meta,
            candidates: Vec::new(),
        };
        rebuilder.discover()?;
        Ok(rebuilder)
    }

    /// Load (or create) the index for `root`, then discover
    pub fn open(root: &Path) -> Result<Self> {
        Self::new(MetaRecord::load_or_create(root)?)
    }

    fn discover(&mut self) -> Result<()> {
        let root = self.meta.root();
        if !root.exists() {
            return Ok(());
        }
        let known_folders: Vec<String> = self
            .meta
            .load_all_records()?
            .into_iter()
            .map(|r| r.folder)
            .collect();

        for entry in fs::read_dir(root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let folder = entry.file_name().to_string_lossy().into_owned();
            if metarecord::is_reserved_folder(&folder) {
                continue;
            }
            if known_folders.iter().any(|known| known == &folder) {
                debug!(folder, "already indexed, not offering");
                continue;
            }
            let timestamp = folder_timestamp(&entry.path())?;
            let stamp = timestamp.format("%Y-%m-%d_%H-%M-%S");
            self.candidates.push(Candidate {
                record: Record::with_timestamp(
                    format!("Backup for {stamp}"),
                    folder,
                    timestamp,
                ),
                included: true,
            });
        }
        info!(found = self.candidates.len(), "discovered unindexed folders");
        Ok(())
    }

    /// The discovered candidates, in discovery order
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// The proposed records (included or not)
    pub fn records(&self) -> Vec<&Record> {
        self.candidates.iter().map(|c| &c.record).collect()
    }

    /// Adjust a candidate before commit, matched by its folder name
    ///
    /// Any of the name, timestamp, and inclusion flag may be changed;
    /// `None` leaves the field as discovered. Returns whether a candidate
    /// matched.
    pub fn configure_directory(
        &mut self,
        folder: &str,
        name: Option<String>,
        timestamp: Option<DateTime<Utc>>,
        included: Option<bool>,
    ) -> bool {
        let Some(candidate) = self
            .candidates
            .iter_mut()
            .find(|c| c.record.folder == folder)
        else {
            return false;
        };
        if let Some(name) = name {
            candidate.record.name = name;
        }
        if let Some(timestamp) = timestamp {
            candidate.record.timestamp = timestamp;
        }
        if let Some(included) = included {
            candidate.included = included;
        }
        true
    }

    /// Commit: hash every included folder's contents into records
    ///
    /// Walks each included candidate's folder, hashes every file into a
    /// [`crate::record::FileEntry`] owned by the record itself, saves the
    /// record, and registers it; the metarecord is persisted once at the
    /// end. Excluded candidates leave no trace in the index.
    pub fn generate_records(&mut self, progress: impl Fn(Update)) -> Result<()> {
        let root = self.meta.root().to_path_buf();
        let total = self.candidates.iter().filter(|c| c.included).count();
        let mut index = 0usize;

        let meta = &mut self.meta;
        for candidate in self.candidates.iter_mut().filter(|c| c.included) {
            let record = &mut candidate.record;
            let destination = root.join(&record.folder);
            progress(Update::major(
                format!("Building {}", destination.display()),
                index,
                total,
            ));
            info!("building record for {}", destination.display());

            record.files.clear();
            for entry in WalkDir::new(&destination) {
                let entry = entry?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let relative = entry
                    .path()
                    .strip_prefix(&destination)
                    .expect("walked path is under its root")
                    .to_string_lossy()
                    .replace('\\', "/");
                record.add_file(entry.path(), relative, None)?;
            }
            record.save(&root)?;
            meta.add_record(record);
            index += 1;
        }
        meta.save()?;
        progress(Update::major("Complete", total, total));
        Ok(())
    }

    /// Hand the (possibly updated) index back to the caller
    pub fn into_metarecord(self) -> MetaRecord {
        self.meta
    }
}

/// Timestamp for a discovered folder: creation time where the platform
/// records one, modification time otherwise
fn folder_timestamp(path: &Path) -> Result<DateTime<Utc>> {
    let metadata = fs::metadata(path)?;
    let time = metadata.created().or_else(|_| metadata.modified())?;
    Ok(time.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_discover_skips_reserved_and_indexed() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        for dir in ["Dir A", "Dir B", "Dir C"] {
            fs::create_dir(root.join(dir)).unwrap();
        }

        let mut meta = MetaRecord::create_new(root);
        meta.save().unwrap(); // creates the reserved records folder

        // Pre-index Dir C so discovery must not re-offer it.
        let mut known = Record::new("Known", "Dir C");
        known.save(root).unwrap();
        meta.add_record(&known);
        meta.save().unwrap();

        let rebuilder = Rebuilder::new(meta).unwrap();
        let mut folders: Vec<&str> = rebuilder
            .records()
            .iter()
            .map(|r| r.folder.as_str())
            .collect();
        folders.sort_unstable();
        assert_eq!(folders, vec!["Dir A", "Dir B"]);
    }

    #[test]
    fn test_configure_directory() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("legacy")).unwrap();

        let mut rebuilder = Rebuilder::new(MetaRecord::create_new(root)).unwrap();
        assert!(rebuilder.configure_directory(
            "legacy",
            Some("Backup for 2020-01-01_00-00-00".to_string()),
            None,
            Some(false),
        ));
        assert!(!rebuilder.configure_directory("missing", None, None, None));

        let candidate = &rebuilder.candidates()[0];
        assert_eq!(candidate.record.name, "Backup for 2020-01-01_00-00-00");
        assert!(!candidate.included);
    }

    #[test]
    fn test_excluded_candidates_leave_no_trace() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("wanted")).unwrap();
        fs::write(root.join("wanted/file.txt"), "data").unwrap();
        fs::create_dir(root.join("unwanted")).unwrap();
        fs::write(root.join("unwanted/file.txt"), "data").unwrap();

        let mut rebuilder = Rebuilder::open(root).unwrap();
        rebuilder.configure_directory("unwanted", None, None, Some(false));
        rebuilder.generate_records(|_| {}).unwrap();

        let meta = rebuilder.into_metarecord();
        assert_eq!(meta.records().len(), 1);
        let record = meta.load_all_records().unwrap().pop().unwrap();
        assert_eq!(record.folder, "wanted");
        assert_eq!(record.files.len(), 1);
        assert_eq!(record.files[0].source, record.name);
    }
}

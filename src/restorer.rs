//! Reconstructing the full logical file set
//!
//! After deduplication the latest snapshot is *logically* complete but
//! *physically* partial: unchanged files live in whichever older snapshot
//! first copied them. The restorer resolves every entry of the latest
//! record to its physical owner and copies the result into an arbitrary
//! destination, producing one file per tracked relative path.
//!
//! The restore is idempotent and resumable: files already present at the
//! destination are skipped, and a missing physical source is reported and
//! skipped rather than failing the run.

use crate::error::{Result, VaultError};
use crate::metarecord::MetaRecord;
use crate::progress::Update;
use crate::task::{self, Task};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Outcome counters for a restore run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreStats {
    /// Files copied to the destination
    pub files_restored: usize,
    /// Files skipped because the destination already had them
    pub files_skipped: usize,
    /// Entries whose physical source file was missing
    pub files_missing: usize,
}

/// Copies the latest snapshot's logical view into a destination
#[derive(Debug)]
pub struct Restorer {
    meta: MetaRecord,
    destination: Option<PathBuf>,
}

impl Restorer {
    /// Create a restorer over a managed root's index
    pub fn new(meta: MetaRecord) -> Self {
        Self {
            meta,
            destination: None,
        }
    }

    /// Set the restore destination
    ///
    /// # Errors
    ///
    /// [`VaultError::Validation`] when the destination does not exist.
    pub fn set_destination(&mut self, destination: impl Into<PathBuf>) -> Result<()> {
        let destination = destination.into();
        if !destination.exists() {
            return Err(VaultError::validation(format!(
                "Restore destination {} does not exist",
                destination.display()
            )));
        }
        self.destination = Some(destination);
        Ok(())
    }

    /// Run the restore synchronously, reporting progress through `progress`
    pub fn perform_restore(&self, progress: impl Fn(Update)) -> Result<RestoreStats> {
        let destination = self
            .destination
            .as_deref()
            .ok_or_else(|| VaultError::validation("No restore destination set"))?;

        progress(Update::status("Loading records..."));
        let latest = self.meta.latest_record()?;
        let records = self.meta.load_all_records()?;

        progress(Update::status("Prepping file pairs..."));
        let total = latest.files.len();
        let mut pairs: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(total);
        for (i, entry) in latest.files.iter().enumerate() {
            progress(Update::major(
                format!("[{}] {}", entry.source, entry.path),
                i,
                total,
            ));
            // The latest record owns most entries; a differing source is
            // resolved through the index by name.
            let source_record = if entry.source == latest.name {
                &latest
            } else {
                records
                    .iter()
                    .find(|r| r.name == entry.source)
                    .ok_or_else(|| VaultError::RecordNotFound(entry.source.clone()))?
            };
            let from = source_record.data_path(self.meta.root()).join(&entry.path);
            let to = destination.join(&entry.path);
            progress(Update::minor(format!(
                "{}, {}",
                from.display(),
                to.display()
            )));
            pairs.push((from, to));
        }

        progress(Update::status("Records Loaded. Copying..."));
        let mut stats = RestoreStats::default();
        for (i, (from, to)) in pairs.iter().enumerate() {
            progress(Update::major(to.display().to_string(), i, total));
            if to.exists() {
                stats.files_skipped += 1;
                continue;
            }
            if !from.exists() {
                warn!(missing = %from.display(), "physical source file missing");
                progress(Update::major(
                    format!("[FILE MISSING] {} -> {}", from.display(), to.display()),
                    i,
                    total,
                ));
                stats.files_missing += 1;
                continue;
            }
            if let Some(parent) = to.parent() {
                if !parent.exists() {
                    fs::create_dir_all(parent)?;
                }
            }
            fs::copy(from, to)?;
            stats.files_restored += 1;
        }
        info!(
            restored = stats.files_restored,
            skipped = stats.files_skipped,
            missing = stats.files_missing,
            "restore finished"
        );
        progress(Update::status("Restore Complete!"));
        Ok(stats)
    }

    /// Run the restore on a background worker
    pub fn execute(self) -> Result<Task<RestoreStats>> {
        if self.destination.is_none() {
            return Err(VaultError::validation("No restore destination set"));
        }
        Ok(task::spawn(move |updates| {
            self.perform_restore(|update| {
                updates.send(update).ok();
            })
        }))
    }

    /// One-call restore of a managed root into a destination
    pub fn quick_restore(root: &Path, destination: &Path) -> Result<RestoreStats> {
        let meta = MetaRecord::load_from(root)?
            .ok_or_else(|| VaultError::validation(format!("{} is not managed", root.display())))?;
        let mut restorer = Restorer::new(meta);
        restorer.set_destination(destination)?;
        restorer.perform_restore(|_| {})
    }
}

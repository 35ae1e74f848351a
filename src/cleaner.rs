//! Redundant-copy garbage collection
//!
//! Consecutive snapshots of slowly-changing sources accumulate physical
//! duplicates: the same relative path with identical content copied into
//! more than one data folder (typically after a
//! [rebuild](crate::rebuilder), where every discovered folder owns all of
//! its files). The cleaner walks the full chronological chain of records,
//! finds those duplicates, deletes the newer physical copy, and repoints
//! the newer record's provenance at the snapshot that still holds the
//! bytes - collapsing chains of duplication transitively down to the first
//! owner.
//!
//! Cleaning is a two-phase operation: [`Cleaner::generate_diffs`] analyzes
//! and accumulates the doomed copies, then [`Cleaner::perform_clean`]
//! deletes them and persists the rewritten records. The metarecord itself
//! is never touched - no snapshot is removed from history, only physical
//! duplication.
//!
//! Guarantee: after cleaning, every file entry's `(source record's folder,
//! path)` physically exists with matching content; a snapshot's own
//! first-owner copy is never deleted.

use crate::error::Result;
use crate::metarecord::MetaRecord;
use crate::progress::Update;
use crate::record::Record;
use std::fs;
use tracing::{debug, info};

/// Analyzes and deletes physically duplicated snapshot files
#[derive(Debug)]
pub struct Cleaner {
    meta: MetaRecord,
    to_delete: Vec<(Record, Vec<String>)>,
}

impl Cleaner {
    /// Create a cleaner over a managed root's index
    pub fn new(meta: MetaRecord) -> Self {
        Self {
            meta,
            to_delete: Vec::new(),
        }
    }

    /// Records slated for physical deletion, with the doomed paths
    ///
    /// Populated by [`Cleaner::generate_diffs`]; each record carries its
    /// already-rewritten provenance, persisted when the clean is performed.
    pub fn pending(&self) -> &[(Record, Vec<String>)] {
        &self.to_delete
    }

    /// Total number of files slated for deletion
    pub fn file_count(&self) -> usize {
        self.to_delete.iter().map(|(_, files)| files.len()).sum()
    }

    /// The index this cleaner operates over
    pub fn metarecord(&self) -> &MetaRecord {
        &self.meta
    }

    /// Compute the change history and collect redundant physical copies
    ///
    /// Loads every record, sorts them ascending by timestamp, and diffs
    /// each adjacent (older, newer) pair. For every unchanged pair the
    /// newer entry's provenance is rewritten to the older entry's already
    /// resolved source; the newer physical copy is slated for deletion
    /// when the newer record still owned it. Because pairs are processed
    /// in chronological order, chains of duplication collapse to the
    /// first owner in a single pass.
    pub fn generate_diffs(&mut self, progress: impl Fn(Update)) -> Result<()> {
        progress(Update::major("Loading Records...", 0, 1));
        let mut records = self.meta.load_all_records()?;
        // Stable sort: equal timestamps keep registration order.
        records.sort_by_key(|r| r.timestamp);

        self.to_delete.clear();
        for i in 0..records.len().saturating_sub(1) {
            let (older_half, newer_half) = records.split_at_mut(i + 1);
            let older = &older_half[i];
            let newer = &mut newer_half[0];

            let unchanged = older.diff(newer).unchanged;
            if unchanged.is_empty() {
                continue;
            }

            let mut doomed = Vec::new();
            let mut rewritten = false;
            for (old_entry, new_entry) in &unchanged {
                // Only a copy the newer snapshot physically owns is
                // redundant on disk; an inherited pointer has nothing to
                // delete but still gets collapsed to the resolved owner.
                if new_entry.source == newer.name {
                    doomed.push(new_entry.path.clone());
                }
                if let Some(entry) = newer.files.iter_mut().find(|f| f.path == new_entry.path) {
                    if entry.source != old_entry.source {
                        entry.source = old_entry.source.clone();
                        rewritten = true;
                    }
                }
            }
            debug!(
                record = %newer.name,
                redundant = doomed.len(),
                "diffed against {}",
                older.name
            );
            // A record with rewritten provenance must be re-saved even when
            // none of its own copies are doomed, or a pointer could be left
            // aimed at a snapshot that just lost the bytes.
            if !doomed.is_empty() || rewritten {
                self.to_delete.push((newer.clone(), doomed));
            }
        }
        info!(
            records = self.to_delete.len(),
            files = self.file_count(),
            "diff pass complete"
        );
        progress(Update::status("Diff complete!"));
        Ok(())
    }

    /// Delete the collected redundant copies and persist the records
    ///
    /// Each slated record's doomed paths are removed from its data folder,
    /// then the record file (provenance already rewritten) is saved. The
    /// metarecord is unchanged. The pending set is consumed.
    pub fn perform_clean(&mut self, progress: impl Fn(Update)) -> Result<()> {
        let total = self.to_delete.len();
        for (i, (record, files)) in self.to_delete.iter().enumerate() {
            progress(Update::major(format!("Cleaning {}", record.name), i, total));
            let data_path = record.data_path(self.meta.root());
            for file in files {
                progress(Update::minor(file.clone()));
                fs::remove_file(data_path.join(file))?;
            }
            record.save(self.meta.root())?;
            info!(record = %record.name, removed = files.len(), "cleaned");
        }
        self.to_delete.clear();
        progress(Update::major("Complete", total, total));
        Ok(())
    }
}

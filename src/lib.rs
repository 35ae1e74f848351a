//! # snapvault - Content-tracked snapshot backups
//!
//! A personal file-backup library built around a *managed root*: a
//! destination folder whose snapshots are indexed by content hash, so that
//! repeated backups of the same sources never copy an unchanged file twice.
//!
//! ## Overview
//!
//! Each backup run produces a [`Record`](record::Record) - one snapshot's
//! metadata: its name, its physical data subfolder, a creation timestamp,
//! and one entry per tracked file carrying the file's relative path, its
//! SHA-256 content hash, and the name of the snapshot that physically owns
//! the bytes. A [`MetaRecord`](metarecord::MetaRecord) indexes all records
//! for a root and points at the latest one.
//!
//! On top of that data model:
//!
//! - the [`engine`] walks source trees and copies only new or changed
//!   files, repointing unchanged entries at their existing physical owner;
//! - the [`record`] diff computes added/changed/removed/unchanged sets
//!   between any two snapshots;
//! - the [`cleaner`] garbage-collects physical duplicates across the
//!   snapshot chain, preserving provenance integrity;
//! - the [`rebuilder`] adopts pre-existing unmanaged folders into the
//!   index by hashing what they already contain;
//! - the [`restorer`] materializes the latest snapshot's full logical view
//!   into any destination, pulling each file from its physical owner.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use snapvault::engine::ManagedBackup;
//!
//! # fn main() -> snapvault::Result<()> {
//! let mut backup = ManagedBackup::new();
//! backup.add_source("/home/user/Documents");
//! backup.add_exclusion("*.tmp");
//! backup.set_destination("/mnt/backups");
//!
//! let task = backup.execute()?;
//! while task.is_running() {
//!     while let Some(update) = task.try_next() {
//!         println!("[{:>5.1}%] {}", update.completion(), update.message);
//!     }
//!     std::thread::sleep(std::time::Duration::from_millis(50));
//! }
//! let record = task.wait()?;
//! println!("created snapshot {}", record.name);
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency model
//!
//! Long-running operations run on a dedicated worker thread behind a
//! [`Task`](task::Task) handle carrying an ordered
//! [`Update`](progress::Update) channel. Callers poll - nothing blocks
//! until [`wait`](task::Task::wait) is called, and worker failures
//! (including panics) are re-raised at the join. The synchronous cores
//! (`run`, `generate_diffs`, `perform_clean`, `generate_records`,
//! `perform_restore`) are also public, taking a plain event-sink closure
//! for headless use.
//!
//! ## Persisted layout
//!
//! ```text
//! <root>/records/metarecord.rec.json   index of all snapshots
//! <root>/records/<RecordName>.rec.json one file per snapshot
//! <root>/<dataFolderName>/...          physical snapshot contents
//! ```
//!
//! Index and record files are rewritten whole, atomically by replacement.
//! Concurrent operations against the same root are not guarded; keep one
//! writer per root.

pub mod cleaner;
pub mod config;
pub mod engine;
pub mod error;
pub mod exclusion;
pub mod hasher;
pub mod metarecord;
pub mod progress;
pub mod rebuilder;
pub mod record;
pub mod restorer;
pub mod task;

// Re-export main types for convenience
pub use cleaner::Cleaner;
pub use config::BackupConfig;
pub use engine::{CopyFailurePolicy, ManagedBackup};
pub use error::{Result, VaultError};
pub use exclusion::ExclusionSet;
pub use metarecord::{MetaRecord, RecordRef};
pub use progress::Update;
pub use rebuilder::{Candidate, Rebuilder};
pub use record::{FileEntry, Record, RecordDiff};
pub use restorer::{RestoreStats, Restorer};
pub use task::Task;

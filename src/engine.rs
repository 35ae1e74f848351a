//! The managed backup engine
//!
//! A managed backup walks each configured source tree into a fresh snapshot
//! folder under the destination root, deciding per file whether to copy or
//! to reuse bytes an earlier snapshot already holds:
//!
//! - path unseen in the previous snapshot → copy (`[+]`)
//! - path seen, content hash differs → copy (`[~]`)
//! - path seen, content identical → no copy; the new entry inherits the
//!   previous entry's provenance, pointing at wherever the bytes actually
//!   live
//!
//! The run builds a [`Record`] incrementally as files are visited, then
//! registers it in the destination's [`MetaRecord`]. Unchanged files cost
//! one hash and one metadata entry, never a second physical copy.
//!
//! ## Example
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
//! // ... poll task.try_next() for progress ...
//! let record = task.wait()?;
//! println!("snapshot {} holds {} files", record.name, record.files.len());
//! # Ok(())
//! # }
//! ```

use crate::error::{Result, VaultError};
use crate::exclusion::ExclusionSet;
use crate::hasher;
use crate::metarecord::MetaRecord;
use crate::progress::Update;
use crate::record::{FileEntry, Record};
use crate::task::{self, Task};
use chrono::Utc;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Minor-event marker: file is being checked
pub const CODE_CHECK: &str = "[#]";
/// Minor-event marker: file copied because it is new
pub const CODE_COPY_NEW: &str = "[+]";
/// Minor-event marker: file copied because its content changed
pub const CODE_COPY_CHANGED: &str = "[~]";
/// Minor-event marker: file skipped after a failure
pub const CODE_SKIPPED: &str = "[!]";

/// What to do when a single file cannot be hashed or copied
///
/// Under [`Skip`](CopyFailurePolicy::Skip) the failure is logged, a
/// `[!]` event is emitted, and the file is omitted from the snapshot -
/// the run completes with reduced fidelity. Under
/// [`Abort`](CopyFailurePolicy::Abort) the first failure fails the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CopyFailurePolicy {
    /// Log, emit a `[!]` event, and continue without the file
    #[default]
    Skip,
    /// Fail the whole run on the first per-file error
    Abort,
}

/// Configuration and entry point for one managed backup run
#[derive(Debug, Clone, Default)]
pub struct ManagedBackup {
    sources: Vec<PathBuf>,
    exclusions: Vec<String>,
    destination: PathBuf,
    failure_policy: CopyFailurePolicy,
    dry_run: bool,
}

impl ManagedBackup {
    /// Create an unconfigured backup
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source directory to back up
    pub fn add_source(&mut self, source: impl Into<PathBuf>) {
        self.sources.push(source.into());
    }

    /// Add a glob exclusion pattern (matched against file names)
    pub fn add_exclusion(&mut self, pattern: impl Into<String>) {
        self.exclusions.push(pattern.into());
    }

    /// Set the destination managed root
    pub fn set_destination(&mut self, destination: impl Into<PathBuf>) {
        self.destination = destination.into();
    }

    /// Choose the per-file failure policy (default: skip and continue)
    pub fn set_failure_policy(&mut self, policy: CopyFailurePolicy) {
        self.failure_policy = policy;
    }

    /// Preview mode: walk, hash and report, but write nothing
    pub fn set_dry_run(&mut self, dry_run: bool) {
        self.dry_run = dry_run;
    }

    /// The configured destination root
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Validate the configuration
    ///
    /// Runs before any side effect: the destination must be set and exist,
    /// at least one source must be configured, and every source must
    /// exist. On failure no record or folder is created.
    pub fn validate(&self) -> Result<()> {
        if self.destination.as_os_str().is_empty() {
            return Err(VaultError::validation("No destination set"));
        }
        if !self.destination.exists() {
            return Err(VaultError::validation(format!(
                "Destination {} does not exist",
                self.destination.display()
            )));
        }
        if self.sources.is_empty() {
            return Err(VaultError::validation("No sources set"));
        }
        for source in &self.sources {
            if !source.exists() {
                return Err(VaultError::validation(format!(
                    "Source path {} does not exist",
                    source.display()
                )));
            }
        }
        Ok(())
    }

    /// Validate, then run the backup on a background worker
    ///
    /// Returns the task handle immediately; the finished [`Record`] is
    /// retrieved via [`Task::wait`]. Validation errors surface here,
    /// before any thread is spawned or disk is touched.
    pub fn execute(self) -> Result<Task<Record>> {
        self.validate()?;
        info!(
            destination = %self.destination.display(),
            sources = self.sources.len(),
            "starting managed backup"
        );
        Ok(task::spawn(move |updates| {
            self.run(|update| {
                updates.send(update).ok();
            })
        }))
    }

    /// Run the backup synchronously, reporting progress through `progress`
    ///
    /// This is the headless core `execute` drives; callers embedding the
    /// engine can pass any event sink.
    pub fn run(&self, progress: impl Fn(Update)) -> Result<Record> {
        self.validate()?;
        let exclusions = ExclusionSet::new(&self.exclusions)?;

        let mut meta = MetaRecord::load_or_create(&self.destination)?;
        let previous = match meta.latest_record() {
            Ok(record) => Some(record),
            Err(VaultError::NoRecord) => None, // first-ever backup
            Err(err) => return Err(err),
        };
        let previous_index: Option<HashMap<&str, &FileEntry>> = previous
            .as_ref()
            .map(|p| p.files.iter().map(|f| (f.path.as_str(), f)).collect());

        let now = Utc::now();
        let stamp = now.format("%Y-%m-%d_%H-%M-%S");
        let mut record = Record::with_timestamp(
            format!("Backup for {stamp}"),
            format!("data_{stamp}"),
            now,
        );

        let data_root = record.data_path(&self.destination);
        if !self.dry_run {
            fs::create_dir(&data_root)?;
        }

        let total = self.sources.len();
        for (index, source) in self.sources.iter().enumerate() {
            let base = source
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_default();
            progress(Update::major(
                format!(
                    "Copying {} to {}",
                    source.display(),
                    data_root.join(&base).display()
                ),
                index,
                total,
            ));
            info!(
                source = %source.display(),
                "copying source tree into {}",
                record.folder
            );
            self.copy_tree(
                source,
                &base,
                &data_root,
                &exclusions,
                previous_index.as_ref(),
                &mut record,
                &progress,
            )?;
        }

        if !self.dry_run {
            record.save(&self.destination)?;
            meta.add_record(&record);
            meta.save()?;
        }
        progress(Update::major("Complete", total, total));
        Ok(record)
    }

    /// Walk one source tree, copying into the snapshot data folder
    fn copy_tree(
        &self,
        source: &Path,
        base: &Path,
        data_root: &Path,
        exclusions: &ExclusionSet,
        previous: Option<&HashMap<&str, &FileEntry>>,
        record: &mut Record,
        progress: &impl Fn(Update),
    ) -> Result<()> {
        let walker = WalkDir::new(source)
            .follow_links(true)
            .into_iter()
            .filter_entry(|entry| {
                // Exclusions apply to the contents, never the source root
                // itself; excluded directories are not descended into.
                entry.depth() == 0
                    || !exclusions.should_exclude(&entry.file_name().to_string_lossy())
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if is_dangling_symlink(&err) => {
                    debug!("ignoring dangling symlink: {err}");
                    continue;
                }
                Err(err) => match self.failure_policy {
                    CopyFailurePolicy::Skip => {
                        warn!("skipping unreadable entry: {err}");
                        progress(Update::minor(format!("{CODE_SKIPPED} {err}")));
                        continue;
                    }
                    CopyFailurePolicy::Abort => return Err(err.into()),
                },
            };

            let relative = base.join(entry.path().strip_prefix(source).map_err(|_| {
                VaultError::internal(format!(
                    "walked path {:?} is not under source {:?}",
                    entry.path(),
                    source
                ))
            })?);

            if entry.file_type().is_dir() {
                // Mirror the directory skeleton, empty directories included.
                if !self.dry_run {
                    fs::create_dir_all(data_root.join(&relative))?;
                }
                continue;
            }
            if !entry.file_type().is_file() {
                continue; // sockets, fifos, devices
            }

            let result = self.copy_file(
                entry.path(),
                &relative_string(&relative),
                &data_root.join(&relative),
                previous,
                record,
                progress,
            );
            if let Err(err) = result {
                match self.failure_policy {
                    CopyFailurePolicy::Skip => {
                        warn!(
                            file = %entry.path().display(),
                            "skipping file after copy failure: {err}"
                        );
                        progress(Update::minor(format!(
                            "{CODE_SKIPPED} {}",
                            entry.path().display()
                        )));
                    }
                    CopyFailurePolicy::Abort => return Err(err),
                }
            }
        }
        Ok(())
    }

    /// Hash one file, decide copy-new / copy-changed / skip-unchanged, and
    /// append its entry to the record
    fn copy_file(
        &self,
        abs_path: &Path,
        relative: &str,
        dest: &Path,
        previous: Option<&HashMap<&str, &FileEntry>>,
        record: &mut Record,
        progress: &impl Fn(Update),
    ) -> Result<()> {
        progress(Update::minor(format!("{CODE_CHECK} {}", abs_path.display())));
        let hash = hasher::hash_file(abs_path)?;

        match previous.and_then(|index| index.get(relative).copied()) {
            None => {
                self.copy_bytes(abs_path, dest)?;
                progress(Update::minor(format!(
                    "{CODE_COPY_NEW} {}",
                    abs_path.display()
                )));
                record.files.push(FileEntry {
                    path: relative.to_string(),
                    hash,
                    source: record.name.clone(),
                });
            }
            Some(prior) if prior.hash != hash => {
                self.copy_bytes(abs_path, dest)?;
                progress(Update::minor(format!(
                    "{CODE_COPY_CHANGED} {}",
                    abs_path.display()
                )));
                record.files.push(FileEntry {
                    path: relative.to_string(),
                    hash,
                    source: record.name.clone(),
                });
            }
            Some(prior) => {
                // Identical content: inherit the resolved owner instead of
                // copying. The prior entry's source already points at
                // whichever snapshot physically holds the bytes.
                debug!(file = relative, owner = %prior.source, "unchanged, inheriting provenance");
                record.files.push(FileEntry {
                    path: relative.to_string(),
                    hash,
                    source: prior.source.clone(),
                });
            }
        }
        Ok(())
    }

    fn copy_bytes(&self, from: &Path, to: &Path) -> Result<()> {
        if self.dry_run {
            return Ok(());
        }
        if let Some(parent) = to.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::copy(from, to)?;
        Ok(())
    }
}

/// Whether a walk error is a broken symlink (ignored without failing)
fn is_dangling_symlink(err: &walkdir::Error) -> bool {
    let not_found = err
        .io_error()
        .map(|io| io.kind() == std::io::ErrorKind::NotFound)
        .unwrap_or(false);
    not_found
        && err
            .path()
            .and_then(|p| p.symlink_metadata().ok())
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false)
}

/// Normalize a relative path for storage (`/`-separated)
fn relative_string(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_validation_order() {
        let temp_dir = TempDir::new().unwrap();
        let mut backup = ManagedBackup::new();

        // No destination set
        assert!(matches!(
            backup.validate().unwrap_err(),
            VaultError::Validation(_)
        ));

        // Destination does not exist
        backup.set_destination(temp_dir.path().join("missing"));
        assert!(backup.validate().is_err());

        // No sources
        backup.set_destination(temp_dir.path());
        assert!(backup.validate().is_err());

        // Source does not exist
        backup.add_source(temp_dir.path().join("no-such-source"));
        assert!(backup.validate().is_err());

        // All good
        let source = temp_dir.path().join("src");
        fs::create_dir(&source).unwrap();
        let mut backup = ManagedBackup::new();
        backup.set_destination(temp_dir.path());
        backup.add_source(&source);
        backup.validate().unwrap();
    }

    #[test]
    fn test_validation_creates_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("dest");
        fs::create_dir(&dest).unwrap();

        let mut backup = ManagedBackup::new();
        backup.set_destination(&dest);
        backup.add_source(temp_dir.path().join("missing-source"));
        assert!(backup.execute().is_err());
        assert_eq!(fs::read_dir(&dest).unwrap().count(), 0);
    }

    #[test]
    fn test_relative_string_normalizes() {
        assert_eq!(
            relative_string(Path::new("dir/sub/file.txt")),
            "dir/sub/file.txt"
        );
    }
}

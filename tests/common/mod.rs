//! Shared test harness: a small fluent builder for file trees
//!
//! Tests describe their fixtures as relative paths under a temp root;
//! parents are created on demand.

use std::fs;
use std::path::{Path, PathBuf};

pub struct FileTree {
    root: PathBuf,
}

#[allow(dead_code)] // each integration test binary uses a different subset
impl FileTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a relative location under the root
    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    /// Create a directory (and parents)
    pub fn dir(&self, rel: &str) -> &Self {
        fs::create_dir_all(self.path(rel)).unwrap();
        self
    }

    /// Create a file with content (and parent directories)
    pub fn file(&self, rel: &str, content: &str) -> &Self {
        let path = self.path(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
        self
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.path(rel).exists()
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.path(rel)).unwrap()
    }

    /// Names of the entries directly under a relative directory, sorted
    pub fn list(&self, rel: &str) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.path(rel))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort_unstable();
        names
    }

    /// The single `data_*` snapshot folder under a destination, or panic
    pub fn data_folder(&self, dest_rel: &str) -> String {
        let mut folders: Vec<String> = self
            .list(dest_rel)
            .into_iter()
            .filter(|name| name.starts_with("data"))
            .collect();
        assert_eq!(
            folders.len(),
            1,
            "expected exactly one data folder under {dest_rel}"
        );
        folders.remove(0)
    }

    /// All `data_*` snapshot folders under a destination, sorted
    pub fn data_folders(&self, dest_rel: &str) -> Vec<String> {
        self.list(dest_rel)
            .into_iter()
            .filter(|name| name.starts_with("data"))
            .collect()
    }
}

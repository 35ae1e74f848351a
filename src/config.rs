//! Flat JSON configuration file
//!
//! The CLI (and the original front-ends) persist a backup's setup as a
//! small JSON document: source paths, exclusion patterns, destination,
//! and two behavior flags. Absent booleans default to `false`, so old
//! config files keep loading as the format grows.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A saved backup configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackupConfig {
    /// Source directories to back up
    pub sources: Vec<String>,
    /// Glob exclusion patterns
    pub exceptions: Vec<String>,
    /// Destination root
    pub destination: String,
    /// Preview without writing
    #[serde(default)]
    pub dry_run: bool,
    /// Wrap the plain (non-managed) copy in a timestamped subfolder
    #[serde(default)]
    pub use_wrapper: bool,
}

impl BackupConfig {
    /// Load a configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Save this configuration as a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }
}

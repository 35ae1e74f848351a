//! Glob-based file exclusion
//!
//! Exclusion rules are shell-style globs matched against file and directory
//! *names* (not full paths), mirroring how backup exception lists are
//! usually written: `ex*` excludes anything whose name starts with `ex`,
//! `*.tmp` excludes temporary files wherever they sit. A directory whose
//! name matches is not descended into.

use crate::error::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};

/// A compiled set of exclusion patterns
#[derive(Debug)]
pub struct ExclusionSet {
    set: GlobSet,
}

impl ExclusionSet {
    /// Compile a list of glob patterns
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::VaultError::InvalidPattern`] if any pattern
    /// fails to compile; no partial set is produced.
    pub fn new(patterns: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(Glob::new(pattern)?);
        }
        Ok(Self {
            set: builder.build()?,
        })
    }

    /// Whether a file or directory name matches any exclusion pattern
    pub fn should_exclude(&self, name: &str) -> bool {
        self.set.is_match(name)
    }

    /// Whether no patterns were configured
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}

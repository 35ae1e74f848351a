//! Content hashing for change detection
//!
//! Files are identified by the SHA-256 digest of their byte content. Two
//! files with identical bytes produce identical digests regardless of path,
//! timestamps, or permissions - this is the basis for deciding whether a
//! file changed between snapshots.

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Hash a file's content using SHA-256
///
/// Reads the file in fixed-size blocks and feeds them to the digest, so
/// memory usage stays constant for arbitrarily large files.
///
/// # Arguments
///
/// * `path` - Path to the file to hash
///
/// # Returns
///
/// The SHA-256 digest as a 64-character lowercase hexadecimal string.
///
/// # Errors
///
/// Returns [`crate::error::VaultError::Io`] if the file cannot be opened or
/// read; the error is propagated, never swallowed.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192]; // 8KB buffer

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Hash arbitrary in-memory data using SHA-256
///
/// Convenience for small payloads that are already in memory; returns the
/// same digest `hash_file` would produce for a file with these bytes.
pub fn hash_data(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

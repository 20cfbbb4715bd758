//! Disc signature hashing.

use sha2::{Digest, Sha256};
use std::path::Path;

/// Stable identity of a disc: sha256 over the normalized entry path, the
/// source size and its modification time.
pub fn disc_signature(entry_path: &Path, size_bytes: u64, modified_unix: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_path(entry_path).as_bytes());
    hasher.update(b"\0");
    hasher.update(size_bytes.to_le_bytes());
    hasher.update(modified_unix.to_le_bytes());
    format!("{:x}", hasher.finalize())
}

/// Path string used for deduplication and hashing: forward slashes, no
/// trailing separator.
pub fn normalize_path(path: &Path) -> String {
    let s = path.to_string_lossy().replace('\\', "/");
    let trimmed = s.trim_end_matches('/');
    if trimmed.is_empty() {
        s
    } else {
        trimmed.to_string()
    }
}

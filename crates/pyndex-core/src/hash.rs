//! Content digests for distributions and stable identifiers for locks

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

/// Hash algorithm recorded in index link fragments (`#sha256=...`).
pub const HASH_ALGORITHM: &str = "sha256";

/// Block size used when streaming a file through the hasher (64KB)
const READ_BLOCK_SIZE: usize = 64 * 1024;

/// Hex SHA-256 digest of a file, read in fixed-size blocks.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut block = vec![0u8; READ_BLOCK_SIZE];
    loop {
        let n = file.read(&mut block)?;
        if n == 0 {
            break;
        }
        hasher.update(&block[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Hex SHA-256 digest of raw bytes.
pub fn sha256_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Lock-table identifier for a logical lock key.
///
/// Fixed length (64 hex chars) and identical in every process, so any
/// process racing for `key` addresses the same record.
pub fn lock_id(key: &str) -> String {
    blake3::hash(key.as_bytes()).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_bytes_known_value() {
        assert_eq!(
            sha256_bytes(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn sha256_file_matches_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pkg-0.1.0.tar.gz");
        std::fs::write(&path, b"file content").unwrap();
        assert_eq!(sha256_file(&path).unwrap(), sha256_bytes(b"file content"));
    }

    #[test]
    fn sha256_file_spans_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.whl");
        let data = vec![7u8; READ_BLOCK_SIZE * 2 + 17];
        std::fs::write(&path, &data).unwrap();
        assert_eq!(sha256_file(&path).unwrap(), sha256_bytes(&data));
    }

    #[test]
    fn sha256_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(sha256_file(&dir.path().join("nope")).is_err());
    }

    #[test]
    fn lock_id_deterministic_and_fixed_length() {
        assert_eq!(lock_id("hello-world"), lock_id("hello-world"));
        assert_eq!(lock_id("hello-world").len(), 64);
        assert_eq!(lock_id("/").len(), 64);
    }

    #[test]
    fn lock_id_differs_per_key() {
        assert_ne!(lock_id("foo"), lock_id("bar"));
    }
}

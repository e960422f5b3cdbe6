//! SHA-256 checksums used to verify copies before a source is released.

use crate::error::{DocsortError, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Buffer size for reading files (8KB)
const BUFFER_SIZE: usize = 8192;

/// Content digest of one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChecksum {
    pub sha256: String,
    pub size: u64,
}

/// Compute the SHA-256 checksum of a file
pub fn compute_file_checksum(path: &Path) -> Result<FileChecksum> {
    let metadata = std::fs::metadata(path).map_err(|e| DocsortError::io(path, e))?;
    let file = File::open(path).map_err(|e| DocsortError::io(path, e))?;

    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; BUFFER_SIZE];

    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .map_err(|e| DocsortError::io(path, e))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(FileChecksum {
        sha256: hex::encode(hasher.finalize()),
        size: metadata.len(),
    })
}

/// Whether a file still matches an expected checksum
pub fn verify_checksum(path: &Path, expected: &FileChecksum) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    let current = compute_file_checksum(path)?;
    Ok(current.size == expected.size && current.sha256 == expected.sha256)
}

//! Putting classified files at their final names.
//!
//! Whether a file is moved or copied depends only on who owns it:
//! intermediates the pipeline created (staged conversions, files already in
//! the output tree) are moved, user input is copied and left untouched.
//! Copies are verified with SHA-256 before a moved source is removed.

pub mod checksum;

pub use checksum::{compute_file_checksum, verify_checksum, FileChecksum};

use crate::error::{DocsortError, Result};
use crate::naming;
use std::fs;
use std::path::{Path, PathBuf};

/// Who owns the source file being placed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Created by the pipeline; consumed by placement
    Owned,
    /// Belongs to the user; never modified
    Borrowed,
}

/// Copy `source` onto `destination` and check the bytes arrived intact
fn copy_verified(source: &Path, destination: &Path) -> Result<()> {
    let expected = compute_file_checksum(source)?;
    fs::copy(source, destination).map_err(|e| DocsortError::io(destination, e))?;

    if !verify_checksum(destination, &expected)? {
        return Err(DocsortError::ChecksumMismatch {
            source_path: source.to_path_buf(),
            destination: destination.to_path_buf(),
        });
    }
    Ok(())
}

/// Move a file, falling back to verified copy + delete across filesystems
fn perform_move(source: &Path, destination: &Path) -> Result<()> {
    if fs::rename(source, destination).is_ok() {
        return Ok(());
    }

    tracing::debug!(
        "[Placement] rename failed for {}, copying instead",
        source.display()
    );
    copy_verified(source, destination)?;
    fs::remove_file(source).map_err(|e| DocsortError::io(source, e))?;
    Ok(())
}

/// Place `source` at `target` (or the next free `_NN` name) and return the
/// path actually used.
pub fn place(source: &Path, target: &Path, ownership: Ownership) -> Result<PathBuf> {
    let destination = naming::reserve(target)?;

    let result = match ownership {
        Ownership::Owned => perform_move(source, &destination),
        Ownership::Borrowed => copy_verified(source, &destination),
    };

    match result {
        Ok(()) => {
            tracing::debug!(
                "[Placement] {} -> {}",
                source.display(),
                destination.display()
            );
            Ok(destination)
        }
        Err(e) => {
            // Release the reserved placeholder
            if let Err(cleanup) = fs::remove_file(&destination) {
                tracing::warn!(
                    "[Placement] could not remove placeholder {}: {}",
                    destination.display(),
                    cleanup
                );
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_owned_files_are_moved() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("staged.pdf");
        std::fs::write(&source, b"pdf bytes").unwrap();

        let target = dir.path().join("out").join("P123456_EN.pdf");
        let placed = place(&source, &target, Ownership::Owned).unwrap();

        assert_eq!(placed, target);
        assert!(!source.exists());
        assert_eq!(std::fs::read(&placed).unwrap(), b"pdf bytes");
    }

    #[test]
    fn test_borrowed_files_are_copied() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("input.pdf");
        std::fs::write(&source, b"user file").unwrap();

        let target = dir.path().join("out").join("UNKNOWN_EN.pdf");
        let placed = place(&source, &target, Ownership::Borrowed).unwrap();

        assert!(source.exists());
        assert_eq!(std::fs::read(&source).unwrap(), b"user file");
        assert_eq!(std::fs::read(&placed).unwrap(), b"user file");
    }

    #[test]
    fn test_existing_target_is_never_overwritten() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("SCAN_OCR_DOCUMENT.pdf");
        std::fs::write(&target, b"first").unwrap();

        let source = dir.path().join("second.pdf");
        std::fs::write(&source, b"second").unwrap();

        let placed = place(&source, &target, Ownership::Owned).unwrap();
        assert_eq!(placed, dir.path().join("SCAN_OCR_DOCUMENT_01.pdf"));
        assert_eq!(std::fs::read(&target).unwrap(), b"first");
        assert_eq!(std::fs::read(&placed).unwrap(), b"second");
    }

    #[test]
    fn test_missing_source_releases_reservation() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("X.pdf");

        let result = place(&dir.path().join("missing.pdf"), &target, Ownership::Borrowed);
        assert!(result.is_err());
        assert!(!target.exists());
    }
}

//! Filing File Storage
//!
//! This crate implements the write protocol of the filing service: uploaded bytes (plain
//! files or zip archives) are staged in an isolated temporary directory, verified against
//! the SHA-256 declared by the client, checked for destination conflicts, and only then
//! renamed into the managed base directory.
//!
//! ## Guarantees
//!
//! - Client paths are validated structurally ([`RelativePath`]) and can never escape the
//!   base directory
//! - Nothing reaches the destination tree before it has been fully staged and verified
//! - Existing files are never overwritten
//! - An archive upload moves either every extracted file or none of them when destination
//!   conflicts exist
//! - Every staging directory is removed when the operation that created it ends
//!
//! ## Storage Layout
//!
//! ```text
//! <base_dir>/
//! └── reports/
//!     ├── 2024.csv
//!     └── 2024.csv.sha256   # optional sidecar: "<digest> 2024.csv\n"
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use filing_files::{Filestore, RelativePath};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Filestore::new(Path::new("upload_data"))?;
//! let path = RelativePath::parse("reports/2024.csv")?;
//! let data = b"year,total\n2024,17\n";
//! let digest = filing_files::sha256_bytes(data);
//!
//! let record = store.put(&path, data, digest.as_str())?;
//! assert_eq!(record.size, data.len() as u64);
//! # Ok(())
//! # }
//! ```

mod archive;
mod checksum;
mod constants;
mod filestore;
mod lock;
mod mover;
mod path;
mod staging;

pub use archive::{ArchiveExtractor, ArchiveLimits, ManifestEntry};
pub use checksum::{sha256_bytes, sha256_file, verify_file};
pub use constants::{DIR_MODE, SIDECAR_EXTENSION, ZIP_EXTENSION};
pub use filestore::{FileRecord, Filestore};
pub use filing_types::Sha256Hex;
pub use lock::{KeyedLocks, NoLocks, PathLockGuard, PathLocks};
pub use mover::AtomicMover;
pub use path::RelativePath;
pub use staging::{StagingArea, StagingHandle};

/// Errors that can occur during file operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Base directory does not exist or is not a directory
    #[error("Invalid base directory: {0}")]
    InvalidBaseDirectory(String),

    /// Path validation failed (absolute path, traversal segment or unsafe name)
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// The staged bytes do not hash to the digest declared by the caller
    #[error("checksum verification failed for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: String,
        expected: String,
        actual: Sha256Hex,
    },

    /// Destination already exists
    #[error("{0} already exists")]
    Conflict(RelativePath),

    /// One or more archive destinations already exist; nothing was moved
    #[error("{} already exist(s): {}", .0.len(), join_paths(.0))]
    BatchConflict(Vec<RelativePath>),

    /// Unpack was requested for something that is not a zip archive
    #[error("Unsupported archive type: {0}")]
    UnsupportedArchive(String),

    /// Creating the staging directory or writing staged bytes failed
    #[error("failed to stage {name}: {source}")]
    StagingWrite {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Moving a verified file into the base directory failed
    #[error("failed to move file into {path}: {source}")]
    Move {
        path: RelativePath,
        #[source]
        source: std::io::Error,
    },

    /// The archive is not a valid zip, breaks a limit, or could not be extracted
    #[error("failed to extract archive: {0}")]
    Extraction(String),

    /// Nothing exists at the requested path
    #[error("{0} not found")]
    NotFound(RelativePath),

    /// Removing a file failed
    #[error("failed to delete {path}: {source}")]
    Delete {
        path: RelativePath,
        #[source]
        source: std::io::Error,
    },

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type FilesResult<T> = std::result::Result<T, FilesError>;

fn join_paths(paths: &[RelativePath]) -> String {
    paths
        .iter()
        .map(RelativePath::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

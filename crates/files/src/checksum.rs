//! SHA-256 hashing and verification of staged content.

use crate::constants::IO_CHUNK_SIZE;
use crate::{FilesError, FilesResult};
use filing_types::Sha256Hex;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Hashes an in-memory buffer.
pub fn sha256_bytes(data: &[u8]) -> Sha256Hex {
    let digest: [u8; 32] = Sha256::digest(data).into();
    Sha256Hex::from_digest(&digest)
}

/// Hashes a file, streaming it in fixed-size chunks.
pub fn sha256_file(path: &Path) -> io::Result<Sha256Hex> {
    let file = fs::File::open(path)?;
    sha256_reader(BufReader::with_capacity(IO_CHUNK_SIZE, file))
}

/// Hashes everything `reader` yields. Interrupted reads are retried.
fn sha256_reader(mut reader: impl Read) -> io::Result<Sha256Hex> {
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    let digest: [u8; 32] = hasher.finalize().into();
    Ok(Sha256Hex::from_digest(&digest))
}

/// Hashes a staged file once and compares it with the digest the client declared.
///
/// The comparison ignores case. Returns the computed digest on success.
///
/// # Errors
///
/// - [`FilesError::ChecksumMismatch`] if the digests differ
/// - [`FilesError::Io`] if the file cannot be read
pub fn verify_file(path: &Path, expected: &str) -> FilesResult<Sha256Hex> {
    let actual = sha256_file(path)?;

    if !actual.matches(expected) {
        return Err(FilesError::ChecksumMismatch {
            path: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            expected: expected.to_owned(),
            actual,
        });
    }

    Ok(actual)
}

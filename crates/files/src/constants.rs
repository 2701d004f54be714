//! Constants shared by the storage modules.

/// Mode for directories created under the base directory (owner rwx, group/others rx).
pub const DIR_MODE: u32 = 0o755;

/// Extension appended to a stored file's name for its checksum sidecar.
pub const SIDECAR_EXTENSION: &str = "sha256";

/// The only archive extension `unpack` accepts (compared case-insensitively).
pub const ZIP_EXTENSION: &str = "zip";

/// Prefix of every staging directory name.
pub(crate) const STAGING_PREFIX: &str = "filing-";

/// Staging subdirectory that holds the uploaded payload file.
pub(crate) const PAYLOAD_DIR_NAME: &str = "payload";

/// Staging subdirectory that receives extracted archive contents.
pub(crate) const EXTRACT_DIR_NAME: &str = "extracted";

/// Name used for a staged file whose requested name has no safe characters left.
pub(crate) const FALLBACK_STAGED_NAME: &str = "upload";

/// Read buffer size used when hashing and copying.
pub(crate) const IO_CHUNK_SIZE: usize = 64 * 1024;

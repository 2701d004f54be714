//! Defaults and environment variable names used by the filing service.

/// Default listen address of the REST server.
pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:3000";

/// Default base directory when no explicit directory is configured.
pub const DEFAULT_UPLOAD_DIR: &str = "upload_data";

/// Default request body limit (1 GiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 1024 * 1024 * 1024;

/// PHP interpreter used to run Nextcloud's `occ` when none is configured.
pub const DEFAULT_PHP_PATH: &str = "php";

pub const ENV_REST_ADDR: &str = "FILING_REST_ADDR";
pub const ENV_UPLOAD_DIR: &str = "FILING_UPLOAD_DIR";
pub const ENV_STAGING_DIR: &str = "FILING_STAGING_DIR";
pub const ENV_SIDECARS: &str = "FILING_SIDECARS";
pub const ENV_MAX_UPLOAD_BYTES: &str = "FILING_MAX_UPLOAD_BYTES";
pub const ENV_MAX_ARCHIVE_ENTRIES: &str = "FILING_MAX_ARCHIVE_ENTRIES";
pub const ENV_MAX_ARCHIVE_BYTES: &str = "FILING_MAX_ARCHIVE_BYTES";
pub const ENV_NC_USER: &str = "FILING_NC_USER";
pub const ENV_NC_FOLDER: &str = "FILING_NC_FOLDER";
pub const ENV_OCC_PATH: &str = "FILING_OCC_PATH";
pub const ENV_PHP_PATH: &str = "FILING_PHP_PATH";

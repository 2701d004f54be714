//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the services that
//! need it. Request handling never reads process-wide environment variables.

use crate::constants::*;
use crate::notifier::{NextcloudOcc, RescanNotifier};
use crate::{CoreError, CoreResult};
use filing_files::{ArchiveLimits, Filestore, KeyedLocks};
use filing_types::ScanPath;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Location of a Nextcloud instance whose file index should follow the base directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NextcloudConfig {
    user: ScanPath,
    folder: ScanPath,
    occ_path: PathBuf,
    php_path: PathBuf,
}

impl NextcloudConfig {
    pub fn new(
        user: &str,
        folder: &str,
        occ_path: PathBuf,
        php_path: PathBuf,
    ) -> CoreResult<Self> {
        let user = ScanPath::parse(user)
            .map_err(|e| CoreError::InvalidInput(format!("nextcloud user: {e}")))?;
        if !user.is_single_segment() {
            return Err(CoreError::InvalidInput(format!(
                "nextcloud user cannot contain '/': {user}"
            )));
        }
        let folder = ScanPath::parse(folder)
            .map_err(|e| CoreError::InvalidInput(format!("nextcloud folder: {e}")))?;

        if occ_path.as_os_str().is_empty() || php_path.as_os_str().is_empty() {
            return Err(CoreError::InvalidInput(
                "occ and php paths cannot be empty".into(),
            ));
        }

        Ok(Self {
            user,
            folder,
            occ_path,
            php_path,
        })
    }

    pub fn user(&self) -> &str {
        self.user.as_str()
    }

    /// Folder inside the user's files that mirrors the base directory.
    pub fn folder(&self) -> &str {
        self.folder.as_str()
    }

    pub fn occ_path(&self) -> &Path {
        &self.occ_path
    }

    pub fn php_path(&self) -> &Path {
        &self.php_path
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    upload_dir: PathBuf,
    staging_dir: Option<PathBuf>,
    write_sidecars: bool,
    max_upload_bytes: u64,
    archive_limits: ArchiveLimits,
    nextcloud: Option<NextcloudConfig>,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    pub fn new(
        upload_dir: PathBuf,
        staging_dir: Option<PathBuf>,
        write_sidecars: bool,
        max_upload_bytes: u64,
        archive_limits: ArchiveLimits,
        nextcloud: Option<NextcloudConfig>,
    ) -> CoreResult<Self> {
        if upload_dir.as_os_str().is_empty() {
            return Err(CoreError::InvalidInput(
                "upload_dir cannot be empty".into(),
            ));
        }
        if max_upload_bytes == 0 {
            return Err(CoreError::InvalidInput(
                "max_upload_bytes must be greater than zero".into(),
            ));
        }
        if archive_limits.max_entries == 0 || archive_limits.max_total_bytes == 0 {
            return Err(CoreError::InvalidInput(
                "archive limits must be greater than zero".into(),
            ));
        }

        Ok(Self {
            upload_dir,
            staging_dir,
            write_sidecars,
            max_upload_bytes,
            archive_limits,
            nextcloud,
        })
    }

    /// Resolve configuration from the process environment.
    pub fn from_env() -> CoreResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve configuration from `lookup`, which maps a variable name to its value.
    ///
    /// Unset and blank variables fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> CoreResult<Self> {
        let upload_dir = text_from_env_value(lookup(ENV_UPLOAD_DIR))
            .unwrap_or_else(|| DEFAULT_UPLOAD_DIR.into());
        let staging_dir = text_from_env_value(lookup(ENV_STAGING_DIR)).map(PathBuf::from);
        let write_sidecars = bool_from_env_value(ENV_SIDECARS, lookup(ENV_SIDECARS), false)?;
        let max_upload_bytes = u64_from_env_value(
            ENV_MAX_UPLOAD_BYTES,
            lookup(ENV_MAX_UPLOAD_BYTES),
            DEFAULT_MAX_UPLOAD_BYTES,
        )?;

        let defaults = ArchiveLimits::default();
        let max_entries = u64_from_env_value(
            ENV_MAX_ARCHIVE_ENTRIES,
            lookup(ENV_MAX_ARCHIVE_ENTRIES),
            defaults.max_entries as u64,
        )?;
        let archive_limits = ArchiveLimits {
            max_entries: usize::try_from(max_entries).map_err(|_| CoreError::InvalidEnvValue {
                name: ENV_MAX_ARCHIVE_ENTRIES,
                value: max_entries.to_string(),
            })?,
            max_total_bytes: u64_from_env_value(
                ENV_MAX_ARCHIVE_BYTES,
                lookup(ENV_MAX_ARCHIVE_BYTES),
                defaults.max_total_bytes,
            )?,
        };

        let nextcloud = nextcloud_from_env_values(
            lookup(ENV_NC_USER),
            lookup(ENV_NC_FOLDER),
            lookup(ENV_OCC_PATH),
            lookup(ENV_PHP_PATH),
        )?;

        Self::new(
            PathBuf::from(upload_dir),
            staging_dir,
            write_sidecars,
            max_upload_bytes,
            archive_limits,
            nextcloud,
        )
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn staging_dir(&self) -> Option<&Path> {
        self.staging_dir.as_deref()
    }

    pub fn write_sidecars(&self) -> bool {
        self.write_sidecars
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    pub fn archive_limits(&self) -> ArchiveLimits {
        self.archive_limits
    }

    pub fn nextcloud(&self) -> Option<&NextcloudConfig> {
        self.nextcloud.as_ref()
    }

    /// Build the server's [`Filestore`], with per-path locking enabled.
    ///
    /// # Errors
    /// Returns [`CoreError::Files`] if the upload directory does not exist or is not a
    /// directory.
    pub fn filestore(&self) -> CoreResult<Filestore> {
        let mut store = Filestore::new(&self.upload_dir)?
            .with_locks(Arc::new(KeyedLocks::new()))
            .with_sidecars(self.write_sidecars)
            .with_archive_limits(self.archive_limits);

        if let Some(staging_dir) = &self.staging_dir {
            store = store.with_staging_root(staging_dir);
        }

        tracing::debug!(
            base_dir = %store.base_dir().display(),
            staging_root = %store.staging_root().display(),
            sidecars = self.write_sidecars,
            "configured filestore"
        );
        Ok(store)
    }

    /// Build the rescan notifier, if one is configured.
    pub fn notifier(&self) -> Option<Arc<dyn RescanNotifier>> {
        self.nextcloud
            .clone()
            .map(|nc| Arc::new(NextcloudOcc::new(nc)) as Arc<dyn RescanNotifier>)
    }
}

/// Parse a boolean flag. Accepts `true/1/yes/on` and `false/0/no/off`, case-insensitively.
pub fn bool_from_env_value(
    name: &'static str,
    value: Option<String>,
    default: bool,
) -> CoreResult<bool> {
    let Some(value) = text_from_env_value(value) else {
        return Ok(default);
    };

    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(CoreError::InvalidEnvValue { name, value }),
    }
}

pub fn u64_from_env_value(
    name: &'static str,
    value: Option<String>,
    default: u64,
) -> CoreResult<u64> {
    let Some(value) = text_from_env_value(value) else {
        return Ok(default);
    };

    value
        .parse::<u64>()
        .map_err(|_| CoreError::InvalidEnvValue { name, value })
}

/// The rescan notifier is enabled when user, folder and occ path are all set; setting
/// only some of them is a configuration error.
fn nextcloud_from_env_values(
    user: Option<String>,
    folder: Option<String>,
    occ_path: Option<String>,
    php_path: Option<String>,
) -> CoreResult<Option<NextcloudConfig>> {
    let php_path = text_from_env_value(php_path).unwrap_or_else(|| DEFAULT_PHP_PATH.into());

    match (
        text_from_env_value(user),
        text_from_env_value(folder),
        text_from_env_value(occ_path),
    ) {
        (None, None, None) => Ok(None),
        (Some(user), Some(folder), Some(occ_path)) => Ok(Some(NextcloudConfig::new(
            &user,
            &folder,
            PathBuf::from(occ_path),
            PathBuf::from(php_path),
        )?)),
        _ => Err(CoreError::InvalidInput(format!(
            "{ENV_NC_USER}, {ENV_NC_FOLDER} and {ENV_OCC_PATH} must be set together"
        ))),
    }
}

fn text_from_env_value(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

//! Content-index rescan after writes.
//!
//! Files written into the base directory are invisible to Nextcloud until its file cache is
//! rescanned. [`NextcloudOcc`] runs `occ files:scan` for the directory that changed.

use crate::config::NextcloudConfig;
use crate::{CoreError, CoreResult};
use filing_files::RelativePath;
use std::fmt;
use std::process::{Command, Stdio};

const SCAN_COMMAND: &str = "files:scan";

/// Something that can be told a directory under the base directory has changed.
pub trait RescanNotifier: Send + Sync + fmt::Debug {
    /// Rescans `dir`, or the whole base directory when `dir` is `None`.
    ///
    /// Blocks until the rescan finishes.
    fn rescan(&self, dir: Option<&RelativePath>) -> CoreResult<()>;
}

/// Runs `<php> <occ> files:scan --path=/<user>/files/<folder>/<dir>`.
#[derive(Debug, Clone)]
pub struct NextcloudOcc {
    config: NextcloudConfig,
}

impl NextcloudOcc {
    pub fn new(config: NextcloudConfig) -> Self {
        Self { config }
    }

    /// Path argument understood by `files:scan` for `dir`.
    pub fn scan_path(&self, dir: Option<&RelativePath>) -> String {
        let root = format!("/{}/files/{}", self.config.user(), self.config.folder());
        match dir {
            Some(dir) => format!("{root}/{dir}"),
            None => root,
        }
    }

    fn command(&self, dir: Option<&RelativePath>) -> Command {
        let mut command = Command::new(self.config.php_path());
        command
            .arg(self.config.occ_path())
            .arg(SCAN_COMMAND)
            .arg(format!("--path={}", self.scan_path(dir)))
            .stdin(Stdio::null());
        command
    }
}

impl RescanNotifier for NextcloudOcc {
    fn rescan(&self, dir: Option<&RelativePath>) -> CoreResult<()> {
        let scan_path = self.scan_path(dir);
        tracing::debug!(path = %scan_path, "running occ files:scan");

        let output = self
            .command(dir)
            .output()
            .map_err(CoreError::NotifierSpawn)?;

        if !output.status.success() {
            return Err(CoreError::NotifierFailed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        tracing::info!(path = %scan_path, "rescanned nextcloud path");
        Ok(())
    }
}

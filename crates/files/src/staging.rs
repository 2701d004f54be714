//! Per-operation staging directories
//!
//! Every write starts by copying the uploaded bytes into a fresh directory under the
//! staging root. The directory is owned by a [`StagingHandle`]; calling
//! [`StagingHandle::release`] removes it and reports any I/O failure, while dropping the
//! handle (early return, panic unwind, a cancelled request) removes it silently. Because
//! `release` consumes the handle, the directory is removed exactly once.

use crate::constants::{FALLBACK_STAGED_NAME, PAYLOAD_DIR_NAME, STAGING_PREFIX};
use crate::path::canonical_segment;
use crate::{FilesError, FilesResult};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Location under which staging directories are created.
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    /// Creates a staging area rooted at `root`. The root is created on first use.
    ///
    /// Renames into the base directory are only atomic when `root` is on the same
    /// filesystem; otherwise moves fall back to copy-then-rename.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Staging area under the system temporary directory.
    pub fn system_default() -> Self {
        Self::new(std::env::temp_dir())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `data` into a new staging directory.
    ///
    /// The file lands in the directory's payload subdirectory, named after the lowercased
    /// safe form of `name`, so that extension checks on the staged copy behave the same
    /// for `A.ZIP` and `a.zip`. Other subdirectories of [`StagingHandle::dir`] never
    /// share a name with the payload.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::StagingWrite`] if the directory cannot be created or the file
    /// cannot be written and flushed.
    pub fn stage(&self, name: &str, data: &[u8]) -> FilesResult<StagingHandle> {
        let staged_name = staged_file_name(name);
        let fail = |source: io::Error| FilesError::StagingWrite {
            name: staged_name.clone(),
            source,
        };

        fs::create_dir_all(&self.root).map_err(fail)?;
        let dir = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&self.root)
            .map_err(fail)?;

        let payload_dir = dir.path().join(PAYLOAD_DIR_NAME);
        fs::create_dir(&payload_dir).map_err(fail)?;
        let file_path = payload_dir.join(&staged_name);
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&file_path)
            .map_err(fail)?;
        file.write_all(data).map_err(fail)?;
        file.sync_all().map_err(fail)?;

        tracing::debug!(
            staging_dir = %dir.path().display(),
            file = %staged_name,
            size = data.len(),
            "staged upload"
        );

        Ok(StagingHandle {
            dir,
            file: file_path,
            size: data.len() as u64,
        })
    }
}

impl Default for StagingArea {
    fn default() -> Self {
        Self::system_default()
    }
}

/// Exclusive ownership of one staging directory and the payload staged in it.
#[derive(Debug)]
pub struct StagingHandle {
    dir: TempDir,
    file: PathBuf,
    size: u64,
}

impl StagingHandle {
    /// The staging directory itself. Callers may create scratch entries here.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// The staged payload file.
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Size of the staged payload in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Removes the staging directory and everything in it.
    pub fn release(self) -> io::Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        tracing::debug!(staging_dir = %path.display(), "released staging directory");
        Ok(())
    }
}

fn staged_file_name(name: &str) -> String {
    let safe = canonical_segment(name).to_lowercase();
    if safe.is_empty() {
        FALLBACK_STAGED_NAME.to_owned()
    } else {
        safe
    }
}

//! Zip extraction into staging
//!
//! Only zip archives are ever decoded. Entries are written into a staging subtree, never
//! into the base directory; the subtree is then walked to build the manifest that the
//! orchestrator conflict-checks and commits.
//!
//! An entry is refused, failing the whole extraction, when its name would leave the
//! extraction root, when it is a symlink, when it collides with an earlier entry, or when
//! the archive breaks the configured [`ArchiveLimits`].

use crate::checksum::sha256_file;
use crate::{FilesError, FilesResult, RelativePath};
use filing_types::Sha256Hex;
use std::fs;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::ZipArchive;

const DEFAULT_MAX_ENTRIES: usize = 10_000;
const DEFAULT_MAX_TOTAL_BYTES: u64 = 4 * 1024 * 1024 * 1024;

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

/// Bounds on what a single archive may expand to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveLimits {
    /// Maximum number of entries, directories included
    pub max_entries: usize,
    /// Maximum total uncompressed bytes across all files
    pub max_total_bytes: u64,
}

impl Default for ArchiveLimits {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
        }
    }
}

/// One extracted file, still in staging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Location of the extracted bytes inside the staging directory
    pub staged: PathBuf,
    /// Destination relative to the base directory
    pub path: RelativePath,
    pub size: u64,
    pub sha256: Sha256Hex,
}

#[derive(Debug, Clone, Default)]
pub struct ArchiveExtractor {
    limits: ArchiveLimits,
}

impl ArchiveExtractor {
    pub fn new(limits: ArchiveLimits) -> Self {
        Self { limits }
    }

    /// Extracts `archive` into `extract_root` and returns the manifest of extracted files.
    ///
    /// Each entry's destination is `dest_subdir/<path inside the archive>`. Entries are
    /// listed in file-name order per directory. Nothing outside `extract_root` is written.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::Extraction`] if the archive is not a valid zip, contains an
    /// unsafe or duplicate entry, exceeds the limits, or an I/O error occurs.
    pub fn extract(
        &self,
        archive: &Path,
        extract_root: &Path,
        dest_subdir: Option<&RelativePath>,
    ) -> FilesResult<Vec<ManifestEntry>> {
        let written = self.unzip(archive, extract_root)?;
        tracing::debug!(
            archive = %archive.display(),
            bytes = written,
            "extracted archive into staging"
        );

        walk(extract_root)
            .map(|item| {
                let (staged, relative) = item?;
                let path = RelativePath::join_entry(dest_subdir, &relative)
                    .map_err(|e| FilesError::Extraction(e.to_string()))?;
                let size = fs::metadata(&staged).map_err(extraction_io)?.len();
                let sha256 = sha256_file(&staged).map_err(extraction_io)?;
                Ok(ManifestEntry {
                    staged,
                    path,
                    size,
                    sha256,
                })
            })
            .collect()
    }

    fn unzip(&self, archive: &Path, root: &Path) -> FilesResult<u64> {
        let file = fs::File::open(archive).map_err(extraction_io)?;
        let mut zip = ZipArchive::new(BufReader::new(file))
            .map_err(|e| FilesError::Extraction(format!("not a valid zip archive: {e}")))?;

        if zip.len() > self.limits.max_entries {
            return Err(FilesError::Extraction(format!(
                "archive has {} entries, limit is {}",
                zip.len(),
                self.limits.max_entries
            )));
        }

        fs::create_dir_all(root).map_err(extraction_io)?;
        let mut written: u64 = 0;

        for index in 0..zip.len() {
            let mut entry = zip
                .by_index(index)
                .map_err(|e| FilesError::Extraction(format!("unreadable entry #{index}: {e}")))?;
            let name = entry.name().to_owned();

            let Some(relative) = entry.enclosed_name() else {
                return Err(FilesError::Extraction(format!(
                    "entry escapes extraction root: '{}'",
                    name.escape_debug()
                )));
            };

            if entry
                .unix_mode()
                .is_some_and(|mode| mode & S_IFMT == S_IFLNK)
            {
                return Err(FilesError::Extraction(format!(
                    "symlink entries are not allowed: '{}'",
                    name.escape_debug()
                )));
            }

            if entry.is_dir() {
                fs::create_dir_all(root.join(&relative)).map_err(extraction_io)?;
                continue;
            }

            RelativePath::join_entry(None, &relative)
                .map_err(|e| FilesError::Extraction(e.to_string()))?;

            let budget = self.limits.max_total_bytes.saturating_sub(written);
            if entry.size() > budget {
                return Err(too_large(self.limits.max_total_bytes));
            }

            let target = root.join(&relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(extraction_io)?;
            }

            let mut out = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&target)
                .map_err(|e| match e.kind() {
                    io::ErrorKind::AlreadyExists => FilesError::Extraction(format!(
                        "duplicate entry: '{}'",
                        name.escape_debug()
                    )),
                    _ => extraction_io(e),
                })?;

            let copied = io::copy(&mut (&mut entry).take(budget.saturating_add(1)), &mut out)
                .map_err(extraction_io)?;
            if copied > budget {
                return Err(too_large(self.limits.max_total_bytes));
            }
            written += copied;
        }

        Ok(written)
    }
}

/// Lazily yields `(absolute, relative)` for every regular file under `root`.
fn walk(root: &Path) -> impl Iterator<Item = FilesResult<(PathBuf, PathBuf)>> + '_ {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(move |entry| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    return Some(Err(FilesError::Extraction(format!(
                        "failed to walk extracted files: {e}"
                    ))))
                }
            };
            if !entry.file_type().is_file() {
                return None;
            }
            let relative = match entry.path().strip_prefix(root) {
                Ok(relative) => relative.to_path_buf(),
                Err(e) => return Some(Err(FilesError::Extraction(e.to_string()))),
            };
            Some(Ok((entry.into_path(), relative)))
        })
}

fn extraction_io(e: io::Error) -> FilesError {
    FilesError::Extraction(e.to_string())
}

fn too_large(limit: u64) -> FilesError {
    FilesError::Extraction(format!("archive expands beyond {limit} bytes"))
}

#[cfg(test)]
pub(crate) fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    let mut writer = zip::ZipWriter::new(io::Cursor::new(Vec::new()));
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, data) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
    }
    writer.finish().unwrap().into_inner()
}

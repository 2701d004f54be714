//! Base-directory file storage
//!
//! [`Filestore`] composes staging, verification, conflict detection and the mover into the
//! three write operations exposed to callers: [`Filestore::put`], [`Filestore::unpack`]
//! and [`Filestore::delete`].
//!
//! Each write runs through the same states:
//!
//! ```text
//! Idle → Staged → Verified → Conflicted (error) | Moved (ok) → Released
//! ```
//!
//! `Released` is reached on every path: the staging handle is released explicitly once the
//! commit step returns, and removed by `Drop` if the thread unwinds before that.

use crate::archive::{ArchiveExtractor, ArchiveLimits};
use crate::checksum::verify_file;
use crate::constants::{EXTRACT_DIR_NAME, ZIP_EXTENSION};
use crate::lock::{NoLocks, PathLocks};
use crate::mover::AtomicMover;
use crate::staging::{StagingArea, StagingHandle};
use crate::{FilesError, FilesResult, RelativePath, SIDECAR_EXTENSION};
use filing_types::Sha256Hex;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Directory inside a staging area that receives sidecar files.
const SIDECAR_STAGING_DIR: &str = "sidecars";

/// Result of a successful write: one per persisted file.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FileRecord {
    pub path: RelativePath,
    pub size: u64,
    pub sha256: Sha256Hex,
}

/// Staged, checksum-verified storage rooted at one base directory.
///
/// The base directory is fixed for the lifetime of the store. All operations are
/// synchronous; async callers should run them on a blocking thread.
#[derive(Debug)]
pub struct Filestore {
    staging: StagingArea,
    mover: AtomicMover,
    extractor: ArchiveExtractor,
    locks: Arc<dyn PathLocks>,
    write_sidecars: bool,
}

impl Filestore {
    /// Creates a store rooted at `base_dir`.
    ///
    /// Defaults: staging under the system temp directory, no path locking, no sidecars,
    /// default archive limits.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidBaseDirectory`] if the directory does not exist, is
    /// not a directory, or cannot be canonicalised.
    pub fn new(base_dir: &Path) -> FilesResult<Self> {
        if !base_dir.exists() {
            return Err(FilesError::InvalidBaseDirectory(format!(
                "Directory does not exist: {}",
                base_dir.display()
            )));
        }

        if !base_dir.is_dir() {
            return Err(FilesError::InvalidBaseDirectory(format!(
                "Path is not a directory: {}",
                base_dir.display()
            )));
        }

        let base_dir = base_dir.canonicalize().map_err(|e| {
            FilesError::InvalidBaseDirectory(format!(
                "Cannot canonicalize path {}: {}",
                base_dir.display(),
                e
            ))
        })?;

        Ok(Self {
            mover: AtomicMover::new(base_dir),
            staging: StagingArea::system_default(),
            extractor: ArchiveExtractor::default(),
            locks: Arc::new(NoLocks),
            write_sidecars: false,
        })
    }

    /// Stages uploads under `root` instead of the system temp directory.
    pub fn with_staging_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.staging = StagingArea::new(root);
        self
    }

    /// Uses `locks` to serialise commits per destination path.
    pub fn with_locks(mut self, locks: Arc<dyn PathLocks>) -> Self {
        self.locks = locks;
        self
    }

    /// Writes a `<file>.sha256` sidecar next to every stored file.
    pub fn with_sidecars(mut self, enabled: bool) -> Self {
        self.write_sidecars = enabled;
        self
    }

    pub fn with_archive_limits(mut self, limits: ArchiveLimits) -> Self {
        self.extractor = ArchiveExtractor::new(limits);
        self
    }

    pub fn base_dir(&self) -> &Path {
        self.mover.base_dir()
    }

    pub fn staging_root(&self) -> &Path {
        self.staging.root()
    }

    pub fn writes_sidecars(&self) -> bool {
        self.write_sidecars
    }

    /// Stores `data` at `path` after verifying it hashes to `sha256`.
    ///
    /// # Errors
    ///
    /// - [`FilesError::StagingWrite`] if the bytes cannot be staged
    /// - [`FilesError::ChecksumMismatch`] if the digest differs
    /// - [`FilesError::Conflict`] if `path` (or its sidecar) already exists
    /// - [`FilesError::Move`] if the commit fails
    pub fn put(&self, path: &RelativePath, data: &[u8], sha256: &str) -> FilesResult<FileRecord> {
        let staged = self.staging.stage(path.file_name(), data)?;
        let result = self.commit_file(&staged, path, sha256);
        release(staged);
        result
    }

    /// Verifies a zip archive and stores every file in it under the archive's directory.
    ///
    /// Either all extracted files are moved, or, when any destination already exists,
    /// none are and every conflicting path is reported.
    ///
    /// # Errors
    ///
    /// - [`FilesError::UnsupportedArchive`] if `path` does not end in `.zip`
    /// - [`FilesError::StagingWrite`] / [`FilesError::ChecksumMismatch`] as for `put`
    /// - [`FilesError::Extraction`] if the archive is invalid or unsafe
    /// - [`FilesError::BatchConflict`] listing every occupied destination
    /// - [`FilesError::Move`] if the commit fails partway (earlier files stay moved)
    pub fn unpack(
        &self,
        path: &RelativePath,
        data: &[u8],
        sha256: &str,
    ) -> FilesResult<Vec<FileRecord>> {
        if !path.extension_is(ZIP_EXTENSION) {
            return Err(FilesError::UnsupportedArchive(path.to_string()));
        }

        let staged = self.staging.stage(path.file_name(), data)?;
        let result = self.commit_archive(&staged, path, sha256);
        release(staged);
        result
    }

    /// Removes the file at `path`, and its sidecar when sidecars are enabled.
    ///
    /// # Errors
    ///
    /// - [`FilesError::NotFound`] if nothing exists at `path`
    /// - [`FilesError::Delete`] for any other failure, including `path` being a directory
    pub fn delete(&self, path: &RelativePath) -> FilesResult<()> {
        let sidecar = path.sidecar();
        let mut keys = vec![path];
        if self.write_sidecars {
            keys.push(&sidecar);
        }
        let _guard = self.locks.acquire(&keys);

        let target = self.resolve(path);
        match fs::symlink_metadata(&target) {
            Ok(_) => {}
            Err(e) if is_missing(&e) => return Err(FilesError::NotFound(path.clone())),
            Err(source) => {
                return Err(FilesError::Delete {
                    path: path.clone(),
                    source,
                })
            }
        }

        fs::remove_file(&target).map_err(|source| FilesError::Delete {
            path: path.clone(),
            source,
        })?;

        if self.write_sidecars {
            match fs::remove_file(self.resolve(&sidecar)) {
                Ok(()) => tracing::debug!(path = %sidecar, "deleted sidecar"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(path = %sidecar, error = %e, "failed to delete sidecar"),
            }
        }

        tracing::info!(path = %path, "deleted file");
        Ok(())
    }

    /// Absolute location of `path` under the base directory.
    pub fn resolve(&self, path: &RelativePath) -> PathBuf {
        path.to_path(self.base_dir())
    }

    /// Reads a stored file.
    ///
    /// # Errors
    ///
    /// - [`FilesError::NotFound`] if no file exists at `path`
    /// - [`FilesError::Io`] if it cannot be read
    pub fn read(&self, path: &RelativePath) -> FilesResult<Vec<u8>> {
        fs::read(self.resolve(path)).map_err(|e| {
            if is_missing(&e) || e.kind() == io::ErrorKind::IsADirectory {
                FilesError::NotFound(path.clone())
            } else {
                FilesError::Io(e)
            }
        })
    }

    fn commit_file(
        &self,
        staged: &StagingHandle,
        path: &RelativePath,
        sha256: &str,
    ) -> FilesResult<FileRecord> {
        let digest = verify(staged, path, sha256)?;

        let sidecar = if self.write_sidecars {
            Some((stage_sidecar(staged.dir(), 0, path, &digest)?, path.sidecar()))
        } else {
            None
        };

        let mut keys = vec![path];
        if let Some((_, dest)) = &sidecar {
            keys.push(dest);
        }
        let _guard = self.locks.acquire(&keys);

        if let Some(occupied) = keys.iter().find(|dest| self.mover.is_occupied(dest)) {
            tracing::warn!(path = %occupied, "refusing to overwrite existing file");
            return Err(FilesError::Conflict((*occupied).clone()));
        }

        let sidecar = sidecar.as_ref().map(|(file, dest)| (file.as_path(), dest));
        self.move_with_sidecar(staged.file(), path, sidecar)?;

        let size = staged.size();
        tracing::info!(path = %path, size, sha256 = %digest, "stored file");

        Ok(FileRecord {
            path: path.clone(),
            size,
            sha256: digest,
        })
    }

    fn commit_archive(
        &self,
        staged: &StagingHandle,
        path: &RelativePath,
        sha256: &str,
    ) -> FilesResult<Vec<FileRecord>> {
        verify(staged, path, sha256)?;

        let dest_subdir = path.parent();
        let manifest = self.extractor.extract(
            staged.file(),
            &staged.dir().join(EXTRACT_DIR_NAME),
            dest_subdir.as_ref(),
        )?;

        let mut moves: Vec<(PathBuf, RelativePath)> = Vec::with_capacity(manifest.len());
        for (index, entry) in manifest.iter().enumerate() {
            moves.push((entry.staged.clone(), entry.path.clone()));
            if self.write_sidecars {
                let file = stage_sidecar(staged.dir(), index, &entry.path, &entry.sha256)?;
                moves.push((file, entry.path.sidecar()));
            }
        }

        let dests: Vec<&RelativePath> = moves.iter().map(|(_, dest)| dest).collect();
        let _guard = self.locks.acquire(&dests);

        let conflicts = self.collect_conflicts(&dests);
        if !conflicts.is_empty() {
            tracing::warn!(
                archive = %path,
                conflicts = conflicts.len(),
                "refusing to unpack over existing files"
            );
            return Err(FilesError::BatchConflict(conflicts));
        }

        let batch: Vec<(&Path, &RelativePath)> = moves
            .iter()
            .map(|(file, dest)| (file.as_path(), dest))
            .collect();
        self.mover.move_batch(&batch)?;

        tracing::info!(archive = %path, files = manifest.len(), "unpacked archive");

        Ok(manifest
            .into_iter()
            .map(|entry| FileRecord {
                path: entry.path,
                size: entry.size,
                sha256: entry.sha256,
            })
            .collect())
    }

    /// Moves the sidecar, then the file. If the file cannot be moved the sidecar is taken
    /// back out, so the destination stays free for a retry.
    fn move_with_sidecar(
        &self,
        staged: &Path,
        dest: &RelativePath,
        sidecar: Option<(&Path, &RelativePath)>,
    ) -> FilesResult<()> {
        if let Some((file, sidecar_dest)) = sidecar {
            self.mover.move_single(file, sidecar_dest)?;
        }

        let Err(e) = self.mover.move_single(staged, dest) else {
            return Ok(());
        };

        if let Some((_, sidecar_dest)) = sidecar {
            match fs::remove_file(self.resolve(sidecar_dest)) {
                Ok(()) => tracing::warn!(
                    path = %dest,
                    sidecar = %sidecar_dest,
                    error = %e,
                    "file move failed; removed its sidecar"
                ),
                Err(cleanup) => tracing::error!(
                    path = %dest,
                    sidecar = %sidecar_dest,
                    error = %e,
                    cleanup_error = %cleanup,
                    "file move failed and its sidecar could not be removed"
                ),
            }
        }
        Err(e)
    }

    /// Every destination that is occupied on disk or claimed twice in the same batch.
    fn collect_conflicts(&self, dests: &[&RelativePath]) -> Vec<RelativePath> {
        let mut seen = HashSet::with_capacity(dests.len());
        let mut conflicts: Vec<RelativePath> = dests
            .iter()
            .filter(|dest| !seen.insert(dest.as_str()) || self.mover.is_occupied(dest))
            .map(|dest| (*dest).clone())
            .collect();
        conflicts.sort();
        conflicts.dedup();
        conflicts
    }
}

fn verify(staged: &StagingHandle, path: &RelativePath, sha256: &str) -> FilesResult<Sha256Hex> {
    match verify_file(staged.file(), sha256) {
        Ok(digest) => {
            tracing::debug!(path = %path, sha256 = %digest, "checksum verified");
            Ok(digest)
        }
        Err(FilesError::ChecksumMismatch {
            expected, actual, ..
        }) => {
            tracing::warn!(path = %path, %expected, %actual, "checksum mismatch");
            Err(FilesError::ChecksumMismatch {
                path: path.to_string(),
                expected,
                actual,
            })
        }
        Err(FilesError::Io(source)) => Err(FilesError::StagingWrite {
            name: path.file_name().to_owned(),
            source,
        }),
        Err(other) => Err(other),
    }
}

/// Writes `"<digest> <filename>\n"` into the staging area and returns its location.
fn stage_sidecar(
    staging_dir: &Path,
    index: usize,
    dest: &RelativePath,
    digest: &Sha256Hex,
) -> FilesResult<PathBuf> {
    let dir = staging_dir.join(SIDECAR_STAGING_DIR);
    let file = dir.join(format!("{index}.{SIDECAR_EXTENSION}"));
    let fail = |source: io::Error| FilesError::StagingWrite {
        name: dest.sidecar().file_name().to_owned(),
        source,
    };

    fs::create_dir_all(&dir).map_err(fail)?;
    fs::write(&file, format!("{} {}\n", digest, dest.file_name())).map_err(fail)?;
    Ok(file)
}

fn release(staged: StagingHandle) {
    let dir = staged.dir().to_path_buf();
    if let Err(e) = staged.release() {
        tracing::warn!(
            staging_dir = %dir.display(),
            error = %e,
            "failed to remove staging directory"
        );
    }
}

fn is_missing(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::build_zip;
    use crate::checksum::{sha256_bytes, sha256_file};
    use crate::lock::KeyedLocks;
    use std::thread;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Filestore) {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("base");
        fs::create_dir_all(&base).unwrap();
        let store = Filestore::new(&base)
            .unwrap()
            .with_staging_root(temp.path().join("staging"));
        (temp, store)
    }

    fn rel(raw: &str) -> RelativePath {
        RelativePath::parse(raw).unwrap()
    }

    fn assert_staging_empty(store: &Filestore) {
        let leftover = fs::read_dir(store.staging_root())
            .map(|it| it.count())
            .unwrap_or(0);
        assert_eq!(leftover, 0, "staging directory left behind");
    }

    // Construction

    #[test]
    fn test_new_rejects_missing_base() {
        let temp = TempDir::new().unwrap();
        let result = Filestore::new(&temp.path().join("missing"));
        assert!(matches!(result, Err(FilesError::InvalidBaseDirectory(_))));
    }

    #[test]
    fn test_new_rejects_file_base() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file.txt");
        fs::write(&file, b"x").unwrap();
        let result = Filestore::new(&file);
        assert!(matches!(result, Err(FilesError::InvalidBaseDirectory(_))));
    }

    #[test]
    fn test_new_canonicalises_base() {
        let (temp, store) = setup();
        assert!(store.base_dir().is_absolute());
        assert_eq!(
            store.base_dir(),
            temp.path().join("base").canonicalize().unwrap()
        );
    }

    // put

    #[test]
    fn test_put_round_trip() {
        let (_temp, store) = setup();
        let data = b"Hello, World!";
        let digest = sha256_bytes(data);

        let record = store.put(&rel("a/b/c.txt"), data, digest.as_str()).unwrap();

        assert_eq!(record.path.as_str(), "a/b/c.txt");
        assert_eq!(record.size, 13);
        assert_eq!(record.sha256, digest);
        assert_eq!(store.read(&rel("a/b/c.txt")).unwrap(), data);
        assert_staging_empty(&store);
    }

    #[test]
    fn test_put_empty_file() {
        let (_temp, store) = setup();
        let digest = sha256_bytes(b"");

        let record = store.put(&rel("empty.dat"), b"", digest.as_str()).unwrap();
        assert_eq!(record.size, 0);
    }

    #[test]
    fn test_put_accepts_uppercase_digest() {
        let (_temp, store) = setup();
        let digest = sha256_bytes(b"data").as_str().to_ascii_uppercase();

        let record = store.put(&rel("upper.txt"), b"data", &digest).unwrap();
        assert_eq!(record.sha256.as_str(), digest.to_ascii_lowercase());
    }

    #[test]
    fn test_put_checksum_mismatch_creates_nothing() {
        let (_temp, store) = setup();
        let wrong = sha256_bytes(b"other");

        let result = store.put(&rel("dir/c.txt"), b"data", wrong.as_str());

        assert!(matches!(
            result,
            Err(FilesError::ChecksumMismatch { ref path, .. }) if path == "dir/c.txt"
        ));
        assert!(!store.base_dir().join("dir").exists());
        assert_staging_empty(&store);
    }

    #[test]
    fn test_put_malformed_digest_is_mismatch() {
        let (_temp, store) = setup();

        let result = store.put(&rel("c.txt"), b"data", "not-a-digest");
        assert!(matches!(result, Err(FilesError::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_put_twice_conflicts_and_keeps_original() {
        let (_temp, store) = setup();
        let path = rel("c.txt");
        let first = sha256_bytes(b"first");
        let second = sha256_bytes(b"second");

        store.put(&path, b"first", first.as_str()).unwrap();
        let result = store.put(&path, b"second", second.as_str());

        assert!(matches!(result, Err(FilesError::Conflict(ref p)) if p == &path));
        assert_eq!(store.read(&path).unwrap(), b"first");
        assert_staging_empty(&store);
    }

    #[test]
    fn test_put_conflicts_when_ancestor_is_file() {
        let (_temp, store) = setup();
        let digest = sha256_bytes(b"x");
        store.put(&rel("a"), b"x", digest.as_str()).unwrap();

        let result = store.put(&rel("a/b.txt"), b"x", digest.as_str());
        assert!(matches!(result, Err(FilesError::Conflict(ref p)) if p.as_str() == "a/b.txt"));
    }

    #[test]
    fn test_put_conflicts_with_directory() {
        let (_temp, store) = setup();
        fs::create_dir_all(store.base_dir().join("taken")).unwrap();
        let digest = sha256_bytes(b"x");

        let result = store.put(&rel("taken"), b"x", digest.as_str());
        assert!(matches!(result, Err(FilesError::Conflict(_))));
    }

    #[test]
    fn test_put_concurrent_same_path_with_keyed_locks() {
        let (_temp, store) = setup();
        let store = store.with_locks(Arc::new(KeyedLocks::new()));
        let path = rel("race.txt");

        let results: Vec<FilesResult<FileRecord>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8u8)
                .map(|i| {
                    let store = &store;
                    let path = &path;
                    scope.spawn(move || {
                        let data = vec![i; 16];
                        let digest = sha256_bytes(&data);
                        store.put(path, &data, digest.as_str())
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, FilesError::Conflict(_))));
        assert_staging_empty(&store);
    }

    // unpack

    #[test]
    fn test_unpack_moves_all_files() {
        let (_temp, store) = setup();
        let zip = build_zip(&[("x.txt", b"ex"), ("y/z.txt", b"zed")]);
        let digest = sha256_bytes(&zip);

        let records = store
            .unpack(&rel("drop/bundle.zip"), &zip, digest.as_str())
            .unwrap();

        assert_eq!(records.len(), 2);
        for record in &records {
            let on_disk = sha256_file(&store.resolve(&record.path)).unwrap();
            assert_eq!(record.sha256, on_disk);
        }
        assert_eq!(store.read(&rel("drop/x.txt")).unwrap(), b"ex");
        assert_eq!(store.read(&rel("drop/y/z.txt")).unwrap(), b"zed");
        assert!(!store.base_dir().join("drop/bundle.zip").exists());
        assert_staging_empty(&store);
    }

    #[test]
    fn test_unpack_top_level_archive() {
        let (_temp, store) = setup();
        let zip = build_zip(&[("x.txt", b"ex")]);
        let digest = sha256_bytes(&zip);

        let records = store.unpack(&rel("bundle.ZIP"), &zip, digest.as_str()).unwrap();
        assert_eq!(records[0].path.as_str(), "x.txt");
    }

    #[test]
    fn test_unpack_conflict_moves_nothing() {
        let (_temp, store) = setup();
        let existing = sha256_bytes(b"existing");
        store
            .put(&rel("drop/y/z.txt"), b"existing", existing.as_str())
            .unwrap();

        let zip = build_zip(&[("x.txt", b"ex"), ("y/z.txt", b"zed")]);
        let digest = sha256_bytes(&zip);
        let result = store.unpack(&rel("drop/bundle.zip"), &zip, digest.as_str());

        match result {
            Err(FilesError::BatchConflict(paths)) => {
                assert_eq!(paths, vec![rel("drop/y/z.txt")]);
            }
            other => panic!("expected batch conflict, got {other:?}"),
        }
        assert!(!store.base_dir().join("drop/x.txt").exists());
        assert_eq!(store.read(&rel("drop/y/z.txt")).unwrap(), b"existing");
        assert_staging_empty(&store);
    }

    #[test]
    fn test_unpack_reports_every_conflict() {
        let (_temp, store) = setup();
        fs::write(store.base_dir().join("a.txt"), b"1").unwrap();
        fs::write(store.base_dir().join("c.txt"), b"3").unwrap();

        let zip = build_zip(&[("a.txt", b"a"), ("b.txt", b"b"), ("c.txt", b"c")]);
        let digest = sha256_bytes(&zip);
        let result = store.unpack(&rel("bundle.zip"), &zip, digest.as_str());

        match result {
            Err(FilesError::BatchConflict(paths)) => {
                assert_eq!(paths, vec![rel("a.txt"), rel("c.txt")]);
            }
            other => panic!("expected batch conflict, got {other:?}"),
        }
        assert!(!store.base_dir().join("b.txt").exists());
    }

    #[test]
    fn test_unpack_rejects_non_zip() {
        let (_temp, store) = setup();
        let data = b"tarball";
        let digest = sha256_bytes(data);

        let result = store.unpack(&rel("bundle.tar"), data, digest.as_str());
        assert!(matches!(result, Err(FilesError::UnsupportedArchive(_))));
        assert_staging_empty(&store);
    }

    #[test]
    fn test_unpack_checksum_mismatch() {
        let (_temp, store) = setup();
        let zip = build_zip(&[("x.txt", b"ex")]);
        let wrong = sha256_bytes(b"other");

        let result = store.unpack(&rel("bundle.zip"), &zip, wrong.as_str());
        assert!(matches!(result, Err(FilesError::ChecksumMismatch { .. })));
        assert!(!store.base_dir().join("x.txt").exists());
        assert_staging_empty(&store);
    }

    #[test]
    fn test_unpack_corrupt_archive_cleans_up() {
        let (_temp, store) = setup();
        let data = b"PK\x03\x04 but not really";
        let digest = sha256_bytes(data);

        let result = store.unpack(&rel("bundle.zip"), data, digest.as_str());
        assert!(matches!(result, Err(FilesError::Extraction(_))));
        assert_eq!(fs::read_dir(store.base_dir()).unwrap().count(), 0);
        assert_staging_empty(&store);
    }

    #[test]
    fn test_unpack_traversal_entry_moves_nothing() {
        let (temp, store) = setup();
        let zip = build_zip(&[("good.txt", b"ok"), ("../../escape.txt", b"bad")]);
        let digest = sha256_bytes(&zip);

        let result = store.unpack(&rel("sub/bundle.zip"), &zip, digest.as_str());
        assert!(matches!(result, Err(FilesError::Extraction(_))));
        assert!(!store.base_dir().join("sub").exists());
        assert!(!temp.path().join("escape.txt").exists());
        assert_staging_empty(&store);
    }

    #[test]
    fn test_unpack_unsafe_entry_name_moves_nothing() {
        let (_temp, store) = setup();
        for name in ["z file.txt", ".hidden", "dir/caf\u{e9}.txt"] {
            let zip = build_zip(&[("ok.txt", b"ok"), (name, b"bad")]);
            let digest = sha256_bytes(&zip);

            let result = store.unpack(&rel("bundle.zip"), &zip, digest.as_str());
            assert!(
                matches!(result, Err(FilesError::Extraction(_))),
                "expected rejection of {name:?}"
            );
            assert_eq!(fs::read_dir(store.base_dir()).unwrap().count(), 0);
        }
        assert_staging_empty(&store);
    }

    #[test]
    fn test_unpacked_records_parse_back() {
        let (_temp, store) = setup();
        let zip = build_zip(&[("x.txt", b"ex"), ("y/z_file.txt", b"zed")]);
        let digest = sha256_bytes(&zip);

        let records = store.unpack(&rel("drop/bundle.zip"), &zip, digest.as_str()).unwrap();

        for record in &records {
            assert_eq!(&RelativePath::parse(record.path.as_str()).unwrap(), &record.path);
            let json = serde_json::to_string(record).unwrap();
            assert_eq!(&serde_json::from_str::<FileRecord>(&json).unwrap(), record);
            assert_eq!(store.read(&record.path).unwrap().len() as u64, record.size);
        }
    }

    #[test]
    fn test_unpack_empty_archive() {
        let (_temp, store) = setup();
        let zip = build_zip(&[("only-a-dir/", b"")]);
        let digest = sha256_bytes(&zip);

        let records = store.unpack(&rel("bundle.zip"), &zip, digest.as_str()).unwrap();
        assert!(records.is_empty());
    }

    // delete

    #[test]
    fn test_delete_missing_is_not_found() {
        let (_temp, store) = setup();
        let result = store.delete(&rel("nope.txt"));
        assert!(matches!(result, Err(FilesError::NotFound(_))));
    }

    #[test]
    fn test_delete_under_file_is_not_found() {
        let (_temp, store) = setup();
        fs::write(store.base_dir().join("a"), b"x").unwrap();
        let result = store.delete(&rel("a/b.txt"));
        assert!(matches!(result, Err(FilesError::NotFound(_))));
    }

    #[test]
    fn test_delete_removes_only_target() {
        let (_temp, store) = setup();
        let digest = sha256_bytes(b"x");
        store.put(&rel("d/one.txt"), b"x", digest.as_str()).unwrap();
        store.put(&rel("d/two.txt"), b"x", digest.as_str()).unwrap();

        store.delete(&rel("d/one.txt")).unwrap();

        assert!(!store.base_dir().join("d/one.txt").exists());
        assert_eq!(store.read(&rel("d/two.txt")).unwrap(), b"x");
    }

    #[test]
    fn test_delete_directory_is_delete_error() {
        let (_temp, store) = setup();
        fs::create_dir_all(store.base_dir().join("dir")).unwrap();

        let result = store.delete(&rel("dir"));
        assert!(matches!(result, Err(FilesError::Delete { .. })));
        assert!(store.base_dir().join("dir").exists());
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let (_temp, store) = setup();
        assert!(matches!(
            store.read(&rel("missing.txt")),
            Err(FilesError::NotFound(_))
        ));
    }

    // sidecars

    #[test]
    fn test_put_writes_sidecar() {
        let (_temp, store) = setup();
        let store = store.with_sidecars(true);
        let digest = sha256_bytes(b"data");

        store.put(&rel("docs/r.csv"), b"data", digest.as_str()).unwrap();

        let sidecar = fs::read_to_string(store.base_dir().join("docs/r.csv.sha256")).unwrap();
        assert_eq!(sidecar, format!("{} r.csv\n", digest));
        assert_staging_empty(&store);
    }

    #[test]
    fn test_put_with_sidecar_for_name_matching_staging_dirs() {
        let (_temp, store) = setup();
        let store = store.with_sidecars(true);

        for path in ["docs/Sidecars", "sidecars", "extracted", "payload"] {
            let digest = sha256_bytes(path.as_bytes());
            let record = store.put(&rel(path), path.as_bytes(), digest.as_str()).unwrap();
            assert_eq!(record.size, path.len() as u64);
            assert!(store.base_dir().join(format!("{path}.sha256")).is_file());
        }
        assert_staging_empty(&store);
    }

    #[test]
    fn test_failed_file_move_takes_back_sidecar() {
        let (temp, store) = setup();
        let sidecar = temp.path().join("staged.sha256");
        fs::write(&sidecar, b"digest").unwrap();
        let missing = temp.path().join("vanished");

        let result = store.move_with_sidecar(
            &missing,
            &rel("r.csv"),
            Some((sidecar.as_path(), &rel("r.csv.sha256"))),
        );

        assert!(matches!(result, Err(FilesError::Move { .. })));
        assert_eq!(fs::read_dir(store.base_dir()).unwrap().count(), 0);
    }

    #[test]
    fn test_put_conflicts_on_existing_sidecar() {
        let (_temp, store) = setup();
        let store = store.with_sidecars(true);
        fs::write(store.base_dir().join("r.csv.sha256"), b"stale").unwrap();
        let digest = sha256_bytes(b"data");

        let result = store.put(&rel("r.csv"), b"data", digest.as_str());
        assert!(matches!(result, Err(FilesError::Conflict(ref p)) if p.as_str() == "r.csv.sha256"));
        assert!(!store.base_dir().join("r.csv").exists());
    }

    #[test]
    fn test_unpack_writes_sidecars() {
        let (_temp, store) = setup();
        let store = store.with_sidecars(true);
        let zip = build_zip(&[("x.txt", b"ex"), ("y/z.txt", b"zed")]);
        let digest = sha256_bytes(&zip);

        let records = store.unpack(&rel("bundle.zip"), &zip, digest.as_str()).unwrap();

        assert_eq!(records.len(), 2);
        let sidecar = fs::read_to_string(store.base_dir().join("y/z.txt.sha256")).unwrap();
        assert_eq!(sidecar, format!("{} z.txt\n", sha256_bytes(b"zed")));
    }

    #[test]
    fn test_unpack_sidecar_colliding_with_entry_conflicts() {
        let (_temp, store) = setup();
        let store = store.with_sidecars(true);
        let zip = build_zip(&[("x.txt", b"ex"), ("x.txt.sha256", b"forged")]);
        let digest = sha256_bytes(&zip);

        let result = store.unpack(&rel("bundle.zip"), &zip, digest.as_str());
        assert!(matches!(result, Err(FilesError::BatchConflict(ref p)) if p == &vec![rel("x.txt.sha256")]));
        assert_eq!(fs::read_dir(store.base_dir()).unwrap().count(), 0);
    }

    #[test]
    fn test_delete_removes_sidecar() {
        let (_temp, store) = setup();
        let store = store.with_sidecars(true);
        let digest = sha256_bytes(b"data");
        store.put(&rel("r.csv"), b"data", digest.as_str()).unwrap();

        store.delete(&rel("r.csv")).unwrap();
        assert_eq!(fs::read_dir(store.base_dir()).unwrap().count(), 0);
    }

    #[test]
    fn test_file_record_serialization() {
        let record = FileRecord {
            path: rel("a/b.txt"),
            size: 3,
            sha256: sha256_bytes(b"abc"),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["path"], "a/b.txt");
        assert_eq!(json["size"], 3);
        assert_eq!(json["sha256"], sha256_bytes(b"abc").as_str());
    }
}

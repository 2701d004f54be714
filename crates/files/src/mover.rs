//! Committing verified files into the base directory.

use crate::constants::{DIR_MODE, IO_CHUNK_SIZE};
use crate::{FilesError, FilesResult, RelativePath};
use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Moves staged files to their destinations under the base directory, never replacing
/// an existing path.
#[derive(Debug, Clone)]
pub struct AtomicMover {
    base_dir: PathBuf,
}

impl AtomicMover {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Returns true if `dest` cannot be written without touching something that exists.
    ///
    /// That is the case when the destination itself exists (a dangling symlink counts), or
    /// when one of its ancestors exists but is not a directory.
    pub fn is_occupied(&self, dest: &RelativePath) -> bool {
        if fs::symlink_metadata(dest.to_path(&self.base_dir)).is_ok() {
            return true;
        }

        let Some(parent) = dest.parent() else {
            return false;
        };

        let mut current = self.base_dir.clone();
        for segment in parent.segments() {
            current.push(segment);
            match fs::metadata(&current) {
                Ok(meta) if meta.is_dir() => continue,
                Ok(_) => return true,
                Err(_) => return false,
            }
        }
        false
    }

    /// Moves one staged file to `dest`.
    ///
    /// # Errors
    ///
    /// - [`FilesError::Conflict`] if `dest` is occupied; nothing is modified
    /// - [`FilesError::Move`] if parent creation or the move fails; the staged file stays
    ///   where it is
    pub fn move_single(&self, staged: &Path, dest: &RelativePath) -> FilesResult<()> {
        if self.is_occupied(dest) {
            return Err(FilesError::Conflict(dest.clone()));
        }

        let target = dest.to_path(&self.base_dir);
        let fail = |source: io::Error| FilesError::Move {
            path: dest.clone(),
            source,
        };

        if let Some(parent) = target.parent() {
            create_dirs(parent).map_err(fail)?;
        }

        match fs::rename(staged, &target) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                copy_then_rename(staged, &target).map_err(fail)?;
            }
            Err(e) => return Err(fail(e)),
        }

        tracing::debug!(path = %dest, "moved staged file into place");
        Ok(())
    }

    /// Moves every entry in order.
    ///
    /// Conflicts are expected to have been ruled out beforehand. There is no rollback: if
    /// an entry fails, entries moved before it stay in place.
    pub fn move_batch(&self, entries: &[(&Path, &RelativePath)]) -> FilesResult<()> {
        for (index, (staged, dest)) in entries.iter().enumerate() {
            if let Err(e) = self.move_single(staged, dest) {
                tracing::error!(
                    path = %dest,
                    moved = index,
                    remaining = entries.len() - index,
                    error = %e,
                    "batch move failed partway; already moved files are kept"
                );
                return Err(e);
            }
        }
        Ok(())
    }
}

fn create_dirs(dir: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }
    builder.create(dir)
}

/// Copies into a hidden temporary file beside `target`, then links it into place without
/// replacing anything. Used when the staging root is on another filesystem.
fn copy_then_rename(staged: &Path, target: &Path) -> io::Result<()> {
    let parent = target
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "target has no parent"))?;

    let temp = tempfile::NamedTempFile::new_in(parent)?;
    {
        let mut reader = BufReader::with_capacity(IO_CHUNK_SIZE, fs::File::open(staged)?);
        let mut writer = BufWriter::with_capacity(IO_CHUNK_SIZE, temp.as_file());
        io::copy(&mut reader, &mut writer)?;
        writer.flush()?;
    }
    temp.as_file().sync_all()?;
    temp.persist_noclobber(target).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, AtomicMover, PathBuf) {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("base");
        let staging = temp.path().join("staging");
        fs::create_dir_all(&base).unwrap();
        fs::create_dir_all(&staging).unwrap();
        (temp, AtomicMover::new(&base), staging)
    }

    fn rel(raw: &str) -> RelativePath {
        RelativePath::parse(raw).unwrap()
    }

    #[test]
    fn test_move_single_creates_parents() {
        let (_temp, mover, staging) = setup();
        let staged = staging.join("c.txt");
        fs::write(&staged, b"content").unwrap();

        mover.move_single(&staged, &rel("a/b/c.txt")).unwrap();

        let target = mover.base_dir().join("a/b/c.txt");
        assert_eq!(fs::read(&target).unwrap(), b"content");
        assert!(!staged.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_move_single_directory_mode() {
        use std::os::unix::fs::PermissionsExt;

        let (_temp, mover, staging) = setup();
        let staged = staging.join("c.txt");
        fs::write(&staged, b"content").unwrap();

        mover.move_single(&staged, &rel("new/c.txt")).unwrap();

        let mode = fs::metadata(mover.base_dir().join("new"))
            .unwrap()
            .permissions()
            .mode();
        // umask may only remove bits
        assert_eq!(mode & 0o777 & !DIR_MODE, 0);
        assert_ne!(mode & 0o700, 0);
    }

    #[test]
    fn test_move_single_refuses_existing() {
        let (_temp, mover, staging) = setup();
        let target = mover.base_dir().join("c.txt");
        fs::write(&target, b"original").unwrap();
        let staged = staging.join("c.txt");
        fs::write(&staged, b"replacement").unwrap();

        let result = mover.move_single(&staged, &rel("c.txt"));

        assert!(matches!(result, Err(FilesError::Conflict(ref p)) if p.as_str() == "c.txt"));
        assert_eq!(fs::read(&target).unwrap(), b"original");
        assert!(staged.exists());
    }

    #[test]
    fn test_is_occupied_when_ancestor_is_file() {
        let (_temp, mover, _staging) = setup();
        fs::write(mover.base_dir().join("a"), b"file").unwrap();

        assert!(mover.is_occupied(&rel("a/b/c.txt")));
        assert!(!mover.is_occupied(&rel("x/y.txt")));
    }

    #[cfg(unix)]
    #[test]
    fn test_is_occupied_by_dangling_symlink() {
        let (_temp, mover, _staging) = setup();
        std::os::unix::fs::symlink("/nonexistent/target", mover.base_dir().join("link.txt"))
            .unwrap();

        assert!(mover.is_occupied(&rel("link.txt")));
    }

    #[test]
    fn test_move_single_missing_source_is_move_error() {
        let (_temp, mover, staging) = setup();

        let result = mover.move_single(&staging.join("absent"), &rel("a.txt"));
        assert!(matches!(result, Err(FilesError::Move { .. })));
    }

    #[test]
    fn test_move_batch_keeps_earlier_moves_on_failure() {
        let (_temp, mover, staging) = setup();
        let first = staging.join("one.txt");
        fs::write(&first, b"1").unwrap();
        let missing = staging.join("two.txt");

        let one = rel("one.txt");
        let two = rel("two.txt");
        let result = mover.move_batch(&[(first.as_path(), &one), (missing.as_path(), &two)]);

        assert!(matches!(result, Err(FilesError::Move { .. })));
        assert!(mover.base_dir().join("one.txt").exists());
        assert!(!mover.base_dir().join("two.txt").exists());
    }

    #[test]
    fn test_copy_then_rename_does_not_clobber() {
        let (_temp, mover, staging) = setup();
        let staged = staging.join("c.txt");
        fs::write(&staged, b"copy me").unwrap();
        let target = mover.base_dir().join("c.txt");

        copy_then_rename(&staged, &target).unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"copy me");

        assert!(copy_then_rename(&staged, &target).is_err());
        assert_eq!(
            fs::read_dir(mover.base_dir()).unwrap().count(),
            1,
            "temporary copy must not be left behind"
        );
    }
}

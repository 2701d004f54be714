//! Per-destination mutual exclusion
//!
//! The check-then-move sequence in [`crate::Filestore`] is only race-free if no other
//! request commits to the same destination in between. [`PathLocks`] lets the caller
//! decide how much coordination it wants: [`NoLocks`] keeps the best-effort behaviour,
//! [`KeyedLocks`] serialises writers per normalised destination path inside one process.

use crate::RelativePath;
use parking_lot::{Condvar, Mutex};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

/// Provider of locks keyed by destination path.
pub trait PathLocks: Send + Sync + fmt::Debug {
    /// Blocks until every path in `paths` is held by the caller.
    ///
    /// The locks are released when the returned guard is dropped.
    fn acquire(&self, paths: &[&RelativePath]) -> PathLockGuard<'_>;
}

/// Holds the locks taken by [`PathLocks::acquire`] until dropped.
#[must_use = "the paths are unlocked as soon as the guard is dropped"]
pub struct PathLockGuard<'a> {
    _held: Option<Box<dyn Send + 'a>>,
}

impl<'a> PathLockGuard<'a> {
    /// A guard that holds nothing.
    pub fn unlocked() -> Self {
        Self { _held: None }
    }

    /// Wraps any value that releases its locks when dropped.
    pub fn holding(held: impl Send + 'a) -> Self {
        Self {
            _held: Some(Box::new(held)),
        }
    }
}

impl fmt::Debug for PathLockGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathLockGuard")
            .field("held", &self._held.is_some())
            .finish()
    }
}

/// No coordination: concurrent requests for one destination may both pass the
/// existence check.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLocks;

impl PathLocks for NoLocks {
    fn acquire(&self, _paths: &[&RelativePath]) -> PathLockGuard<'_> {
        PathLockGuard::unlocked()
    }
}

/// In-process locks keyed by normalised destination path.
///
/// A caller takes all of its keys at once or waits, so batches sharing some paths cannot
/// deadlock each other.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of paths currently held.
    pub fn held_count(&self) -> usize {
        self.held.lock().len()
    }

    fn release(&self, keys: &[String]) {
        let mut held = self.held.lock();
        for key in keys {
            held.remove(key);
        }
        drop(held);
        self.released.notify_all();
    }
}

impl PathLocks for KeyedLocks {
    fn acquire(&self, paths: &[&RelativePath]) -> PathLockGuard<'_> {
        let keys: Vec<String> = paths
            .iter()
            .map(|p| p.as_str().to_owned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut held = self.held.lock();
        while keys.iter().any(|k| held.contains(k)) {
            self.released.wait(&mut held);
        }
        held.extend(keys.iter().cloned());
        drop(held);

        PathLockGuard::holding(HeldKeys { locks: self, keys })
    }
}

struct HeldKeys<'a> {
    locks: &'a KeyedLocks,
    keys: Vec<String>,
}

impl Drop for HeldKeys<'_> {
    fn drop(&mut self) {
        self.locks.release(&self.keys);
    }
}

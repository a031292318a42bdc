//! Per-path mutual exclusion for the record store
//!
//! Each resolved record path gets its own mutex, created on first use and kept for
//! the lifetime of the owning [`LockManager`]. Unrelated paths never contend.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type PathLock = Arc<Mutex<()>>;

/// Lock table keyed by record path
#[derive(Debug, Default)]
pub struct LockManager {
  locks: Mutex<HashMap<PathBuf, PathLock>>,
}

impl LockManager {
  pub fn new() -> Self {
    Self::default()
  }

  /// Get (or create) the lock for a path
  fn lock_for(&self, path: &Path) -> PathLock {
    // The table only guards the map; a poisoned table is still structurally valid.
    let mut table = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
    table.entry(path.to_path_buf()).or_default().clone()
  }

  /// Run `f` while holding the lock for `path`
  pub fn with_path<R>(&self, path: &Path, f: impl FnOnce() -> R) -> R {
    let lock = self.lock_for(path);
    let _guard = acquire(&lock);
    f()
  }

  /// Run `f` while holding the locks for two paths.
  ///
  /// Locks are taken in path order so two callers locking the same pair cannot deadlock.
  pub fn with_paths<R>(&self, a: &Path, b: &Path, f: impl FnOnce() -> R) -> R {
    if a == b {
      return self.with_path(a, f);
    }
    let (first, second) = if a < b { (a, b) } else { (b, a) };
    let first_lock = self.lock_for(first);
    let second_lock = self.lock_for(second);
    let _first_guard = acquire(&first_lock);
    let _second_guard = acquire(&second_lock);
    f()
  }

  /// Number of distinct paths that have been locked so far
  #[cfg(test)]
  fn len(&self) -> usize {
    self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
  }
}

fn acquire(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
  // A panic while holding a path lock leaves no shared state behind besides the file
  // itself, which is only ever replaced by rename.
  lock.lock().unwrap_or_else(PoisonError::into_inner)
}

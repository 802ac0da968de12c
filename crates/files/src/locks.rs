//! Per-directory mutual exclusion for index updates.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Hands out one lock per upload directory.
///
/// The lookup, write and index update for a directory run while its lock is
/// held, so two uploads into the same directory cannot overwrite each other's
/// index entries. Uploads into different directories never contend.
///
/// An entry lives only while some caller holds a [`DirectoryLease`] for it.
#[derive(Debug, Default)]
pub struct DirectoryLocks {
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl DirectoryLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a lease on the lock guarding `directory`, creating it if no
    /// other caller currently holds one.
    pub fn lease(&self, directory: &Path) -> DirectoryLease<'_> {
        let mut locks = self.map();
        let lock = locks
            .entry(directory.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        DirectoryLease {
            owner: self,
            directory: directory.to_path_buf(),
            lock: Some(lock),
        }
    }

    /// Number of directories with at least one outstanding lease.
    #[cfg(test)]
    pub(crate) fn tracked(&self) -> usize {
        self.map().len()
    }

    fn map(&self) -> MutexGuard<'_, HashMap<PathBuf, Arc<Mutex<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A claim on one directory's lock. Dropping the last lease for a directory
/// removes its entry.
#[derive(Debug)]
pub struct DirectoryLease<'a> {
    owner: &'a DirectoryLocks,
    directory: PathBuf,
    lock: Option<Arc<Mutex<()>>>,
}

impl DirectoryLease<'_> {
    /// Blocks until the directory is free. A poisoned lock is recovered, since
    /// it guards no data of its own.
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        match &self.lock {
            Some(lock) => lock.lock().unwrap_or_else(PoisonError::into_inner),
            None => unreachable!("lease lock is only taken on drop"),
        }
    }
}

impl Drop for DirectoryLease<'_> {
    fn drop(&mut self) {
        // Reference counts only change under the map lock, so a count of one
        // means the map holds the sole remaining reference.
        let mut locks = self.owner.map();
        drop(self.lock.take());
        let unused = locks
            .get(&self.directory)
            .is_some_and(|lock| Arc::strong_count(lock) == 1);
        if unused {
            locks.remove(&self.directory);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_same_directory_shares_lock() {
        let locks = DirectoryLocks::new();
        let a = locks.lease(Path::new("/store/books"));
        let b = locks.lease(Path::new("/store/books"));

        let _held = a.lock();
        assert!(b.lock.as_ref().unwrap().try_lock().is_err());
        assert_eq!(locks.tracked(), 1);
    }

    #[test]
    fn test_different_directories_do_not_contend() {
        let locks = DirectoryLocks::new();
        let books = locks.lease(Path::new("/store/books"));
        let documents = locks.lease(Path::new("/store/documents"));

        let _held = books.lock();
        assert!(documents.lock.as_ref().unwrap().try_lock().is_ok());
        assert_eq!(locks.tracked(), 2);
    }

    #[test]
    fn test_entry_removed_when_last_lease_dropped() {
        let locks = DirectoryLocks::new();
        let first = locks.lease(Path::new("/store/books"));
        let second = locks.lease(Path::new("/store/books"));

        drop(first);
        assert_eq!(locks.tracked(), 1);

        drop(second);
        assert_eq!(locks.tracked(), 0);
    }

    #[test]
    fn test_entries_removed_after_concurrent_leases() {
        let locks = DirectoryLocks::new();

        thread::scope(|scope| {
            for i in 0..16 {
                let locks = &locks;
                scope.spawn(move || {
                    for _ in 0..50 {
                        let lease = locks.lease(Path::new(&format!("/store/d{}", i % 4)));
                        let _guard = lease.lock();
                    }
                });
            }
        });

        assert_eq!(locks.tracked(), 0);
    }
}

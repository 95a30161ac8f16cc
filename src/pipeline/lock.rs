//! Lock file guarding one subdirectory's output against concurrent runs

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    pub run_id: String,
    pub acquired_at: DateTime<Utc>,
}

/// Held lock; the file is removed on drop
#[derive(Debug)]
pub struct SubdirLock {
    path: PathBuf,
    info: LockInfo,
}

impl SubdirLock {
    /// Try to take the lock at `path`.
    ///
    /// Returns `Ok(None)` when another run holds a lock younger than
    /// `stale_after`; older locks are reclaimed.
    pub fn acquire(path: &Path, run_id: &str, stale_after: Duration) -> Result<Option<Self>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        for _ in 0..2 {
            let info = LockInfo {
                run_id: run_id.to_string(),
                acquired_at: Utc::now(),
            };
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    file.write_all(serde_json::to_string(&info)?.as_bytes())?;
                    file.sync_all()?;
                    debug!("Acquired lock {}", path.display());
                    return Ok(Some(Self {
                        path: path.to_path_buf(),
                        info,
                    }));
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if !is_stale(path, stale_after) {
                        return Ok(None);
                    }
                    warn!("Reclaiming stale lock {}", path.display());
                    if !reclaim_stale(path, stale_after)? {
                        return Ok(None);
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        // lost the race for a reclaimed lock
        Ok(None)
    }

    pub fn info(&self) -> &LockInfo {
        &self.info
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SubdirLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                warn!("Failed to remove lock {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Move a stale lock out of the way.
///
/// The file is renamed to a unique name first and only deleted once the
/// renamed file is confirmed stale, so a lock that another run created
/// after our staleness check is put back instead of removed. Returns
/// whether the lock path is free to retry.
fn reclaim_stale(path: &Path, stale_after: Duration) -> Result<bool> {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{}.stale", Uuid::new_v4()));
    let moved = PathBuf::from(name);

    match std::fs::rename(path, &moved) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e.into()),
    }

    if is_stale(&moved, stale_after) {
        std::fs::remove_file(&moved)?;
        return Ok(true);
    }

    debug!("Lock {} was taken by another run, restoring it", path.display());
    match std::fs::hard_link(&moved, path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            warn!("Lock {} was replaced while restoring it", path.display());
        }
        Err(e) => {
            warn!("Failed to restore lock {}: {}", path.display(), e);
            return Err(e.into());
        }
    }
    std::fs::remove_file(&moved)?;
    Ok(false)
}

/// Age of the lock from its recorded timestamp, or from the file's
/// modification time when the content is unreadable
fn is_stale(path: &Path, stale_after: Duration) -> bool {
    let acquired_at = std::fs::read_to_string(path)
        .ok()
        .and_then(|s| serde_json::from_str::<LockInfo>(&s).ok())
        .map(|info| info.acquired_at)
        .or_else(|| {
            std::fs::metadata(path)
                .and_then(|m| m.modified())
                .ok()
                .map(DateTime::<Utc>::from)
        });

    match acquired_at {
        Some(at) => Utc::now()
            .signed_duration_since(at)
            .to_std()
            .map(|age| age >= stale_after)
            .unwrap_or(false),
        // vanished between the failed create and now
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Energy.lock");

        {
            let lock = SubdirLock::acquire(&path, "run-a", Duration::from_secs(3600)).unwrap().unwrap();
            assert_eq!(lock.info().run_id, "run-a");
            assert!(path.exists());

            let second = SubdirLock::acquire(&path, "run-b", Duration::from_secs(3600)).unwrap();
            assert!(second.is_none());
        }

        assert!(!path.exists());
    }

    #[test]
    fn test_stale_lock_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Energy.lock");
        let old = LockInfo {
            run_id: "crashed".to_string(),
            acquired_at: Utc::now() - chrono::Duration::hours(2),
        };
        std::fs::write(&path, serde_json::to_string(&old).unwrap()).unwrap();

        let lock = SubdirLock::acquire(&path, "run-b", Duration::from_secs(3600)).unwrap();
        assert_eq!(lock.unwrap().info().run_id, "run-b");
    }

    #[test]
    fn test_garbage_lock_uses_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Energy.lock");
        std::fs::write(&path, "not json").unwrap();

        assert!(SubdirLock::acquire(&path, "run-b", Duration::from_secs(3600)).unwrap().is_none());
        assert!(SubdirLock::acquire(&path, "run-b", Duration::ZERO).unwrap().is_some());
    }

    #[test]
    fn test_reclaim_restores_fresh_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Energy.lock");
        let fresh = LockInfo {
            run_id: "run-a".to_string(),
            acquired_at: Utc::now(),
        };
        let content = serde_json::to_string(&fresh).unwrap();
        std::fs::write(&path, &content).unwrap();

        // the lock was judged stale, then run-a took it before the rename
        assert!(!reclaim_stale(&path, Duration::from_secs(3600)).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), content);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_reclaim_removes_stale_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Energy.lock");
        let old = LockInfo {
            run_id: "crashed".to_string(),
            acquired_at: Utc::now() - chrono::Duration::hours(2),
        };
        std::fs::write(&path, serde_json::to_string(&old).unwrap()).unwrap();

        assert!(reclaim_stale(&path, Duration::from_secs(3600)).unwrap());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        // already gone: nothing to reclaim, the path is free
        assert!(reclaim_stale(&path, Duration::from_secs(3600)).unwrap());
    }
}

//! Cross-process mutual exclusion without a database: a lock is a file
//! created with exclusive-create semantics, holding `{pid, timestamp,
//! version}`. A lock older than [`STALE_AFTER_SECS`] is presumed abandoned
//! by a crashed owner and may be seized.
//!
//! Non-blocking by contract: a caller that fails to acquire skips the
//! guarded optional action (self-update, duplicate background upload) and
//! continues the primary task. Contention is never an error.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Age in seconds after which a lock file is considered abandoned.
pub const STALE_AFTER_SECS: i64 = 300;

/// Persisted lock payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    pub pid: u32,
    pub timestamp: i64,
    pub version: String,
}

/// Path of the self-update lock under the tool's state directory.
pub fn update_lock_path(state_dir: &Path) -> PathBuf {
    state_dir.join("update.lock")
}

/// Path of the background-upload guard under the tool's state directory.
pub fn upload_guard_path(state_dir: &Path) -> PathBuf {
    state_dir.join("upload.lock")
}

/// Releasable handle to an acquired lock. Best-effort deleted on drop.
#[derive(Debug)]
pub struct LockHandle {
    path: PathBuf,
    released: bool,
}

impl LockHandle {
    /// Delete the lock file. Failures (already gone) are swallowed.
    pub fn release(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        if !self.released {
            let _ = std::fs::remove_file(&self.path);
            self.released = true;
        }
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        self.remove();
    }
}

/// Try to acquire the lock at `path` without blocking.
///
/// Creates the lock file exclusively; if it already exists, reads it and
/// seizes it only when older than [`STALE_AFTER_SECS`] or unparsable
/// (corrupt lock ⇒ assume abandoned), retrying acquisition exactly once.
/// Returns `None` when another live process holds the lock.
pub fn try_acquire(path: &Path, version: &str) -> Option<LockHandle> {
    for attempt in 0..2 {
        match create_exclusive(path, version) {
            Ok(()) => {
                return Some(LockHandle {
                    path: path.to_path_buf(),
                    released: false,
                });
            }
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                if attempt > 0 {
                    // Lost the post-takeover race to another process
                    return None;
                }
                match read_info(path) {
                    Some(info) if now_unix() - info.timestamp <= STALE_AFTER_SECS => {
                        debug!(path = %path.display(), holder = info.pid, "lock held");
                        return None;
                    }
                    stale => {
                        debug!(
                            path = %path.display(),
                            parsed = stale.is_some(),
                            "seizing stale lock"
                        );
                        let _ = std::fs::remove_file(path);
                    }
                }
            }
            Err(_) => return None,
        }
    }
    None
}

/// Read the lock payload, if the file exists and parses.
pub fn read_info(path: &Path) -> Option<LockInfo> {
    let content = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

fn create_exclusive(path: &Path, version: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    let info = LockInfo {
        pid: std::process::id(),
        timestamp: now_unix(),
        version: version.to_string(),
    };
    let payload = serde_json::to_string(&info).map_err(std::io::Error::other)?;
    file.write_all(payload.as_bytes())?;
    file.flush()
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_one_acquirer_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("upload.lock");

        let first = try_acquire(&path, "0.2.0");
        assert!(first.is_some());
        // Second acquire against the same path loses without blocking
        assert!(try_acquire(&path, "0.2.0").is_none());

        first.unwrap().release();
        assert!(try_acquire(&path, "0.2.0").is_some());
    }

    #[test]
    fn payload_holds_pid_and_version() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("update.lock");
        let _handle = try_acquire(&path, "1.4.2").unwrap();

        let info = read_info(&path).unwrap();
        assert_eq!(info.pid, std::process::id());
        assert_eq!(info.version, "1.4.2");
        assert!(info.timestamp > 0);
    }

    #[test]
    fn stale_lock_is_seized() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("update.lock");
        let stale = LockInfo {
            pid: 99999,
            timestamp: now_unix() - STALE_AFTER_SECS - 60,
            version: "0.1.0".into(),
        };
        std::fs::write(&path, serde_json::to_string(&stale).unwrap()).unwrap();

        let handle = try_acquire(&path, "0.2.0");
        assert!(handle.is_some(), "stale lock should be seized");
        let info = read_info(&path).unwrap();
        assert_eq!(info.pid, std::process::id());
    }

    #[test]
    fn fresh_lock_is_respected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("update.lock");
        let fresh = LockInfo {
            pid: 99999,
            timestamp: now_unix() - 10,
            version: "0.1.0".into(),
        };
        std::fs::write(&path, serde_json::to_string(&fresh).unwrap()).unwrap();

        assert!(try_acquire(&path, "0.2.0").is_none());
        // File untouched
        assert_eq!(read_info(&path).unwrap().pid, 99999);
    }

    #[test]
    fn corrupt_lock_treated_as_abandoned() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("upload.lock");
        std::fs::write(&path, "not json at all").unwrap();

        assert!(try_acquire(&path, "0.2.0").is_some());
    }

    #[test]
    fn drop_releases_the_lock() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("upload.lock");
        {
            let _handle = try_acquire(&path, "0.2.0").unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
        assert!(try_acquire(&path, "0.2.0").is_some());
    }

    #[test]
    fn release_of_already_deleted_lock_is_silent() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("upload.lock");
        let handle = try_acquire(&path, "0.2.0").unwrap();
        std::fs::remove_file(&path).unwrap();
        handle.release(); // must not panic
    }

    #[test]
    fn well_known_paths() {
        let dir = Path::new("/tmp/shiplog-state");
        assert_eq!(update_lock_path(dir), dir.join("update.lock"));
        assert_eq!(upload_guard_path(dir), dir.join("upload.lock"));
    }
}

//! Best-effort guard against overlapping runs.
//!
//! The lock is a file created with `create_new`, holding the owner's pid and
//! acquisition time. It is removed when the guard drops. A lock older than
//! the configured staleness window is assumed abandoned by a crashed run and
//! replaced.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StateError;

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    pid: u32,
    acquired_at: DateTime<Utc>,
}

/// Held run lock; released on drop.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Take the lock at `path`, replacing it if older than `stale_after`.
    pub fn acquire(path: impl AsRef<Path>, stale_after: Duration) -> Result<Self, StateError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        match Self::create(path) {
            Ok(lock) => Ok(lock),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let since = lock_time(path);
                let held = since.map(|t| Utc::now().signed_duration_since(t));
                // A timestamp in the future comes from clock skew and never ages out.
                let stale =
                    held.is_some_and(|d| d.to_std().map_or(true, |age| age >= stale_after));

                if !stale {
                    return Err(StateError::Locked {
                        path: path.display().to_string(),
                        since: since.map_or_else(|| "unknown".to_string(), |t| t.to_rfc3339()),
                    });
                }

                log::warn!(
                    "Replacing stale lock {} (held for {}s)",
                    path.display(),
                    held.map_or(0, |d| d.num_seconds())
                );
                fs::remove_file(path)?;
                Ok(Self::create(path)?)
            }
            Err(e) => Err(StateError::Io(e)),
        }
    }

    fn create(path: &Path) -> std::io::Result<Self> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        let info = LockInfo {
            pid: std::process::id(),
            acquired_at: Utc::now(),
        };
        let body = serde_json::to_vec(&info).map_err(std::io::Error::other)?;
        file.write_all(&body)?;
        file.sync_all()?;
        log::debug!("Acquired run lock {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("Failed to release run lock {}: {e}", self.path.display());
        }
    }
}

/// Acquisition time from the lock body, or the file's mtime.
fn lock_time(path: &Path) -> Option<DateTime<Utc>> {
    let from_body = fs::read(path)
        .ok()
        .and_then(|bytes| serde_json::from_slice::<LockInfo>(&bytes).ok())
        .map(|info| info.acquired_at);

    from_body.or_else(|| {
        fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from)
    })
}

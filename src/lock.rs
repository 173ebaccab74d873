//! Per-device run lock.
//!
//! A [`RunLock`] holds an exclusive, non-blocking OS lock on
//! `<lock_dir>/temp_notifier-<device>.lock`. On Unix this is `flock(2)`, so
//! the kernel drops the lock when the process dies, however it dies. The
//! file itself is left in place and only carries the holder's PID for
//! operators; its existence means nothing.

use crate::error::{MonitorError, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// An acquired device lock. Released on [`release`](Self::release) or drop.
#[derive(Debug)]
pub struct RunLock {
    device: String,
    path: PathBuf,
    file: Option<File>,
}

/// Check that `device` can name a lock file on its own.
///
/// Only `[A-Za-z0-9_-]` is accepted, so distinct devices never share a path.
pub fn validate_device_name(device: &str) -> Result<()> {
    if device.is_empty() {
        return Err(MonitorError::config_error("device name must not be empty"));
    }
    match device
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        Some(c) => Err(MonitorError::config_error(format!(
            "device name '{}' contains {:?}; use letters, digits, '-' or '_'",
            device, c
        ))),
        None => Ok(()),
    }
}

/// Lock file path for `device` inside `lock_dir`.
pub fn lock_path(lock_dir: &Path, device: &str) -> PathBuf {
    lock_dir.join(format!("temp_notifier-{}.lock", device))
}

impl RunLock {
    /// Try to take the lock for `device` without waiting.
    ///
    /// # Errors
    ///
    /// [`MonitorError::LockHeld`] if another holder has it,
    /// [`MonitorError::Lock`] if the lock file cannot be used at all,
    /// [`MonitorError::Config`] for a device name rejected by
    /// [`validate_device_name`].
    pub fn acquire(lock_dir: &Path, device: &str) -> Result<Self> {
        validate_device_name(device)?;
        let path = lock_path(lock_dir, device);
        let lock_err = |source| MonitorError::Lock {
            path: path.clone(),
            source,
        };

        std::fs::create_dir_all(lock_dir).map_err(lock_err)?;
        let mut file = sys::open_locked(&path).map_err(|e| {
            if sys::is_contended(&e) {
                MonitorError::LockHeld {
                    device: device.to_string(),
                    path: path.clone(),
                }
            } else {
                lock_err(e)
            }
        })?;

        // Only the holder reaches this point, so truncating is safe.
        if let Err(e) = file
            .set_len(0)
            .and_then(|_| writeln!(file, "{}", std::process::id()))
        {
            warn!(path = %path.display(), error = %e, "Failed to record PID in lock file");
        }

        info!(device, path = %path.display(), "Lock acquired");
        Ok(Self {
            device: device.to_string(),
            path,
            file: Some(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Release the lock. Calling this more than once is a no-op.
    pub fn release(&mut self) {
        let Some(file) = self.file.take() else {
            debug!(device = %self.device, "Lock already released");
            return;
        };
        if let Err(e) = sys::unlock(file, &self.path) {
            warn!(device = %self.device, error = %e, "Explicit unlock failed; lock drops with the file");
        }
        info!(device = %self.device, path = %self.path.display(), "Lock released");
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(unix)]
mod sys {
    use super::*;
    use std::os::unix::io::AsRawFd;

    pub fn open_locked(path: &Path) -> std::io::Result<File> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        // SAFETY: `file` owns a valid descriptor for the duration of the call.
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc != 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(file)
    }

    pub fn is_contended(err: &std::io::Error) -> bool {
        err.kind() == std::io::ErrorKind::WouldBlock
            || err.raw_os_error() == Some(libc::EWOULDBLOCK)
    }

    pub fn unlock(file: File, _path: &Path) -> std::io::Result<()> {
        // SAFETY: as above.
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_UN) };
        if rc != 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(())
    }
}

#[cfg(not(unix))]
mod sys {
    use super::*;

    pub fn open_locked(path: &Path) -> std::io::Result<File> {
        OpenOptions::new().write(true).create_new(true).open(path)
    }

    pub fn is_contended(err: &std::io::Error) -> bool {
        err.kind() == std::io::ErrorKind::AlreadyExists
    }

    pub fn unlock(file: File, path: &Path) -> std::io::Result<()> {
        drop(file);
        std::fs::remove_file(path)
    }
}

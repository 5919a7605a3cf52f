//! Per-mirror lock so two local invocations never drive the same remote tree.
//!
//! PID-based lock files under `<data dir>/rbp/locks/`, named by the blake3
//! hash of the remote source dir. Invocations from other workstations are not
//! covered; one writer per remote mirror is assumed across hosts.

use crate::errors::{RemotingError, Result};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Grace period for a holder that has created its lock file but not yet
/// written its PID.
const PID_WRITE_GRACE: Duration = Duration::from_millis(50);

/// Held while a full cycle runs against one remote mirror.
#[derive(Debug)]
pub struct MirrorLock {
    path: PathBuf,
}

impl MirrorLock {
    /// Acquire the lock for `mirror` in the default lock directory.
    pub fn acquire(mirror: &Path) -> Result<Self> {
        let dir = default_lock_dir().ok_or_else(|| {
            RemotingError::Config("could not determine data directory for locks".to_string())
        })?;
        Self::acquire_in(&dir, mirror)
    }

    /// Acquire the lock for `mirror` with lock files kept in `dir`.
    ///
    /// The lock file is created exclusively. A lock left by a dead process is
    /// removed and creation retried once; losing that retry means another
    /// invocation got there first.
    pub fn acquire_in(dir: &Path, mirror: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let path = lock_path(dir, mirror);

        for _ in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(std::process::id().to_string().as_bytes())?;
                    debug!(lock = %path.display(), mirror = %mirror.display(), "acquired mirror lock");
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => match holder_pid(&path) {
                    Some(pid) if is_process_running(pid) => {
                        return Err(RemotingError::MirrorBusy {
                            mirror: mirror.to_path_buf(),
                            pid,
                        });
                    }
                    stale => {
                        debug!(pid = ?stale, lock = %path.display(), "removing stale mirror lock");
                        let _ = fs::remove_file(&path);
                    }
                },
                Err(e) => return Err(e.into()),
            }
        }

        Err(RemotingError::MirrorBusy {
            mirror: mirror.to_path_buf(),
            pid: read_pid(&path).unwrap_or_default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for MirrorLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// `<data dir>/rbp/locks`.
pub fn default_lock_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("rbp").join("locks"))
}

fn lock_path(dir: &Path, mirror: &Path) -> PathBuf {
    let hash = blake3::hash(mirror.to_string_lossy().as_bytes());
    dir.join(format!("{}.lock", hash.to_hex()))
}

fn read_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// PID recorded in an existing lock file, waiting briefly for a fresh one.
fn holder_pid(path: &Path) -> Option<u32> {
    read_pid(path).or_else(|| {
        thread::sleep(PID_WRITE_GRACE);
        read_pid(path)
    })
}

fn is_process_running(pid: u32) -> bool {
    #[cfg(target_os = "linux")]
    {
        Path::new(&format!("/proc/{pid}")).exists()
    }

    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("ps")
            .args(["-p", &pid.to_string()])
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        let _ = pid;
        false
    }
}

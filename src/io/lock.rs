use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const LOCK_FILE: &str = ".tasks.lock";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Advisory write lock on the task file.
///
/// The dashboard, its background workflows, and CLI invocations all write
/// `tasks.json`; every read-modify-write cycle holds this lock. Released when
/// dropped.
pub struct TaskFileLock {
    _file: File,
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("could not open lock file {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("timed out waiting for {path}: another taskdeck process is writing")]
    Timeout { path: PathBuf },
}

impl TaskFileLock {
    /// Block up to `timeout` waiting for the lock.
    pub fn acquire(deck_dir: &Path, timeout: Duration) -> Result<Self, LockError> {
        let path = deck_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| LockError::Open {
                path: path.clone(),
                source,
            })?;

        let deadline = Instant::now() + timeout;
        while try_lock(&file).is_err() {
            if Instant::now() >= deadline {
                return Err(LockError::Timeout { path });
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        Ok(TaskFileLock { _file: file })
    }

    pub fn acquire_default(deck_dir: &Path) -> Result<Self, LockError> {
        Self::acquire(deck_dir, DEFAULT_TIMEOUT)
    }
}

#[cfg(unix)]
fn try_lock(file: &File) -> Result<(), std::io::Error> {
    use std::os::unix::io::AsRawFd;
    // SAFETY: the descriptor is owned by `file` and stays open for the call.
    let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if result == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn try_lock(_file: &File) -> Result<(), std::io::Error> {
    Ok(())
}

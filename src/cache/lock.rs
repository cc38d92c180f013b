//! Exclusive run lock for a task directory
//!
//! Advisory `flock` on `<taskdir>/.run.lock`, polled until acquired or the
//! timeout expires. The lock is released when the guard is dropped (or
//! when the process dies, which the kernel handles for us).

use crate::error::{DriverError, DriverResult};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

const LOCK_FILENAME: &str = ".run.lock";
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Held exclusive lock on a task directory
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    #[cfg_attr(not(unix), allow(dead_code))]
    file: File,
}

impl RunLock {
    /// Acquire the lock, waiting up to `timeout`
    pub async fn acquire(task_dir: &Path, timeout: Duration) -> DriverResult<Self> {
        let path = task_dir.join(LOCK_FILENAME);
        let start = Instant::now();
        let mut announced = false;

        loop {
            match try_lock(&path) {
                Ok(file) => {
                    if announced {
                        info!(
                            "Run lock acquired after {:.1}s",
                            start.elapsed().as_secs_f64()
                        );
                    }
                    debug!("Holding run lock {}", path.display());
                    return Ok(Self { path, file });
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if !announced {
                        info!("Another step is running inspections, waiting for it to finish");
                        announced = true;
                    }
                }
                Err(e) => {
                    return Err(DriverError::io(
                        format!("locking {}", path.display()),
                        e,
                    ))
                }
            }

            if start.elapsed() >= timeout {
                return Err(DriverError::LockTimeout {
                    path,
                    secs: timeout.as_secs(),
                });
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            // SAFETY: the descriptor is owned by `self.file` and still open.
            unsafe {
                libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
            }
        }
        #[cfg(not(unix))]
        {
            let _ = std::fs::remove_file(&self.path);
        }
        debug!("Released run lock {}", self.path.display());
    }
}

#[cfg(unix)]
fn try_lock(path: &Path) -> io::Result<File> {
    use std::os::unix::io::AsRawFd;

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;

    // SAFETY: plain syscall on a descriptor we own.
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        Ok(file)
    } else {
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
            Err(io::Error::new(io::ErrorKind::WouldBlock, "run lock held"))
        } else {
            Err(err)
        }
    }
}

#[cfg(not(unix))]
fn try_lock(path: &Path) -> io::Result<File> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => Ok(file),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            Err(io::Error::new(io::ErrorKind::WouldBlock, "run lock held"))
        }
        Err(e) => Err(e),
    }
}

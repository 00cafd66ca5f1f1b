use crate::core::error::{PipelineError, Result};
use std::fs::{File, OpenOptions, TryLockError};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const LOCK_FILE: &str = "pipeline.lock";

/// Exclusive claim on a data directory for the length of one stage or
/// correlate run.
///
/// Backed by an OS advisory lock on `pipeline.lock`. The lock goes away with
/// the file descriptor, so dropping the guard or killing the process both
/// release it. The file itself is never removed: unlinking a locked path lets
/// one waiter lock the orphaned inode while another creates a fresh file.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    file: File,
}

impl RunLock {
    pub fn acquire(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(LOCK_FILE);
        let lock_err = |path: &Path, source| PipelineError::Lock {
            path: path.to_path_buf(),
            source,
        };

        std::fs::create_dir_all(data_dir).map_err(|e| lock_err(&path, e))?;
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| lock_err(&path, e))?;

        match file.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => return Err(PipelineError::RunInProgress(path)),
            Err(TryLockError::Error(e)) => return Err(lock_err(&path, e)),
        }

        // Owner pid, informational only.
        let recorded = file
            .set_len(0)
            .and_then(|()| writeln!(file, "{}", std::process::id()));
        if let Err(e) = recorded {
            warn!("Could not record pid in {}: {e}", path.display());
        }

        debug!("Acquired run lock {}", path.display());
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

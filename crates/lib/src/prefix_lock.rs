//! Advisory lock on an install prefix.
//!
//! Installs take the lock exclusively so two installs into the same prefix
//! cannot interleave; verification takes it shared.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const LOCK_FILENAME: &str = ".keg.lock";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
  Shared,
  Exclusive,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LockMetadata {
  pub version: u32,
  pub pid: u32,
  pub started_at_unix: u64,
  pub command: String,
  pub prefix: PathBuf,
}

#[derive(Debug, Error)]
pub enum PrefixLockError {
  #[error(
    "prefix is locked by another process: {command} (PID {pid}, started at unix time {started_at_unix})\n\
     If no keg process is running, remove the lock file:\n  {lock_path}"
  )]
  Contention {
    command: String,
    pid: u32,
    started_at_unix: u64,
    lock_path: PathBuf,
  },

  #[error(
    "prefix is locked (could not read lock metadata)\n\
     If no keg process is running, remove the lock file:\n  {lock_path}"
  )]
  ContentionUnknown { lock_path: PathBuf },

  #[error("failed to create prefix directory: {0}")]
  CreateDir(#[source] io::Error),

  #[error("failed to open lock file: {0}")]
  OpenFile(#[source] io::Error),

  #[error("failed to write lock metadata: {0}")]
  WriteMetadata(#[source] io::Error),

  #[error("failed to acquire lock: {0}")]
  LockFailed(#[source] io::Error),
}

/// Held for as long as the value lives; released on drop.
#[derive(Debug)]
pub struct PrefixLock {
  file: File,
  lock_path: PathBuf,
}

impl PrefixLock {
  /// Try to take the lock without blocking.
  pub fn acquire(prefix: &Path, mode: LockMode, command: &str) -> Result<Self, PrefixLockError> {
    let lock_path = prefix.join(LOCK_FILENAME);

    if !prefix.exists() {
      std::fs::create_dir_all(prefix).map_err(PrefixLockError::CreateDir)?;
    }

    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(false)
      .open(&lock_path)
      .map_err(PrefixLockError::OpenFile)?;

    if let Err(err) = try_lock(&file, mode) {
      if err.kind() == io::ErrorKind::WouldBlock {
        return Err(Self::contention_error(&lock_path));
      }
      return Err(PrefixLockError::LockFailed(err));
    }

    if mode == LockMode::Exclusive {
      Self::write_metadata(&file, command, prefix)?;
    }

    debug!(lock = ?lock_path, mode = ?mode, "prefix locked");
    Ok(Self { file, lock_path })
  }

  /// Read metadata through the held handle.
  pub fn read_metadata(&self) -> io::Result<LockMetadata> {
    use std::io::{Seek, SeekFrom};

    let mut file = &self.file;
    file.seek(SeekFrom::Start(0))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    serde_json::from_str(&contents).map_err(io::Error::other)
  }

  pub fn lock_path(&self) -> &Path {
    &self.lock_path
  }

  fn write_metadata(file: &File, command: &str, prefix: &Path) -> Result<(), PrefixLockError> {
    let metadata = LockMetadata {
      version: 1,
      pid: std::process::id(),
      started_at_unix: SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs(),
      command: command.to_string(),
      prefix: prefix.to_path_buf(),
    };

    file.set_len(0).map_err(PrefixLockError::WriteMetadata)?;
    let mut writer = io::BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &metadata)
      .map_err(|e| PrefixLockError::WriteMetadata(io::Error::other(e)))?;
    writer.flush().map_err(PrefixLockError::WriteMetadata)?;

    Ok(())
  }

  fn contention_error(lock_path: &Path) -> PrefixLockError {
    if let Ok(mut file) = File::open(lock_path) {
      let mut contents = String::new();
      if file.read_to_string(&mut contents).is_ok()
        && let Ok(metadata) = serde_json::from_str::<LockMetadata>(&contents)
      {
        return PrefixLockError::Contention {
          command: metadata.command,
          pid: metadata.pid,
          started_at_unix: metadata.started_at_unix,
          lock_path: lock_path.to_path_buf(),
        };
      }
    }

    PrefixLockError::ContentionUnknown {
      lock_path: lock_path.to_path_buf(),
    }
  }
}

#[cfg(unix)]
fn try_lock(file: &File, mode: LockMode) -> io::Result<()> {
  use rustix::fs::{FlockOperation, flock};
  use std::os::unix::io::AsFd;

  let operation = match mode {
    LockMode::Shared => FlockOperation::NonBlockingLockShared,
    LockMode::Exclusive => FlockOperation::NonBlockingLockExclusive,
  };

  flock(file.as_fd(), operation).map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}

#[cfg(windows)]
fn try_lock(file: &File, mode: LockMode) -> io::Result<()> {
  use std::os::windows::io::AsRawHandle;
  use windows_sys::Win32::Foundation::HANDLE;
  use windows_sys::Win32::Storage::FileSystem::{LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY, LockFileEx};

  let handle = file.as_raw_handle() as HANDLE;
  let flags = match mode {
    LockMode::Shared => LOCKFILE_FAIL_IMMEDIATELY,
    LockMode::Exclusive => LOCKFILE_FAIL_IMMEDIATELY | LOCKFILE_EXCLUSIVE_LOCK,
  };

  // SAFETY: OVERLAPPED is valid when zero-initialized and the handle is open.
  let result = unsafe {
    let mut overlapped = std::mem::zeroed();
    LockFileEx(handle, flags, 0, 1, 0, &mut overlapped)
  };

  if result == 0 {
    Err(io::Error::last_os_error())
  } else {
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn creates_prefix_and_lock_file() {
    let temp = TempDir::new().unwrap();
    let prefix = temp.path().join("prefix");

    let lock = PrefixLock::acquire(&prefix, LockMode::Exclusive, "keg install cutest").unwrap();

    assert!(lock.lock_path().exists());
    let metadata = lock.read_metadata().unwrap();
    assert_eq!(metadata.command, "keg install cutest");
    assert_eq!(metadata.pid, std::process::id());
    assert_eq!(metadata.prefix, prefix);
  }

  #[test]
  fn shared_locks_coexist() {
    let temp = TempDir::new().unwrap();
    let _a = PrefixLock::acquire(temp.path(), LockMode::Shared, "keg test").unwrap();
    let _b = PrefixLock::acquire(temp.path(), LockMode::Shared, "keg test").unwrap();
  }

  #[cfg(unix)]
  #[test]
  fn second_exclusive_lock_is_contended() {
    let temp = TempDir::new().unwrap();
    let _held = PrefixLock::acquire(temp.path(), LockMode::Exclusive, "keg install cutest").unwrap();

    match PrefixLock::acquire(temp.path(), LockMode::Exclusive, "keg install mastsif") {
      Err(PrefixLockError::Contention { command, pid, .. }) => {
        assert_eq!(command, "keg install cutest");
        assert_eq!(pid, std::process::id());
      }
      other => panic!("expected contention, got {other:?}"),
    }
  }

  #[test]
  fn released_on_drop() {
    let temp = TempDir::new().unwrap();
    {
      let _lock = PrefixLock::acquire(temp.path(), LockMode::Exclusive, "first").unwrap();
    }
    PrefixLock::acquire(temp.path(), LockMode::Exclusive, "second").unwrap();
  }
}

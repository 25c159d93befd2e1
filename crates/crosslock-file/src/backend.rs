//! Advisory file lock backend.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use fs2::FileExt;
use tracing::{Span, debug, instrument};

use crosslock_core::backend::{LockBackend, Wait};
use crosslock_core::error::{LockError, LockResult};
use crosslock_core::lease::{LockName, OwnerToken};
use crosslock_core::retry::{Backoff, Deadline};

use crate::path::lock_file_path;

/// Lock file handle kept for the duration of one acquisition.
#[derive(Debug)]
struct HeldLock {
    file: File,
    path: PathBuf,
}

/// Backend that locks a file per lock name under a shared directory.
///
/// Mutual exclusion comes from the operating system's advisory exclusive
/// lock (`flock`/`LockFileEx` via `fs2`), so it spans every process that
/// locks through the same filesystem path. There is no TTL: if the holder
/// crashes, the OS drops the lock with the process and the file is simply
/// re-locked by the next acquirer.
#[derive(Debug)]
pub struct FileBackend {
    directory: PathBuf,
    held: Option<HeldLock>,
}

impl FileBackend {
    /// Creates a backend storing lock files under `directory`, creating the
    /// directory if needed.
    pub fn new(directory: impl Into<PathBuf>) -> LockResult<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory).map_err(|e| {
            LockError::InvalidConfig(format!(
                "cannot create lock directory '{}': {e}",
                directory.display()
            ))
        })?;
        // Canonical paths keep lock identity stable when callers mix
        // relative and absolute spellings of the same directory.
        let directory = directory.canonicalize().unwrap_or(directory);
        Ok(Self {
            directory,
            held: None,
        })
    }

    /// Directory the lock files live in.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// The file a given lock name maps to.
    pub fn lock_path(&self, name: &LockName) -> PathBuf {
        lock_file_path(&self.directory, name.as_str())
    }

    /// One non-blocking lock attempt.
    fn try_acquire_once(&self, path: &Path, token: &OwnerToken) -> LockResult<Option<HeldLock>> {
        // No truncate here: truncating a file some other process currently
        // holds locked would wipe its owner annotation.
        let file = match OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // The directory vanished underneath us; recreate it and let
                // the caller retry.
                fs::create_dir_all(&self.directory)
                    .map_err(|e| LockError::Unavailable(Box::new(e)))?;
                return Ok(None);
            }
            Err(e) => return Err(LockError::Unavailable(Box::new(e))),
        };

        match file.try_lock_exclusive() {
            Ok(()) => {}
            Err(e) if is_contended(&e) => return Ok(None),
            Err(e) => return Err(LockError::Unavailable(Box::new(e))),
        }

        // Release unlinks lock files. If the file we just locked was
        // unlinked (or replaced) between our open and the flock, we locked
        // a dangling inode while a newcomer may have locked a fresh file at
        // the same path. Treat it as a lost race and retry on the new file.
        if !still_at_path(&file, path) {
            let _ = FileExt::unlock(&file);
            return Ok(None);
        }

        if let Err(e) = annotate(&file, token) {
            debug!(path = %path.display(), error = %e, "could not write owner annotation");
        }

        Ok(Some(HeldLock {
            file,
            path: path.to_path_buf(),
        }))
    }
}

#[async_trait::async_trait]
impl LockBackend for FileBackend {
    #[instrument(
        skip(self, token),
        fields(lock.name = %name, backend = "file", acquired = tracing::field::Empty, elapsed_ms = tracing::field::Empty)
    )]
    async fn acquire(
        &mut self,
        name: &LockName,
        token: &OwnerToken,
        _ttl: Duration,
        wait: Wait,
    ) -> LockResult<bool> {
        let path = self.lock_path(name);
        let deadline = Deadline::starting_now(wait.timeout());
        let mut backoff = Backoff::new(wait.poll_interval());

        loop {
            if let Some(held) = self.try_acquire_once(&path, token)? {
                self.held = Some(held);
                Span::current().record("acquired", true);
                Span::current().record("elapsed_ms", deadline.elapsed().as_millis() as u64);
                return Ok(true);
            }

            if wait.is_single_attempt() || deadline.expired() {
                Span::current().record("acquired", false);
                return Ok(false);
            }

            tokio::time::sleep(deadline.clamp(backoff.next_delay())).await;
        }
    }

    #[instrument(skip(self, _token), fields(lock.name = %name, backend = "file"))]
    async fn release(&mut self, name: &LockName, _token: &OwnerToken) -> LockResult<bool> {
        let path = self.lock_path(name);
        let Some(held) = self.held.take_if(|held| held.path == path) else {
            return Ok(false);
        };

        // Unlink first, while the flock is still ours. Waiters that already
        // opened the old inode will notice the swap in their post-lock
        // re-stat and move to the fresh file.
        if let Err(e) = fs::remove_file(&held.path) {
            debug!(path = %held.path.display(), error = %e, "lock file already gone");
        }
        let _ = FileExt::unlock(&held.file);
        Ok(true)
    }

    #[instrument(skip(self), fields(lock.name = %name, backend = "file"))]
    async fn is_locked(&self, name: &LockName) -> LockResult<bool> {
        let path = self.lock_path(name);
        if let Some(held) = &self.held
            && held.path == path
        {
            return Ok(true);
        }

        let file = match OpenOptions::new().read(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(LockError::Unavailable(Box::new(e))),
        };
        match file.try_lock_exclusive() {
            Ok(()) => {
                let _ = FileExt::unlock(&file);
                Ok(false)
            }
            Err(e) if is_contended(&e) => Ok(true),
            Err(e) => Err(LockError::Unavailable(Box::new(e))),
        }
    }

    /// Advisory file locks have no TTL; renewal reports whether the lock is
    /// still held and otherwise does nothing.
    async fn renew(
        &mut self,
        name: &LockName,
        _token: &OwnerToken,
        _extension: Duration,
    ) -> LockResult<bool> {
        let path = self.lock_path(name);
        Ok(self.held.as_ref().is_some_and(|held| held.path == path))
    }

    fn supports_expiry(&self) -> bool {
        false
    }
}

/// Whether a lock error means "someone else holds it".
fn is_contended(e: &std::io::Error) -> bool {
    e.kind() == ErrorKind::WouldBlock || e.kind() == fs2::lock_contended_error().kind()
}

/// Whether `file` is still the inode living at `path`.
#[cfg(unix)]
fn still_at_path(file: &File, path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (file.metadata(), fs::metadata(path)) {
        (Ok(held), Ok(at_path)) => held.dev() == at_path.dev() && held.ino() == at_path.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn still_at_path(_file: &File, path: &Path) -> bool {
    path.exists()
}

/// Writes the owner token and pid into the lock file. Purely diagnostic;
/// ownership is the flock itself.
fn annotate(mut file: &File, token: &OwnerToken) -> std::io::Result<()> {
    file.set_len(0)?;
    writeln!(file, "{token} pid={}", std::process::id())?;
    file.flush()
}

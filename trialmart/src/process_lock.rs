//! Process-level lock keeping the loader the only writer of a database.
//!
//! Lock strategy:
//! - `trialmart-load.lock` marks an active loader for one database path.
//! - Locks are advisory OS file locks (flock), held for process lifetime.
//! - The lock name hashes the canonical database path.

use anyhow::{Context, Result};
use std::collections::hash_map::DefaultHasher;
use std::fs::{self, File, OpenOptions};
use std::hash::{Hash, Hasher};
use std::io::{self, Seek, SeekFrom, Write};
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};

const LOAD_LOCK_FILE: &str = "trialmart-load.lock";

/// Guard held by trialmart-load for the whole run.
pub struct LoadProcessGuard {
    _load_lock: ProcessLock,
}

/// Acquire the loader lock for a database.
///
/// Fails if another trialmart-load is already rebuilding the same database.
pub fn acquire_load_guard(db_path: &Path) -> Result<LoadProcessGuard> {
    let canonical = canonical_db_path(db_path)?;
    match try_acquire_lock(LOAD_LOCK_FILE, &canonical)? {
        Some(lock) => Ok(LoadProcessGuard { _load_lock: lock }),
        None => anyhow::bail!(
            "another trialmart-load is already rebuilding {}",
            db_path.display()
        ),
    }
}

/// Resolve the database path so every spelling of one file maps to one lock.
///
/// The database file may not exist yet, so only its parent directory is
/// canonicalized (after creating it, as `Database::open` would).
fn canonical_db_path(db_path: &Path) -> Result<PathBuf> {
    let file_name = db_path
        .file_name()
        .with_context(|| format!("database path has no file name: {}", db_path.display()))?;
    let parent = match db_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)
        .with_context(|| format!("failed to create database directory: {}", parent.display()))?;
    let parent = parent
        .canonicalize()
        .with_context(|| format!("failed to resolve database directory: {}", parent.display()))?;
    Ok(parent.join(file_name))
}

struct ProcessLock {
    file: File,
    path: PathBuf,
}

impl Drop for ProcessLock {
    fn drop(&mut self) {
        let _ = unlock_file(&self.file);
        let _ = fs::remove_file(&self.path);
    }
}

fn try_acquire_lock(filename: &str, db_path: &Path) -> Result<Option<ProcessLock>> {
    let dir = lock_dir();
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create runtime lock directory: {}", dir.display()))?;

    let path = dir.join(scoped_lock_filename(filename, db_path));
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .with_context(|| format!("failed to open lock file: {}", path.display()))?;

    match lock_file_nonblocking(&file) {
        Ok(()) => {
            // Owner info for debugging.
            let _ = file.set_len(0);
            let _ = file.seek(SeekFrom::Start(0));
            let _ = writeln!(file, "pid={}", std::process::id());
            let _ = file.flush();

            Ok(Some(ProcessLock { file, path }))
        }
        Err(e) if is_lock_busy(&e) => Ok(None),
        Err(e) => Err(e).with_context(|| format!("failed to lock file: {}", path.display())),
    }
}

fn lock_dir() -> PathBuf {
    let mut dir = match std::env::var_os("XDG_RUNTIME_DIR") {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => std::env::temp_dir(),
    };
    dir.push("trialmart");
    dir
}

fn scoped_lock_filename(base_filename: &str, db_path: &Path) -> String {
    let mut hasher = DefaultHasher::new();
    db_path.to_string_lossy().hash(&mut hasher);
    let digest = hasher.finish();
    format!("{base_filename}.{digest:016x}")
}

fn is_lock_busy(error: &io::Error) -> bool {
    matches!(error.kind(), io::ErrorKind::WouldBlock)
        || matches!(error.raw_os_error(), Some(11) | Some(35))
}

#[cfg(unix)]
fn lock_file_nonblocking(file: &File) -> io::Result<()> {
    const LOCK_EX: i32 = 2;
    const LOCK_NB: i32 = 4;
    let fd = file.as_raw_fd();
    // SAFETY: flock is called with a valid file descriptor and constant flags.
    let rc = unsafe { flock(fd, LOCK_EX | LOCK_NB) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(unix)]
fn unlock_file(file: &File) -> io::Result<()> {
    const LOCK_UN: i32 = 8;
    let fd = file.as_raw_fd();
    // SAFETY: flock is called with a valid file descriptor and constant flags.
    let rc = unsafe { flock(fd, LOCK_UN) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(unix)]
extern "C" {
    fn flock(fd: i32, operation: i32) -> i32;
}

#[cfg(not(unix))]
compile_error!("trialmart process locks currently require Unix (macOS/Linux)");

//! Atomic file writes for progress files.
//!
//! Data goes to a temp file in the destination directory, is flushed and
//! fsynced, renamed over the destination, and the directory is fsynced. A
//! crash leaves either the old or the new file, never a partial one.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum FsSafeError {
    #[error("path has no parent directory: {}", path.display())]
    NoParentDirectory { path: PathBuf },

    #[error("json serialization failed: {0}")]
    SerializeFailed(#[source] serde_json::Error),

    #[error("I/O error during {context} for {}: {source}", path.display())]
    Io {
        context: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FsSafeError {
    pub(crate) fn io(context: impl Into<String>, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Write `data` to `path` via temp file, fsync and rename.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<(), FsSafeError> {
    let parent = match path.parent() {
        Some(p) if p.as_os_str().is_empty() => Path::new("."),
        Some(p) => p,
        None => {
            return Err(FsSafeError::NoParentDirectory {
                path: path.to_path_buf(),
            });
        }
    };
    if !parent.exists() {
        fs::create_dir_all(parent).map_err(|e| FsSafeError::io("create parent directory", parent, e))?;
    }

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| FsSafeError::io("create temp file", parent, e))?;
    tmp.write_all(data).map_err(|e| FsSafeError::io("write temp file", path, e))?;
    tmp.flush().map_err(|e| FsSafeError::io("flush temp file", path, e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| FsSafeError::io("fsync temp file", path, e))?;
    tmp.persist(path)
        .map_err(|e| FsSafeError::io("rename temp file", path, e.error))?;

    fsync_directory(parent)
}

/// Pretty JSON through [`atomic_write`]. Serialization happens before any
/// file is touched.
pub fn atomic_write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), FsSafeError> {
    let mut json = serde_json::to_vec_pretty(value).map_err(FsSafeError::SerializeFailed)?;
    json.push(b'\n');
    atomic_write(path, &json)
}

#[cfg(unix)]
fn fsync_directory(dir: &Path) -> Result<(), FsSafeError> {
    File::open(dir)
        .and_then(|f| f.sync_all())
        .map_err(|e| FsSafeError::io("fsync directory", dir, e))
}

#[cfg(not(unix))]
fn fsync_directory(_dir: &Path) -> Result<(), FsSafeError> {
    Ok(())
}

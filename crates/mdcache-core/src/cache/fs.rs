use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tempfile::NamedTempFile;

use crate::error::{Error, Result};

/// Modification time of `path`; [`Error::NotFound`] if it does not exist.
pub async fn modified(path: &Path) -> Result<SystemTime> {
    tokio::fs::metadata(path)
        .await
        .and_then(|m| m.modified())
        .map_err(|e| Error::from_io(path, e))
}

/// Like [`modified`], but `Ok(None)` when the file does not exist.
pub async fn modified_if_exists(path: &Path) -> Result<Option<SystemTime>> {
    match modified(path).await {
        Ok(time) => Ok(Some(time)),
        Err(Error::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Replace `path` with `contents` so readers never observe a partial file.
///
/// Writes a temp file in the same directory, then renames it over `path`.
pub async fn write_atomic(path: &Path, contents: String) -> Result<()> {
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(contents.as_bytes())?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
}

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::path::Path;
use std::path::PathBuf;

use tracing::error;

use crate::StorageError;

pub fn ensure_dir(path: &Path) -> Result<(), StorageError> {
    if !path.is_dir() {
        if let Err(e) = fs::create_dir_all(path) {
            error!("Failed to create directory {:?}: {:?}", path, e);
            return Err(StorageError::Io(e));
        }
    }
    Ok(())
}

pub fn open_file_for_append(path: PathBuf) -> Result<File, StorageError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let log_file = match OpenOptions::new().append(true).create(true).open(&path) {
        Ok(f) => f,
        Err(e) => {
            return Err(StorageError::Io(e));
        }
    };
    Ok(log_file)
}

/// Replaces `path` atomically: the new content lands in a sibling temp file
/// first, then a rename publishes it. A reader never observes a half-written
/// record.
pub fn write_atomic(path: &Path, buf: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("record");
    let tmp_path = match path.parent() {
        Some(parent) => parent.join(format!(".{}.tmp", file_name)),
        None => PathBuf::from(format!(".{}.tmp", file_name)),
    };
    fs::write(&tmp_path, buf)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

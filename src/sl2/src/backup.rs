//! Smart backup management with hash tracking.
//!
//! A container edit is destructive — there is no undo inside the save —
//! so callers snapshot the file before writing. The sidecar metadata
//! remembers two hashes: the file as it was when the backup was taken and
//! the file as we last wrote it. That distinction lets a later run tell
//! "our own previous edit" apart from "the game played and rewrote the
//! save", and refresh the backup only in the second case.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No backup exists for {0}")]
    NoBackup(PathBuf),
}

/// Metadata tracking save file hashes for smart backup management
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupMetadata {
    /// Hash of the save file when the backup was created
    pub original_hash: String,

    /// Hash of the save file after the last edit
    pub last_edit_hash: String,

    /// When the backup was created (RFC 3339)
    pub created_at: String,
}

impl BackupMetadata {
    fn new(hash: String) -> Self {
        BackupMetadata {
            original_hash: hash.clone(),
            last_edit_hash: hash,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// SHA-256 of a file's bytes, hex encoded.
pub fn content_hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

pub fn backup_path(save_path: &Path) -> PathBuf {
    let mut path = save_path.as_os_str().to_owned();
    path.push(".backup");
    PathBuf::from(path)
}

fn metadata_path(save_path: &Path) -> PathBuf {
    let mut path = save_path.as_os_str().to_owned();
    path.push(".backup.meta.json");
    PathBuf::from(path)
}

fn read_metadata(save_path: &Path) -> Result<Option<BackupMetadata>, BackupError> {
    let path = metadata_path(save_path);
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&text)?))
}

fn write_metadata(save_path: &Path, metadata: &BackupMetadata) -> Result<(), BackupError> {
    let text = serde_json::to_string_pretty(metadata)?;
    fs::write(metadata_path(save_path), text)?;
    Ok(())
}

/// Ensure a current backup exists before an edit.
///
/// Creates one when none exists, or when the save changed outside our
/// control (its hash no longer matches the last edit we recorded). A save
/// still matching our last edit keeps its existing backup — otherwise a
/// chain of edits would grind the original away one overwrite at a time.
/// Returns true when a backup was written.
pub fn smart_backup(save_path: &Path) -> Result<bool, BackupError> {
    let data = fs::read(save_path)?;
    let hash = content_hash(&data);

    let backup = backup_path(save_path);
    if let Some(metadata) = read_metadata(save_path)? {
        if backup.exists() && metadata.last_edit_hash == hash {
            return Ok(false);
        }
    }

    fs::write(&backup, &data)?;
    write_metadata(save_path, &BackupMetadata::new(hash))?;
    Ok(true)
}

/// Record the hash of the file we just wrote.
pub fn update_after_edit(save_path: &Path) -> Result<(), BackupError> {
    let data = fs::read(save_path)?;
    let hash = content_hash(&data);

    let mut metadata = read_metadata(save_path)?
        .unwrap_or_else(|| BackupMetadata::new(hash.clone()));
    metadata.last_edit_hash = hash;
    write_metadata(save_path, &metadata)
}

/// Copy the backup over the save file.
pub fn restore_backup(save_path: &Path) -> Result<(), BackupError> {
    let backup = backup_path(save_path);
    if !backup.exists() {
        return Err(BackupError::NoBackup(save_path.to_path_buf()));
    }
    fs::copy(backup, save_path)?;
    update_after_edit(save_path)
}

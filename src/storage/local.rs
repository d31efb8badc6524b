//! Local filesystem state store.
//!
//! Writes go to a sibling temp file that is flushed to disk and then renamed
//! over the state file, so a crash leaves either the old or the new version.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::StateError;
use crate::storage::{SeenState, StateStore, decode_or_empty};

/// State kept in a single JSON file.
#[derive(Debug, Clone)]
pub struct LocalStateStore {
    path: PathBuf,
    capacity: usize,
}

impl LocalStateStore {
    pub fn new(path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            path: path.into(),
            capacity,
        }
    }

    /// Write bytes atomically (write to temp, sync, then rename).
    async fn write_bytes(&self, bytes: &[u8]) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        sync_dir(&self.path).await?;
        Ok(())
    }

    /// Read bytes, returning None if the file doesn't exist.
    async fn read_bytes(&self) -> Result<Option<Vec<u8>>, StateError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StateError::Io(e)),
        }
    }
}

/// Flush the directory entry of `path` so the rename survives power loss.
#[cfg(unix)]
async fn sync_dir(path: &Path) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    tokio::fs::File::open(dir).await?.sync_all().await
}

#[cfg(not(unix))]
async fn sync_dir(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[async_trait]
impl StateStore for LocalStateStore {
    async fn load(&self) -> SeenState {
        decode_or_empty(self.read_bytes().await, self.capacity, &self.location())
    }

    async fn save(&self, state: &SeenState) -> Result<(), StateError> {
        let bytes = state.to_json()?;
        self.write_bytes(&bytes).await?;
        log::debug!("Saved {} seen ids to {}", state.len(), self.path.display());
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

//! Scratch storage for in-flight recordings and clips

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Temporary file store.
///
/// `clear` must be idempotent: it runs at startup and after every save.
#[async_trait]
pub trait ScratchStore: Send + Sync {
    /// Directory recordings and clips are written into
    fn dir(&self) -> &Path;

    /// Remove everything in the scratch directory
    async fn clear(&self) -> io::Result<()>;
}

pub struct TempDirStore {
    dir: PathBuf,
    // Deletes the directory on drop when the store owns it
    _owned: Option<TempDir>,
}

impl TempDirStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir, _owned: None }
    }

    /// `loopcam` under the system temporary directory
    pub fn in_system_temp() -> Self {
        Self::new(std::env::temp_dir().join("loopcam"))
    }

    /// A fresh directory removed when the store is dropped
    pub fn ephemeral() -> io::Result<Self> {
        let owned = tempfile::Builder::new().prefix("loopcam-").tempdir()?;
        Ok(Self {
            dir: owned.path().to_path_buf(),
            _owned: Some(owned),
        })
    }
}

#[async_trait]
impl ScratchStore for TempDirStore {
    fn dir(&self) -> &Path {
        &self.dir
    }

    async fn clear(&self) -> io::Result<()> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return tokio::fs::create_dir_all(&self.dir).await;
            }
            Err(e) => return Err(e),
        };

        let mut removed = 0usize;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let result = if entry.file_type().await?.is_dir() {
                tokio::fs::remove_dir_all(&path).await
            } else {
                tokio::fs::remove_file(&path).await
            };

            match result {
                Ok(()) => removed += 1,
                // Raced with another remover
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Failed to remove {:?}: {}", path, e),
            }
        }

        tracing::debug!("Cleared {} entries from {:?}", removed, self.dir);
        Ok(())
    }
}

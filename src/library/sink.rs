//! Media library sink
//!
//! The recorder only needs "persist this file". Failures are logged by the
//! caller and never retried.

use async_trait::async_trait;
use chrono::Local;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Library rejected {path:?}: {reason}")]
    Rejected { path: PathBuf, reason: String },
}

/// Persist a clip to the user's media library
#[async_trait]
pub trait MediaSink: Send + Sync {
    async fn save(&self, path: &Path) -> Result<(), SaveError>;
}

/// A media library that is just a directory of timestamped clips
pub struct DirectoryLibrary {
    root: PathBuf,
}

impl DirectoryLibrary {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn destination_for(&self, source: &Path) -> PathBuf {
        let extension = source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp4");
        let stamp = Local::now().format("%Y%m%d-%H%M%S%.3f");
        let mut candidate = self.root.join(format!("loopcam-{}.{}", stamp, extension));

        let mut n = 1;
        while candidate.exists() {
            candidate = self
                .root
                .join(format!("loopcam-{}-{}.{}", stamp, n, extension));
            n += 1;
        }
        candidate
    }
}

#[async_trait]
impl MediaSink for DirectoryLibrary {
    async fn save(&self, path: &Path) -> Result<(), SaveError> {
        if !tokio::fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false) {
            return Err(SaveError::Rejected {
                path: path.to_path_buf(),
                reason: "not a file".to_string(),
            });
        }

        tokio::fs::create_dir_all(&self.root).await?;
        let destination = self.destination_for(path);
        let bytes = tokio::fs::copy(path, &destination).await?;

        tracing::info!("Saved clip to {:?} ({} bytes)", destination, bytes);
        Ok(())
    }
}

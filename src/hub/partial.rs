//! In-progress download file
//!
//! Bytes are streamed into a uniquely named `.incomplete` file next to the
//! destination and renamed into place only once the download finishes, so a
//! half-written file never appears under the final name.

use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Temporary download target
///
/// Removed on drop unless [`PartialDownload::persist`] was called.
pub struct PartialDownload {
    path: PathBuf,
    file: File,
    written: u64,
    persisted: bool,
}

impl PartialDownload {
    /// Create the temp file next to `target`
    pub async fn create(target: &Path) -> std::io::Result<Self> {
        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "download".to_string());
        let path = target.with_file_name(format!(
            ".{}.{}.incomplete",
            file_name,
            uuid::Uuid::new_v4()
        ));

        let file = File::create(&path).await?;

        Ok(Self {
            path,
            file,
            written: 0,
            persisted: false,
        })
    }

    /// Get the path to the temp file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Append a chunk
    pub async fn write(&mut self, chunk: &[u8]) -> std::io::Result<()> {
        self.file.write_all(chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Flush to disk and move into place
    pub async fn persist(mut self, target: &Path) -> std::io::Result<u64> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        tokio::fs::rename(&self.path, target).await?;
        self.persisted = true;
        Ok(self.written)
    }
}

impl Drop for PartialDownload {
    fn drop(&mut self) {
        if self.persisted {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to clean up partial download"
                );
            }
        }
    }
}

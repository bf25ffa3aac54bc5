//! Directory snapshot publisher.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use super::{check_relative_path, PublishError, PublishReceipt, Publisher, Snapshot};

/// Writes the snapshot into a directory.
///
/// Files are written to a staging directory next to the target. The target
/// is then renamed aside and the staging directory renamed into its place,
/// so readers never see a partially written snapshot, though the target is
/// briefly absent between the two renames. Staging is removed on failure.
pub struct FsPublisher {
    output_dir: PathBuf,
}

impl FsPublisher {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    fn sibling(&self, suffix: &str) -> Result<PathBuf, PublishError> {
        let name = self.output_dir.file_name().ok_or_else(|| {
            PublishError::Config(format!(
                "output directory {} has no final component",
                self.output_dir.display()
            ))
        })?;
        let mut sibling = name.to_os_string();
        sibling.push(format!(".{}-{}", suffix, uuid::Uuid::new_v4()));
        Ok(self.output_dir.with_file_name(sibling))
    }

    /// Rename an existing target out of the way, returning where it went.
    async fn move_aside(&self) -> Result<Option<PathBuf>, PublishError> {
        let exists = tokio::fs::try_exists(&self.output_dir)
            .await
            .map_err(|e| io_err(&self.output_dir, e))?;
        if !exists {
            return Ok(None);
        }
        let old = self.sibling("old")?;
        tokio::fs::rename(&self.output_dir, &old)
            .await
            .map_err(|e| io_err(&self.output_dir, e))?;
        Ok(Some(old))
    }
}

fn io_err(path: &Path, e: std::io::Error) -> PublishError {
    PublishError::Io(format!("{}: {}", path.display(), e))
}

/// Write every snapshot file under `staging`.
async fn write_staging(staging: &Path, snapshot: &Snapshot) -> Result<(), PublishError> {
    for (relative, contents) in snapshot.files() {
        check_relative_path(relative)?;
        let path = staging.join(relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_err(parent, e))?;
        }
        tokio::fs::write(&path, contents)
            .await
            .map_err(|e| io_err(&path, e))?;
    }
    // An empty snapshot still replaces the target.
    tokio::fs::create_dir_all(staging)
        .await
        .map_err(|e| io_err(staging, e))
}

async fn discard_staging(staging: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(staging).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %staging.display(), "Failed to remove staging directory: {}", e);
        }
    }
}

#[async_trait]
impl Publisher for FsPublisher {
    async fn publish(&self, snapshot: &Snapshot) -> Result<PublishReceipt, PublishError> {
        let staging = self.sibling("staging")?;

        if let Err(e) = write_staging(&staging, snapshot).await {
            discard_staging(&staging).await;
            return Err(e);
        }

        debug!(staging = %staging.display(), files = snapshot.len(), "Wrote staging snapshot");

        let previous = match self.move_aside().await {
            Ok(previous) => previous,
            Err(e) => {
                discard_staging(&staging).await;
                return Err(e);
            }
        };

        if let Err(e) = tokio::fs::rename(&staging, &self.output_dir).await {
            // Put the previous snapshot back before reporting.
            if let Some(old) = &previous {
                let _ = tokio::fs::rename(old, &self.output_dir).await;
            }
            discard_staging(&staging).await;
            return Err(io_err(&self.output_dir, e));
        }

        if let Some(old) = previous {
            if let Err(e) = tokio::fs::remove_dir_all(&old).await {
                warn!(path = %old.display(), "Failed to remove previous snapshot: {}", e);
            }
        }

        info!(
            output_dir = %self.output_dir.display(),
            files = snapshot.len(),
            "Published snapshot"
        );

        Ok(PublishReceipt {
            backend: self.name().to_string(),
            location: self.output_dir.display().to_string(),
            files: snapshot.len(),
            published_at: Utc::now(),
        })
    }

    fn name(&self) -> &str {
        "fs"
    }
}

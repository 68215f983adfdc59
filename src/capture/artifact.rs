use crate::error::CaptureError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Transient capture image on disk, deleted when the guard goes away.
///
/// Removal happens in `remove` on the normal path and in `Drop` on every
/// other one (early return, panic, task abort).
#[derive(Debug)]
pub struct CaptureArtifact {
    path: PathBuf,
    removed: bool,
}

impl CaptureArtifact {
    /// Write `bytes` to `dir/name`. A partially written file is cleaned up
    /// if the write fails.
    ///
    /// The write is synchronous: there is no await point between creating
    /// the file and arming the guard, so an aborted worker cannot leak it.
    pub fn persist(dir: &Path, name: &str, bytes: &[u8]) -> Result<Self, CaptureError> {
        let artifact = Self {
            path: dir.join(name),
            removed: false,
        };

        std::fs::write(&artifact.path, bytes).map_err(|e| CaptureError::Artifact {
            path: artifact.path.display().to_string(),
            source: e,
        })?;

        debug!(
            "Wrote {} byte capture artifact {}",
            bytes.len(),
            artifact.path.display()
        );
        Ok(artifact)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read(&self) -> Result<Vec<u8>, CaptureError> {
        fs::read(&self.path)
            .await
            .map_err(|e| CaptureError::Artifact {
                path: self.path.display().to_string(),
                source: e,
            })
    }

    /// Delete the file now and return the path it had
    pub fn remove(mut self) -> PathBuf {
        self.removed = true;
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed capture artifact {}", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove capture artifact {}: {}",
                self.path.display(),
                e
            ),
        }
        self.path.clone()
    }
}

impl Drop for CaptureArtifact {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed capture artifact {} on drop", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove capture artifact {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

use super::job::Poem;
use crate::error::CaptureError;
use chrono::Local;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// Write the displayed poem to `dir/poem_<timestamp>.txt`
pub async fn save_poem(poem: &Poem, dir: &Path) -> Result<PathBuf, CaptureError> {
    fs::create_dir_all(dir)
        .await
        .map_err(|e| CaptureError::Save {
            path: dir.display().to_string(),
            source: e,
        })?;

    let filename = format!("poem_{}.txt", Local::now().format("%Y%m%d_%H%M%S"));
    let path = dir.join(filename);

    fs::write(&path, poem.render())
        .await
        .map_err(|e| CaptureError::Save {
            path: path.display().to_string(),
            source: e,
        })?;

    info!("Poem saved as {}", path.display());
    Ok(path)
}

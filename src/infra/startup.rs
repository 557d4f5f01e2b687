use std::{io::ErrorKind, path::Path};

use tokio::fs;

use super::error::InfraError;

/// Fails fast when the renderer's working directory is unusable.
pub async fn ensure_renderer_dir(dir: &Path) -> Result<(), InfraError> {
    match fs::metadata(dir).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(InfraError::missing_renderer_dir(dir)),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            Err(InfraError::missing_renderer_dir(dir))
        }
        Err(err) => Err(InfraError::unreadable_renderer_dir(dir, &err)),
    }
}

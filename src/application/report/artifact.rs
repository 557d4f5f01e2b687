//! Scoped ownership of rendered report files.
//!
//! A rendered file belongs to exactly one request. [`with_artifact`] reads it,
//! hands the bytes to the caller's action and deletes the file afterwards,
//! whichever way the action finishes. Cleanup failures are logged and never
//! override the action's result.

use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};

use bytes::Bytes;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, error};

use super::types::RenderedArtifact;

#[derive(Debug, Error)]
#[error("failed to read `{}`: {source}", path.display())]
pub struct ArtifactReadError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CleanupOutcome {
    Removed,
    AlreadyGone,
    Failed,
}

/// Deletes the owned file once, either through [`ArtifactGuard::release`] or on drop.
#[derive(Debug)]
pub(crate) struct ArtifactGuard {
    path: PathBuf,
    armed: bool,
}

impl ArtifactGuard {
    pub(crate) fn new(artifact: RenderedArtifact) -> Self {
        Self {
            path: artifact.into_path(),
            armed: true,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) async fn release(mut self) -> CleanupOutcome {
        self.armed = false;
        let result = fs::remove_file(&self.path).await;
        log_cleanup(&self.path, result)
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;
        // Unwinding or cancelled before release; no runtime to await on here.
        // Builds with `panic = "abort"` (the release profile) never reach this on panic.
        let result = std::fs::remove_file(&self.path);
        log_cleanup(&self.path, result);
    }
}

fn log_cleanup(path: &Path, result: io::Result<()>) -> CleanupOutcome {
    match result {
        Ok(()) => {
            debug!(
                target = "application::report::artifact",
                path = %path.display(),
                "Removed rendered artifact"
            );
            CleanupOutcome::Removed
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(
                target = "application::report::artifact",
                path = %path.display(),
                "Rendered artifact was already gone at cleanup"
            );
            CleanupOutcome::AlreadyGone
        }
        Err(err) => {
            error!(
                target = "application::report::artifact",
                path = %path.display(),
                error = %err,
                "Failed to remove rendered artifact"
            );
            CleanupOutcome::Failed
        }
    }
}

/// Read the artifact, run `action` on its bytes, then delete the file.
///
/// The delete is attempted exactly once on every path: read failure, action
/// failure, panic inside `action`, or cancellation of the returned future.
pub async fn with_artifact<T, E, F>(artifact: RenderedArtifact, action: F) -> Result<T, E>
where
    F: FnOnce(Bytes) -> Result<T, E>,
    E: From<ArtifactReadError>,
{
    let guard = ArtifactGuard::new(artifact);

    let result = match fs::read(guard.path()).await {
        Ok(data) => action(Bytes::from(data)),
        Err(source) => Err(E::from(ArtifactReadError {
            path: guard.path().to_path_buf(),
            source,
        })),
    };

    guard.release().await;
    result
}

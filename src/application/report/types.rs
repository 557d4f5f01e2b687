use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use thiserror::Error;

use crate::domain::types::Identifier;

/// Rendering request passed into the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderRequest {
    pub identifier: Identifier,
}

impl RenderRequest {
    pub fn new(identifier: Identifier) -> Self {
        Self { identifier }
    }
}

/// File the renderer claims to have produced, after its path was validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifact {
    path: PathBuf,
    byte_length: u64,
}

impl RenderedArtifact {
    pub fn new(path: PathBuf, byte_length: u64) -> Self {
        Self { path, byte_length }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn byte_length(&self) -> u64 {
        self.byte_length
    }

    pub(crate) fn into_path(self) -> PathBuf {
        self.path
    }
}

pub type RenderResult = Result<RenderedArtifact, RenderFailure>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderFailureKind {
    ProcessFailed,
    Timeout,
    InvalidOutputPath,
    OutputMissing,
    OutputEmpty,
    UnexpectedError,
}

impl RenderFailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderFailureKind::ProcessFailed => "process_failed",
            RenderFailureKind::Timeout => "timeout",
            RenderFailureKind::InvalidOutputPath => "invalid_output_path",
            RenderFailureKind::OutputMissing => "output_missing",
            RenderFailureKind::OutputEmpty => "output_empty",
            RenderFailureKind::UnexpectedError => "unexpected_error",
        }
    }
}

#[derive(Debug, Error)]
pub enum RenderFailure {
    #[error("renderer process failed: {stderr}")]
    ProcessFailed {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("report generation timed out after {}s for identifier {identifier}", timeout.as_secs())]
    Timeout {
        identifier: Identifier,
        timeout: Duration,
    },
    #[error("renderer returned an invalid output path `{claimed}`: {reason}")]
    InvalidOutputPath {
        claimed: String,
        reason: &'static str,
    },
    #[error("renderer reported `{}` but no file exists there", path.display())]
    OutputMissing { path: PathBuf },
    #[error("renderer produced an empty file at `{}`", path.display())]
    OutputEmpty { path: PathBuf },
    #[error("unexpected error invoking renderer: {message}")]
    UnexpectedError { message: String },
}

impl RenderFailure {
    pub fn kind(&self) -> RenderFailureKind {
        match self {
            RenderFailure::ProcessFailed { .. } => RenderFailureKind::ProcessFailed,
            RenderFailure::Timeout { .. } => RenderFailureKind::Timeout,
            RenderFailure::InvalidOutputPath { .. } => RenderFailureKind::InvalidOutputPath,
            RenderFailure::OutputMissing { .. } => RenderFailureKind::OutputMissing,
            RenderFailure::OutputEmpty { .. } => RenderFailureKind::OutputEmpty,
            RenderFailure::UnexpectedError { .. } => RenderFailureKind::UnexpectedError,
        }
    }

    pub(crate) fn unexpected(message: impl Into<String>) -> Self {
        Self::UnexpectedError {
            message: message.into(),
        }
    }
}

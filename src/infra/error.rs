use std::path::Path;

use thiserror::Error;

/// Startup and runtime-bootstrap failures.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database error: {message}")]
    Database { message: String },
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl InfraError {
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }

    pub fn unreadable_renderer_dir(path: &Path, err: &std::io::Error) -> Self {
        Self::configuration(format!(
            "renderer working directory `{}` could not be inspected: {err}",
            path.display()
        ))
    }

    pub fn missing_renderer_dir(path: &Path) -> Self {
        Self::configuration(format!(
            "renderer working directory `{}` does not exist or is not a directory",
            path.display()
        ))
    }
}

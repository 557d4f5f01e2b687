use std::{borrow::Cow, error::Error as StdError};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{chat::ChatError, report::ReportError},
    domain::error::DomainError,
    infra::error::InfraError,
};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Plain-text HTTP failure carrying a diagnostic report for the logging middleware.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: Cow<'static, str>,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: impl Into<Cow<'static, str>>,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message: public_message.into(),
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: impl Into<Cow<'static, str>>,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message: public_message.into(),
            report,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn public_message(&self) -> &str {
        &self.public_message
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message.into_owned()).into_response();
        self.report.attach(&mut response);
        response
    }
}

impl From<ReportError> for HttpError {
    fn from(error: ReportError) -> Self {
        const SOURCE: &str = "application::error::report_error_to_http_error";
        match &error {
            ReportError::WorkerNotFound { .. } => HttpError::from_error(
                SOURCE,
                StatusCode::NOT_FOUND,
                "No worker is registered for that phone number",
                &error,
            ),
            ReportError::Resolve(_) => HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to look up worker",
                &error,
            ),
            // Renderer, read and empty-output failures expose their detail to the caller.
            ReportError::Render(_)
            | ReportError::Read(_)
            | ReportError::Empty
            | ReportError::Task(_) => HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                error.to_string(),
                &error,
            ),
        }
    }
}

impl From<ChatError> for HttpError {
    fn from(error: ChatError) -> Self {
        const SOURCE: &str = "application::error::chat_error_to_http_error";
        match error {
            ChatError::Validation(err) => HttpError::from_error(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Request could not be processed",
                &err,
            ),
            ChatError::Repo(err) => crate::infra::http::repo_error_to_http(SOURCE, err),
        }
    }
}

impl From<DomainError> for HttpError {
    fn from(error: DomainError) -> Self {
        const SOURCE: &str = "application::error::domain_error_to_http_error";
        match &error {
            DomainError::NotFound { .. } => {
                HttpError::from_error(SOURCE, StatusCode::NOT_FOUND, "Resource not found", &error)
            }
            DomainError::Validation { message } => HttpError::new(
                SOURCE,
                StatusCode::BAD_REQUEST,
                message.clone(),
                error.to_string(),
            ),
        }
    }
}

/// Process-level failure surfaced by the binary entry point.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::application::report::RenderFailure;
    use crate::domain::types::PhoneNumber;

    #[test]
    fn missing_worker_maps_to_not_found() {
        let error = ReportError::WorkerNotFound {
            phone: PhoneNumber::parse("0981").expect("phone"),
        };
        let http = HttpError::from(error);
        assert_eq!(http.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn render_failure_detail_is_public() {
        let error = ReportError::Render(RenderFailure::ProcessFailed {
            exit_code: Some(1),
            stderr: "DB connection refused".to_string(),
        });
        let http = HttpError::from(error);
        assert_eq!(http.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(http.public_message().contains("DB connection refused"));
    }

    #[test]
    fn missing_output_maps_to_internal_error() {
        let error = ReportError::Render(RenderFailure::OutputMissing {
            path: PathBuf::from("/tmp/gone.pdf"),
        });
        let http = HttpError::from(error);
        assert_eq!(http.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(http.public_message().contains("/tmp/gone.pdf"));
    }

    #[test]
    fn empty_report_message_is_stable() {
        let http = HttpError::from(ReportError::Empty);
        assert_eq!(http.public_message(), "generated report is empty");
    }

    #[test]
    fn error_report_collects_source_chain() {
        let error = ReportError::Resolve(crate::application::repos::RepoError::Timeout);
        let report = ErrorReport::from_error("test", StatusCode::INTERNAL_SERVER_ERROR, &error);
        assert_eq!(report.messages.len(), 2);
        assert_eq!(report.messages[1], "database timeout");
    }
}

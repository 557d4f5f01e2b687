use std::{sync::Arc, time::Instant};

use bytes::Bytes;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    application::{identity::IdentityService, repos::RepoError},
    domain::{
        slug::{report_filename_for_identifier, report_filename_for_worker},
        types::{Identifier, PhoneNumber},
    },
};

use super::{
    artifact::{ArtifactReadError, with_artifact},
    renderer::ReportRenderer,
    types::{RenderFailure, RenderRequest},
};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("no worker registered for phone number {phone}")]
    WorkerNotFound { phone: PhoneNumber },
    #[error("failed to resolve worker by phone")]
    Resolve(#[source] RepoError),
    #[error("failed to generate report PDF: {0}")]
    Render(#[from] RenderFailure),
    #[error("failed to read generated report: {0}")]
    Read(#[from] ArtifactReadError),
    #[error("generated report is empty")]
    Empty,
    #[error("report task aborted: {0}")]
    Task(String),
}

/// Fully materialised PDF ready to be written to the transport.
#[derive(Debug, Clone)]
pub struct ReportDocument {
    pub identifier: Identifier,
    pub filename: String,
    pub bytes: Bytes,
}

/// Sequences resolution, rendering, artifact read and cleanup for one request.
#[derive(Clone)]
pub struct ReportService {
    identity: IdentityService,
    renderer: Arc<dyn ReportRenderer>,
}

impl ReportService {
    pub fn new(identity: IdentityService, renderer: Arc<dyn ReportRenderer>) -> Self {
        Self { identity, renderer }
    }

    pub async fn report_for_identifier(
        &self,
        identifier: Identifier,
    ) -> Result<ReportDocument, ReportError> {
        let filename = report_filename_for_identifier(identifier);
        self.deliver(identifier, filename).await
    }

    pub async fn report_for_phone(
        &self,
        phone: &PhoneNumber,
    ) -> Result<ReportDocument, ReportError> {
        let worker = self
            .identity
            .resolve_by_phone(phone)
            .await
            .map_err(ReportError::Resolve)?
            .ok_or_else(|| ReportError::WorkerNotFound {
                phone: phone.clone(),
            })?;

        let filename = report_filename_for_worker(&worker);
        self.deliver(worker.identifier, filename).await
    }

    async fn deliver(
        &self,
        identifier: Identifier,
        filename: String,
    ) -> Result<ReportDocument, ReportError> {
        let started_at = Instant::now();
        let renderer = Arc::clone(&self.renderer);

        // Detached so a client disconnect cannot cancel the render or skip cleanup.
        let task = tokio::spawn(async move {
            let artifact = renderer.render(RenderRequest::new(identifier)).await?;
            with_artifact(artifact, |bytes| {
                if bytes.is_empty() {
                    Err(ReportError::Empty)
                } else {
                    Ok(bytes)
                }
            })
            .await
        });

        let result = match task.await {
            Ok(result) => result,
            Err(err) => Err(ReportError::Task(err.to_string())),
        };

        match &result {
            Ok(bytes) => info!(
                target = "application::report::service",
                op = "report::deliver",
                result = "ok",
                identifier = identifier.get(),
                bytes = bytes.len(),
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                "Report delivered"
            ),
            Err(err) => warn!(
                target = "application::report::service",
                op = "report::deliver",
                result = "error",
                identifier = identifier.get(),
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                error = %err,
                "Report delivery failed"
            ),
        }

        Ok(ReportDocument {
            identifier,
            filename,
            bytes: result?,
        })
    }
}

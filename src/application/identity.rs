use std::sync::Arc;

use tracing::debug;

use crate::application::repos::{RepoError, WorkersRepo};
use crate::domain::{entities::WorkerRecord, types::PhoneNumber};

/// Resolves a phone number to the worker whose identifier drives rendering.
#[derive(Clone)]
pub struct IdentityService {
    workers: Arc<dyn WorkersRepo>,
}

impl IdentityService {
    pub fn new(workers: Arc<dyn WorkersRepo>) -> Self {
        Self { workers }
    }

    /// `Ok(None)` is the normal miss; `Err` is reserved for persistence failures.
    pub async fn resolve_by_phone(
        &self,
        phone: &PhoneNumber,
    ) -> Result<Option<WorkerRecord>, RepoError> {
        let worker = self.workers.find_by_phone(phone).await?;
        debug!(
            target = "application::identity",
            phone = %phone,
            found = worker.is_some(),
            "Resolved worker by phone"
        );
        Ok(worker)
    }
}

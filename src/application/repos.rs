//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{ChatEntryRecord, WorkerRecord};
use crate::domain::types::PhoneNumber;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[async_trait]
pub trait WorkersRepo: Send + Sync {
    /// Single-row lookup; `Ok(None)` when no worker carries the phone number.
    async fn find_by_phone(&self, phone: &PhoneNumber) -> Result<Option<WorkerRecord>, RepoError>;
}

#[derive(Debug, Clone)]
pub struct NewChatEntry {
    pub phone_number: PhoneNumber,
    pub question: String,
    pub answer: Option<String>,
}

#[async_trait]
pub trait ChatHistoryRepo: Send + Sync {
    async fn append_entry(&self, entry: NewChatEntry) -> Result<ChatEntryRecord, RepoError>;

    /// Entries for `phone`, oldest first.
    async fn list_entries(
        &self,
        phone: &PhoneNumber,
        limit: u32,
    ) -> Result<Vec<ChatEntryRecord>, RepoError>;

    async fn update_answer(&self, id: i64, answer: &str) -> Result<ChatEntryRecord, RepoError>;
}

//! Question/answer history kept per phone number.

use std::sync::Arc;

use thiserror::Error;

use crate::application::repos::{ChatHistoryRepo, NewChatEntry, RepoError};
use crate::domain::{entities::ChatEntryRecord, error::DomainError, types::PhoneNumber};

pub const DEFAULT_HISTORY_LIMIT: u32 = 50;
pub const MAX_HISTORY_LIMIT: u32 = 200;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct ChatHistoryService {
    repo: Arc<dyn ChatHistoryRepo>,
}

impl ChatHistoryService {
    pub fn new(repo: Arc<dyn ChatHistoryRepo>) -> Self {
        Self { repo }
    }

    pub async fn history(
        &self,
        phone: &PhoneNumber,
        limit: Option<u32>,
    ) -> Result<Vec<ChatEntryRecord>, ChatError> {
        let limit = limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT);
        Ok(self.repo.list_entries(phone, limit).await?)
    }

    pub async fn record(
        &self,
        phone: PhoneNumber,
        question: &str,
        answer: Option<&str>,
    ) -> Result<ChatEntryRecord, ChatError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(DomainError::validation("question must not be empty").into());
        }

        let answer = answer
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        Ok(self
            .repo
            .append_entry(NewChatEntry {
                phone_number: phone,
                question: question.to_string(),
                answer,
            })
            .await?)
    }

    pub async fn answer(&self, id: i64, answer: &str) -> Result<ChatEntryRecord, ChatError> {
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(DomainError::validation("answer must not be empty").into());
        }
        Ok(self.repo.update_answer(id, answer).await?)
    }
}

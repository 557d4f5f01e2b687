//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::types::{Identifier, PhoneNumber};

/// Person whose identifier drives report rendering. Read-only from this service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerRecord {
    pub identifier: Identifier,
    pub given_names: String,
    pub family_names: String,
    pub phone_number: PhoneNumber,
}

impl WorkerRecord {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.given_names.trim(), self.family_names.trim())
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatEntryRecord {
    pub id: i64,
    pub phone_number: PhoneNumber,
    pub question: String,
    pub answer: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

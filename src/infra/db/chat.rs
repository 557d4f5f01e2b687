use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    application::repos::{ChatHistoryRepo, NewChatEntry, RepoError},
    domain::{entities::ChatEntryRecord, types::PhoneNumber},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct ChatEntryRow {
    id: i64,
    phone_number: String,
    question: String,
    answer: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<ChatEntryRow> for ChatEntryRecord {
    type Error = RepoError;

    fn try_from(row: ChatEntryRow) -> Result<Self, Self::Error> {
        let phone_number =
            PhoneNumber::parse(&row.phone_number).map_err(|err| RepoError::Integrity {
                message: format!("chat entry {} carries an invalid phone number: {err}", row.id),
            })?;

        Ok(Self {
            id: row.id,
            phone_number,
            question: row.question,
            answer: row.answer,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl ChatHistoryRepo for PostgresRepositories {
    async fn append_entry(&self, entry: NewChatEntry) -> Result<ChatEntryRecord, RepoError> {
        let row = sqlx::query_as::<_, ChatEntryRow>(
            r#"
            INSERT INTO chat_history (phone_number, question, answer)
            VALUES ($1, $2, $3)
            RETURNING id, phone_number, question, answer, created_at, updated_at
            "#,
        )
        .bind(entry.phone_number.as_str())
        .bind(&entry.question)
        .bind(entry.answer.as_deref())
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        ChatEntryRecord::try_from(row)
    }

    async fn list_entries(
        &self,
        phone: &PhoneNumber,
        limit: u32,
    ) -> Result<Vec<ChatEntryRecord>, RepoError> {
        // Newest `limit` rows, returned oldest first.
        let rows = sqlx::query_as::<_, ChatEntryRow>(
            r#"
            SELECT id, phone_number, question, answer, created_at, updated_at
            FROM (
                SELECT id, phone_number, question, answer, created_at, updated_at
                FROM chat_history
                WHERE phone_number = $1
                ORDER BY created_at DESC, id DESC
                LIMIT $2
            ) recent
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(phone.as_str())
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(ChatEntryRecord::try_from).collect()
    }

    async fn update_answer(&self, id: i64, answer: &str) -> Result<ChatEntryRecord, RepoError> {
        let row = sqlx::query_as::<_, ChatEntryRow>(
            r#"
            UPDATE chat_history
            SET answer = $2, updated_at = now()
            WHERE id = $1
            RETURNING id, phone_number, question, answer, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(answer)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        ChatEntryRecord::try_from(row)
    }
}

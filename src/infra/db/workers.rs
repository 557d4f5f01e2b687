use async_trait::async_trait;

use crate::{
    application::repos::{RepoError, WorkersRepo},
    domain::{
        entities::WorkerRecord,
        types::{Identifier, PhoneNumber},
    },
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct WorkerRow {
    identifier: i64,
    given_names: String,
    family_names: String,
    phone_number: String,
}

impl TryFrom<WorkerRow> for WorkerRecord {
    type Error = RepoError;

    fn try_from(row: WorkerRow) -> Result<Self, Self::Error> {
        let identifier = Identifier::new(row.identifier).map_err(|err| RepoError::Integrity {
            message: format!("worker row carries an invalid identifier: {err}"),
        })?;
        let phone_number =
            PhoneNumber::parse(&row.phone_number).map_err(|err| RepoError::Integrity {
                message: format!("worker {identifier} carries an invalid phone number: {err}"),
            })?;

        Ok(Self {
            identifier,
            given_names: row.given_names,
            family_names: row.family_names,
            phone_number,
        })
    }
}

#[async_trait]
impl WorkersRepo for PostgresRepositories {
    async fn find_by_phone(&self, phone: &PhoneNumber) -> Result<Option<WorkerRecord>, RepoError> {
        let row = sqlx::query_as::<_, WorkerRow>(
            r#"
            SELECT identifier, given_names, family_names, phone_number
            FROM workers
            WHERE phone_number = $1
            LIMIT 1
            "#,
        )
        .bind(phone.as_str())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(WorkerRecord::try_from).transpose()
    }
}

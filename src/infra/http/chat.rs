use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::{application::error::HttpError, domain::types::PhoneNumber};

use super::HttpState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct HistoryQuery {
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RecordEntryBody {
    question: String,
    #[serde(default)]
    answer: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct AnswerBody {
    answer: String,
}

pub(super) async fn list_history(
    State(state): State<HttpState>,
    Path(raw): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let phone = match PhoneNumber::parse(&raw) {
        Ok(phone) => phone,
        Err(err) => return HttpError::from(err).into_response(),
    };

    match state.chat.history(&phone, query.limit).await {
        Ok(entries) => Json(entries).into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn record_entry(
    State(state): State<HttpState>,
    Path(raw): Path<String>,
    Json(body): Json<RecordEntryBody>,
) -> Response {
    let phone = match PhoneNumber::parse(&raw) {
        Ok(phone) => phone,
        Err(err) => return HttpError::from(err).into_response(),
    };

    match state
        .chat
        .record(phone, &body.question, body.answer.as_deref())
        .await
    {
        Ok(entry) => (StatusCode::CREATED, Json(entry)).into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn answer_entry(
    State(state): State<HttpState>,
    Path(id): Path<i64>,
    Json(body): Json<AnswerBody>,
) -> Response {
    match state.chat.answer(id, &body.answer).await {
        Ok(entry) => Json(entry).into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}

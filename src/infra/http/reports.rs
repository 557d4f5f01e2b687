use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::{
    application::{error::HttpError, report::ReportDocument},
    domain::types::{Identifier, PhoneNumber},
};

use super::HttpState;

const PDF_CONTENT_TYPE: &str = "application/pdf";

pub(super) async fn report_by_identifier(
    State(state): State<HttpState>,
    Path(raw): Path<String>,
) -> Response {
    let identifier = match parse_identifier(&raw) {
        Ok(identifier) => identifier,
        Err(err) => return err.into_response(),
    };

    match state.reports.report_for_identifier(identifier).await {
        Ok(document) => pdf_response(document),
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn report_by_phone(
    State(state): State<HttpState>,
    Path(raw): Path<String>,
) -> Response {
    let phone = match PhoneNumber::parse(&raw) {
        Ok(phone) => phone,
        Err(err) => return HttpError::from(err).into_response(),
    };

    match state.reports.report_for_phone(&phone).await {
        Ok(document) => pdf_response(document),
        Err(err) => HttpError::from(err).into_response(),
    }
}

fn parse_identifier(raw: &str) -> Result<Identifier, HttpError> {
    const SOURCE: &str = "infra::http::reports::parse_identifier";
    let value: i64 = raw.trim().parse().map_err(|err| {
        HttpError::from_error(
            SOURCE,
            StatusCode::BAD_REQUEST,
            "identifier must be a positive integer",
            &err,
        )
    })?;
    Identifier::new(value).map_err(HttpError::from)
}

fn pdf_response(document: ReportDocument) -> Response {
    let length = document.bytes.len();
    let mut response = Response::new(Body::from(document.bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(PDF_CONTENT_TYPE),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));

    let safe_name = document.filename.replace('"', "'");
    if let Ok(value) = HeaderValue::from_str(&format!("inline; filename=\"{safe_name}\"")) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    response
}

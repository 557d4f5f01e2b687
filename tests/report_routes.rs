#![cfg(unix)]

use std::{
    fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use serde_json::{Value, json};
use sqlx::postgres::PgPoolOptions;
use tempfile::TempDir;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tower::ServiceExt;

use payslip::application::{
    chat::ChatHistoryService,
    identity::IdentityService,
    report::{EmptyOutputPolicy, ProcessRenderer, RendererConfig, ReportService},
    repos::{ChatHistoryRepo, NewChatEntry, RepoError, WorkersRepo},
};
use payslip::domain::{
    entities::{ChatEntryRecord, WorkerRecord},
    types::{Identifier, PhoneNumber},
};
use payslip::infra::{
    db::PostgresRepositories,
    http::{HttpState, build_router},
};

const WORKER_PHONE: &str = "0981123456";
const WORKER_ID: i64 = 1_234_567;

struct StaticWorkers {
    workers: Vec<WorkerRecord>,
}

#[async_trait]
impl WorkersRepo for StaticWorkers {
    async fn find_by_phone(&self, phone: &PhoneNumber) -> Result<Option<WorkerRecord>, RepoError> {
        Ok(self
            .workers
            .iter()
            .find(|worker| &worker.phone_number == phone)
            .cloned())
    }
}

#[derive(Default)]
struct MemoryChat {
    entries: Mutex<Vec<ChatEntryRecord>>,
}

#[async_trait]
impl ChatHistoryRepo for MemoryChat {
    async fn append_entry(&self, entry: NewChatEntry) -> Result<ChatEntryRecord, RepoError> {
        let mut entries = self.entries.lock().await;
        let now = OffsetDateTime::now_utc();
        let record = ChatEntryRecord {
            id: entries.len() as i64 + 1,
            phone_number: entry.phone_number,
            question: entry.question,
            answer: entry.answer,
            created_at: now,
            updated_at: now,
        };
        entries.push(record.clone());
        Ok(record)
    }

    async fn list_entries(
        &self,
        phone: &PhoneNumber,
        limit: u32,
    ) -> Result<Vec<ChatEntryRecord>, RepoError> {
        let matching: Vec<ChatEntryRecord> = self
            .entries
            .lock()
            .await
            .iter()
            .filter(|entry| &entry.phone_number == phone)
            .cloned()
            .collect();
        let skip = matching.len().saturating_sub(limit as usize);
        Ok(matching.into_iter().skip(skip).collect())
    }

    async fn update_answer(&self, id: i64, answer: &str) -> Result<ChatEntryRecord, RepoError> {
        let mut entries = self.entries.lock().await;
        let entry = entries
            .iter_mut()
            .find(|entry| entry.id == id)
            .ok_or(RepoError::NotFound)?;
        entry.answer = Some(answer.to_string());
        entry.updated_at = OffsetDateTime::now_utc();
        Ok(entry.clone())
    }
}

struct Harness {
    dir: TempDir,
    router: Router,
}

impl Harness {
    fn calls_log(&self) -> PathBuf {
        self.dir.path().join("calls.log")
    }

    fn artifact(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

fn worker() -> WorkerRecord {
    WorkerRecord {
        identifier: Identifier::new(WORKER_ID).expect("identifier"),
        given_names: "María José".to_string(),
        family_names: "Núñez Báez".to_string(),
        phone_number: PhoneNumber::parse(WORKER_PHONE).expect("phone"),
    }
}

fn write_runtime(dir: &Path, body: &str) -> PathBuf {
    let script = dir.join("fake-java");
    fs::write(
        &script,
        format!("#!/bin/sh\necho \"$4\" >> calls.log\n{body}\n"),
    )
    .expect("write script");
    let mut perms = fs::metadata(&script).expect("metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&script, perms).expect("chmod");
    script
}

fn unreachable_db() -> Arc<PostgresRepositories> {
    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(250))
        .connect_lazy("postgres://payslip@127.0.0.1:1/payslip")
        .expect("lazy pool");
    Arc::new(PostgresRepositories::new(pool))
}

fn harness(script_body: &str, empty_output: EmptyOutputPolicy) -> Harness {
    let dir = TempDir::new().expect("tempdir");
    let runtime = write_runtime(dir.path(), script_body);

    let renderer = ProcessRenderer::new(RendererConfig {
        runtime,
        working_dir: dir.path().to_path_buf(),
        classpath: "luciajasper.jar:lib/*".to_string(),
        entry_point: "luciareportes.GenerarReporte".to_string(),
        timeout: Duration::from_secs(10),
        empty_output,
    });
    let identity = IdentityService::new(Arc::new(StaticWorkers {
        workers: vec![worker()],
    }));

    let state = HttpState {
        reports: Arc::new(ReportService::new(identity, Arc::new(renderer))),
        chat: Arc::new(ChatHistoryService::new(Arc::new(MemoryChat::default()))),
        db: unreachable_db(),
    };

    Harness {
        dir,
        router: build_router(state),
    }
}

const WRITES_PDF: &str = r#"out="$(pwd)/report_$4.pdf"
printf '%s' '%PDF-1.4 fake report' > "$out"
echo "$out""#;

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    router
        .clone()
        .oneshot(builder.body(body).expect("request should build"))
        .await
        .expect("router should respond")
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn identifier_route_streams_pdf_and_removes_artifact() {
    let harness = harness(WRITES_PDF, EmptyOutputPolicy::Warn);

    let response = send(
        &harness.router,
        Method::GET,
        "/api/report/1234567",
        None,
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers().clone();
    assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "inline; filename=\"estracto_sueldo_1234567.pdf\""
    );
    assert_eq!(headers[header::CONTENT_LENGTH], "20");
    assert_eq!(body_text(response).await, "%PDF-1.4 fake report");

    assert!(!harness.artifact("report_1234567.pdf").exists());
    let calls = fs::read_to_string(harness.calls_log()).expect("calls log");
    assert_eq!(calls.trim(), "1234567");
}

#[tokio::test]
async fn phone_route_resolves_worker_and_names_file_after_them() {
    let harness = harness(WRITES_PDF, EmptyOutputPolicy::Warn);

    let response = send(
        &harness.router,
        Method::GET,
        &format!("/api/report/phone/{WORKER_PHONE}"),
        None,
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "inline; filename=\"estracto_sueldo_maria_jose_nunez_baez.pdf\""
    );
    assert!(!harness.artifact("report_1234567.pdf").exists());
}

#[tokio::test]
async fn unknown_phone_is_not_found_without_rendering() {
    let harness = harness(WRITES_PDF, EmptyOutputPolicy::Warn);

    let response = send(
        &harness.router,
        Method::GET,
        "/api/report/phone/0999000000",
        None,
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(!harness.calls_log().exists());
}

#[tokio::test]
async fn non_positive_identifier_is_rejected_without_rendering() {
    let harness = harness(WRITES_PDF, EmptyOutputPolicy::Warn);

    for uri in ["/api/report/0", "/api/report/-7", "/api/report/abc"] {
        let response = send(&harness.router, Method::GET, uri, None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "uri {uri}");
    }
    assert!(!harness.calls_log().exists());
}

#[tokio::test]
async fn renderer_exit_failure_surfaces_stderr() {
    let harness = harness(
        "echo 'DB connection refused' >&2\nexit 1",
        EmptyOutputPolicy::Warn,
    );

    let response = send(&harness.router, Method::GET, "/api/report/42", None).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_text(response).await,
        "failed to generate report PDF: renderer process failed: DB connection refused"
    );
}

#[tokio::test]
async fn silent_renderer_is_a_generation_failure() {
    let harness = harness("exit 0", EmptyOutputPolicy::Warn);

    let response = send(&harness.router, Method::GET, "/api/report/42", None).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(
        body_text(response)
            .await
            .starts_with("failed to generate report PDF: ")
    );
}

#[tokio::test]
async fn empty_output_file_is_rejected_and_removed() {
    let script = r#"out="$(pwd)/report_$4.pdf"
: > "$out"
echo "$out""#;
    let harness = harness(script, EmptyOutputPolicy::Warn);

    let response = send(&harness.router, Method::GET, "/api/report/42", None).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, "generated report is empty");
    assert!(!harness.artifact("report_42.pdf").exists());
}

#[tokio::test]
async fn chat_history_round_trip() {
    let harness = harness(WRITES_PDF, EmptyOutputPolicy::Warn);
    let uri = format!("/api/chat/{WORKER_PHONE}");

    let created = send(
        &harness.router,
        Method::POST,
        &uri,
        Some(json!({ "question": "  When is payday?  " })),
    )
    .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let created = body_json(created).await;
    assert_eq!(created["question"], "When is payday?");
    assert!(created["answer"].is_null());
    let id = created["id"].as_i64().expect("id");

    let answered = send(
        &harness.router,
        Method::PATCH,
        &format!("/api/chat/entries/{id}"),
        Some(json!({ "answer": "On the last business day." })),
    )
    .await;
    assert_eq!(answered.status(), StatusCode::OK);

    let history = send(&harness.router, Method::GET, &uri, None).await;
    assert_eq!(history.status(), StatusCode::OK);
    let history = body_json(history).await;
    let entries = history.as_array().expect("array");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["answer"], "On the last business day.");
    assert_eq!(entries[0]["phone_number"], WORKER_PHONE);
}

#[tokio::test]
async fn chat_rejects_blank_question_and_unknown_entry() {
    let harness = harness(WRITES_PDF, EmptyOutputPolicy::Warn);

    let blank = send(
        &harness.router,
        Method::POST,
        &format!("/api/chat/{WORKER_PHONE}"),
        Some(json!({ "question": "   " })),
    )
    .await;
    assert_eq!(blank.status(), StatusCode::BAD_REQUEST);

    let missing = send(
        &harness.router,
        Method::PATCH,
        "/api/chat/entries/999",
        Some(json!({ "answer": "nobody asked" })),
    )
    .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_routes_report_liveness_and_database_state() {
    let harness = harness(WRITES_PDF, EmptyOutputPolicy::Warn);

    let live = send(&harness.router, Method::GET, "/_health", None).await;
    assert_eq!(live.status(), StatusCode::OK);
    assert_eq!(body_text(live).await, "ok");

    let db = send(&harness.router, Method::GET, "/_health/db", None).await;
    assert_eq!(db.status(), StatusCode::SERVICE_UNAVAILABLE);
}

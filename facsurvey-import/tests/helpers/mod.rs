//! Shared integration test utilities
//!
//! - `create_test_db`: file-backed SQLite with the full schema
//! - `InMemorySource`: scripted `SurveySource` for orchestrator tests
//! - `FakeSourceServer`: axum stand-in for the survey platform's data API

#![allow(dead_code)]

use async_trait::async_trait;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinHandle;

use facsurvey_import::config::SourceConfig;
use facsurvey_import::error::SourceError;
use facsurvey_import::services::{ImportOrchestrator, OrchestratorOptions, SurveySource};

pub const TEST_API_KEY: &str = "test-token";

/// Create temporary test database with the schema applied
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().unwrap();
    let pool = facsurvey_common::db::init_database(&temp_dir.path().join("test_facsurvey.db"))
        .await
        .unwrap();
    (temp_dir, pool)
}

/// Minimal valid submission
pub fn submission(id: i64, facility_name: &str) -> Value {
    json!({
        "_id": id,
        "_submission_time": "2024-03-05T09:30:00",
        "facility_name": facility_name,
        "facility_type": "health centre",
        "electricity_source": "Solar panel",
    })
}

/// Submission the transformer rejects (no facility name)
pub fn nameless_submission(id: i64) -> Value {
    json!({ "_id": id, "electricity_source": "grid" })
}

pub fn orchestrator(pool: &SqlitePool, source: Arc<InMemorySource>, concurrency: usize) -> ImportOrchestrator {
    ImportOrchestrator::new(
        pool.clone(),
        source,
        OrchestratorOptions {
            concurrency,
            owner_user_id: Some("importer".to_string()),
            max_lock_wait_ms: 5000,
        },
    )
}

// ============================================================================
// In-memory source
// ============================================================================

/// Serves a fixed record list; can be switched into an outage
pub struct InMemorySource {
    records: Mutex<Vec<Value>>,
    unavailable: bool,
    range_calls: AtomicUsize,
}

impl InMemorySource {
    pub fn new(records: Vec<Value>) -> Self {
        Self {
            records: Mutex::new(records),
            unavailable: false,
            range_calls: AtomicUsize::new(0),
        }
    }

    /// Every fetch fails as a network outage
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::new(Vec::new())
        }
    }

    /// Replace the served records (simulates edits on the platform)
    pub fn set_records(&self, records: Vec<Value>) {
        *self.records.lock().unwrap() = records;
    }

    pub fn range_calls(&self) -> usize {
        self.range_calls.load(Ordering::SeqCst)
    }

    fn outage(&self) -> Result<(), SourceError> {
        if self.unavailable {
            return Err(SourceError::Unavailable("simulated outage".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SurveySource for InMemorySource {
    fn source_tag(&self) -> &str {
        "memory"
    }

    async fn fetch_by_date_range(
        &self,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<Value>, SourceError> {
        self.range_calls.fetch_add(1, Ordering::SeqCst);
        self.outage()?;
        Ok(self.records.lock().unwrap().clone())
    }

    async fn fetch_by_id(&self, external_id: &str) -> Result<Option<Value>, SourceError> {
        self.outage()?;
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .find(|record| id_of(record).as_deref() == Some(external_id))
            .cloned())
    }
}

fn id_of(record: &Value) -> Option<String> {
    match record.get("_id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ============================================================================
// Fake HTTP source
// ============================================================================

#[derive(Clone)]
struct FakeState {
    pages: Arc<Vec<Vec<Value>>>,
    by_id: Arc<HashMap<String, Value>>,
    /// Last page links back to page 1 instead of ending
    cyclic: bool,
    origin: String,
    requests: Arc<AtomicUsize>,
    last_range: Arc<Mutex<Option<(String, String)>>>,
}

/// Local HTTP server mimicking the survey data API
///
/// `/data` serves paginated range queries and `/data/{id}` single
/// submissions; `/garbage` answers 200 with bodies that are not the
/// documented JSON shape. Requests without `Authorization: Token
/// test-token` get 401.
pub struct FakeSourceServer {
    origin: String,
    state: FakeState,
    handle: JoinHandle<()>,
}

impl FakeSourceServer {
    pub async fn start(pages: Vec<Vec<Value>>, by_id: Vec<Value>) -> Self {
        Self::start_with(pages, by_id, false).await
    }

    pub async fn start_cyclic(pages: Vec<Vec<Value>>) -> Self {
        Self::start_with(pages, Vec::new(), true).await
    }

    async fn start_with(pages: Vec<Vec<Value>>, by_id: Vec<Value>, cyclic: bool) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let origin = format!("http://{}", listener.local_addr().unwrap());

        let state = FakeState {
            pages: Arc::new(pages),
            by_id: Arc::new(
                by_id
                    .into_iter()
                    .filter_map(|record| id_of(&record).map(|id| (id, record)))
                    .collect(),
            ),
            cyclic,
            origin: origin.clone(),
            requests: Arc::new(AtomicUsize::new(0)),
            last_range: Arc::new(Mutex::new(None)),
        };

        let app = Router::new()
            .route("/data", get(range_handler))
            .route("/data/:id", get(by_id_handler))
            .route("/garbage", get(|| async { "<html>maintenance</html>" }))
            .route("/garbage/:id", get(|| async { Json(json!([1, 2, 3])) }))
            .with_state(state.clone());

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            origin,
            state,
            handle,
        }
    }

    pub fn data_url(&self) -> String {
        format!("{}/data", self.origin)
    }

    pub fn garbage_url(&self) -> String {
        format!("{}/garbage", self.origin)
    }

    pub fn request_count(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }

    /// `(start, end)` query values of the most recent range request
    pub fn last_range(&self) -> Option<(String, String)> {
        self.state.last_range.lock().unwrap().clone()
    }
}

impl Drop for FakeSourceServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Token {}", TEST_API_KEY))
        .unwrap_or(false)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "detail": "Invalid token." })),
    )
        .into_response()
}

async fn range_handler(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return unauthorized();
    }

    let (Some(start), Some(end)) = (params.get("start"), params.get("end")) else {
        return (StatusCode::BAD_REQUEST, "start and end are required").into_response();
    };
    *state.last_range.lock().unwrap() = Some((start.clone(), end.clone()));

    let page: usize = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(0);
    let results = state.pages.get(page).cloned().unwrap_or_default();

    let next_page = if page + 1 < state.pages.len() {
        Some(page + 1)
    } else if state.cyclic {
        Some(1)
    } else {
        None
    };
    let next = next_page.map(|p| {
        format!(
            "{}/data?start={}&end={}&page={}",
            state.origin, start, end, p
        )
    });

    let count: usize = state.pages.iter().map(Vec::len).sum();
    Json(json!({
        "count": count,
        "next": next,
        "previous": null,
        "results": results,
    }))
    .into_response()
}

async fn by_id_handler(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return unauthorized();
    }

    match state.by_id.get(&id) {
        Some(record) => Json(record.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not found." }))).into_response(),
    }
}

/// Source config pointing at `base_url` with the test token
pub fn source_config(base_url: &str) -> SourceConfig {
    source_config_with_key(base_url, TEST_API_KEY)
}

pub fn source_config_with_key(base_url: &str, api_key: &str) -> SourceConfig {
    SourceConfig {
        base_url: base_url.to_string(),
        api_key: api_key.to_string(),
        source_tag: "kobo".to_string(),
        timeout: Duration::from_secs(5),
        requests_per_second: None,
    }
}

//! # REST API
//!
//! Builds the axum router that exposes the record store over HTTP. All
//! handlers share one [`RecordStore`] behind a `parking_lot::Mutex`; the
//! guard is never held across an `.await`. Mining runs on tokio's blocking
//! pool since proof-of-work is CPU bound.
//!
//! ## Endpoints
//!
//! | Method | Path                    | Description                          |
//! |--------|-------------------------|--------------------------------------|
//! | GET    | `/health`               | Liveness probe                       |
//! | GET    | `/info`                 | Store and ledger status              |
//! | GET    | `/schemas`              | All schemas                          |
//! | POST   | `/schemas`              | Define a schema                      |
//! | GET    | `/schemas/:name`        | One schema                           |
//! | GET    | `/records`              | List records (`?schema=` filter)     |
//! | POST   | `/records`              | Create a record                      |
//! | POST   | `/records/search`       | Exact-match search                   |
//! | GET    | `/records/:id`          | One record                           |
//! | PUT    | `/records/:id`          | Replace a record's fields            |
//! | GET    | `/records/:id/history`  | Ledger transactions for a record     |
//! | POST   | `/mine`                 | Seal pending transactions            |
//! | GET    | `/validate`             | Full chain audit                     |
//! | GET    | `/export`               | Whole-store snapshot                 |
//! | GET    | `/blocks/:index`        | Block by index                       |
//! | GET    | `/transactions/:id`     | Stored transaction by id             |

use axum::{
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use chainstore_core::ledger::{ChainAudit, LedgerError};
use chainstore_core::schema::{FieldSpec, Fields};
use chainstore_core::storage::SledBackend;
use chainstore_core::store::{RecordStore, StoreError};

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// The one store this process serves.
pub type SharedStore = Arc<Mutex<RecordStore<SledBackend>>>;

/// Shared application state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Reported by `/info`.
    pub version: String,
    pub store: SharedStore,
    pub metrics: SharedMetrics,
}

impl AppState {
    /// Convert a store failure into a response, counting validation
    /// rejections on the way.
    fn reject(&self, err: StoreError) -> ApiError {
        if matches!(err, StoreError::Validation(_)) {
            self.metrics.validation_failures_total.inc();
        }
        ApiError::Store(err)
    }

    fn refresh_gauges(&self, store: &RecordStore<SledBackend>) {
        self.metrics.observe_store(&store.info());
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Body of every non-2xx response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Handler failure, rendered as a status code plus [`ErrorResponse`].
#[derive(Debug)]
pub enum ApiError {
    Store(StoreError),
    NotFound(String),
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

/// HTTP status for a store failure.
pub fn status_for(err: &StoreError) -> StatusCode {
    match err {
        StoreError::UnknownSchema(_) | StoreError::UnknownRecord(_) => StatusCode::NOT_FOUND,
        StoreError::DuplicateSchema(_) => StatusCode::CONFLICT,
        StoreError::Ledger(LedgerError::NoPendingWork) => StatusCode::CONFLICT,
        StoreError::InvalidSchema(_) | StoreError::Validation(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        StoreError::Ledger(_) | StoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::Store(err) => (status_for(&err), err.to_string()),
            ApiError::NotFound(what) => (StatusCode::NOT_FOUND, what),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        if status.is_server_error() {
            tracing::error!(status = %status, "{}", error);
        }
        (status, Json(ErrorResponse { error })).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ---------------------------------------------------------------------------
// Request Types
// ---------------------------------------------------------------------------

/// Body of `POST /schemas`.
#[derive(Debug, Deserialize)]
pub struct DefineSchemaRequest {
    pub name: String,
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub description: String,
}

/// Body of `POST /records`.
#[derive(Debug, Deserialize)]
pub struct CreateRecordRequest {
    pub schema: String,
    pub fields: Fields,
}

/// Body of `PUT /records/:id`.
#[derive(Debug, Deserialize)]
pub struct UpdateRecordRequest {
    pub fields: Fields,
}

/// Body of `POST /records/search`.
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub criteria: Fields,
}

/// Query string of `GET /records`.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub schema: Option<String>,
}

/// Response of `GET /validate`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub is_valid: bool,
    #[serde(flatten)]
    pub audit: ChainAudit,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/info", get(info_handler))
        .route("/schemas", get(list_schemas_handler).post(define_schema_handler))
        .route("/schemas/:name", get(schema_handler))
        .route("/records", get(list_records_handler).post(create_record_handler))
        .route("/records/search", post(search_handler))
        .route("/records/:id", get(record_handler).put(update_record_handler))
        .route("/records/:id/history", get(history_handler))
        .route("/mine", post(mine_handler))
        .route("/validate", get(validate_handler))
        .route("/export", get(export_handler))
        .route("/blocks/:index", get(block_handler))
        .route("/transactions/:id", get(transaction_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: 200 while the process is up.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /info`
async fn info_handler(State(state): State<AppState>) -> impl IntoResponse {
    let info = state.store.lock().info();
    state.metrics.observe_store(&info);
    Json(serde_json::json!({
        "version": state.version,
        "store": info,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn list_schemas_handler(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.store.lock();
    let schemas: Vec<_> = store.schemas().into_iter().cloned().collect();
    Json(schemas)
}

/// `POST /schemas`: 201 with the stored schema.
async fn define_schema_handler(
    State(state): State<AppState>,
    Json(req): Json<DefineSchemaRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut store = state.store.lock();
    let schema = store
        .define_schema(&req.name, req.fields, &req.description)
        .map_err(|e| state.reject(e))?;
    state.refresh_gauges(&store);
    Ok((StatusCode::CREATED, Json(schema)))
}

async fn schema_handler(
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<impl IntoResponse> {
    let store = state.store.lock();
    let schema = store
        .schema(&name)
        .cloned()
        .ok_or(StoreError::UnknownSchema(name))?;
    Ok(Json(schema))
}

/// `GET /records?schema=Name`
async fn list_records_handler(
    Query(query): Query<ListQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let store = state.store.lock();
    let records: Vec<_> = store
        .list(query.schema.as_deref())
        .into_iter()
        .cloned()
        .collect();
    Json(records)
}

/// `POST /records`: 201 with the new record.
async fn create_record_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateRecordRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut store = state.store.lock();
    let id = store
        .create(&req.schema, req.fields)
        .map_err(|e| state.reject(e))?;
    state.refresh_gauges(&store);
    let record = store
        .get(&id)
        .cloned()
        .ok_or_else(|| ApiError::Internal(format!("record {id} vanished after create")))?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn search_handler(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> impl IntoResponse {
    let store = state.store.lock();
    let records: Vec<_> = store
        .search(req.schema.as_deref(), &req.criteria)
        .into_iter()
        .cloned()
        .collect();
    Json(records)
}

async fn record_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<impl IntoResponse> {
    let store = state.store.lock();
    let record = store
        .get(&id)
        .cloned()
        .ok_or(StoreError::UnknownRecord(id))?;
    Ok(Json(record))
}

/// `PUT /records/:id`: full replacement, returns the updated record.
async fn update_record_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<UpdateRecordRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut store = state.store.lock();
    store.update(&id, req.fields).map_err(|e| state.reject(e))?;
    state.refresh_gauges(&store);
    let record = store
        .get(&id)
        .cloned()
        .ok_or(StoreError::UnknownRecord(id))?;
    Ok(Json(record))
}

/// `GET /records/:id/history`: 404 for unknown records, otherwise every
/// transaction that touched it.
async fn history_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<impl IntoResponse> {
    let store = state.store.lock();
    if store.get(&id).is_none() {
        return Err(StoreError::UnknownRecord(id).into());
    }
    Ok(Json(store.history(&id)))
}

/// `POST /mine`: 201 with the sealed block, 409 when nothing is pending.
async fn mine_handler(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let store = Arc::clone(&state.store);
    let started = Instant::now();

    let (block, info) = tokio::task::spawn_blocking(move || {
        let mut store = store.lock();
        let block = store.mine()?;
        Ok::<_, StoreError>((block, store.info()))
    })
    .await
    .map_err(|e| ApiError::Internal(format!("mining task failed: {e}")))??;

    state
        .metrics
        .observe_block(block.transactions.len(), started.elapsed().as_secs_f64());
    state.metrics.observe_store(&info);
    Ok((StatusCode::CREATED, Json(block)))
}

/// `GET /validate`: always 200; `is_valid` carries the verdict.
async fn validate_handler(State(state): State<AppState>) -> impl IntoResponse {
    let audit = state.store.lock().audit();
    Json(ValidateResponse {
        is_valid: audit.is_valid(),
        audit,
    })
}

async fn export_handler(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.store.lock().export();
    Json(snapshot)
}

async fn block_handler(
    Path(index): Path<u64>,
    State(state): State<AppState>,
) -> ApiResult<impl IntoResponse> {
    let store = state.store.lock();
    let block = store
        .ledger()
        .block(index)
        .cloned()
        .ok_or_else(|| ApiError::NotFound(format!("block {index} not found")))?;
    Ok(Json(block))
}

/// `GET /transactions/:id`: the stored copy, with `block_index` once sealed.
async fn transaction_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<impl IntoResponse> {
    let store = state.store.lock();
    let tx = store
        .transaction(&id)?
        .ok_or_else(|| ApiError::NotFound(format!("transaction {id} not found")))?;
    Ok(Json(tx))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

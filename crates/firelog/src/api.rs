//! # HTTP JSON API
//!
//! Routes, mounted under the configured base path (`/api` by default):
//!
//! - `GET  /extinguishers` lists every record.
//! - `POST /extinguishers` registers a record.
//! - `GET  /extinguishers/:barcode` returns a record with its history.
//! - `POST /maintenance-logs` appends a log entry.
//! - `GET  /resolve/:barcode` reports whether a code is registered.
//! - `GET  /barcodes/batch?prefix=..&count=..` generates codes.
//!
//! `GET /health` is always served at the root. Every error body has the
//! shape `{"error": "...", "details": {...}}`, with `details` only present
//! for field-level validation failures.

use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, info};

use crate::barcode;
use crate::config::Config;
use crate::error::{Error, FieldErrors, Result};
use crate::model::{
    AddLogRequest, ExtinguisherWithLogs, FireExtinguisher, MaintenanceLog, RegisterRequest,
};
use crate::resolver::{Resolution, Resolver};
use crate::storage::{Backend, Store};

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    resolver: Resolver,
}

impl AppState {
    /// State over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            resolver: Resolver::new(store),
        }
    }
}

/// JSON error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Short description shown to the user.
    pub error: String,
    /// Per-field messages for validation failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<FieldErrors>,
}

/// An [`Error`] on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(Error::invalid_field("body", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(Error::invalid_field("query", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self.0 {
            Error::Validation { message, details } => {
                let error = if details.is_empty() {
                    message
                } else {
                    "Invalid data".to_string()
                };
                let details = (!details.is_empty()).then_some(details);
                (StatusCode::BAD_REQUEST, ErrorBody { error, details })
            }
            Error::DuplicateBarcode { barcode } => {
                debug!("Duplicate registration for {}", barcode);
                (StatusCode::BAD_REQUEST, plain("Barcode already exists"))
            }
            Error::UnknownExtinguisher { id } => {
                debug!("Log entry for unknown extinguisher {}", id);
                (StatusCode::BAD_REQUEST, plain("Fire extinguisher not found"))
            }
            Error::UnknownBarcode { .. } => {
                (StatusCode::NOT_FOUND, plain("Fire extinguisher not found"))
            }
            other => {
                error!("Request failed: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    plain("Internal server error"),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

fn plain(error: &str) -> ErrorBody {
    ErrorBody {
        error: error.to_string(),
        details: None,
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Run synchronous store work on the blocking pool.
async fn blocking<T, F>(work: F) -> ApiResult<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| Error::internal(format!("blocking task failed: {e}")))?
        .map_err(ApiError)
}

/// Look up a record with its maintenance history.
async fn get_extinguisher(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ApiResult<Json<ExtinguisherWithLogs>> {
    let resolver = state.resolver;
    match blocking(move || resolver.resolve(&raw)).await? {
        Resolution::Found { record } => Ok(Json(record)),
        Resolution::Unregistered { barcode } => Err(Error::UnknownBarcode { barcode }.into()),
    }
}

/// Register a new record.
async fn create_extinguisher(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<FireExtinguisher>)> {
    let Json(request) = payload?;
    let resolver = state.resolver;
    let registered = blocking(move || resolver.register(request)).await?;
    info!("Registered {} over HTTP", registered.extinguisher.barcode);
    Ok((StatusCode::CREATED, Json(registered.extinguisher)))
}

/// List every record, without history.
async fn list_extinguishers(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<FireExtinguisher>>> {
    let store = Arc::clone(state.resolver.store());
    Ok(Json(blocking(move || store.list()).await?))
}

/// Append a maintenance log entry.
async fn create_maintenance_log(
    State(state): State<AppState>,
    payload: std::result::Result<Json<AddLogRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<MaintenanceLog>)> {
    let Json(request) = payload?;
    let (id, entry) = request.into_new()?;
    let store = Arc::clone(state.resolver.store());
    let log = blocking(move || store.append(id, entry)).await?;
    Ok((StatusCode::CREATED, Json(log)))
}

/// Report whether a code is registered.
async fn resolve_barcode(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ApiResult<Json<Resolution>> {
    let resolver = state.resolver;
    Ok(Json(blocking(move || resolver.resolve(&raw)).await?))
}

/// Query parameters for batch generation.
#[derive(Debug, Deserialize)]
struct BatchQuery {
    #[serde(default)]
    prefix: String,
    count: usize,
}

#[derive(Debug, Serialize)]
struct BatchResponse {
    barcodes: Vec<String>,
}

async fn generate_barcodes(
    query: std::result::Result<Query<BatchQuery>, QueryRejection>,
) -> ApiResult<Json<BatchResponse>> {
    let Query(query) = query?;
    let barcodes = barcode::generate_batch(&query.prefix, query.count)?;
    Ok(Json(BatchResponse { barcodes }))
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    backend: Backend,
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        backend: state.resolver.store().backend(),
    })
}

/// Build the application router.
///
/// An empty `base_path` (or `/`) mounts the API at the root.
pub fn router(state: AppState, base_path: &str) -> Router {
    let api = Router::new()
        .route(
            "/extinguishers",
            get(list_extinguishers).post(create_extinguisher),
        )
        .route("/extinguishers/:barcode", get(get_extinguisher))
        .route("/maintenance-logs", post(create_maintenance_log))
        .route("/resolve/:barcode", get(resolve_barcode))
        .route("/barcodes/batch", get(generate_barcodes));

    let base = base_path.trim_end_matches('/');
    let app = if base.is_empty() {
        api
    } else {
        Router::new().nest(base, api)
    };

    app.route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the API until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the bind address is invalid or cannot be bound.
pub async fn serve(
    config: &Config,
    store: Arc<dyn Store>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = config.bind_addr()?;
    let app = router(AppState::new(store), config.base_path());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        "Listening on http://{}{}",
        listener.local_addr()?,
        config.base_path()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("Server stopped");
    Ok(())
}

//! HTTP and WebSocket routes serving the `items` collection and the blob
//! store to `pantry` clients.
//!
//! # Endpoints
//!
//! - `GET /health`: Health check
//! - `GET /items`: All items, in creation order
//! - `POST /items`: Create an item, returns `{"id": ...}`
//! - `PATCH /items/{id}`: Partial update of name/quantity/unit
//! - `DELETE /items/{id}`: Delete an item (succeeds if already gone)
//! - `GET /items/subscribe`: WebSocket; full JSON snapshot on connect and on
//!   every change
//! - `PUT /o/{*path}`, `GET /o/{*path}`, `DELETE /o/{*path}`: Blob access;
//!   uploads are capped at `AppState::max_upload_bytes`
//! - `GET /o?prefix=`: List blob paths
//! - `GET /url/{*path}`: Retrieval URL of a blob

use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        DefaultBodyLimit, Path, Query, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch},
    Json, Router,
};
use futures::StreamExt;
use pantry_core::{
    BlobStore, DocumentStore, ItemUpdate, NewItem, Snapshot, StoreError, ValidationError,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Upload cap used unless configured otherwise.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub documents: Arc<dyn DocumentStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(documents: Arc<dyn DocumentStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            documents,
            blobs,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }
}

/// Builds the router with tracing enabled.
pub fn router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    Router::new()
        .route("/health", get(health))
        .route("/items", get(list_items).post(create_item))
        .route("/items/subscribe", get(subscribe_items))
        .route("/items/{id}", patch(update_item).delete(delete_item))
        .route("/o", get(list_blobs))
        .route(
            "/o/{*path}",
            get(get_blob)
                .put(put_blob)
                .delete(delete_blob)
                .layer(upload_limit),
        )
        .route("/url/{*path}", get(blob_url))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

// ============================================================================
// Errors
// ============================================================================

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    Store(StoreError),
    Invalid(ValidationError),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Store(e)
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Invalid(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::Invalid(e) => (StatusCode::BAD_REQUEST, "invalid_item", e.to_string()),
            ApiError::Store(e) => {
                let (status, error) = match &e {
                    StoreError::NotFound(_) | StoreError::BlobNotFound(_) => {
                        (StatusCode::NOT_FOUND, "not_found")
                    }
                    StoreError::InvalidPath(_) => (StatusCode::BAD_REQUEST, "invalid_path"),
                    StoreError::Connection(_) | StoreError::Backend(_) => {
                        tracing::error!("Storage failure: {}", e);
                        (StatusCode::INTERNAL_SERVER_ERROR, "storage_error")
                    }
                };
                (status, error, e.to_string())
            }
        };

        (
            status,
            Json(ErrorBody {
                error: error.to_string(),
                message,
            }),
        )
            .into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn list_items(State(state): State<AppState>) -> Result<Json<Snapshot>, ApiError> {
    Ok(Json(state.documents.query_all().await?))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub id: String,
}

async fn create_item(
    State(state): State<AppState>,
    Json(item): Json<NewItem>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    item.validate()?;
    let id = state.documents.create(item).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<ItemUpdate>,
) -> Result<StatusCode, ApiError> {
    update.validate()?;
    state.documents.update(&id, &update).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.documents.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn subscribe_items(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_subscription(socket, state))
}

/// Forwards snapshots to the socket until either side closes.
async fn handle_subscription(mut socket: WebSocket, state: AppState) {
    let mut snapshots = match state.documents.subscribe().await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to open subscription: {}", e);
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };
    tracing::info!("Subscriber connected");

    loop {
        tokio::select! {
            next = snapshots.next() => {
                let snapshot = match next {
                    Some(Ok(snapshot)) => snapshot,
                    Some(Err(e)) => {
                        tracing::warn!("Subscription error: {}", e);
                        break;
                    }
                    None => break,
                };
                let json = match serde_json::to_string(&snapshot) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!("Failed to encode snapshot: {}", e);
                        break;
                    }
                };
                if socket.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    // Pings are answered by axum; other frames are ignored
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    let _ = socket.send(Message::Close(None)).await;
    tracing::info!("Subscriber disconnected");
}

async fn put_blob(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|h| h.to_str().ok());
    state
        .blobs
        .upload(&path, body.to_vec(), content_type)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_blob(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, ApiError> {
    let bytes = state.blobs.download(&path).await?;
    Ok(([(header::CONTENT_TYPE, content_type_for(&path))], bytes).into_response())
}

async fn delete_blob(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.blobs.delete(&path).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default)]
    prefix: String,
}

async fn list_blobs(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.blobs.list(&query.prefix).await?))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UrlResponse {
    pub url: String,
}

async fn blob_url(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Json<UrlResponse>, ApiError> {
    let url = state.blobs.download_url(&path).await?;
    Ok(Json(UrlResponse { url }))
}

/// Content type from the file extension.
fn content_type_for(path: &str) -> &'static str {
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

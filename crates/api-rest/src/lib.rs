//! # API REST
//!
//! REST API implementation for Libris uploads.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (multipart parsing, token extraction, CORS)
//!
//! Uses `api-shared` for common types and authorisation, and `libris-core` for upload rules.

#![warn(rust_2018_idioms)]

pub mod error;
pub mod token;

pub use error::ApiError;

use api_shared::{require_role, ErrorRes, HealthRes, HealthService, Role, TokenKeys, UploadRes};
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, Path as AxumPath, State,
    },
    http::{header, HeaderMap},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use libris_core::{CoreConfig, FileAccessService, UploadRequest, UploadService};
use libris_files::UploadStore;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

const FILE_FIELD: &str = "file";
const STANDARD_FIELD: &str = "tieuChuan";
const CRITERION_FIELD: &str = "tieuChi";
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Application state for the REST API server
///
/// Resolved once at startup and shared by every handler.
#[derive(Clone)]
pub struct AppState {
    cfg: Arc<CoreConfig>,
    keys: Arc<TokenKeys>,
    uploads: UploadService,
    files: FileAccessService,
}

impl AppState {
    pub fn new(cfg: Arc<CoreConfig>, keys: TokenKeys, store: Arc<UploadStore>) -> Self {
        Self {
            uploads: UploadService::new(cfg.clone(), store.clone()),
            files: FileAccessService::new(cfg.clone(), store),
            keys: Arc::new(keys),
            cfg,
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(health, upload_file, read_file),
    components(schemas(HealthRes, UploadRes, ErrorRes))
)]
pub struct ApiDoc;

/// Builds the REST router.
///
/// The request body limit sits above the largest category limit so oversized files are
/// rejected by the upload policy, with a message naming that category's limit.
pub fn router(state: AppState) -> Router {
    let body_limit = state.cfg.max_request_bytes();

    Router::new()
        .route("/health", get(health))
        .route("/upload_file", post(upload_file))
        .route("/files/*path", get(read_file))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Used for monitoring and load balancer health checks. Requires no token.
#[axum::debug_handler]
async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    post,
    path = "/upload_file",
    request_body(content = Vec<u8>, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File stored, or an identical file already existed", body = UploadRes),
        (status = 400, description = "Bad request", body = ErrorRes),
        (status = 401, description = "Missing or invalid token", body = ErrorRes),
        (status = 403, description = "Role may not upload", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Upload a file into its category directory
///
/// Expects a multipart form with:
/// - `file`: the file, with a filename and content type
/// - `tieuChuan`: the standard (`book` for book images and documents)
/// - `tieuChi`: the criterion (`image` or `document` for books)
///
/// Uploading content identical to a file already in the target directory returns that
/// file's path instead of storing a copy.
///
/// # Errors
/// - `401` if no valid token is sent in the `Authorization` header or `token` cookie
/// - `403` if the caller's role is not allowed to upload
/// - `400` if a field is missing, or the file is too large or of the wrong type
/// - `500` if the file cannot be stored
#[axum::debug_handler]
async fn upload_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadRes>, ApiError> {
    let token = token::token_from_headers(&headers);
    let identity = require_role(token.as_deref(), state.cfg.upload_roles(), &state.keys)?;

    let mut multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let mut file_data: Option<Vec<u8>> = None;
    let mut filename: Option<String> = None;
    let mut content_type: Option<String> = None;
    let mut standard: Option<String> = None;
    let mut criterion: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let field_name = field.name().unwrap_or_default().to_owned();

        match field_name.as_str() {
            FILE_FIELD => {
                filename = field.file_name().map(String::from);
                content_type = field.content_type().map(String::from);
                file_data = Some(field.bytes().await.map_err(malformed)?.to_vec());
            }
            STANDARD_FIELD => standard = Some(field.text().await.map_err(malformed)?),
            CRITERION_FIELD => criterion = Some(field.text().await.map_err(malformed)?),
            _ => {}
        }
    }

    let file_data = file_data.ok_or_else(|| ApiError::BadRequest("No file uploaded".into()))?;
    let standard = required_text(standard, STANDARD_FIELD)?;
    let criterion = required_text(criterion, CRITERION_FIELD)?;
    let filename = filename.unwrap_or_default();

    let content_type = content_type
        .filter(|t| !t.trim().is_empty())
        .or_else(|| {
            mime_guess::from_path(&filename)
                .first()
                .map(|m| m.essence_str().to_owned())
        })
        .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_owned());

    let request = UploadRequest {
        standard,
        criterion,
        original_filename: filename,
        content_type,
        bytes: file_data,
    };

    let uploads = state.uploads.clone();
    let stored = tokio::task::spawn_blocking(move || uploads.upload(&identity, request))
        .await
        .map_err(|e| ApiError::Internal(format!("upload task failed: {e}")))??;

    let message = if stored.already_existed() {
        "File already exists"
    } else {
        "File uploaded successfully"
    };

    Ok(Json(UploadRes {
        success: true,
        message: message.into(),
        filename: stored.filename,
        filepath: stored.relative_path,
    }))
}

#[utoipa::path(
    get,
    path = "/files/{path}",
    params(("path" = String, Path, description = "Path relative to the storage root, as returned by the upload")),
    responses(
        (status = 200, description = "File content"),
        (status = 400, description = "Invalid path", body = ErrorRes),
        (status = 401, description = "Missing or invalid token", body = ErrorRes),
        (status = 403, description = "Path belongs to another user", body = ErrorRes),
        (status = 404, description = "File not found", body = ErrorRes)
    )
)]
/// Read a stored file
///
/// Any authenticated role may read. The response carries the file's media type.
#[axum::debug_handler]
async fn read_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(path): AxumPath<String>,
) -> Result<Response, ApiError> {
    let token = token::token_from_headers(&headers);
    let identity = require_role(token.as_deref(), &Role::ALL, &state.keys)?;

    let files = state.files.clone();
    let content = tokio::task::spawn_blocking(move || files.read(&identity, &path))
        .await
        .map_err(|e| ApiError::Internal(format!("read task failed: {e}")))??;

    let headers = [
        (header::CONTENT_TYPE, content.media_type),
        (header::X_CONTENT_TYPE_OPTIONS, "nosniff".to_owned()),
    ];
    Ok((headers, content.bytes).into_response())
}

fn malformed(e: MultipartError) -> ApiError {
    ApiError::BadRequest(format!("Malformed multipart body: {e}"))
}

fn required_text(value: Option<String>, field: &str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("{field} is required")))
}

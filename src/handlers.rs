//! HTTP request handlers for the notes API.
//!
//! Handlers decode and validate input, call [`NoteService`], and map every
//! failure through [`ApiError`], the single error-to-status policy.

use crate::config::Config;
use crate::models::{
    CreateNoteRequest, ErrorResponse, HealthResponse, ListNotesQuery, NewNote, Note, NoteFilter,
    NoteId, NotePatch, UpdateNoteRequest,
};
use crate::rate_limit::RateLimiter;
use crate::service::{NoteService, ServiceError};
use crate::store::NoteRepository;
use crate::validation::FieldError;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub notes: NoteService,
    /// Shared by every request; counters survive across requests
    pub limiter: RateLimiter,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(repo: Arc<dyn NoteRepository>, config: Config) -> Self {
        Self {
            notes: NoteService::new(repo),
            limiter: RateLimiter::new(config.rate_limit_requests, config.rate_limit_window),
            config: Arc::new(config),
        }
    }
}

// === Health Check ===

/// GET /api/v1/health - Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// === Notes ===

/// GET /api/v1/notes - List notes, optionally filtered by `?status=`
pub async fn list_notes(
    State(state): State<AppState>,
    query: Result<Query<ListNotesQuery>, QueryRejection>,
) -> Result<Json<Vec<Note>>, ApiError> {
    let Query(query) = query?;
    let filter = NoteFilter::try_from(query)?;

    let notes = state.notes.get_all(&filter).await?;
    debug!(count = notes.len(), "Listed notes");

    Ok(Json(notes))
}

/// POST /api/v1/notes - Create a note
pub async fn create_note(
    State(state): State<AppState>,
    payload: Result<Json<CreateNoteRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Note>), ApiError> {
    let Json(req) = payload?;
    let new = NewNote::try_from(req)?;

    let note = state.notes.create(new).await?;
    info!(note_id = %note.id, status = %note.status, "Note created");

    Ok((StatusCode::CREATED, Json(note)))
}

/// GET /api/v1/notes/:id - Fetch one note
pub async fn get_note(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
) -> Result<Json<Note>, ApiError> {
    let id = parse_note_id(id)?;
    let note = state.notes.get_by_id(id).await?;
    Ok(Json(note))
}

/// PATCH /api/v1/notes/:id - Partially update a note
///
/// Only fields present in the body are validated and applied.
pub async fn update_note(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
    payload: Result<Json<UpdateNoteRequest>, JsonRejection>,
) -> Result<Json<Note>, ApiError> {
    let id = parse_note_id(id)?;
    let Json(req) = payload?;
    let patch = NotePatch::try_from(req)?;

    let note = state.notes.update(id, patch).await?;
    info!(note_id = %note.id, status = %note.status, "Note updated");

    Ok(Json(note))
}

/// Fallback for unmatched paths
pub async fn not_found() -> ApiError {
    ApiError::NotFound("route not found")
}

fn parse_note_id(raw: Result<Path<String>, PathRejection>) -> Result<NoteId, ApiError> {
    let Path(raw) = raw?;
    NoteId::parse_str(&raw).map_err(|_| ApiError::InvalidInput("invalid note id".to_string()))
}

// === Error Handling ===

/// API error types
#[derive(Debug)]
pub enum ApiError {
    /// One or more fields failed validation
    Validation(Vec<FieldError>),
    /// Malformed id, body or query string
    InvalidInput(String),
    PayloadTooLarge,
    NotFound(&'static str),
    Conflict(String),
    OriginNotAllowed,
    RateLimited { retry_after: Duration },
    Internal,
}

impl From<Vec<FieldError>> for ApiError {
    fn from(errors: Vec<FieldError>) -> Self {
        ApiError::Validation(errors)
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound => ApiError::NotFound("note not found"),
            ServiceError::Conflict(msg) => ApiError::Conflict(msg),
            ServiceError::Internal(_) => ApiError::Internal,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::PayloadTooLarge;
        }
        ApiError::InvalidInput(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::InvalidInput(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::InvalidInput(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let mut retry_after = None;
        let mut details = Vec::new();

        let (status, code, message) = match self {
            ApiError::Validation(errors) => {
                details = errors;
                (StatusCode::BAD_REQUEST, "VALIDATION_FAILED", "validation failed".to_string())
            }
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg),
            ApiError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE",
                "request body exceeds size limit".to_string(),
            ),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.to_string()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::OriginNotAllowed => (
                StatusCode::FORBIDDEN,
                "ORIGIN_NOT_ALLOWED",
                "origin not allowed".to_string(),
            ),
            ApiError::RateLimited { retry_after: wait } => {
                retry_after = Some(wait);
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    "RATE_LIMITED",
                    "too many requests, try again later".to_string(),
                )
            }
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "internal server error".to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            error: message,
            code,
            details,
        });

        let mut res = (status, body).into_response();
        if let Some(wait) = retry_after {
            // Whole seconds, rounded up
            let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
            res.headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs.max(1)));
        }
        res
    }
}

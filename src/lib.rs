//! # Notes API
//!
//! Small HTTP service exposing CRUD operations over notes.
//!
//! ## Architecture
//!
//! ```text
//! request ─▶ request id ─▶ trace/log ─▶ CORS ─▶ rate limit ─▶ router
//!                                                               │
//!                                  handlers ─▶ service ─▶ repository
//! ```
//!
//! Every stage may answer early, none may be skipped or reordered.
//!
//! ## API Overview
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/api/v1/health` | GET | Health check |
//! | `/api/v1/notes` | GET | List notes |
//! | `/api/v1/notes` | POST | Create a note |
//! | `/api/v1/notes/:id` | GET | Fetch a note |
//! | `/api/v1/notes/:id` | PATCH | Partially update a note |
//! | `/api/v1/swagger/` | GET | API documentation assets |

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod rate_limit;
pub mod server;
pub mod service;
pub mod store;
pub mod validation;

pub use config::Config;
pub use handlers::AppState;
pub use server::{Server, ServerError, ServerState};
pub use store::{MemoryStore, NoteRepository};

use crate::middleware::{CorsPolicy, RateLimitState, REQUEST_ID_HEADER};
use axum::{middleware::from_fn_with_state, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Maximum request body size (16 KiB).
pub const MAX_BODY_SIZE: usize = 16 * 1024;

/// Build the Axum router with all endpoints and middleware.
pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();
    let cors = CorsPolicy::from_config(&config);
    let rate_limit = RateLimitState {
        limiter: state.limiter.clone(),
        trust_proxy: config.rate_limit_trust_proxy,
    };

    let api = Router::new()
        .route("/health", get(handlers::health))
        .route("/notes", get(handlers::list_notes).post(handlers::create_note))
        .route(
            "/notes/:id",
            get(handlers::get_note).patch(handlers::update_note),
        )
        .nest_service("/swagger", ServeDir::new(&config.swagger_dir));

    // ServiceBuilder order: first listed = outermost
    let pipeline = ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuid))
        .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(middleware::request_span)
                .on_request(middleware::log_request)
                .on_response(middleware::log_response),
        )
        .layer(from_fn_with_state(cors.clone(), middleware::enforce_origin))
        .layer(cors.layer())
        .layer(from_fn_with_state(rate_limit, middleware::rate_limit))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::new(config.request_timeout));

    Router::new()
        .nest(config::API_PREFIX, api)
        .fallback(handlers::not_found)
        .layer(pipeline)
        .with_state(state)
}

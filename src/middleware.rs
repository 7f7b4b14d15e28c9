//! Request pipeline stages.
//!
//! The stages are composed in [`crate::build_router`] in a fixed order:
//!
//! 1. `SetRequestId` assigns or keeps the `x-request-id` correlation id
//! 2. `TraceLayer` opens a request span ([`request_span`]) and logs the
//!    outcome ([`log_response`])
//! 3. [`enforce_origin`] rejects disallowed origins, then the tower-http
//!    CORS layer answers preflights and decorates responses
//! 4. [`rate_limit`] spends one unit of the caller's allowance
//! 5. body limit, timeout, then route dispatch
//!
//! Every custom stage is an `(request, next) -> response` function.

use crate::config::Config;
use crate::handlers::ApiError;
use crate::rate_limit::{Decision, RateLimiter};
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderName, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::RequestId;
use tracing::{info, warn, Span};

/// Correlation id header
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

const RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

// === Tracing / Logging ===

/// Correlation id attached by the tracing stage, `-` if absent
pub fn correlation_id(req: &Request) -> &str {
    req.extensions()
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .unwrap_or("-")
}

/// Span wrapping everything logged while handling one request
pub fn request_span(req: &Request) -> Span {
    tracing::info_span!(
        "request",
        method = %req.method(),
        path = %req.uri().path(),
        correlation_id = %correlation_id(req),
    )
}

pub fn log_request(_req: &Request, _span: &Span) {
    info!("Request started");
}

pub fn log_response(res: &Response, latency: Duration, _span: &Span) {
    info!(
        status = res.status().as_u16(),
        latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
        "Request completed"
    );
}

// === CORS ===

/// Origin allow-list shared by the origin check and the CORS layer
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allow_any: bool,
    origins: Arc<Vec<HeaderValue>>,
}

impl CorsPolicy {
    pub fn from_config(config: &Config) -> Self {
        let origins = config
            .cors_allowed_origins
            .iter()
            .filter(|o| o.as_str() != "*")
            .filter_map(|o| o.parse().ok())
            .collect();
        Self {
            allow_any: config.cors_allows_any(),
            origins: Arc::new(origins),
        }
    }

    pub fn allows(&self, origin: &HeaderValue) -> bool {
        self.allow_any || self.origins.iter().any(|o| o == origin)
    }

    /// tower-http layer answering preflights and adding CORS headers
    pub fn layer(&self) -> CorsLayer {
        let allow_origin = if self.allow_any {
            AllowOrigin::any()
        } else {
            AllowOrigin::list(self.origins.iter().cloned())
        };

        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
            .allow_headers(Any)
            .expose_headers([REQUEST_ID_HEADER, RATE_LIMIT_LIMIT, RATE_LIMIT_REMAINING])
    }
}

/// Reject requests whose `Origin` is not allowed before they go further
pub async fn enforce_origin(State(policy): State<CorsPolicy>, req: Request, next: Next) -> Response {
    if let Some(origin) = req.headers().get(header::ORIGIN) {
        if !policy.allows(origin) {
            warn!(origin = ?origin, "Origin rejected");
            return ApiError::OriginNotAllowed.into_response();
        }
    }
    next.run(req).await
}

// === Rate Limiting ===

/// Limiter plus the rule for identifying callers
#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: RateLimiter,
    pub trust_proxy: bool,
}

/// Caller key: first `X-Forwarded-For` hop when trusted, else the peer IP
pub fn caller_key(req: &Request, trust_proxy: bool) -> String {
    if trust_proxy {
        let forwarded = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Spend one unit of the caller's allowance or short-circuit with 429
pub async fn rate_limit(State(state): State<RateLimitState>, req: Request, next: Next) -> Response {
    let limiter = &state.limiter;
    if !limiter.is_enabled() {
        return next.run(req).await;
    }

    let key = caller_key(&req, state.trust_proxy);
    match limiter.check(&key) {
        Decision::Allowed { remaining } => {
            let mut res = next.run(req).await;
            let headers = res.headers_mut();
            headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(limiter.limit()));
            headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(remaining));
            res
        }
        Decision::Limited { retry_after } => {
            warn!(caller = %key, "Rate limit exceeded");
            ApiError::RateLimited { retry_after }.into_response()
        }
    }
}

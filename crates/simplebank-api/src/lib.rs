//! Simple Bank REST API
//!
//! ```text
//! /health                                  - repository liveness
//! /register, /login                        - public
//! /api/accounts                            - open an account
//! /api/users/:user_id/accounts             - list own accounts
//! /api/cards, /api/accounts/:id/cards      - issue and list cards
//! /api/payments/card                       - card payment
//! /api/transfers, /api/deposits            - money movement
//! /api/loans, /api/loans/:id/schedule      - loans
//! /api/analytics/...                       - history, summary, forecast
//! ```
//!
//! Everything under `/api` requires `Authorization: Bearer <token>`.

pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod routes;
pub mod state;

use axum::http::{HeaderName, Request};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

pub use error::{ApiError, ApiResult};
pub use state::AppState;

/// HTTP surface settings
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub request_timeout: Duration,
    pub enable_cors: bool,
    pub enable_tracing: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            enable_cors: false,
            enable_tracing: true,
        }
    }
}

/// Full router with middleware
pub fn create_router(state: Arc<AppState>, config: ApiConfig) -> Router {
    let mut router = Router::new()
        .merge(routes::public_routes())
        .nest("/api", routes::api_routes(&state))
        .with_state(state)
        .layer(TimeoutLayer::new(config.request_timeout));

    if config.enable_tracing {
        router = router.layer(TraceLayer::new_for_http().make_span_with(
            |request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");

                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            },
        ));
    }

    let x_request_id = HeaderName::from_static("x-request-id");
    router = router
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid));

    if config.enable_cors {
        router = router.layer(CorsLayer::permissive());
    }

    router
}

/// Router without tracing, for tests
pub fn create_test_router(state: Arc<AppState>) -> Router {
    create_router(
        state,
        ApiConfig {
            enable_tracing: false,
            ..Default::default()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.enable_tracing);
        assert!(!config.enable_cors);
    }
}

//! Grocer Storefront library.
//!
//! Owns the authoritative copy of every cart. Clients push their local cart
//! here; the storefront reprices lines from the catalog, caps quantities at
//! stock and answers with the list the client should adopt.
//!
//! The router is built by [`app`] so the binary, the unit tests and the
//! end-to-end tests all serve the same stack.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod carts;
pub mod catalog;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod users;

use std::time::Duration;

use axum::Router;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use state::AppState;

/// Build the storefront router without rate limiting.
///
/// Rate limiting keys on the peer address, which only exists when served
/// with connect info; see [`rate_limited_app`].
pub fn app(state: AppState) -> Router {
    build(state, |guest| guest)
}

/// Build the storefront router with guest endpoints rate limited per IP.
///
/// Serve with `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn rate_limited_app(state: AppState) -> Router {
    build(state, |guest| guest.layer(middleware::guest_rate_limiter()))
}

fn build(
    state: AppState,
    guest: impl FnOnce(Router<AppState>) -> Router<AppState>,
) -> Router {
    let session_layer = middleware::create_session_layer(&state);

    Router::new()
        .merge(routes::routes(state.config().dev_login, guest))
        .layer(session_layer)
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        user_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

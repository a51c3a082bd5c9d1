//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                                   - Health check
//!
//! # Cart (requires signed-in user)
//! POST   /api/cart/sync                            - Replace the user's cart
//! GET    /api/cart                                 - Current cart (empty shape if none)
//! DELETE /api/cart                                 - Clear the user's cart
//!
//! # Guest cart (keyed by client session token, rate limited)
//! GET    /api/cart/guest/{token}                   - Current guest cart
//! POST   /api/cart/guest/{token}/items             - Add quantity to a line
//! DELETE /api/cart/guest/{token}/items/{p}/{v}     - Remove a line
//!
//! # Development sign-in (only with STOREFRONT_DEV_LOGIN=true)
//! POST   /dev/session                              - Sign in as a user id
//! DELETE /dev/session                              - Sign out
//! ```

pub mod cart;
pub mod guest;
pub mod session;

use axum::{
    Router,
    extract::{FromRequest, FromRequestParts},
    routing::{get, post},
};

use crate::error::AppError;
use crate::state::AppState;

/// JSON body extractor that rejects with an [`AppError`] body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Path extractor that rejects with an [`AppError`] body.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// Create the authenticated cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/sync", post(cart::sync))
        .route("/", get(cart::show).delete(cart::clear))
}

/// Create the guest cart routes router.
pub fn guest_routes() -> Router<AppState> {
    Router::new()
        .route("/{token}", get(guest::show))
        .route("/{token}/items", post(guest::add))
        .route(
            "/{token}/items/{product_id}/{variant_id}",
            axum::routing::delete(guest::remove),
        )
}

/// Create the development sign-in router.
pub fn dev_routes() -> Router<AppState> {
    Router::new().route("/session", post(session::login).delete(session::logout))
}

/// Create all routes for the storefront.
///
/// `guest` wraps the guest router, typically with a rate limiter.
pub fn routes(
    dev_login: bool,
    guest: impl FnOnce(Router<AppState>) -> Router<AppState>,
) -> Router<AppState> {
    let router = Router::new()
        .route("/health", get(health))
        .nest("/api/cart/guest", guest(guest_routes()))
        .nest("/api/cart", cart_routes());

    if dev_login {
        tracing::warn!("Development sign-in routes enabled");
        router.nest("/dev", dev_routes())
    } else {
        router
    }
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running.
async fn health() -> &'static str {
    "ok"
}

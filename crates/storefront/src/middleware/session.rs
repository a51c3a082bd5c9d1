//! Session middleware configuration.
//!
//! Sessions are kept in memory by tower-sessions and identified by a signed
//! cookie. The session only carries the signed-in user's id.

use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, service::SignedCookie};

use crate::state::AppState;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "grocer_session";

/// Session expiry time in seconds (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Session keys.
pub mod keys {
    /// Key for storing the signed-in user's id.
    pub const CURRENT_USER: &str = "current_user";
}

/// Create the session layer with an in-memory store and signed cookies.
#[must_use]
pub fn create_session_layer(state: &AppState) -> SessionManagerLayer<MemoryStore, SignedCookie> {
    SessionManagerLayer::new(MemoryStore::default())
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(state.config().is_secure())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
        .with_signed(state.session_key().clone())
}

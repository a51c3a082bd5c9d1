//! Authentication extractors.
//!
//! Sign-in itself happens elsewhere; whoever authenticates the user calls
//! [`set_current_user`]. Cart endpoints then use [`RequireUser`], which also
//! checks that the session's user still exists.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tower_sessions::Session;
use tracing::{Span, warn};

use grocer_core::UserId;

use super::session::keys;
use crate::error::{AppError, set_sentry_user};
use crate::state::AppState;

/// Extractor that requires a signed-in, still-known user.
///
/// Rejects with `unauthenticated` when the session has no user and with
/// `stale_session` when the user is no longer in the directory.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireUser(user): RequireUser) -> String {
///     format!("Hello, user {user}!")
/// }
/// ```
pub struct RequireUser(pub UserId);

impl<S> FromRequestParts<S> for RequireUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or_else(|| AppError::Internal("session layer missing".to_string()))?;

        let user: UserId = session
            .get(keys::CURRENT_USER)
            .await?
            .ok_or(AppError::Unauthenticated)?;

        let state = AppState::from_ref(state);
        if !state.users().contains(user) {
            warn!(%user, "Session refers to an unknown user");
            return Err(AppError::StaleSession);
        }

        Span::current().record("user_id", user.as_i32());
        set_sentry_user(&user);
        Ok(Self(user))
    }
}

/// Helper to set the current user in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: UserId,
) -> Result<(), tower_sessions::session::Error> {
    // New identity, new session id
    session.cycle_id().await?;
    session.insert(keys::CURRENT_USER, user).await
}

/// Helper to clear the current user from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.remove::<UserId>(keys::CURRENT_USER).await?;
    Ok(())
}

//! Development sign-in.
//!
//! Stands in for the real identity provider when running locally and in
//! end-to-end tests. Signing in registers the user with the directory and
//! binds the session to it.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{info, instrument};

use grocer_core::UserId;

use super::ApiJson;
use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{clear_current_user, set_current_user};
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub user_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub success: bool,
    #[serde(default)]
    pub user_id: Option<UserId>,
}

#[instrument(skip(state, session, request), fields(user_id = %request.user_id))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<SessionResponse>> {
    let user = request.user_id;
    if state.users().register(user) {
        info!("Registered new user");
    }

    set_current_user(&session, user).await?;
    set_sentry_user(&user);
    info!("Signed in");

    Ok(Json(SessionResponse {
        success: true,
        user_id: Some(user),
    }))
}

#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<Json<SessionResponse>> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    info!("Signed out");

    Ok(Json(SessionResponse {
        success: true,
        user_id: None,
    }))
}

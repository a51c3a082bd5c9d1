//! Authenticated cart handlers.
//!
//! The client pushes its whole cart; the server reprices every line from the
//! catalog, caps quantities at stock and stores the result. The response
//! carries the authoritative list so the client can adopt server prices.

use axum::{Json, extract::State};
use tracing::{info, instrument};

use grocer_core::api::{CartSnapshotResponse, SyncRequest, SyncResponse};

use super::ApiJson;
use crate::carts::CartOwner;
use crate::error::Result;
use crate::middleware::RequireUser;
use crate::state::AppState;

/// Replace the signed-in user's cart.
#[instrument(skip(state, request), fields(items = request.items.len()))]
pub async fn sync(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiJson(request): ApiJson<SyncRequest>,
) -> Result<Json<SyncResponse>> {
    let priced = state.catalog().price_cart(&request.items)?;

    state
        .carts()
        .replace(CartOwner::User(user), priced.clone(), request.last_updated)
        .await;

    info!(lines = priced.len(), "Cart synced");
    Ok(Json(SyncResponse::ok(priced)))
}

/// Current cart of the signed-in user, repriced for display.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<CartSnapshotResponse>> {
    let snapshot = state
        .carts()
        .get(CartOwner::User(user))
        .await
        .map_or_else(CartSnapshotResponse::empty, |cart| {
            CartSnapshotResponse::new(state.catalog().refresh(&cart.items), Some(cart.updated_at))
        });
    Ok(Json(snapshot))
}

#[instrument(skip(state))]
pub async fn clear(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<SyncResponse>> {
    state.carts().clear(CartOwner::User(user)).await;
    info!("Cart cleared");
    Ok(Json(SyncResponse::ok(Vec::new())))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use axum::http::{Method, StatusCode};
    use grocer_core::api::{
        CartSnapshotResponse, ErrorBody, ErrorCode, SyncRequest, SyncResponse,
    };
    use grocer_core::{Price, UserId};

    use crate::catalog::tests::client_line;
    use crate::tests::TestApp;

    #[tokio::test]
    async fn test_sync_requires_session() {
        let app = TestApp::new();
        let request = SyncRequest::new(vec![client_line(100, 1, 1, 1)], 1);

        let (status, body) = app
            .send::<ErrorBody>(Method::POST, "/api/cart/sync", None, Some(&request))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.code, ErrorCode::Unauthenticated);
    }

    #[tokio::test]
    async fn test_sync_reprices_and_caps() {
        let app = TestApp::new();
        let cookie = app.login(UserId::new(7)).await;
        let request = SyncRequest::new(
            vec![client_line(100, 1, 1, 2), client_line(100, 2, 1, 10)],
            1_700_000_000_000,
        );

        let (status, body) = app
            .send::<SyncResponse>(
                Method::POST,
                "/api/cart/sync",
                Some(cookie.as_str()),
                Some(&request),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let items = body.updated_items.unwrap();
        assert_eq!(items[0].price, Price::from_minor(8000));
        assert_eq!(items[1].quantity, 3);

        let (status, snapshot) = app
            .send::<CartSnapshotResponse>(
                Method::GET,
                "/api/cart",
                Some(cookie.as_str()),
                None::<&()>,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(snapshot.item_count, 5);
        assert_eq!(snapshot.total, Price::from_minor(8000 * 2 + 18000 * 3));
        assert_eq!(snapshot.last_updated, Some(1_700_000_000_000));
    }

    #[tokio::test]
    async fn test_sync_rejects_unknown_variant() {
        let app = TestApp::new();
        let cookie = app.login(UserId::new(7)).await;
        let request = SyncRequest::new(vec![client_line(999, 1, 1, 1)], 1);

        let (status, body) = app
            .send::<ErrorBody>(Method::POST, "/api/cart/sync", Some(cookie.as_str()), Some(&request))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.code, ErrorCode::ValidationFailed);
    }

    #[tokio::test]
    async fn test_removed_user_is_stale() {
        let app = TestApp::new();
        let user = UserId::new(7);
        let cookie = app.login(user).await;
        app.state.users().remove(user);

        let (status, body) = app
            .send::<ErrorBody>(Method::GET, "/api/cart", Some(cookie.as_str()), None::<&()>)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.code, ErrorCode::StaleSession);
    }

    #[tokio::test]
    async fn test_missing_cart_is_empty_and_clear_succeeds() {
        let app = TestApp::new();
        let cookie = app.login(UserId::new(8)).await;

        let (status, snapshot) = app
            .send::<CartSnapshotResponse>(
                Method::GET,
                "/api/cart",
                Some(cookie.as_str()),
                None::<&()>,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(snapshot.items.is_empty());
        assert!(snapshot.last_updated.is_none());

        let (status, body) = app
            .send::<SyncResponse>(
                Method::DELETE,
                "/api/cart",
                Some(cookie.as_str()),
                None::<&()>,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.success);
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let app = TestApp::new();
        let cookie = app.login(UserId::new(7)).await;

        let (status, body) = app
            .send::<ErrorBody>(
                Method::POST,
                "/api/cart/sync",
                Some(cookie.as_str()),
                Some(&serde_json::json!({ "items": "nope" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, ErrorCode::BadRequest);
    }
}

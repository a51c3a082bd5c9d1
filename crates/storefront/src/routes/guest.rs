//! Guest cart handlers.
//!
//! Guests have no account, so their cart is keyed by the session token the
//! client generated and persisted. Writes are incremental (add a quantity,
//! remove a line) and every added line is repriced from the catalog.

use axum::{Json, extract::State};
use tracing::{debug, instrument};

use grocer_core::api::{CartSnapshotResponse, GuestAddRequest, SyncResponse};
use grocer_core::{LineId, ProductId, SessionToken, VariantId};

use super::{ApiJson, ApiPath};
use crate::carts::CartOwner;
use crate::error::Result;
use crate::state::AppState;

#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    ApiPath(token): ApiPath<SessionToken>,
) -> Result<Json<CartSnapshotResponse>> {
    let snapshot = state
        .carts()
        .get(CartOwner::Guest(token))
        .await
        .map_or_else(CartSnapshotResponse::empty, |cart| {
            CartSnapshotResponse::new(state.catalog().refresh(&cart.items), Some(cart.updated_at))
        });
    Ok(Json(snapshot))
}

/// Add `item.quantity` units of a line to a guest cart.
///
/// Adding a variant that is out of stock leaves the cart unchanged.
#[instrument(skip(state, body), fields(line = %body.item.line_id()))]
pub async fn add(
    State(state): State<AppState>,
    ApiPath(token): ApiPath<SessionToken>,
    ApiJson(body): ApiJson<GuestAddRequest>,
) -> Result<Json<SyncResponse>> {
    let owner = CartOwner::Guest(token);
    let line = state.catalog().price_line(&body.item)?;

    let cart = if line.quantity == 0 {
        debug!("Variant out of stock, nothing added");
        state.carts().get(owner).await.unwrap_or_default()
    } else {
        state.carts().add(owner, line).await
    };

    Ok(Json(SyncResponse::ok(cart.items)))
}

/// Remove a line from a guest cart. Removing an absent line succeeds.
#[instrument(skip(state))]
pub async fn remove(
    State(state): State<AppState>,
    ApiPath((token, product_id, variant_id)): ApiPath<(SessionToken, ProductId, VariantId)>,
) -> Result<Json<SyncResponse>> {
    let cart = state
        .carts()
        .remove(CartOwner::Guest(token), LineId::new(product_id, variant_id))
        .await;
    Ok(Json(SyncResponse::ok(cart.items)))
}

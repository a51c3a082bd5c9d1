//! End-to-end cart sync against a live storefront.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use grocer_cart::{
    CartApi, CheckoutGate, CheckoutOutcome, FileStorage, MemoryStorage, SyncFailure,
};
use grocer_core::{LineId, Price, ProductId, SyncStatus, UserId, VariantId};
use grocer_integration_tests::{TestContext, item};

fn line(product: i32, variant: i32) -> LineId {
    LineId::new(ProductId::new(product), VariantId::new(variant))
}

#[tokio::test]
async fn test_guest_actions_replay_and_adopt_server_prices() {
    let ctx = TestContext::start().await;
    let cart = ctx.guest_cart();

    cart.add_item(item(100, 1, 2));
    cart.add_item(item(110, 1, 1));
    cart.update_item(line(110, 1), 3);
    cart.remove_item(line(100, 1));
    cart.flush().await.unwrap();

    let snapshot = ctx.guest_snapshot(cart.session_token()).await;
    assert_eq!(snapshot.items.len(), 1);
    assert_eq!(snapshot.items[0].line_id(), line(110, 1));
    assert_eq!(snapshot.items[0].quantity, 3);
    assert_eq!(snapshot.total, Price::from_minor(16500 * 3));

    let view = cart.view();
    assert_eq!(view.status, SyncStatus::Idle);
    assert_eq!(view.pending_actions, 0);
    assert_eq!(view.items, snapshot.items);
    assert_eq!(view.total, snapshot.total);

    cart.shutdown().await;
}

#[tokio::test]
async fn test_signed_in_push_is_repriced_and_capped() {
    let ctx = TestContext::start().await;
    let user = UserId::new(7);
    let cart = ctx
        .signed_in_cart(user, Arc::new(MemoryStorage::new()))
        .await;

    cart.add_item(item(100, 2, 20));
    cart.flush().await.unwrap();

    let items = cart.items();
    assert_eq!(items[0].quantity, 12);
    assert_eq!(items[0].price, Price::from_minor(18000));
    assert_eq!(items[0].max_stock, Some(12));
    assert_eq!(items[0].product_name, "Fresh Paneer");

    let snapshot = ctx.signed_in_api(user).await.fetch().await.unwrap();
    assert_eq!(snapshot.items, items);

    cart.shutdown().await;
}

#[tokio::test]
async fn test_second_device_hydrates_from_account() {
    let ctx = TestContext::start().await;
    let user = UserId::new(9);

    let phone = ctx
        .signed_in_cart(user, Arc::new(MemoryStorage::new()))
        .await;
    phone.add_item(item(100, 1, 2));
    phone.add_item(item(110, 1, 1));
    phone.flush().await.unwrap();

    let laptop = ctx
        .signed_in_cart(user, Arc::new(MemoryStorage::new()))
        .await;
    assert_eq!(laptop.items(), phone.items());
    assert_eq!(laptop.total(), Price::from_minor(8000 * 2 + 16500));
    assert!(laptop.view().last_synced_at.is_some());

    phone.shutdown().await;
    laptop.shutdown().await;
}

#[tokio::test]
async fn test_removed_account_needs_reauth() {
    let ctx = TestContext::start().await;
    let user = UserId::new(11);
    let cart = ctx
        .signed_in_cart(user, Arc::new(MemoryStorage::new()))
        .await;

    ctx.state.users().remove(user);
    cart.add_item(item(100, 1, 1));

    assert_eq!(cart.flush().await, Err(SyncFailure::StaleSession));
    let view = cart.view();
    assert_eq!(view.status, SyncStatus::Error);
    assert!(view.needs_reauth());
    // The change stays queued for after sign-in
    assert_eq!(view.pending_actions, 1);
    assert_eq!(view.item_count, 1);

    cart.shutdown().await;
}

#[tokio::test]
async fn test_unknown_variant_is_rejected() {
    let ctx = TestContext::start().await;
    let cart = ctx
        .signed_in_cart(UserId::new(12), Arc::new(MemoryStorage::new()))
        .await;

    cart.add_item(item(999, 1, 1));

    let result = cart.flush().await;
    assert!(matches!(result, Err(SyncFailure::Validation(_))));
    assert_eq!(cart.status(), SyncStatus::Error);

    cart.shutdown().await;
}

#[tokio::test]
async fn test_checkout_flushes_signed_in_cart() {
    let ctx = TestContext::start().await;
    let user = UserId::new(13);
    let cart = ctx
        .signed_in_cart(user, Arc::new(MemoryStorage::new()))
        .await;
    let gate = CheckoutGate::new(cart.clone());

    cart.add_item(item(110, 1, 2));
    assert_eq!(
        gate.proceed_to_checkout().await.unwrap(),
        CheckoutOutcome::Navigate { synced: true }
    );

    let snapshot = ctx.signed_in_api(user).await.fetch().await.unwrap();
    assert_eq!(snapshot.item_count, 2);

    cart.order_placed();
    assert_eq!(cart.item_count(), 0);
    cart.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_pushes_and_cart_survives_restart() {
    let ctx = TestContext::start().await;
    let dir = tempfile::tempdir().unwrap();

    let storage = Arc::new(FileStorage::new(dir.path()).unwrap());
    let cart = ctx.open(ctx.guest_api(), storage);
    cart.add_item(item(100, 1, 4));
    let token = cart.session_token();
    cart.shutdown().await;

    let snapshot = ctx.guest_snapshot(token).await;
    assert_eq!(snapshot.item_count, 4);

    let storage = Arc::new(FileStorage::new(dir.path()).unwrap());
    let reopened = ctx.open(ctx.guest_api(), storage);
    assert_eq!(reopened.session_token(), token);
    assert_eq!(reopened.item_count(), 4);
    assert_eq!(reopened.view().pending_actions, 0);
    reopened.shutdown().await;
}

#[tokio::test]
async fn test_logout_moves_cart_to_new_guest_scope() {
    let ctx = TestContext::start().await;
    let user = UserId::new(14);
    let cart = ctx
        .signed_in_cart(user, Arc::new(MemoryStorage::new()))
        .await;
    let before = cart.session_token();

    cart.add_item(item(100, 1, 1));
    cart.logout().await.unwrap();
    assert!(!cart.is_authenticated());
    assert_ne!(cart.session_token(), before);

    cart.flush().await.unwrap();
    let snapshot = ctx.guest_snapshot(cart.session_token()).await;
    assert_eq!(snapshot.item_count, 1);

    let account = ctx.signed_in_api(user).await.fetch().await.unwrap();
    assert_eq!(account.item_count, 1);

    cart.shutdown().await;
}

#[tokio::test]
async fn test_health() {
    let ctx = TestContext::start().await;
    let response = reqwest::get(ctx.url("health")).await.unwrap();
    assert!(response.status().is_success());
    assert_eq!(response.text().await.unwrap(), "ok");
}

//! Gate between the cart and the checkout page.

use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::api::CartApi;
use crate::cart::Cart;

/// Why checkout cannot start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CheckoutError {
    #[error("your cart is empty")]
    EmptyCart,
}

/// What the caller should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// Go to checkout. `synced` says whether the server copy is known to be current.
    Navigate { synced: bool },
    /// An identical checkout attempt is already running.
    AlreadyInProgress,
}

/// Flushes the cart before checkout for signed-in users.
///
/// A failed flush never blocks checkout; the next sync carries the changes.
pub struct CheckoutGate<A: CartApi> {
    cart: Cart<A>,
    /// Item count when the running attempt started.
    in_flight: Mutex<Option<u32>>,
}

impl<A: CartApi> CheckoutGate<A> {
    #[must_use]
    pub const fn new(cart: Cart<A>) -> Self {
        Self {
            cart,
            in_flight: Mutex::new(None),
        }
    }

    /// Prepare the cart for checkout.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` without touching the network when
    /// the cart has no items.
    #[instrument(skip(self))]
    pub async fn proceed_to_checkout(&self) -> Result<CheckoutOutcome, CheckoutError> {
        let count = self.cart.item_count();
        if count == 0 {
            return Err(CheckoutError::EmptyCart);
        }

        {
            let mut in_flight = self.lock();
            if *in_flight == Some(count) {
                return Ok(CheckoutOutcome::AlreadyInProgress);
            }
            *in_flight = Some(count);
        }
        let _guard = InFlightGuard { gate: self, count };

        if !self.cart.is_authenticated() {
            info!(items = count, "Guest checkout");
            return Ok(CheckoutOutcome::Navigate { synced: false });
        }

        match self.cart.flush().await {
            Ok(()) => Ok(CheckoutOutcome::Navigate { synced: true }),
            Err(e) => {
                warn!(error = %e, "Cart sync before checkout failed; continuing");
                Ok(CheckoutOutcome::Navigate { synced: false })
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<u32>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases the in-flight marker when the attempt that set it ends.
struct InFlightGuard<'a, A: CartApi> {
    gate: &'a CheckoutGate<A>,
    count: u32,
}

impl<A: CartApi> Drop for InFlightGuard<'_, A> {
    fn drop(&mut self) {
        let mut in_flight = self.gate.lock();
        if *in_flight == Some(self.count) {
            *in_flight = None;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use grocer_core::{Price, ProductId, UserId, VariantId};
    use rust_decimal::Decimal;

    use super::*;
    use crate::api::ApiError;
    use crate::config::CartConfig;
    use crate::persistence::MemoryStorage;
    use crate::store::{AuthState, NewLineItem};
    use crate::testing::MockApi;

    fn gate(api: &MockApi, auth: AuthState) -> Arc<CheckoutGate<MockApi>> {
        let cart = Cart::open(
            &CartConfig::default(),
            api.clone(),
            Arc::new(MemoryStorage::new()),
            auth,
        );
        Arc::new(CheckoutGate::new(cart))
    }

    fn item(variant: i32) -> NewLineItem {
        NewLineItem {
            product_id: ProductId::new(3),
            variant_id: VariantId::new(variant),
            product_name: "Toor Dal".to_string(),
            variant_unit: "kg".to_string(),
            variant_amount: Decimal::ONE,
            price: Price::from_minor(16500),
            quantity: 1,
            image_url: None,
            max_stock: None,
        }
    }

    const USER: AuthState = AuthState::Authenticated(UserId::new(5));

    #[tokio::test(start_paused = true)]
    async fn test_empty_cart_fails_without_network() {
        let api = MockApi::new();
        let gate = gate(&api, USER);

        assert_eq!(
            gate.proceed_to_checkout().await,
            Err(CheckoutError::EmptyCart)
        );
        assert!(api.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_guest_navigates_without_sync() {
        let api = MockApi::new();
        let gate = gate(&api, AuthState::Guest);
        gate.cart.add_item(item(1));

        assert_eq!(
            gate.proceed_to_checkout().await,
            Ok(CheckoutOutcome::Navigate { synced: false })
        );
        assert!(api.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_authenticated_flushes_before_navigating() {
        let api = MockApi::new();
        let gate = gate(&api, USER);
        gate.cart.add_item(item(1));

        assert_eq!(
            gate.proceed_to_checkout().await,
            Ok(CheckoutOutcome::Navigate { synced: true })
        );
        assert_eq!(api.push_count(), 1);
        assert_eq!(api.user_cart().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_flush_still_navigates() {
        let api = MockApi::new();
        api.fail_next(1, &ApiError::Network("offline".to_string()));
        let gate = gate(&api, USER);
        gate.cart.add_item(item(1));

        assert_eq!(
            gate.proceed_to_checkout().await,
            Ok(CheckoutOutcome::Navigate { synced: false })
        );
        assert_eq!(api.push_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeat_click_is_ignored_until_cart_changes() {
        let api = MockApi::new();
        api.set_delay(Duration::from_secs(1));
        let gate = gate(&api, USER);
        gate.cart.add_item(item(1));

        let first = tokio::spawn({
            let gate = Arc::clone(&gate);
            async move { gate.proceed_to_checkout().await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(
            gate.proceed_to_checkout().await,
            Ok(CheckoutOutcome::AlreadyInProgress)
        );

        // A changed cart is a new attempt
        gate.cart.add_item(item(2));
        assert_eq!(
            gate.proceed_to_checkout().await,
            Ok(CheckoutOutcome::Navigate { synced: true })
        );
        assert_eq!(
            first.await.unwrap(),
            Ok(CheckoutOutcome::Navigate { synced: true })
        );

        // Once finished, the gate is open again
        assert_eq!(
            gate.proceed_to_checkout().await,
            Ok(CheckoutOutcome::Navigate { synced: true })
        );
    }
}

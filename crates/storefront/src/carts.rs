//! Server-side cart storage.
//!
//! Carts live in a `moka` cache keyed by owner. An idle cart expires after
//! seven days, matching the client's persistence window.

use std::time::Duration;

use chrono::Utc;
use moka::future::Cache;
use tracing::debug;

use grocer_core::{CartLineItem, LineId, SessionToken, UserId};

/// How long an untouched cart is kept.
pub const CART_IDLE_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

const MAX_CARTS: u64 = 100_000;

/// Whose cart this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CartOwner {
    User(UserId),
    Guest(SessionToken),
}

/// A stored cart and when it was last written (epoch ms).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoredCart {
    pub items: Vec<CartLineItem>,
    pub updated_at: i64,
}

/// In-memory cart repository.
#[derive(Clone)]
pub struct CartRepository {
    carts: Cache<CartOwner, StoredCart>,
}

impl Default for CartRepository {
    fn default() -> Self {
        Self::new(CART_IDLE_EXPIRY)
    }
}

impl CartRepository {
    /// Create a repository whose carts expire after `idle` without access.
    #[must_use]
    pub fn new(idle: Duration) -> Self {
        let carts = Cache::builder()
            .max_capacity(MAX_CARTS)
            .time_to_idle(idle)
            .build();
        Self { carts }
    }

    pub async fn get(&self, owner: CartOwner) -> Option<StoredCart> {
        self.carts.get(&owner).await
    }

    /// Replace the whole cart (last write wins).
    pub async fn replace(&self, owner: CartOwner, items: Vec<CartLineItem>, updated_at: i64) {
        debug!(?owner, lines = items.len(), "Replacing cart");
        self.carts
            .insert(owner, StoredCart { items, updated_at })
            .await;
    }

    /// Add `item.quantity` units to a line, capped at its stock.
    ///
    /// Returns the cart after the change.
    pub async fn add(&self, owner: CartOwner, item: CartLineItem) -> StoredCart {
        self.carts
            .entry(owner)
            .and_upsert_with(|existing| {
                let mut cart = existing.map(|e| e.into_value()).unwrap_or_default();
                if let Some(line) = cart
                    .items
                    .iter_mut()
                    .find(|l| l.line_id() == item.line_id())
                {
                    line.max_stock = item.max_stock;
                    line.price = item.price;
                    line.quantity = line.cap_quantity(line.quantity.saturating_add(item.quantity));
                } else {
                    cart.items.push(item);
                }
                cart.updated_at = Utc::now().timestamp_millis();
                std::future::ready(cart)
            })
            .await
            .into_value()
    }

    /// Remove a line. Removing a missing line is not an error.
    pub async fn remove(&self, owner: CartOwner, line: LineId) -> StoredCart {
        self.carts
            .entry(owner)
            .and_upsert_with(|existing| {
                let mut cart = existing.map(|e| e.into_value()).unwrap_or_default();
                cart.items.retain(|l| l.line_id() != line);
                cart.updated_at = Utc::now().timestamp_millis();
                std::future::ready(cart)
            })
            .await
            .into_value()
    }

    pub async fn clear(&self, owner: CartOwner) {
        self.carts.invalidate(&owner).await;
    }
}

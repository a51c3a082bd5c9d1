//! Request and response bodies for the cart endpoints.
//!
//! Both the storefront handlers and the client's HTTP adapter use these types,
//! so the JSON contract lives in exactly one place.

use serde::{Deserialize, Serialize};

use crate::types::{CartLineItem, Price, cart_item_count, cart_total};

/// Full-replace push of the client's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub items: Vec<CartLineItem>,
    pub total: Price,
    pub item_count: u32,
    /// Epoch milliseconds of the client state being pushed.
    pub last_updated: i64,
}

impl SyncRequest {
    /// Build a request with aggregates computed from `items`.
    #[must_use]
    pub fn new(items: Vec<CartLineItem>, last_updated: i64) -> Self {
        let total = cart_total(&items);
        let item_count = cart_item_count(&items);
        Self {
            items,
            total,
            item_count,
            last_updated,
        }
    }
}

/// Outcome of a write to the server cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Authoritative item list after repricing and stock capping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_items: Option<Vec<CartLineItem>>,
}

impl SyncResponse {
    /// Successful write carrying the server's view of the items.
    #[must_use]
    pub fn ok(items: Vec<CartLineItem>) -> Self {
        Self {
            success: true,
            message: None,
            updated_items: Some(items),
        }
    }
}

/// Current server cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshotResponse {
    pub success: bool,
    pub items: Vec<CartLineItem>,
    pub total: Price,
    pub item_count: u32,
    #[serde(default)]
    pub last_updated: Option<i64>,
}

impl CartSnapshotResponse {
    /// Snapshot with aggregates computed from `items`.
    #[must_use]
    pub fn new(items: Vec<CartLineItem>, last_updated: Option<i64>) -> Self {
        Self {
            success: true,
            total: cart_total(&items),
            item_count: cart_item_count(&items),
            items,
            last_updated,
        }
    }

    /// Shape returned when the server has no cart for the caller.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new(), None)
    }
}

/// Guest add: increments the line's quantity by `item.quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestAddRequest {
    pub item: CartLineItem,
}

/// Machine-readable error kinds returned by the cart endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// No user in the session.
    Unauthenticated,
    /// The session names a user the server no longer recognises.
    /// Clients must re-authenticate instead of retrying.
    StaleSession,
    /// The payload references unknown variants or invalid quantities.
    ValidationFailed,
    NotFound,
    BadRequest,
    RateLimited,
    Internal,
}

impl ErrorCode {
    /// Whether retrying the same request later can succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Internal)
    }
}

/// JSON error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorBody {
    /// Create an error body.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            code,
            message: message.into(),
        }
    }
}

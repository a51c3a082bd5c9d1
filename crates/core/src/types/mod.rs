//! Core types for Grocer.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod id;
pub mod price;
pub mod status;

pub use cart::{CartLineItem, LineId, LineIdError, cart_item_count, cart_total};
pub use id::*;
pub use price::{CurrencyCode, Price};
pub use status::SyncStatus;

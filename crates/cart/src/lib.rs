//! Local-first cart for the Grocer storefront.
//!
//! Mutations apply to the in-memory cart immediately and are persisted to
//! client storage; a background worker reconciles them with the server after
//! a quiet period, retrying transient failures with capped backoff.
//!
//! # Modules
//!
//! - [`store`] - Cart state and its synchronous mutations
//! - [`persistence`] - Versioned, expiring client-side storage
//! - [`sync`] - Sync failure taxonomy and the background worker
//! - [`api`] - Server contract and its HTTP implementation
//! - [`checkout`] - Flush-before-checkout gate
//! - [`config`] - Client configuration
//!
//! # Example
//!
//! ```rust,ignore
//! let config = CartConfig::from_env()?;
//! let api = HttpCartApi::new(&config)?;
//! let storage = Arc::new(FileStorage::new(".grocer")?);
//! let cart = Cart::open(&config, api, storage, AuthState::Guest);
//!
//! cart.add_item(item);
//! println!("{}", cart.total());
//! cart.shutdown().await;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
mod cart;
pub mod checkout;
pub mod config;
pub mod persistence;
pub mod store;
pub mod sync;
#[cfg(test)]
mod testing;

pub use api::{ApiError, CartApi, HttpCartApi};
pub use cart::Cart;
pub use checkout::{CheckoutError, CheckoutGate, CheckoutOutcome};
pub use config::{CartConfig, RetryPolicy};
pub use persistence::{CartStorage, FileStorage, MemoryStorage, PersistenceAdapter};
pub use store::{AuthState, CartState, CartView, NewLineItem};
pub use sync::SyncFailure;

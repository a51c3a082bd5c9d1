//! Grocer Core - Shared cart types and wire contract.
//!
//! This crate provides the types shared by every Grocer component:
//! - `cart` - Client-side cart store, persistence and sync engine
//! - `storefront` - Server holding the authoritative cart copy
//! - `cli` - Terminal cart client
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no clocks. This keeps it usable on both sides of the wire.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices, cart line items and sync status
//! - [`api`] - JSON request/response shapes for the cart endpoints

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod types;

pub use types::*;

//! Command implementations.

pub mod cart;
pub mod session;

use thiserror::Error;

use grocer_cart::persistence::StorageError;
use grocer_cart::{ApiError, CheckoutError, SyncFailure};

/// Errors that end a command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] grocer_cart::config::ConfigError),

    #[error("cart storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Api(#[from] ApiError),

    #[error("sign-in failed: {0}")]
    SignIn(String),

    #[error("{0}")]
    Sync(#[from] SyncFailure),

    #[error("{0}")]
    Checkout(#[from] CheckoutError),

    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

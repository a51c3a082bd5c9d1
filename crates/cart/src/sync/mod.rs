//! Debounced, single-flight reconciliation with the server.
//!
//! # State machine
//!
//! ```text
//! Idle ──trigger──▶ Syncing ──ok──────────────▶ Idle
//!                      │ ──transient─────────▶ Retrying ──backoff──▶ Syncing
//!                      │ ──retries exhausted─▶ Error
//!                      └ ──stale/validation──▶ Error ──next trigger──▶ Syncing
//! ```
//!
//! # Triggers
//!
//! - Every local mutation re-arms a debounce timer; the push happens once the
//!   cart has been quiet for the configured window.
//! - Login, logout, checkout and shutdown force an immediate attempt that
//!   supersedes any pending timer.
//!
//! A single worker task owns the network, so at most one request is in flight
//! and every request is built from one coherent snapshot.

mod worker;

use thiserror::Error;

use crate::api::{ApiError, FailureKind};

pub(crate) use worker::{Command, Worker};

/// Why the last sync attempt did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncFailure {
    /// Transient failure; a retry is scheduled.
    #[error("sync failed, retrying: {0}")]
    Transient(String),

    /// Transient failures exceeded the retry budget. The queue is kept and
    /// retried on the next trigger.
    #[error("sync gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    /// The server no longer accepts this session. Sign in again.
    #[error("session expired, sign in again")]
    StaleSession,

    /// The server refused the cart contents.
    #[error("server rejected the cart: {0}")]
    Validation(String),

    /// The worker has shut down.
    #[error("cart sync engine is not running")]
    EngineStopped,
}

impl SyncFailure {
    /// Map a one-off API error (no retry bookkeeping) to a failure.
    #[must_use]
    pub fn from_api(error: &ApiError) -> Self {
        match error.kind() {
            FailureKind::Transient => Self::Transient(error.to_string()),
            FailureKind::StaleSession => Self::StaleSession,
            FailureKind::Validation => Self::Validation(error.to_string()),
        }
    }
}

//! Status enums shared by the cart client and its observers.

use serde::{Deserialize, Serialize};

/// Where the local cart stands relative to the server copy.
///
/// Transitions: `Idle -> Syncing -> {Idle | Retrying | Error}`,
/// `Retrying -> Syncing`, and `Error -> Syncing` on the next trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Nothing in flight.
    #[default]
    Idle,
    /// A request is in flight.
    Syncing,
    /// The last attempt failed transiently and a retry is scheduled.
    Retrying,
    /// Retries are exhausted or the failure is terminal for this attempt.
    Error,
}

impl SyncStatus {
    /// Whether the status should be shown as a problem indicator.
    #[must_use]
    pub const fn is_problem(&self) -> bool {
        matches!(self, Self::Retrying | Self::Error)
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Syncing => write!(f, "syncing"),
            Self::Retrying => write!(f, "retrying"),
            Self::Error => write!(f, "error"),
        }
    }
}

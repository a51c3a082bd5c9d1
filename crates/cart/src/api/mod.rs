//! Server contract used by the sync engine.
//!
//! [`CartApi`] is the seam between the engine and the network. The production
//! implementation is [`HttpCartApi`]; tests substitute scripted fakes.

mod http;

use std::future::Future;

use thiserror::Error;

use grocer_core::api::{CartSnapshotResponse, ErrorCode, SyncRequest, SyncResponse};
use grocer_core::{CartLineItem, LineId, SessionToken};

pub use http::HttpCartApi;

/// Errors returned by a [`CartApi`] call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The request never produced a response (DNS, connect, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with an error status.
    #[error("server returned {status}: {message}")]
    Status {
        status: u16,
        code: Option<ErrorCode>,
        message: String,
    },

    /// The server answered 2xx but reported `success: false`.
    #[error("server rejected the cart: {0}")]
    Rejected(String),

    /// The response body could not be decoded.
    #[error("invalid response: {0}")]
    Decode(String),
}

/// How the sync engine should react to an [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Retry with backoff.
    Transient,
    /// The session is no longer valid; retrying cannot help.
    StaleSession,
    /// The payload was refused; terminal for this attempt.
    Validation,
}

impl ApiError {
    /// Classify the error for retry decisions.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Network(_) | Self::Decode(_) => FailureKind::Transient,
            Self::Rejected(_) => FailureKind::Validation,
            Self::Status { status, code, .. } => match code {
                Some(ErrorCode::StaleSession | ErrorCode::Unauthenticated) => {
                    FailureKind::StaleSession
                }
                Some(ErrorCode::ValidationFailed | ErrorCode::BadRequest | ErrorCode::NotFound) => {
                    FailureKind::Validation
                }
                Some(ErrorCode::RateLimited | ErrorCode::Internal) => FailureKind::Transient,
                None => match status {
                    401 => FailureKind::StaleSession,
                    408 | 429 | 500..=599 => FailureKind::Transient,
                    _ => FailureKind::Validation,
                },
            },
        }
    }
}

/// Server operations the cart depends on.
pub trait CartApi: Send + Sync + 'static {
    /// Replace the signed-in user's server cart with `request.items`.
    fn push(
        &self,
        request: &SyncRequest,
    ) -> impl Future<Output = Result<SyncResponse, ApiError>> + Send;

    /// Fetch the signed-in user's server cart.
    fn fetch(&self) -> impl Future<Output = Result<CartSnapshotResponse, ApiError>> + Send;

    /// Increment a line in the guest cart scoped by `token`.
    fn guest_add(
        &self,
        token: SessionToken,
        item: &CartLineItem,
    ) -> impl Future<Output = Result<SyncResponse, ApiError>> + Send;

    /// Remove a line from the guest cart scoped by `token`.
    fn guest_remove(
        &self,
        token: SessionToken,
        line: LineId,
    ) -> impl Future<Output = Result<SyncResponse, ApiError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: u16, code: Option<ErrorCode>) -> ApiError {
        ApiError::Status {
            status,
            code,
            message: String::new(),
        }
    }

    #[test]
    fn test_classification() {
        assert_eq!(
            ApiError::Network("reset".into()).kind(),
            FailureKind::Transient
        );
        assert_eq!(
            status(401, Some(ErrorCode::StaleSession)).kind(),
            FailureKind::StaleSession
        );
        assert_eq!(status(401, None).kind(), FailureKind::StaleSession);
        assert_eq!(
            status(422, Some(ErrorCode::ValidationFailed)).kind(),
            FailureKind::Validation
        );
        assert_eq!(status(503, None).kind(), FailureKind::Transient);
        assert_eq!(
            status(429, Some(ErrorCode::RateLimited)).kind(),
            FailureKind::Transient
        );
        assert_eq!(status(404, None).kind(), FailureKind::Validation);
        assert_eq!(
            ApiError::Rejected("nope".into()).kind(),
            FailureKind::Validation
        );
    }
}

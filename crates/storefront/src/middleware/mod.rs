//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Session layer (tower-sessions, in-memory store, signed cookie)
//! 5. Rate limiting on guest endpoints (governor)

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod session;

pub use auth::{RequireUser, clear_current_user, set_current_user};
pub use rate_limit::guest_rate_limiter;
pub use request_id::{RequestId, request_id_middleware};
pub use session::create_session_layer;

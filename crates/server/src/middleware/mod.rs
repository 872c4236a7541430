//! HTTP middleware and extractors.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, transaction), added by the binary
//! 2. CORS
//! 3. `TraceLayer` (request span with `request_id` and `user_id` fields)
//! 4. Request ID (fills `request_id`, echoes `x-request-id`)
//!
//! Authentication is not a layer: handlers opt in with the [`RequireAuth`]
//! or [`RequireAdmin`] extractors, which fill `user_id` once the caller is
//! known.

pub mod auth;
pub mod request_id;

pub use auth::{RequireAdmin, RequireAuth};
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};

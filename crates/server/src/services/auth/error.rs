//! Authentication error types.
//!
//! Every variant that means "this caller is not authenticated" is reported to
//! clients identically; the variants only exist so logs can tell them apart.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No bearer token on the request.
    #[error("no session token presented")]
    MissingToken,

    /// Signature, issuer or structure did not verify.
    #[error("invalid session token: {0}")]
    InvalidToken(String),

    /// Valid signature, but `exp` has passed.
    #[error("session token expired")]
    ExpiredToken,

    /// The token names a principal that no longer exists.
    #[error("session principal no longer exists")]
    UnknownPrincipal,

    /// The principal exists but has been deactivated.
    #[error("principal is inactive")]
    InactivePrincipal,

    /// Wrong password or no principal with that email.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] shopfront_core::EmailError),

    /// A required profile field is blank or too long.
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// Email already registered.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Operation refused for an impersonation session.
    #[error("not available while impersonating a customer")]
    ImpersonationRestricted,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,

    /// Token signing failed.
    #[error("token encoding error: {0}")]
    TokenEncoding(String),
}

impl AuthError {
    /// Whether this error means the caller failed to authenticate, as
    /// opposed to a validation or server-side failure.
    #[must_use]
    pub const fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            Self::MissingToken
                | Self::InvalidToken(_)
                | Self::ExpiredToken
                | Self::UnknownPrincipal
                | Self::InactivePrincipal
                | Self::InvalidCredentials
        )
    }
}

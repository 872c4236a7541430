//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Each service error is sorted
//! into an [`ErrorKind`], which fixes the HTTP status and how much of the
//! message the client may see:
//!
//! | Kind | Status | Body |
//! |---|---|---|
//! | `Unauthorized` | 401 | always `Not authorized` |
//! | `Forbidden` | 403 | the unmet requirement |
//! | `NotFound` | 404 | what was missing |
//! | `InvalidOperation`, `BadRequest` | 400 | the reason |
//! | `Conflict` | 409 | the reason |
//! | `Internal` | 500 | generic; captured to Sentry |

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::catalog::CatalogError;
use crate::services::customers::CustomerError;
use crate::services::guard::RoleRequired;
use crate::services::impersonation::ImpersonationError;
use crate::services::orders::OrderError;

/// Message returned for every authentication failure, whatever the cause.
pub const UNAUTHORIZED_MESSAGE: &str = "Not authorized";

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Impersonation error: {0}")]
    Impersonation(#[from] ImpersonationError),

    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Customer error: {0}")]
    Customer(#[from] CustomerError),

    /// Authenticated, but the route needs a different role.
    #[error("Forbidden: {0}")]
    Forbidden(#[from] RoleRequired),

    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// How an error is reported at the HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthorized,
    Forbidden,
    NotFound,
    InvalidOperation,
    Conflict,
    BadRequest,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::InvalidOperation | Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

const fn auth_kind(err: &AuthError) -> ErrorKind {
    if err.is_unauthenticated() {
        return ErrorKind::Unauthorized;
    }
    match err {
        AuthError::InvalidEmail(_) | AuthError::InvalidField { .. } | AuthError::WeakPassword(_) => {
            ErrorKind::BadRequest
        }
        AuthError::UserAlreadyExists => ErrorKind::Conflict,
        AuthError::ImpersonationRestricted => ErrorKind::Forbidden,
        _ => ErrorKind::Internal,
    }
}

const fn impersonation_kind(err: &ImpersonationError) -> ErrorKind {
    match err {
        ImpersonationError::Forbidden(_) => ErrorKind::Forbidden,
        ImpersonationError::TargetNotFound | ImpersonationError::OriginalNotFound => {
            ErrorKind::NotFound
        }
        ImpersonationError::AlreadyImpersonating
        | ImpersonationError::TargetNotCustomer(_)
        | ImpersonationError::TargetInactive
        | ImpersonationError::NotImpersonating
        | ImpersonationError::OriginalNotAdmin => ErrorKind::InvalidOperation,
        ImpersonationError::Token(inner) => auth_kind(inner),
        ImpersonationError::Repository(_) => ErrorKind::Internal,
    }
}

const fn order_kind(err: &OrderError) -> ErrorKind {
    match err {
        OrderError::Forbidden(_) | OrderError::NotOwner | OrderError::CancelOnly => {
            ErrorKind::Forbidden
        }
        OrderError::NotFound | OrderError::ProductNotFound(_) => ErrorKind::NotFound,
        OrderError::InvalidInput(_) | OrderError::InvalidAddress(_) => ErrorKind::BadRequest,
        OrderError::InvalidTransition(_) => ErrorKind::InvalidOperation,
        OrderError::InsufficientStock { .. } | OrderError::Conflict(_) => ErrorKind::Conflict,
        OrderError::Repository(_) => ErrorKind::Internal,
    }
}

const fn catalog_kind(err: &CatalogError) -> ErrorKind {
    match err {
        CatalogError::Forbidden(_) => ErrorKind::Forbidden,
        CatalogError::NotFound => ErrorKind::NotFound,
        CatalogError::InvalidField { .. } => ErrorKind::BadRequest,
        CatalogError::Repository(_) => ErrorKind::Internal,
    }
}

const fn customer_kind(err: &CustomerError) -> ErrorKind {
    match err {
        CustomerError::Forbidden(_) => ErrorKind::Forbidden,
        CustomerError::NotFound => ErrorKind::NotFound,
        CustomerError::SelfModification(_) | CustomerError::HasOrders => {
            ErrorKind::InvalidOperation
        }
        CustomerError::Repository(_) => ErrorKind::Internal,
    }
}

impl AppError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Auth(e) => auth_kind(e),
            Self::Impersonation(e) => impersonation_kind(e),
            Self::Order(e) => order_kind(e),
            Self::Catalog(e) => catalog_kind(e),
            Self::Customer(e) => customer_kind(e),
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Database(RepositoryError::NotFound) => ErrorKind::NotFound,
            Self::Database(_) => ErrorKind::Internal,
            Self::BadRequest(_) => ErrorKind::BadRequest,
        }
    }

    /// The message a client is allowed to see.
    fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Unauthorized => UNAUTHORIZED_MESSAGE.to_owned(),
            ErrorKind::Internal => "Internal server error".to_owned(),
            _ => match self {
                Self::Auth(e) => e.to_string(),
                Self::Impersonation(e) => e.to_string(),
                Self::Order(e) => e.to_string(),
                Self::Catalog(e) => e.to_string(),
                Self::Customer(e) => e.to_string(),
                Self::Forbidden(e) => e.to_string(),
                Self::Database(e) => e.to_string(),
                Self::BadRequest(msg) => msg.clone(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();

        match kind {
            ErrorKind::Internal => {
                let event_id = sentry::capture_error(&self);
                tracing::error!(
                    error = %self,
                    sentry_event_id = %event_id,
                    "Request error"
                );
            }
            // The precise cause stays in the logs; the client only learns
            // that it is not authorized.
            ErrorKind::Unauthorized => {
                tracing::debug!(cause = %self, "request not authorized");
            }
            ErrorKind::Forbidden => tracing::debug!(error = %self, "request forbidden"),
            _ => {}
        }

        let body = Json(json!({ "error": self.public_message() }));
        (kind.status(), body).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Called by the auth extractors once a principal is resolved.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use shopfront_core::{OrderStatus, ProductId, Role, TransitionError};

    use super::*;

    fn status(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    async fn body(err: impl Into<AppError>) -> serde_json::Value {
        let response = err.into().into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn every_authentication_failure_looks_the_same() {
        for err in [
            AuthError::MissingToken,
            AuthError::InvalidToken("bad signature".to_string()),
            AuthError::ExpiredToken,
            AuthError::UnknownPrincipal,
            AuthError::InactivePrincipal,
            AuthError::InvalidCredentials,
        ] {
            assert_eq!(
                body(err).await,
                json!({ "error": UNAUTHORIZED_MESSAGE })
            );
        }
        assert_eq!(status(AuthError::ExpiredToken), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn forbidden_names_the_requirement() {
        let err = OrderError::Forbidden(RoleRequired {
            allowed: vec![Role::Admin],
            actual: Role::Customer,
        });
        assert_eq!(status(OrderError::NotOwner), StatusCode::FORBIDDEN);
        assert_eq!(
            body(err).await,
            json!({ "error": "requires the admin role" })
        );
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            status(OrderError::InvalidTransition(
                TransitionError::CancelAfterShipment(OrderStatus::Shipped)
            )),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(OrderError::InsufficientStock {
                product_id: ProductId::generate(),
                product_name: "Espresso Beans".to_string(),
                requested: 5,
                available: 2,
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(status(AuthError::UserAlreadyExists), StatusCode::CONFLICT);
        assert_eq!(
            status(ImpersonationError::NotImpersonating),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(ImpersonationError::OriginalNotFound),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(ImpersonationError::Token(AuthError::ExpiredToken)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status(CustomerError::HasOrders), StatusCode::BAD_REQUEST);
        assert_eq!(status(CatalogError::NotFound), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn internal_errors_are_not_leaked() {
        let err = RepositoryError::DataCorruption("row 42 has a negative stock".to_string());
        assert_eq!(
            status(RepositoryError::DataCorruption(String::new())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            body(err).await,
            json!({ "error": "Internal server error" })
        );
    }
}

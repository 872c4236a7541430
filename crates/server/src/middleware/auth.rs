//! Authentication extractors.
//!
//! Each extractor runs the access guard on the `Authorization: Bearer`
//! header and, for the role-specific ones, checks the caller's live role.
//! Rejections are [`AppError`]s, so every authentication failure reaches the
//! client as the same `401 Not authorized`.
//!
//! # Example
//!
//! ```rust,ignore
//! async fn list_all(
//!     RequireAdmin(admin): RequireAdmin,
//!     State(state): State<AppState>,
//! ) -> Result<Json<Page<Order>>> {
//!     // ...
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use tracing::Span;

use shopfront_core::Role;

use crate::error::{AppError, set_sentry_user};
use crate::services::auth::AuthError;
use crate::services::guard::{Principal, authorize};
use crate::state::AppState;

/// Any authenticated, active principal.
pub struct RequireAuth(pub Principal);

/// An authenticated principal whose current role is admin.
pub struct RequireAdmin(pub Principal);

/// Extract the token from `Authorization: Bearer <token>`.
///
/// `Ok(None)` when the header is absent.
fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AuthError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| AuthError::InvalidToken("authorization header is not ASCII".to_owned()))?;

    match value.split_once(' ') {
        Some((scheme, token))
            if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() =>
        {
            Ok(Some(token.trim()))
        }
        _ => Err(AuthError::InvalidToken(
            "authorization header is not a bearer token".to_owned(),
        )),
    }
}

fn log_rejection(parts: &Parts, err: &AuthError) {
    match err {
        AuthError::InactivePrincipal | AuthError::UnknownPrincipal => tracing::warn!(
            path = %parts.uri.path(),
            cause = %err,
            "authentication refused"
        ),
        AuthError::Repository(_) => {}
        _ => tracing::debug!(path = %parts.uri.path(), cause = %err, "authentication refused"),
    }
}

async fn authenticate(parts: &Parts, state: &AppState) -> Result<Principal, AppError> {
    let result = match bearer_token(&parts.headers) {
        Ok(bearer) => state.guard().authenticate(bearer).await,
        Err(err) => Err(err),
    };
    let principal = result.inspect_err(|err| log_rejection(parts, err))?;

    let span = Span::current();
    span.record("user_id", tracing::field::display(principal.id()));
    if let Some(admin_id) = principal.original_principal_id() {
        span.record("impersonated_by", tracing::field::display(admin_id));
    }
    set_sentry_user(&principal.id(), Some(principal.user().email.as_str()));

    Ok(principal)
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        authenticate(parts, state).await.map(Self)
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let principal = authenticate(parts, state).await?;
        authorize(&principal, &[Role::Admin])?;
        Ok(Self(principal))
    }
}

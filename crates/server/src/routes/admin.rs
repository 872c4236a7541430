//! Impersonation route handlers.
//!
//! Both routes take any authenticated caller and let the impersonation
//! manager decide, so a customer calling `impersonate` gets a 403 naming the
//! admin requirement rather than a generic rejection.

use axum::{
    Json,
    extract::{Path, State},
};

use shopfront_core::UserId;

use super::auth::SessionResponse;
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::services::auth::SessionMode;
use crate::state::AppState;

/// `POST /admin/impersonate/{customer_id}` - returns a customer-scoped token.
///
/// The caller's own token stays valid; the client keeps it to fall back on.
pub async fn impersonate(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
    Path(customer_id): Path<UserId>,
) -> Result<Json<SessionResponse>> {
    let session = state.impersonation().begin(&caller, customer_id).await?;
    let mode = SessionMode::Impersonating {
        original_principal_id: caller.id(),
    };
    Ok(Json(SessionResponse::new(session, mode)))
}

/// `POST /admin/exit-impersonation` - called with the derived token, returns
/// a fresh admin token.
pub async fn exit_impersonation(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
) -> Result<Json<SessionResponse>> {
    let session = state.impersonation().exit(&caller).await?;
    Ok(Json(SessionResponse::new(session, SessionMode::Normal)))
}

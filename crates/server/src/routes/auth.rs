//! Authentication route handlers.
//!
//! Registration and login hand back a bearer token; `/auth/me` resolves it.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopfront_core::UserId;

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::User;
use crate::services::auth::{Registration, Session, SessionMode};
use crate::state::AppState;

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

// =============================================================================
// Response Types
// =============================================================================

/// A bearer token and the principal it authenticates.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    pub user: User,
    pub impersonating: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_principal_id: Option<UserId>,
}

impl SessionResponse {
    pub(crate) fn new(session: Session, mode: SessionMode) -> Self {
        Self {
            token: session.token.token,
            token_type: "Bearer",
            expires_at: session.token.expires_at,
            user: session.user,
            impersonating: mode.is_impersonating(),
            original_principal_id: mode.original_principal_id(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: User,
    pub impersonating: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_principal_id: Option<UserId>,
}

// =============================================================================
// Handlers
// =============================================================================

/// `POST /auth/register` - create a customer and sign them in.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<SessionResponse>)> {
    let session = state
        .auth()
        .register(Registration {
            first_name: body.first_name,
            last_name: body.last_name,
            email: body.email,
            password: body.password,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse::new(session, SessionMode::Normal)),
    ))
}

/// `POST /auth/login`
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<SessionResponse>> {
    let session = state.auth().login(&body.email, &body.password).await?;
    Ok(Json(SessionResponse::new(session, SessionMode::Normal)))
}

/// `GET /auth/me`
pub async fn me(RequireAuth(principal): RequireAuth) -> Json<MeResponse> {
    Json(MeResponse {
        impersonating: principal.is_impersonating(),
        original_principal_id: principal.original_principal_id(),
        user: principal.user().clone(),
    })
}

/// `PUT /auth/password`
pub async fn change_password(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<StatusCode> {
    state
        .auth()
        .change_password(&principal, &body.current_password, &body.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

//! Back-office principal management handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use shopfront_core::{Role, UserId};

use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::{Page, Pagination, User, UserFilter};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CustomerQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Substring of the email address, case-insensitive.
    pub email: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: Role,
}

/// `GET /admin/customers`
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(caller): RequireAdmin,
    Query(query): Query<CustomerQuery>,
) -> Result<Json<Page<User>>> {
    let filter = UserFilter {
        email: query.email.filter(|e| !e.trim().is_empty()),
        role: query.role,
    };
    let page = Pagination::new(query.page, query.per_page);
    Ok(Json(state.customers().list(&caller, &filter, page).await?))
}

/// `GET /admin/customers/{id}`
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(caller): RequireAdmin,
    Path(id): Path<UserId>,
) -> Result<Json<User>> {
    Ok(Json(state.customers().get(&caller, id).await?))
}

/// `PUT /admin/customers/{id}/status`
pub async fn set_status(
    State(state): State<AppState>,
    RequireAdmin(caller): RequireAdmin,
    Path(id): Path<UserId>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<User>> {
    Ok(Json(
        state
            .customers()
            .set_active(&caller, id, body.is_active)
            .await?,
    ))
}

/// `PUT /admin/customers/{id}/role`
pub async fn set_role(
    State(state): State<AppState>,
    RequireAdmin(caller): RequireAdmin,
    Path(id): Path<UserId>,
    Json(body): Json<RoleRequest>,
) -> Result<Json<User>> {
    Ok(Json(state.customers().set_role(&caller, id, body.role).await?))
}

/// `DELETE /admin/customers/{id}`
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(caller): RequireAdmin,
    Path(id): Path<UserId>,
) -> Result<StatusCode> {
    state.customers().delete(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

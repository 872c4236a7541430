//! Catalog route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use shopfront_core::ProductId;

use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::{NewProduct, Page, Pagination, Product, ProductUpdate};
use crate::state::AppState;

/// Paging parameters shared by the list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageQuery {
    pub(crate) fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.per_page)
    }
}

/// `GET /products`
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<Product>>> {
    Ok(Json(state.catalog().list(query.pagination()).await?))
}

/// `GET /products/{id}`
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    Ok(Json(state.catalog().get(id).await?))
}

/// `POST /admin/products`
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(caller): RequireAdmin,
    Json(body): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>)> {
    let product = state.catalog().create(&caller, body).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// `PUT /admin/products/{id}`
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(caller): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(body): Json<ProductUpdate>,
) -> Result<Json<Product>> {
    Ok(Json(state.catalog().update(&caller, id, body).await?))
}

/// `DELETE /admin/products/{id}`
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(caller): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    state.catalog().delete(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

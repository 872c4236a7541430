//! Order route handlers.
//!
//! Ownership and role rules live in the order service; handlers only
//! authenticate and translate between JSON and service calls.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use shopfront_core::{OrderId, OrderStatus, ShippingAddress};

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::{Order, OrderFilter, OrderLine, Page, Pagination};
use crate::services::orders::Checkout;
use crate::state::AppState;

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub items: Vec<OrderLine>,
    pub shipping_address: ShippingAddress,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<OrderStatus>,
    /// Substring of the customer's email address, case-insensitive.
    pub email: Option<String>,
}

// =============================================================================
// Handlers
// =============================================================================

/// `POST /orders`
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
    Json(body): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>)> {
    let order = state
        .orders()
        .place(
            &caller,
            Checkout {
                items: body.items,
                shipping_address: body.shipping_address,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// `GET /orders/myorders`
pub async fn mine(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(state.orders().list_mine(&caller).await?))
}

/// `GET /orders` - back-office listing.
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
    Query(query): Query<OrderQuery>,
) -> Result<Json<Page<Order>>> {
    let filter = OrderFilter {
        status: query.status,
        customer_email: query.email.filter(|e| !e.trim().is_empty()),
    };
    let page = Pagination::new(query.page, query.per_page);
    Ok(Json(state.orders().list_all(&caller, &filter, page).await?))
}

/// `GET /orders/{id}`
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    Ok(Json(state.orders().get(&caller, id).await?))
}

/// `PUT /orders/{id}/status`
pub async fn update_status(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
    Path(id): Path<OrderId>,
    Json(body): Json<StatusUpdateRequest>,
) -> Result<Json<Order>> {
    Ok(Json(
        state
            .orders()
            .change_status(&caller, id, body.status)
            .await?,
    ))
}

/// `PUT /orders/{id}/cancel`
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    Ok(Json(state.orders().cancel(&caller, id).await?))
}

/// `DELETE /orders/{id}`
pub async fn delete(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<StatusCode> {
    state.orders().delete(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

//! Order lifecycle: checkout, status changes, cancellation and removal.
//!
//! Every operation re-reads the order and re-checks ownership; nothing about
//! a previous request is trusted. Stock moves only inside the repository's
//! unit of work, so a failed checkout never leaves a partial reservation.

use thiserror::Error;

use shopfront_core::{
    AddressError, OrderId, OrderStatus, ProductId, Role, ShippingAddress, TransitionError,
};

use super::guard::{Principal, RoleRequired, authorize};
use crate::db::{OrderRepository, RepositoryError};
use crate::models::{NewOrder, Order, OrderFilter, OrderLine, Page, Pagination};

const MAX_LINES: usize = 100;

/// Errors from the order lifecycle.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error(transparent)]
    Forbidden(#[from] RoleRequired),

    /// The caller neither owns the order nor is an admin.
    #[error("order belongs to another customer")]
    NotOwner,

    /// Owners may only cancel; every other transition is an admin action.
    #[error("customers may only cancel their orders")]
    CancelOnly,

    #[error("order not found")]
    NotFound,

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    InvalidAddress(#[from] AddressError),

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    #[error(
        "insufficient stock for {product_name}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        product_name: String,
        requested: u32,
        available: u32,
    },

    /// Someone else changed the order between our read and our write.
    #[error("{0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for OrderError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound,
            RepositoryError::Conflict(msg) => Self::Conflict(msg),
            RepositoryError::UnknownProduct(id) => Self::ProductNotFound(id),
            RepositoryError::StockOverflow(id) => Self::Conflict(format!(
                "returning stock would exceed the limit for product {id}"
            )),
            RepositoryError::TotalTooLarge { max } => {
                Self::InvalidInput(format!("order total cannot exceed {max}"))
            }
            RepositoryError::InsufficientStock {
                product_id,
                product_name,
                requested,
                available,
            } => Self::InsufficientStock {
                product_id,
                product_name,
                requested,
                available,
            },
            other => Self::Repository(other),
        }
    }
}

/// Checkout request as submitted by the customer.
#[derive(Debug, Clone)]
pub struct Checkout {
    pub items: Vec<OrderLine>,
    pub shipping_address: ShippingAddress,
}

/// Order lifecycle engine.
pub struct OrderService<'a, S> {
    store: &'a S,
}

impl<'a, S: OrderRepository> OrderService<'a, S> {
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Place an order for the caller, reserving stock for every line.
    ///
    /// Duplicate product lines are merged before reservation.
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless the caller is a customer (or an admin impersonating one)
    /// - `InvalidInput` / `InvalidAddress` for malformed checkout data
    /// - `ProductNotFound` / `InsufficientStock`, in which case nothing is reserved
    /// - `InvalidInput` when the total would not fit the order record, also
    ///   before anything is reserved
    pub async fn place(&self, caller: &Principal, checkout: Checkout) -> Result<Order, OrderError> {
        authorize(caller, &[Role::Customer])?;
        let lines = merge_lines(&checkout.items)?;
        checkout.shipping_address.validate()?;

        let order = self
            .store
            .create_order(NewOrder {
                user_id: caller.id(),
                lines,
                shipping_address: checkout.shipping_address,
            })
            .await
            .map_err(|e| {
                if let RepositoryError::InsufficientStock {
                    product_id,
                    requested,
                    available,
                    ..
                } = &e
                {
                    tracing::info!(
                        user_id = %caller.id(),
                        product_id = %product_id,
                        requested,
                        available,
                        "checkout refused: insufficient stock"
                    );
                }
                OrderError::from(e)
            })?;

        tracing::info!(
            order_id = %order.id,
            user_id = %order.user_id,
            total = %order.total_amount,
            items = order.items.len(),
            impersonated_by = ?caller.original_principal_id(),
            "order placed"
        );
        Ok(order)
    }

    /// Fetch one order on behalf of its owner or an admin.
    ///
    /// # Errors
    ///
    /// `NotFound` if it does not exist, `NotOwner` if it belongs to someone else.
    pub async fn get(&self, caller: &Principal, id: OrderId) -> Result<Order, OrderError> {
        let order = self.load(id).await?;
        ensure_owner_or_admin(caller, &order)?;
        Ok(order)
    }

    /// The caller's own orders, newest first.
    ///
    /// # Errors
    ///
    /// Fails only if the store does.
    pub async fn list_mine(&self, caller: &Principal) -> Result<Vec<Order>, OrderError> {
        Ok(self.store.list_orders_for_user(caller.id()).await?)
    }

    /// Every order, filtered and paged.
    ///
    /// # Errors
    ///
    /// `Forbidden` unless the caller is an admin.
    pub async fn list_all(
        &self,
        caller: &Principal,
        filter: &OrderFilter,
        page: Pagination,
    ) -> Result<Page<Order>, OrderError> {
        authorize(caller, &[Role::Admin])?;
        Ok(self.store.list_orders(filter, page).await?)
    }

    /// Move an order to `target`.
    ///
    /// Admins may pick any target except `Pending`; owners may only cancel.
    /// Cancelling a `Pending` or `Processing` order gives its stock back.
    /// Setting the status an order already has is a no-op, except for a
    /// second cancellation, which is refused.
    ///
    /// # Errors
    ///
    /// - `NotFound`, `NotOwner` or `CancelOnly` for callers who may not act
    /// - `InvalidTransition` for moves the status rules forbid, for every caller
    /// - `Conflict` if the status changed concurrently
    pub async fn change_status(
        &self,
        caller: &Principal,
        id: OrderId,
        target: OrderStatus,
    ) -> Result<Order, OrderError> {
        let order = self.load(id).await?;
        ensure_owner_or_admin(caller, &order)?;
        if !caller.is_admin() && target != OrderStatus::Cancelled {
            return Err(OrderError::CancelOnly);
        }

        let current = order.status;
        if current == target && current != OrderStatus::Cancelled {
            return Ok(order);
        }
        current.check_transition(target).inspect_err(|e| {
            tracing::info!(
                order_id = %id,
                user_id = %caller.id(),
                from = %current,
                to = %target,
                reason = %e,
                "status change refused"
            );
        })?;

        let updated = self.store.update_order_status(id, current, target).await?;

        tracing::info!(
            order_id = %id,
            user_id = %caller.id(),
            from = %current,
            to = %target,
            stock_released = current.releases_stock(target),
            "order status changed"
        );
        Ok(updated)
    }

    /// Cancel an order, returning its stock.
    ///
    /// # Errors
    ///
    /// As [`Self::change_status`] with a `Cancelled` target.
    pub async fn cancel(&self, caller: &Principal, id: OrderId) -> Result<Order, OrderError> {
        self.change_status(caller, id, OrderStatus::Cancelled).await
    }

    /// Remove an order outright, returning its stock unless a cancellation
    /// already did. Allowed in every status.
    ///
    /// # Errors
    ///
    /// `Forbidden` unless the caller is an admin, `NotFound` if it does not exist.
    pub async fn delete(&self, caller: &Principal, id: OrderId) -> Result<Order, OrderError> {
        authorize(caller, &[Role::Admin])?;
        let order = self.store.delete_order(id).await?;

        tracing::info!(
            order_id = %id,
            admin_id = %caller.id(),
            status = %order.status,
            stock_released = order.status != OrderStatus::Cancelled,
            "order deleted"
        );
        Ok(order)
    }

    async fn load(&self, id: OrderId) -> Result<Order, OrderError> {
        self.store
            .get_order(id)
            .await?
            .ok_or(OrderError::NotFound)
    }
}

fn ensure_owner_or_admin(caller: &Principal, order: &Order) -> Result<(), OrderError> {
    if caller.is_admin() || order.user_id == caller.id() {
        Ok(())
    } else {
        tracing::warn!(
            order_id = %order.id,
            user_id = %caller.id(),
            "access to another customer's order refused"
        );
        Err(OrderError::NotOwner)
    }
}

/// Validate checkout lines and fold repeated products into one line each,
/// keeping first-seen order.
fn merge_lines(items: &[OrderLine]) -> Result<Vec<OrderLine>, OrderError> {
    if items.is_empty() {
        return Err(OrderError::InvalidInput(
            "order must contain at least one item".to_owned(),
        ));
    }
    if items.len() > MAX_LINES {
        return Err(OrderError::InvalidInput(format!(
            "order may contain at most {MAX_LINES} items"
        )));
    }

    let mut merged: Vec<OrderLine> = Vec::with_capacity(items.len());
    for item in items {
        if item.quantity == 0 {
            return Err(OrderError::InvalidInput(format!(
                "quantity for product {} must be at least 1",
                item.product_id
            )));
        }
        match merged.iter_mut().find(|l| l.product_id == item.product_id) {
            Some(line) => {
                line.quantity = line.quantity.checked_add(item.quantity).ok_or_else(|| {
                    OrderError::InvalidInput(format!(
                        "quantity for product {} is too large",
                        item.product_id
                    ))
                })?;
            }
            None => merged.push(*item),
        }
    }
    Ok(merged)
}

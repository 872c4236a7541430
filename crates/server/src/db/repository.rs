//! Repository traits implemented by every persistence backend.
//!
//! Services are generic over these traits so they run unchanged against
//! `PostgreSQL` and the in-memory store. Method names are unique across the
//! three traits because [`super::Store`] implements all of them.

use std::future::Future;

use shopfront_core::{Email, OrderId, OrderStatus, ProductId, Role, UserId};

use super::RepositoryError;
use crate::models::{
    NewOrder, NewProduct, NewUser, Order, OrderFilter, Page, Pagination, Product, ProductUpdate,
    User, UserFilter,
};

/// Persistence for principals.
pub trait UserRepository: Send + Sync {
    /// Insert a principal.
    ///
    /// Returns `RepositoryError::Conflict` when the email is already taken,
    /// compared case-insensitively.
    fn create_user(
        &self,
        input: NewUser,
    ) -> impl Future<Output = Result<User, RepositoryError>> + Send;

    fn get_user(
        &self,
        id: UserId,
    ) -> impl Future<Output = Result<Option<User>, RepositoryError>> + Send;

    /// Case-insensitive lookup.
    fn find_user_by_email(
        &self,
        email: &Email,
    ) -> impl Future<Output = Result<Option<User>, RepositoryError>> + Send;

    /// The principal and its password hash, for login.
    fn find_credentials(
        &self,
        email: &Email,
    ) -> impl Future<Output = Result<Option<(User, String)>, RepositoryError>> + Send;

    fn get_password_hash(
        &self,
        id: UserId,
    ) -> impl Future<Output = Result<Option<String>, RepositoryError>> + Send;

    fn update_password_hash(
        &self,
        id: UserId,
        password_hash: String,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    fn set_user_active(
        &self,
        id: UserId,
        is_active: bool,
    ) -> impl Future<Output = Result<User, RepositoryError>> + Send;

    fn set_user_role(
        &self,
        id: UserId,
        role: Role,
    ) -> impl Future<Output = Result<User, RepositoryError>> + Send;

    /// Remove a principal that owns no orders.
    ///
    /// Returns `RepositoryError::Conflict` if any order references it.
    fn delete_user(&self, id: UserId)
    -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Newest first.
    fn list_users(
        &self,
        filter: &UserFilter,
        page: Pagination,
    ) -> impl Future<Output = Result<Page<User>, RepositoryError>> + Send;
}

/// Persistence for the catalog.
pub trait ProductRepository: Send + Sync {
    fn create_product(
        &self,
        input: NewProduct,
    ) -> impl Future<Output = Result<Product, RepositoryError>> + Send;

    fn get_product(
        &self,
        id: ProductId,
    ) -> impl Future<Output = Result<Option<Product>, RepositoryError>> + Send;

    /// Ordered by name.
    fn list_products(
        &self,
        page: Pagination,
    ) -> impl Future<Output = Result<Page<Product>, RepositoryError>> + Send;

    fn update_product(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> impl Future<Output = Result<Product, RepositoryError>> + Send;

    fn delete_product(
        &self,
        id: ProductId,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

/// Persistence for orders, including the stock they hold.
pub trait OrderRepository: Send + Sync {
    /// Reserve stock for every line and insert the order, as one unit of work.
    ///
    /// Either every product's stock is decremented and the order exists, or
    /// nothing changed. Fails with `RepositoryError::UnknownProduct` or
    /// `RepositoryError::InsufficientStock` for the first offending line.
    fn create_order(
        &self,
        input: NewOrder,
    ) -> impl Future<Output = Result<Order, RepositoryError>> + Send;

    fn get_order(
        &self,
        id: OrderId,
    ) -> impl Future<Output = Result<Option<Order>, RepositoryError>> + Send;

    /// Newest first.
    fn list_orders_for_user(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<Order>, RepositoryError>> + Send;

    /// Newest first.
    fn list_orders(
        &self,
        filter: &OrderFilter,
        page: Pagination,
    ) -> impl Future<Output = Result<Page<Order>, RepositoryError>> + Send;

    /// Move an order from `expected` to `target`.
    ///
    /// The change only applies if the stored status still equals `expected`;
    /// otherwise `RepositoryError::Conflict` is returned and nothing changes.
    /// When `expected.releases_stock(target)` the reserved quantities are
    /// returned to the catalog in the same unit of work.
    fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        target: OrderStatus,
    ) -> impl Future<Output = Result<Order, RepositoryError>> + Send;

    /// Remove an order, returning any stock it still holds.
    ///
    /// Cancelled orders hold no stock; every other status does.
    fn delete_order(
        &self,
        id: OrderId,
    ) -> impl Future<Output = Result<Order, RepositoryError>> + Send;
}

//! Persistence for principals, the catalog and orders.
//!
//! # Backends
//!
//! - [`PgStore`] - `PostgreSQL`, schema `shop`:
//!   - `shop.user_account` - principals (unique on `lower(email)`)
//!   - `shop.product` - catalog with `stock_quantity >= 0`
//!   - `shop.purchase_order` - orders, line items and address as `JSONB`
//! - [`MemoryStore`] - process-local, used by tests and `SHOPFRONT_STORE=memory`
//!
//! Both implement the traits in [`repository`]; [`Store`] dispatches to the
//! configured one.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p shopfront-cli -- migrate
//! ```

mod memory;
mod orders;
mod products;
pub mod repository;
mod users;

use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use shopfront_core::{Email, OrderId, OrderStatus, ProductId, Role, UserId};

use crate::models::{
    NewOrder, NewProduct, NewUser, Order, OrderFilter, Page, Pagination, Product, ProductUpdate,
    User, UserFilter,
};

pub use memory::MemoryStore;
pub use repository::{OrderRepository, ProductRepository, UserRepository};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation or lost race (e.g., unique email, concurrent status change).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// An order line references a product that does not exist.
    #[error("product {0} does not exist")]
    UnknownProduct(ProductId),

    /// An order line asks for more units than are in stock.
    #[error("insufficient stock for {product_name}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        product_name: String,
        requested: u32,
        available: u32,
    },

    /// Returning stock would push a product past its storable maximum.
    #[error("restocking product {0} would exceed the stock limit")]
    StockOverflow(ProductId),

    /// The order total does not fit the total column.
    #[error("order total exceeds {max}")]
    TotalTooLarge { max: Decimal },
}

/// Map a unique violation to `Conflict`, anything else to `Database`.
pub(crate) fn conflict_on_unique(err: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(err)
}

/// Build an `ILIKE` pattern matching `needle` anywhere, with wildcards escaped.
pub(crate) fn contains_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// `PostgreSQL`-backed repositories.
///
/// Cheap to clone; the pool is reference counted.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// The configured persistence backend.
#[derive(Clone, Debug)]
pub enum Store {
    Postgres(PgStore),
    Memory(MemoryStore),
}

impl Store {
    /// Check that the backend can serve requests.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if `PostgreSQL` is unreachable.
    pub async fn ping(&self) -> Result<(), RepositoryError> {
        match self {
            Self::Postgres(pg) => {
                sqlx::query("SELECT 1").execute(pg.pool()).await?;
                Ok(())
            }
            Self::Memory(_) => Ok(()),
        }
    }
}

/// Forward a call to whichever backend is configured.
macro_rules! dispatch {
    ($self:ident, $method:ident($($arg:expr),*)) => {
        match $self {
            Self::Postgres(store) => store.$method($($arg),*).await,
            Self::Memory(store) => store.$method($($arg),*).await,
        }
    };
}

impl UserRepository for Store {
    async fn create_user(&self, input: NewUser) -> Result<User, RepositoryError> {
        dispatch!(self, create_user(input))
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        dispatch!(self, get_user(id))
    }

    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        dispatch!(self, find_user_by_email(email))
    }

    async fn find_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        dispatch!(self, find_credentials(email))
    }

    async fn get_password_hash(&self, id: UserId) -> Result<Option<String>, RepositoryError> {
        dispatch!(self, get_password_hash(id))
    }

    async fn update_password_hash(
        &self,
        id: UserId,
        password_hash: String,
    ) -> Result<(), RepositoryError> {
        dispatch!(self, update_password_hash(id, password_hash))
    }

    async fn set_user_active(&self, id: UserId, is_active: bool) -> Result<User, RepositoryError> {
        dispatch!(self, set_user_active(id, is_active))
    }

    async fn set_user_role(&self, id: UserId, role: Role) -> Result<User, RepositoryError> {
        dispatch!(self, set_user_role(id, role))
    }

    async fn delete_user(&self, id: UserId) -> Result<(), RepositoryError> {
        dispatch!(self, delete_user(id))
    }

    async fn list_users(
        &self,
        filter: &UserFilter,
        page: Pagination,
    ) -> Result<Page<User>, RepositoryError> {
        dispatch!(self, list_users(filter, page))
    }
}

impl ProductRepository for Store {
    async fn create_product(&self, input: NewProduct) -> Result<Product, RepositoryError> {
        dispatch!(self, create_product(input))
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        dispatch!(self, get_product(id))
    }

    async fn list_products(&self, page: Pagination) -> Result<Page<Product>, RepositoryError> {
        dispatch!(self, list_products(page))
    }

    async fn update_product(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Product, RepositoryError> {
        dispatch!(self, update_product(id, update))
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), RepositoryError> {
        dispatch!(self, delete_product(id))
    }
}

impl OrderRepository for Store {
    async fn create_order(&self, input: NewOrder) -> Result<Order, RepositoryError> {
        dispatch!(self, create_order(input))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        dispatch!(self, get_order(id))
    }

    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        dispatch!(self, list_orders_for_user(user_id))
    }

    async fn list_orders(
        &self,
        filter: &OrderFilter,
        page: Pagination,
    ) -> Result<Page<Order>, RepositoryError> {
        dispatch!(self, list_orders(filter, page))
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        target: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        dispatch!(self, update_order_status(id, expected, target))
    }

    async fn delete_order(&self, id: OrderId) -> Result<Order, RepositoryError> {
        dispatch!(self, delete_order(id))
    }
}

//! Domain models for the server.
//!
//! These types represent validated domain objects, separate from database row
//! types. They serialize with camelCase keys and are returned directly by the
//! JSON API; none of them carries secret material.

pub mod order;
pub mod page;
pub mod product;
pub mod user;

pub use order::{NewOrder, Order, OrderFilter, OrderItem, OrderLine};
pub use page::{Page, Pagination};
pub use product::{NewProduct, Product, ProductUpdate};
pub use user::{NewUser, User, UserFilter};

//! Business logic, independent of HTTP.
//!
//! Services borrow a repository (and the token service where needed) for the
//! duration of one request; routes construct them from [`crate::AppState`].

pub mod auth;
pub mod catalog;
pub mod customers;
pub mod guard;
pub mod impersonation;
pub mod orders;

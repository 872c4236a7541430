//! Shopfront server library.
//!
//! The REST API for the storefront and the admin back office, exposed as a
//! library so the binary and the integration tests build the same router.
//!
//! # Layers
//!
//! - [`routes`] - axum handlers, thin JSON translation
//! - [`middleware`] - bearer-token extractors, request ids
//! - [`services`] - token service, access guard, impersonation, order
//!   lifecycle, catalog and customer management
//! - [`db`] - repository traits with `PostgreSQL` and in-memory backends

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

pub use error::{AppError, Result};
pub use routes::app;
pub use state::AppState;

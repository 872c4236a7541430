//! Shopfront Core - Shared domain types.
//!
//! This crate provides the types shared by every Shopfront component:
//! - `server` - REST API for the storefront and the admin back office
//! - `cli` - Command-line tools for migrations, bootstrap admins and seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP. The order status rules live here so that every storage
//! backend and every caller agrees on which transitions exist.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, e-mail addresses, prices, roles, order statuses
//!   and shipping addresses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;

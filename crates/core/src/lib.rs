//! Cartkit Core - Shared cart domain types.
//!
//! This crate provides the data model shared by every Cartkit component:
//! - `engine` - The cart domain engine (mutations, totals, validation, sync)
//! - Host applications consuming the SDK surface
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! storage, no HTTP clients. This keeps it lightweight and allows it to be
//! used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Cart aggregate, line items, coupons, totals, catalog snapshots
//! - [`shape`] - Structural validation for storage-loaded cart documents

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod shape;
pub mod types;

pub use types::*;

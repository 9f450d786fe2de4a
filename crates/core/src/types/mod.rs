//! Core types for Cartkit.
//!
//! This module provides the cart aggregate and its supporting domain types.

pub mod cart;
pub mod catalog;
pub mod coupon;
pub mod key;
pub mod sync;
pub mod totals;

pub use cart::{Cart, CartItem, FeeLine, QuantityLimits, ShippingSelection, StockSnapshot};
pub use catalog::{CouponSnapshot, ProductSnapshot, StockStatus, VariationAttribute};
pub use coupon::{AppliedCoupon, DiscountType};
pub use key::ItemKey;
pub use sync::{ConflictKind, QueuedAction, SyncConflict, SyncQueueEntry};
pub use totals::Totals;

//! Monetary breakdown derived from cart contents.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Tax-aware monetary breakdown of a cart.
///
/// Totals are derived, never mutated directly: they are recomputed by the
/// totals calculator after every mutation. All amounts are non-negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Totals {
    /// Sum of line totals before discounts, shipping, and fees.
    pub subtotal: Decimal,
    /// Tax portion of the subtotal.
    pub subtotal_tax: Decimal,
    /// Total of the selected shipping method.
    pub shipping_total: Decimal,
    /// Tax on shipping (zero for non-taxable methods).
    pub shipping_tax: Decimal,
    /// Sum of all coupon discounts.
    pub discount_total: Decimal,
    /// Tax portion of the discount.
    pub discount_tax: Decimal,
    /// Total of additional fee lines.
    pub fee_total: Decimal,
    /// Tax on taxable fees.
    pub fee_tax: Decimal,
    /// Grand total payable.
    pub total: Decimal,
    /// Total tax across all components.
    pub total_tax: Decimal,
}

impl Totals {
    /// True when every component is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.total.is_zero() && self.subtotal.is_zero()
    }

    /// Whether another breakdown matches this one within `tolerance`.
    ///
    /// Used to detect drift between a stored snapshot and a fresh
    /// recomputation without tripping over rounding noise.
    #[must_use]
    pub fn matches(&self, other: &Self, tolerance: Decimal) -> bool {
        (self.total - other.total).abs() <= tolerance
            && (self.subtotal - other.subtotal).abs() <= tolerance
            && (self.discount_total - other.discount_total).abs() <= tolerance
    }
}

//! Applied discount codes and their constraint data.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How a coupon's amount is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// Percentage of the eligible subtotal (amount is the percentage).
    Percent,
    /// Fixed amount off the whole cart.
    FixedCart,
    /// Fixed amount off each eligible unit.
    FixedProduct,
}

/// A discount code attached to the cart.
///
/// Added by successful validation against live coupon data; removed
/// explicitly or invalidated during a later validation pass (expired,
/// usage exhausted, minimum not met).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedCoupon {
    /// The coupon code as entered.
    pub code: String,
    /// Discount interpretation.
    pub discount_type: DiscountType,
    /// Discount amount (percentage or currency depending on type).
    pub amount: Decimal,
    /// Minimum eligible subtotal, if any.
    pub minimum_amount: Option<Decimal>,
    /// Maximum eligible subtotal, if any (exceeding it is a warning).
    pub maximum_amount: Option<Decimal>,
    /// Ceiling on the computed discount for percent coupons.
    pub maximum_discount: Option<Decimal>,
    /// Product ids this coupon is limited to (empty = all products).
    pub allowed_products: Vec<String>,
    /// Product ids this coupon never applies to.
    pub excluded_products: Vec<String>,
    /// Times this coupon has been redeemed.
    pub usage_count: u32,
    /// Redemption ceiling, if any.
    pub usage_limit: Option<u32>,
    /// Whether this coupon refuses to combine with others.
    pub individual_use: bool,
    /// Expiry timestamp, if any.
    pub expires_at: Option<DateTime<Utc>>,
}

impl AppliedCoupon {
    /// Whether the coupon applies to an item with the given product id.
    ///
    /// An item is eligible unless its product id is excluded, or the coupon
    /// carries a non-empty allow-list that does not include it.
    #[must_use]
    pub fn applies_to(&self, product_id: &str) -> bool {
        if self.excluded_products.iter().any(|p| p == product_id) {
            return false;
        }
        if !self.allowed_products.is_empty()
            && !self.allowed_products.iter().any(|p| p == product_id)
        {
            return false;
        }
        true
    }

    /// Whether the coupon has expired as of `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Whether the usage limit has been exhausted.
    #[must_use]
    pub fn is_usage_exhausted(&self) -> bool {
        self.usage_limit
            .is_some_and(|limit| self.usage_count >= limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn coupon() -> AppliedCoupon {
        AppliedCoupon {
            code: "SAVE10".into(),
            discount_type: DiscountType::Percent,
            amount: dec!(10),
            minimum_amount: None,
            maximum_amount: None,
            maximum_discount: None,
            allowed_products: vec![],
            excluded_products: vec![],
            usage_count: 0,
            usage_limit: None,
            individual_use: false,
            expires_at: None,
        }
    }

    #[test]
    fn test_applies_to_all_products_by_default() {
        assert!(coupon().applies_to("1"));
    }

    #[test]
    fn test_excluded_product_is_ineligible() {
        let mut c = coupon();
        c.excluded_products = vec!["1".into()];
        assert!(!c.applies_to("1"));
        assert!(c.applies_to("2"));
    }

    #[test]
    fn test_allow_list_excludes_everything_else() {
        let mut c = coupon();
        c.allowed_products = vec!["1".into()];
        assert!(c.applies_to("1"));
        assert!(!c.applies_to("2"));
    }

    #[test]
    fn test_exclusion_beats_allow_list() {
        let mut c = coupon();
        c.allowed_products = vec!["1".into()];
        c.excluded_products = vec!["1".into()];
        assert!(!c.applies_to("1"));
    }

    #[test]
    fn test_usage_exhaustion() {
        let mut c = coupon();
        assert!(!c.is_usage_exhausted());
        c.usage_limit = Some(3);
        c.usage_count = 3;
        assert!(c.is_usage_exhausted());
    }
}

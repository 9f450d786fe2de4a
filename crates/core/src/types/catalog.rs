//! Catalog snapshot types returned by the external lookup collaborators.
//!
//! These are read-only views of live product and coupon data, fetched at
//! add-time and during validation. The engine never caches validity derived
//! from them across mutations.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::cart::QuantityLimits;
use super::coupon::DiscountType;

/// Stock availability of a product or variation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    /// Purchasable from on-hand stock.
    #[default]
    InStock,
    /// Not purchasable.
    OutOfStock,
    /// Purchasable subject to the backorder policy.
    OnBackorder,
}

/// A required attribute on a variable product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariationAttribute {
    /// Attribute name (e.g. "size").
    pub name: String,
    /// Whether a value must be selected before adding to cart.
    pub required: bool,
}

/// Current catalog state of a product, as returned by the catalog lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    /// Product id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Whether the product is published and purchasable at all.
    pub published: bool,
    /// Current selling price.
    pub price: Decimal,
    /// Current regular (non-sale) price.
    pub regular_price: Decimal,
    /// Current sale price, if on sale.
    pub sale_price: Option<Decimal>,
    /// Stock status.
    pub stock_status: StockStatus,
    /// Managed stock quantity; `None` when stock is not managed.
    pub stock_quantity: Option<i64>,
    /// Whether backorders are accepted when stock runs out.
    pub backorders_allowed: bool,
    /// Whether this is a variable product requiring a variation selection.
    pub is_variable: bool,
    /// Attributes a variation selection must provide.
    pub variation_attributes: Vec<VariationAttribute>,
    /// Purchase quantity bounds, if the product declares any.
    pub quantity_limits: Option<QuantityLimits>,
}

/// Current state of a coupon, as returned by the coupon lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouponSnapshot {
    /// The coupon code.
    pub code: String,
    /// Discount interpretation.
    pub discount_type: DiscountType,
    /// Discount amount.
    pub amount: Decimal,
    /// Minimum eligible subtotal.
    pub minimum_amount: Option<Decimal>,
    /// Maximum eligible subtotal.
    pub maximum_amount: Option<Decimal>,
    /// Ceiling on the computed discount for percent coupons.
    pub maximum_discount: Option<Decimal>,
    /// Product allow-list (empty = all).
    pub allowed_products: Vec<String>,
    /// Product deny-list.
    pub excluded_products: Vec<String>,
    /// Times redeemed so far.
    pub usage_count: u32,
    /// Redemption ceiling.
    pub usage_limit: Option<u32>,
    /// Refuses to combine with other coupons.
    pub individual_use: bool,
    /// Expiry timestamp.
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<CouponSnapshot> for super::coupon::AppliedCoupon {
    fn from(snapshot: CouponSnapshot) -> Self {
        Self {
            code: snapshot.code,
            discount_type: snapshot.discount_type,
            amount: snapshot.amount,
            minimum_amount: snapshot.minimum_amount,
            maximum_amount: snapshot.maximum_amount,
            maximum_discount: snapshot.maximum_discount,
            allowed_products: snapshot.allowed_products,
            excluded_products: snapshot.excluded_products,
            usage_count: snapshot.usage_count,
            usage_limit: snapshot.usage_limit,
            individual_use: snapshot.individual_use,
            expires_at: snapshot.expires_at,
        }
    }
}

//! Cart validation against live catalog data.
//!
//! Produces errors (block checkout) and warnings (informational) with
//! stable machine-readable codes. Never mutates the cart; callers decide
//! what to do with the report.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use cartkit_core::{Cart, CartItem, ItemKey, ProductSnapshot, StockStatus};

use crate::catalog::CatalogProvider;
use crate::config::LimitsConfig;
use crate::error::EngineError;
use crate::totals::TotalsCalculator;

/// One cent: the drift tolerance for price and totals comparisons.
const fn one_cent() -> Decimal {
    Decimal::from_parts(1, 0, 0, false, 2)
}

/// Stable validation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    /// Product missing or unpublished.
    ProductNotFound,
    /// Stock status out-of-stock, or managed stock at zero and below request.
    OutOfStock,
    /// Managed stock positive but below the requested quantity.
    InsufficientStock,
    /// Remaining stock is close to the requested quantity.
    LowStock,
    /// Item is on backorder.
    Backorder,
    /// Quantity violates the attached limits.
    InvalidQuantity,
    /// Add-time price drifted beyond tolerance from the current price.
    PriceChanged,
    /// Variable product lacks a variation id or a required attribute value.
    VariationNotFound,
    /// Distinct-item ceiling exceeded.
    MaxItemsExceeded,
    /// Total quantity approaching the configured soft ceiling.
    QuantityCeiling,
    /// Cart holds no items.
    EmptyCart,
    /// Coupon past its expiry.
    CouponExpired,
    /// Coupon redemption limit exhausted.
    CouponUsageLimit,
    /// Cart subtotal below the coupon minimum.
    CouponMinNotMet,
    /// Cart subtotal above the coupon maximum.
    CouponMaxExceeded,
    /// Individual-use coupon combined with others.
    CouponIndividualUse,
    /// Stored totals drift beyond tolerance from recomputation.
    TotalsMismatch,
}

/// One finding from a validation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Stable code.
    pub code: ValidationCode,
    /// Human-readable explanation.
    pub message: String,
    /// The item involved, when applicable.
    pub item_key: Option<ItemKey>,
}

impl ValidationIssue {
    fn new(code: ValidationCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            item_key: None,
        }
    }

    fn for_item(code: ValidationCode, message: impl Into<String>, key: &ItemKey) -> Self {
        Self {
            code,
            message: message.into(),
            item_key: Some(key.clone()),
        }
    }
}

/// Outcome of a validation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// True when no errors (warnings do not block checkout).
    pub is_valid: bool,
    /// Blocking findings.
    pub errors: Vec<ValidationIssue>,
    /// Informational findings.
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    fn from_findings(errors: Vec<ValidationIssue>, warnings: Vec<ValidationIssue>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

/// Checks a cart snapshot against freshly fetched catalog data.
pub struct ValidationEngine {
    limits: LimitsConfig,
    calculator: TotalsCalculator,
}

impl ValidationEngine {
    /// Create a validation engine with the given ceilings and calculator.
    #[must_use]
    pub const fn new(limits: LimitsConfig, calculator: TotalsCalculator) -> Self {
        Self { limits, calculator }
    }

    /// Validate every item, the cart-level ceilings, the applied coupons,
    /// and finally the stored totals against a fresh recomputation.
    ///
    /// # Errors
    ///
    /// Only transport failures from the catalog lookup surface as `Err`;
    /// business findings land in the returned report.
    #[instrument(skip(self, cart, catalog), fields(items = cart.items.len()))]
    pub async fn validate(
        &self,
        cart: &Cart,
        catalog: &dyn CatalogProvider,
    ) -> crate::error::Result<ValidationReport> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for item in &cart.items {
            match catalog.get_product(&item.product_id).await {
                Ok(snapshot) => {
                    self.check_item(item, &snapshot, &mut errors, &mut warnings);
                }
                Err(EngineError::NotFound(_)) => {
                    errors.push(ValidationIssue::for_item(
                        ValidationCode::ProductNotFound,
                        format!("product {} no longer exists", item.product_id),
                        &item.key,
                    ));
                }
                Err(other) => return Err(other),
            }
        }

        self.check_cart_level(cart, &mut errors, &mut warnings);
        self.check_coupons(cart, &mut errors, &mut warnings);
        self.check_totals(cart, &mut warnings);

        Ok(ValidationReport::from_findings(errors, warnings))
    }

    fn check_item(
        &self,
        item: &CartItem,
        snapshot: &ProductSnapshot,
        errors: &mut Vec<ValidationIssue>,
        warnings: &mut Vec<ValidationIssue>,
    ) {
        if !snapshot.published {
            errors.push(ValidationIssue::for_item(
                ValidationCode::ProductNotFound,
                format!("product {} is no longer published", item.product_id),
                &item.key,
            ));
            return;
        }

        self.check_stock(item, snapshot, errors, warnings);
        Self::check_quantity_limits(item, errors);
        Self::check_price_drift(item, snapshot, warnings);
        Self::check_variation(item, snapshot, errors);
    }

    #[allow(clippy::unused_self)]
    fn check_stock(
        &self,
        item: &CartItem,
        snapshot: &ProductSnapshot,
        errors: &mut Vec<ValidationIssue>,
        warnings: &mut Vec<ValidationIssue>,
    ) {
        let requested = i64::from(item.quantity);

        match snapshot.stock_status {
            StockStatus::OutOfStock => {
                errors.push(ValidationIssue::for_item(
                    ValidationCode::OutOfStock,
                    format!("{} is out of stock", snapshot.name),
                    &item.key,
                ));
                return;
            }
            StockStatus::OnBackorder => {
                if snapshot.backorders_allowed {
                    warnings.push(ValidationIssue::for_item(
                        ValidationCode::Backorder,
                        format!("{} will be backordered", snapshot.name),
                        &item.key,
                    ));
                } else {
                    errors.push(ValidationIssue::for_item(
                        ValidationCode::Backorder,
                        format!("{} is on backorder and backorders are disabled", snapshot.name),
                        &item.key,
                    ));
                }
                return;
            }
            StockStatus::InStock => {}
        }

        let Some(available) = snapshot.stock_quantity else {
            return; // Stock not managed.
        };

        if available == 0 && available < requested {
            errors.push(ValidationIssue::for_item(
                ValidationCode::OutOfStock,
                format!("{} has no stock remaining", snapshot.name),
                &item.key,
            ));
        } else if available > 0 && available < requested {
            errors.push(ValidationIssue::for_item(
                ValidationCode::InsufficientStock,
                format!(
                    "only {available} of {} available, {requested} requested",
                    snapshot.name
                ),
                &item.key,
            ));
        } else {
            // Low-stock threshold: max(5, 10% of available).
            let threshold = 5.max(available / 10);
            if available - requested <= threshold {
                warnings.push(ValidationIssue::for_item(
                    ValidationCode::LowStock,
                    format!("{} is running low ({available} left)", snapshot.name),
                    &item.key,
                ));
            }
        }
    }

    fn check_quantity_limits(item: &CartItem, errors: &mut Vec<ValidationIssue>) {
        let Some(limits) = item.limits else { return };
        if !limits.allows(item.quantity) {
            errors.push(ValidationIssue::for_item(
                ValidationCode::InvalidQuantity,
                format!(
                    "quantity {} violates limits (min {}, max {}, step {})",
                    item.quantity, limits.min, limits.max, limits.step
                ),
                &item.key,
            ));
        }
    }

    fn check_price_drift(
        item: &CartItem,
        snapshot: &ProductSnapshot,
        warnings: &mut Vec<ValidationIssue>,
    ) {
        let tolerance = one_cent();

        if (item.regular_price - snapshot.regular_price).abs() > tolerance {
            warnings.push(ValidationIssue::for_item(
                ValidationCode::PriceChanged,
                format!(
                    "regular price of {} changed from {} to {}",
                    snapshot.name, item.regular_price, snapshot.regular_price
                ),
                &item.key,
            ));
        }

        // Sale price checked independently, including presence transitions.
        let sale_drifted = match (item.sale_price, snapshot.sale_price) {
            (Some(then), Some(now)) => (then - now).abs() > tolerance,
            (None, None) => false,
            _ => true,
        };
        if sale_drifted {
            warnings.push(ValidationIssue::for_item(
                ValidationCode::PriceChanged,
                format!("sale price of {} changed since it was added", snapshot.name),
                &item.key,
            ));
        }
    }

    fn check_variation(
        item: &CartItem,
        snapshot: &ProductSnapshot,
        errors: &mut Vec<ValidationIssue>,
    ) {
        if !snapshot.is_variable {
            return;
        }
        let missing_variation = item.variation_id.is_none();
        let missing_attribute = snapshot.variation_attributes.iter().any(|attr| {
            attr.required
                && !item
                    .attributes
                    .iter()
                    .any(|(name, value)| name == &attr.name && !value.is_empty())
        });
        if missing_variation || missing_attribute {
            errors.push(ValidationIssue::for_item(
                ValidationCode::VariationNotFound,
                format!("{} requires a variation selection", snapshot.name),
                &item.key,
            ));
        }
    }

    fn check_cart_level(
        &self,
        cart: &Cart,
        errors: &mut Vec<ValidationIssue>,
        warnings: &mut Vec<ValidationIssue>,
    ) {
        if cart.items.len() > self.limits.max_items {
            errors.push(ValidationIssue::new(
                ValidationCode::MaxItemsExceeded,
                format!(
                    "cart holds {} distinct items (limit {})",
                    cart.items.len(),
                    self.limits.max_items
                ),
            ));
        }

        if cart.item_count >= self.limits.soft_quantity_ceiling {
            warnings.push(ValidationIssue::new(
                ValidationCode::QuantityCeiling,
                format!(
                    "total quantity {} approaching ceiling {}",
                    cart.item_count, self.limits.soft_quantity_ceiling
                ),
            ));
        }

        if cart.is_empty() {
            warnings.push(ValidationIssue::new(
                ValidationCode::EmptyCart,
                "cart is empty",
            ));
        }
    }

    fn check_coupons(
        &self,
        cart: &Cart,
        errors: &mut Vec<ValidationIssue>,
        warnings: &mut Vec<ValidationIssue>,
    ) {
        let now = chrono::Utc::now();
        let subtotal = cart.totals.subtotal;
        let coupon_count = cart.applied_coupons.len();

        for coupon in &cart.applied_coupons {
            if coupon.is_expired(now) {
                errors.push(ValidationIssue::new(
                    ValidationCode::CouponExpired,
                    format!("coupon {} has expired", coupon.code),
                ));
            }
            if coupon.is_usage_exhausted() {
                errors.push(ValidationIssue::new(
                    ValidationCode::CouponUsageLimit,
                    format!("coupon {} has reached its usage limit", coupon.code),
                ));
            }
            if let Some(minimum) = coupon.minimum_amount
                && subtotal < minimum
            {
                errors.push(ValidationIssue::new(
                    ValidationCode::CouponMinNotMet,
                    format!(
                        "coupon {} requires a minimum subtotal of {minimum}",
                        coupon.code
                    ),
                ));
            }
            if let Some(maximum) = coupon.maximum_amount
                && subtotal > maximum
            {
                warnings.push(ValidationIssue::new(
                    ValidationCode::CouponMaxExceeded,
                    format!(
                        "coupon {} is limited to subtotals up to {maximum}",
                        coupon.code
                    ),
                ));
            }
            if coupon.individual_use && coupon_count > 1 {
                errors.push(ValidationIssue::new(
                    ValidationCode::CouponIndividualUse,
                    format!("coupon {} cannot be combined with other coupons", coupon.code),
                ));
            }
        }
    }

    /// Guard against a stale snapshot being trusted blindly.
    fn check_totals(&self, cart: &Cart, warnings: &mut Vec<ValidationIssue>) {
        let recomputed = self.calculator.calculate(
            &cart.items,
            &cart.applied_coupons,
            &cart.shipping,
            &cart.fees,
        );
        let tolerance = one_cent();
        if !cart.totals.matches(&recomputed, tolerance) {
            warnings.push(ValidationIssue::new(
                ValidationCode::TotalsMismatch,
                format!(
                    "stored total {} differs from recomputed total {}",
                    cart.totals.total, recomputed.total
                ),
            ));
        }
    }
}

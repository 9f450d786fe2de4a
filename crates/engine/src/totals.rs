//! Pure totals calculation.
//!
//! [`TotalsCalculator::calculate`] turns a line-item list, applied
//! discounts, shipping selection, and fee lines into a tax-aware monetary
//! breakdown. No I/O, deterministic for a given configuration.

use rust_decimal::Decimal;

use cartkit_core::{AppliedCoupon, CartItem, DiscountType, FeeLine, ShippingSelection, Totals};

use crate::config::{RoundingMode, TaxConfig};

/// Computes cart totals from immutable inputs.
#[derive(Debug, Clone)]
pub struct TotalsCalculator {
    tax: TaxConfig,
    rounding: RoundingMode,
}

impl TotalsCalculator {
    /// Create a calculator for the given tax and rounding configuration.
    #[must_use]
    pub const fn new(tax: TaxConfig, rounding: RoundingMode) -> Self {
        Self { tax, rounding }
    }

    /// Compute the full breakdown.
    ///
    /// Steps: subtotal from line totals; tax backed out of (inclusive) or
    /// added to (exclusive) each amount; per-coupon discounts against the
    /// coupon-eligible subtotal; cart-contents total clamped at zero;
    /// shipping from the first selected method and fees with tax only when
    /// marked taxable; grand total adds tax only under exclusive pricing,
    /// since inclusive component sums already embed it.
    #[must_use]
    pub fn calculate(
        &self,
        items: &[CartItem],
        coupons: &[AppliedCoupon],
        shipping: &[ShippingSelection],
        fees: &[FeeLine],
    ) -> Totals {
        let subtotal: Decimal = items.iter().map(|item| self.line_amount(item)).sum();
        let subtotal_tax = self.tax_on(subtotal);

        let discount_total: Decimal = coupons
            .iter()
            .map(|coupon| self.coupon_discount(coupon, items))
            .sum();
        let discount_total = discount_total.min(subtotal);
        let discount_tax = self.tax_on(discount_total);

        let contents_total = (subtotal - discount_total).max(Decimal::ZERO);
        let contents_tax = (subtotal_tax - discount_tax).max(Decimal::ZERO);

        let (shipping_total, shipping_tax) = shipping
            .iter()
            .find(|method| method.selected)
            .map_or((Decimal::ZERO, Decimal::ZERO), |method| {
                let tax = if method.taxable {
                    self.tax_on(method.cost)
                } else {
                    Decimal::ZERO
                };
                (method.cost, tax)
            });

        let fee_total: Decimal = fees.iter().map(|fee| fee.amount).sum();
        let fee_tax: Decimal = fees
            .iter()
            .filter(|fee| fee.taxable)
            .map(|fee| self.tax_on(fee.amount))
            .sum();

        let total_tax = contents_tax + shipping_tax + fee_tax;
        // Inclusive component sums already embed their tax.
        let mut total = contents_total + shipping_total + fee_total;
        if !self.tax.prices_include_tax {
            total += total_tax;
        }

        self.rounded(Totals {
            subtotal,
            subtotal_tax,
            shipping_total,
            shipping_tax,
            discount_total,
            discount_tax,
            fee_total,
            fee_tax,
            total,
            total_tax,
        })
    }

    /// One line's contribution to the subtotal, rounded per line when the
    /// rounding mode asks for it.
    fn line_amount(&self, item: &CartItem) -> Decimal {
        let amount = item.price * Decimal::from(item.quantity);
        match self.rounding.line_precision() {
            Some(dp) => amount.round_dp(dp),
            None => amount,
        }
    }

    /// Tax carried by `amount` under the effective rate.
    fn tax_on(&self, amount: Decimal) -> Decimal {
        let rate = self.tax.effective_rate();
        if rate.is_zero() {
            return Decimal::ZERO;
        }
        if self.tax.prices_include_tax {
            amount * rate / (Decimal::ONE + rate)
        } else {
            amount * rate
        }
    }

    /// Discount a single coupon contributes, capped at the eligible subtotal.
    fn coupon_discount(&self, coupon: &AppliedCoupon, items: &[CartItem]) -> Decimal {
        let eligible: Vec<&CartItem> = items
            .iter()
            .filter(|item| coupon.applies_to(&item.product_id))
            .collect();
        let eligible_subtotal: Decimal =
            eligible.iter().map(|item| self.line_amount(item)).sum();

        match coupon.discount_type {
            DiscountType::FixedCart => coupon.amount.min(eligible_subtotal),
            DiscountType::Percent => {
                let discount = eligible_subtotal * coupon.amount / Decimal::ONE_HUNDRED;
                match coupon.maximum_discount {
                    Some(ceiling) => discount.min(ceiling),
                    None => discount,
                }
            }
            DiscountType::FixedProduct => {
                let units: Decimal = eligible
                    .iter()
                    .map(|item| Decimal::from(item.quantity))
                    .sum();
                (coupon.amount * units).min(eligible_subtotal)
            }
        }
    }

    /// Apply the configured output rounding to every monetary field.
    fn rounded(&self, totals: Totals) -> Totals {
        let dp = match self.rounding {
            RoundingMode::TotalsOnly => 2,
            RoundingMode::PerLine => 4,
        };
        Totals {
            subtotal: totals.subtotal.round_dp(dp),
            subtotal_tax: totals.subtotal_tax.round_dp(dp),
            shipping_total: totals.shipping_total.round_dp(dp),
            shipping_tax: totals.shipping_tax.round_dp(dp),
            discount_total: totals.discount_total.round_dp(dp),
            discount_tax: totals.discount_tax.round_dp(dp),
            fee_total: totals.fee_total.round_dp(dp),
            fee_tax: totals.fee_tax.round_dp(dp),
            total: totals.total.round_dp(dp),
            total_tax: totals.total_tax.round_dp(dp),
        }
    }
}

//! Integration tests for totals breakdowns under tax and coupon
//! configuration, exercised through the full engine.

use std::sync::Arc;

use rust_decimal_macros::dec;

use cartkit_engine::{
    AddItemRequest, CartEngine, EngineConfig, RoundingMode, TaxConfig,
};
use cartkit_integration_tests::fixtures::{
    FakeCatalog, FakeCoupons, fixed_cart_coupon, percent_coupon, product,
};

fn engine_with_tax(tax: TaxConfig) -> CartEngine {
    let catalog = FakeCatalog::with(vec![
        product("item-a", dec!(10.00)),
        product("item-b", dec!(25.00)),
    ]);
    let coupons = FakeCoupons::with(vec![
        fixed_cart_coupon("FLAT10", dec!(10.00)),
        fixed_cart_coupon("HUGE", dec!(500.00)),
        percent_coupon("TEN", dec!(10), None),
        percent_coupon("CAPPED", dec!(50), Some(dec!(5.00))),
    ]);

    CartEngine::builder(EngineConfig::builder().tax(tax).build())
        .catalog(Arc::new(catalog))
        .coupons(Arc::new(coupons))
        .build()
        .expect("engine wiring")
}

// =============================================================================
// Tax Modes
// =============================================================================

#[tokio::test]
async fn test_inclusive_tax_backs_out_of_total() {
    // 2 x 10.00 at 20% inclusive: subtotal holds the gross amount and
    // the tax component is 20.00 * 0.2 / 1.2 = 3.33.
    let tax = TaxConfig {
        prices_include_tax: true,
        customer_rate: Some(dec!(0.20)),
        ..TaxConfig::default()
    };
    let engine = engine_with_tax(tax);

    let cart = engine
        .add_item(AddItemRequest::simple("item-a", 2))
        .await
        .expect("add");

    assert_eq!(cart.totals.subtotal, dec!(20.00));
    assert_eq!(cart.totals.subtotal_tax, dec!(3.33));
    assert_eq!(cart.totals.total, dec!(20.00));
}

#[tokio::test]
async fn test_exclusive_tax_adds_on_top() {
    let tax = TaxConfig {
        prices_include_tax: false,
        customer_rate: Some(dec!(0.10)),
        ..TaxConfig::default()
    };
    let engine = engine_with_tax(tax);

    let cart = engine
        .add_item(AddItemRequest::simple("item-b", 2))
        .await
        .expect("add");

    assert_eq!(cart.totals.subtotal, dec!(50.00));
    assert_eq!(cart.totals.subtotal_tax, dec!(5.00));
    assert_eq!(cart.totals.total, dec!(55.00));
}

// =============================================================================
// Coupon Arithmetic
// =============================================================================

#[tokio::test]
async fn test_fixed_coupon_never_drives_total_negative() {
    let engine = engine_with_tax(TaxConfig::default());
    engine
        .add_item(AddItemRequest::simple("item-a", 1))
        .await
        .expect("add");

    let cart = engine.apply_coupon("HUGE").await.expect("apply");
    assert_eq!(cart.totals.discount_total, dec!(10.00));
    assert_eq!(cart.totals.total, dec!(0.00));
}

#[tokio::test]
async fn test_percent_coupon_with_cap() {
    let engine = engine_with_tax(TaxConfig::default());
    engine
        .add_item(AddItemRequest::simple("item-b", 2))
        .await
        .expect("add");

    // 50% of 50.00 would be 25.00; the cap holds it at 5.00.
    let cart = engine.apply_coupon("CAPPED").await.expect("apply");
    assert_eq!(cart.totals.discount_total, dec!(5.00));
    assert_eq!(cart.totals.total, dec!(45.00));
}

#[tokio::test]
async fn test_stacked_coupons_sum_their_discounts() {
    let engine = engine_with_tax(TaxConfig::default());
    engine
        .add_item(AddItemRequest::simple("item-b", 4))
        .await
        .expect("add");

    engine.apply_coupon("FLAT10").await.expect("first");
    let cart = engine.apply_coupon("TEN").await.expect("second");

    // 100.00 subtotal: 10.00 flat plus 10% of the subtotal.
    assert_eq!(cart.totals.discount_total, dec!(20.00));
    assert_eq!(cart.totals.total, dec!(80.00));
}

// =============================================================================
// Rounding
// =============================================================================

#[tokio::test]
async fn test_totals_round_to_currency_precision() {
    let tax = TaxConfig {
        prices_include_tax: false,
        customer_rate: Some(dec!(0.0725)),
        ..TaxConfig::default()
    };
    let catalog = FakeCatalog::with(vec![product("odd", dec!(19.99))]);
    let engine = CartEngine::builder(
        EngineConfig::builder()
            .tax(tax)
            .rounding(RoundingMode::TotalsOnly)
            .build(),
    )
    .catalog(Arc::new(catalog))
    .coupons(Arc::new(FakeCoupons::default()))
    .build()
    .expect("engine wiring");

    let cart = engine
        .add_item(AddItemRequest::simple("odd", 3))
        .await
        .expect("add");

    // 59.97 * 0.0725 = 4.347825, rounded half-even at two places.
    assert_eq!(cart.totals.subtotal, dec!(59.97));
    assert_eq!(cart.totals.subtotal_tax, dec!(4.35));
    assert_eq!(cart.totals.total, dec!(64.32));
}

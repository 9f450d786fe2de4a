//! Integration tests for Cartkit.
//!
//! # Test Categories
//!
//! - `cart_mutations` - mutation flow through the full engine
//! - `totals_scenarios` - totals breakdowns under tax and coupon config
//! - `sync_conflicts` - remote reconciliation and conflict resolution
//! - `offline_queue` - offline buffering and replay
//! - `persistence_roundtrip` - durable snapshot storage
//! - `validation_report` - cart validation against live catalog data
//!
//! The `fixtures` module provides the in-memory collaborator fakes the
//! test files share.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod fixtures {
    //! In-memory fakes for the engine's collaborator traits.

    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use cartkit_core::{Cart, CouponSnapshot, DiscountType, ProductSnapshot, StockStatus};
    use cartkit_engine::catalog::product_not_found;
    use cartkit_engine::{
        CatalogProvider, ConnectivityProbe, CouponProvider, EngineError, Identity,
        RemoteCartStore, Result,
    };

    /// A catalog backed by a mutable map, so tests can shift prices and
    /// stock between calls.
    #[derive(Default)]
    pub struct FakeCatalog {
        products: Mutex<HashMap<String, ProductSnapshot>>,
    }

    impl FakeCatalog {
        #[must_use]
        pub fn with(products: Vec<ProductSnapshot>) -> Self {
            let map = products
                .into_iter()
                .map(|snapshot| (snapshot.id.clone(), snapshot))
                .collect();
            Self {
                products: Mutex::new(map),
            }
        }

        /// Replace a product snapshot, simulating a catalog change.
        pub fn put(&self, snapshot: ProductSnapshot) {
            self.products
                .lock()
                .expect("catalog lock poisoned")
                .insert(snapshot.id.clone(), snapshot);
        }

        /// Drop a product, simulating removal from the catalog.
        pub fn remove(&self, product_id: &str) {
            self.products
                .lock()
                .expect("catalog lock poisoned")
                .remove(product_id);
        }
    }

    #[async_trait]
    impl CatalogProvider for FakeCatalog {
        async fn get_product(&self, product_id: &str) -> Result<ProductSnapshot> {
            self.products
                .lock()
                .expect("catalog lock poisoned")
                .get(product_id)
                .cloned()
                .ok_or_else(|| product_not_found(product_id))
        }
    }

    /// A coupon provider over a fixed map.
    #[derive(Default)]
    pub struct FakeCoupons {
        coupons: HashMap<String, CouponSnapshot>,
    }

    impl FakeCoupons {
        #[must_use]
        pub fn with(coupons: Vec<CouponSnapshot>) -> Self {
            Self {
                coupons: coupons
                    .into_iter()
                    .map(|snapshot| (snapshot.code.clone(), snapshot))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl CouponProvider for FakeCoupons {
        async fn get_coupon(&self, code: &str) -> Result<CouponSnapshot> {
            self.coupons
                .get(code)
                .cloned()
                .ok_or_else(|| EngineError::NotFound(format!("coupon not found: {code}")))
        }
    }

    /// A remote cart store holding at most one server-side cart.
    #[derive(Default)]
    pub struct FakeRemote {
        cart: Mutex<Option<Cart>>,
        fail_fetches: AtomicBool,
        fail_uploads: AtomicBool,
        uploads: AtomicU32,
    }

    impl FakeRemote {
        #[must_use]
        pub fn with_cart(cart: Cart) -> Self {
            Self {
                cart: Mutex::new(Some(cart)),
                ..Self::default()
            }
        }

        pub fn set_fail_fetches(&self, fail: bool) {
            self.fail_fetches.store(fail, Ordering::SeqCst);
        }

        pub fn set_fail_uploads(&self, fail: bool) {
            self.fail_uploads.store(fail, Ordering::SeqCst);
        }

        #[must_use]
        pub fn upload_count(&self) -> u32 {
            self.uploads.load(Ordering::SeqCst)
        }

        #[must_use]
        pub fn stored(&self) -> Option<Cart> {
            self.cart.lock().expect("remote lock poisoned").clone()
        }
    }

    #[async_trait]
    impl RemoteCartStore for FakeRemote {
        async fn fetch(&self, _identity: &Identity) -> Result<Option<Cart>> {
            if self.fail_fetches.load(Ordering::SeqCst) {
                return Err(EngineError::Transport("fetch refused".into()));
            }
            Ok(self.cart.lock().expect("remote lock poisoned").clone())
        }

        async fn upload(&self, _identity: &Identity, cart: &Cart) -> Result<()> {
            if self.fail_uploads.load(Ordering::SeqCst) {
                return Err(EngineError::Transport("upload refused".into()));
            }
            self.uploads.fetch_add(1, Ordering::SeqCst);
            *self.cart.lock().expect("remote lock poisoned") = Some(cart.clone());
            Ok(())
        }
    }

    /// A connectivity probe tests can flip at will.
    pub struct TogglingProbe {
        online: AtomicBool,
    }

    impl TogglingProbe {
        #[must_use]
        pub fn new(online: bool) -> Self {
            Self {
                online: AtomicBool::new(online),
            }
        }

        pub fn set_online(&self, online: bool) {
            self.online.store(online, Ordering::SeqCst);
        }
    }

    impl ConnectivityProbe for TogglingProbe {
        fn is_online(&self) -> bool {
            self.online.load(Ordering::SeqCst)
        }
    }

    /// An in-stock simple product at the given price.
    #[must_use]
    pub fn product(id: &str, price: Decimal) -> ProductSnapshot {
        ProductSnapshot {
            id: id.into(),
            name: format!("Product {id}"),
            published: true,
            price,
            regular_price: price,
            sale_price: None,
            stock_status: StockStatus::InStock,
            stock_quantity: Some(100),
            backorders_allowed: false,
            is_variable: false,
            variation_attributes: vec![],
            quantity_limits: None,
        }
    }

    /// A fixed-cart coupon with no restrictions.
    #[must_use]
    pub fn fixed_cart_coupon(code: &str, amount: Decimal) -> CouponSnapshot {
        CouponSnapshot {
            code: code.into(),
            discount_type: DiscountType::FixedCart,
            amount,
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

    /// A percentage coupon with an optional discount ceiling.
    #[must_use]
    pub fn percent_coupon(code: &str, percent: Decimal, cap: Option<Decimal>) -> CouponSnapshot {
        CouponSnapshot {
            discount_type: DiscountType::Percent,
            amount: percent,
            maximum_discount: cap,
            ..fixed_cart_coupon(code, dec!(0))
        }
    }
}

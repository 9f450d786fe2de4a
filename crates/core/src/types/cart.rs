//! The cart aggregate root and its line items.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::catalog::{ProductSnapshot, StockStatus};
use super::coupon::AppliedCoupon;
use super::key::ItemKey;
use super::totals::Totals;

/// Purchase quantity bounds attached to a line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityLimits {
    /// Minimum purchasable quantity.
    pub min: u32,
    /// Maximum purchasable quantity.
    pub max: u32,
    /// Quantity must advance from `min` in multiples of this step.
    pub step: u32,
}

impl QuantityLimits {
    /// Whether `quantity` satisfies these bounds.
    #[must_use]
    pub const fn allows(&self, quantity: u32) -> bool {
        if quantity < self.min || quantity > self.max {
            return false;
        }
        let step = if self.step == 0 { 1 } else { self.step };
        (quantity - self.min) % step == 0
    }
}

/// Stock state captured when the item was added to the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSnapshot {
    /// Stock status at add time.
    pub status: StockStatus,
    /// Managed stock quantity at add time, if stock is managed.
    pub quantity: Option<i64>,
    /// Whether backorders were allowed at add time.
    pub backorders_allowed: bool,
}

/// A selectable shipping method on the cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingSelection {
    /// Shipping method identifier.
    pub method_id: String,
    /// Display label.
    pub label: String,
    /// Cost of the method.
    pub cost: Decimal,
    /// Whether tax applies to this method.
    pub taxable: bool,
    /// Whether this method is the current selection.
    pub selected: bool,
}

/// An additional fee line (e.g. gift wrap, handling).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeLine {
    /// Fee identifier.
    pub id: String,
    /// Display label.
    pub label: String,
    /// Fee amount.
    pub amount: Decimal,
    /// Whether tax applies to this fee.
    pub taxable: bool,
}

/// A line item in the cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    /// Deterministic composite identity (see [`ItemKey`]).
    pub key: ItemKey,
    /// Product id.
    pub product_id: String,
    /// Variation id for variable products.
    pub variation_id: Option<String>,
    /// Positive purchase quantity.
    pub quantity: u32,
    /// Unit price the line is charged at.
    pub price: Decimal,
    /// Regular (non-sale) unit price at add time.
    pub regular_price: Decimal,
    /// Sale unit price at add time, if on sale.
    pub sale_price: Option<Decimal>,
    /// `price * quantity`, kept in lockstep with quantity changes.
    pub line_total: Decimal,
    /// Stock state captured at add time.
    pub stock: StockSnapshot,
    /// Quantity bounds, if the product declares any.
    pub limits: Option<QuantityLimits>,
    /// Selected attribute pairs (part of the item key).
    pub attributes: Vec<(String, String)>,
    /// Free-form metadata pairs (not part of the item key).
    pub metadata: Vec<(String, String)>,
    /// When the line was added.
    pub added_at: DateTime<Utc>,
    /// When the line was last modified.
    pub updated_at: DateTime<Utc>,
}

impl CartItem {
    /// Build a line item from a catalog snapshot and an add request.
    #[must_use]
    pub fn from_snapshot(
        snapshot: &ProductSnapshot,
        variation_id: Option<String>,
        quantity: u32,
        attributes: Vec<(String, String)>,
        now: DateTime<Utc>,
    ) -> Self {
        let key = ItemKey::derive(&snapshot.id, variation_id.as_deref(), &attributes);
        Self {
            key,
            product_id: snapshot.id.clone(),
            variation_id,
            quantity,
            price: snapshot.price,
            regular_price: snapshot.regular_price,
            sale_price: snapshot.sale_price,
            line_total: snapshot.price * Decimal::from(quantity),
            stock: StockSnapshot {
                status: snapshot.stock_status,
                quantity: snapshot.stock_quantity,
                backorders_allowed: snapshot.backorders_allowed,
            },
            limits: snapshot.quantity_limits,
            attributes,
            metadata: Vec::new(),
            added_at: now,
            updated_at: now,
        }
    }

    /// Set the quantity, keeping `line_total` in lockstep.
    pub fn set_quantity(&mut self, quantity: u32, now: DateTime<Utc>) {
        self.quantity = quantity;
        self.line_total = self.price * Decimal::from(quantity);
        self.updated_at = now;
    }
}

/// The cart aggregate root.
///
/// Item order is insertion order and is meaningful for display. The
/// `item_count` field is kept equal to the sum of line quantities and
/// `totals` is recomputed after every mutation; neither is ever edited
/// directly by callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    /// Line items in insertion order.
    pub items: Vec<CartItem>,
    /// Sum of line quantities.
    pub item_count: u32,
    /// Derived monetary breakdown.
    pub totals: Totals,
    /// Applied discount codes.
    pub applied_coupons: Vec<AppliedCoupon>,
    /// Available/selected shipping methods.
    pub shipping: Vec<ShippingSelection>,
    /// Additional fee lines.
    pub fees: Vec<FeeLine>,
    /// ISO 4217 currency code for display.
    pub currency: String,
    /// Whether stored unit prices already embed tax.
    pub prices_include_tax: bool,
    /// Owning session identifier.
    pub session_id: String,
    /// Authenticated customer identifier, once known.
    pub customer_id: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
    /// Expiry timestamp, if the cart expires.
    pub expires_at: Option<DateTime<Utc>>,
    /// When the cart last completed a successful sync.
    pub last_sync_at: Option<DateTime<Utc>>,
}

impl Cart {
    /// Create an empty cart owned by `session_id`.
    #[must_use]
    pub fn new(session_id: impl Into<String>, currency: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            items: Vec::new(),
            item_count: 0,
            totals: Totals::default(),
            applied_coupons: Vec::new(),
            shipping: Vec::new(),
            fees: Vec::new(),
            currency: currency.into(),
            prices_include_tax: false,
            session_id: session_id.into(),
            customer_id: None,
            created_at: now,
            updated_at: now,
            expires_at: None,
            last_sync_at: None,
        }
    }

    /// Whether the cart holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Find a line by its item key.
    #[must_use]
    pub fn find_item(&self, key: &ItemKey) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.key == key)
    }

    /// Find a line by its item key, mutably.
    pub fn find_item_mut(&mut self, key: &ItemKey) -> Option<&mut CartItem> {
        self.items.iter_mut().find(|item| &item.key == key)
    }

    /// Recompute `item_count` from the lines and stamp `updated_at`.
    ///
    /// Called after every structural change so the count invariant never
    /// drifts from the line quantities.
    pub fn refresh_counts(&mut self, now: DateTime<Utc>) {
        self.item_count = self.items.iter().map(|item| item.quantity).sum();
        self.updated_at = now;
    }

    /// The currently selected shipping method, if any.
    ///
    /// First selection wins when multiple methods are flagged selected.
    #[must_use]
    pub fn selected_shipping(&self) -> Option<&ShippingSelection> {
        self.shipping.iter().find(|method| method.selected)
    }
}

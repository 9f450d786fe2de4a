//! Engine configuration.
//!
//! Configuration is a fully-resolved, immutable value produced by a builder
//! over defaults. Builder methods override individual fields; the defaults
//! themselves are never mutated in place.

use std::collections::HashMap;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::sync::ResolutionStrategy;

/// Where configured monetary outputs get rounded.
///
/// The choice changes results by fractions of a cent and is preserved
/// exactly for reproducibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoundingMode {
    /// Round to 2 decimal places at final-total granularity.
    #[default]
    TotalsOnly,
    /// Round each line to 4 decimal places before summation.
    PerLine,
}

impl RoundingMode {
    /// Decimal places applied at line granularity, if any.
    #[must_use]
    pub const fn line_precision(self) -> Option<u32> {
        match self {
            Self::TotalsOnly => None,
            Self::PerLine => Some(4),
        }
    }
}

/// Tax resolution settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TaxConfig {
    /// Whether stored unit prices already embed tax.
    pub prices_include_tax: bool,
    /// Explicit rate for the current customer, when known.
    pub customer_rate: Option<Decimal>,
    /// Default rates per ISO country code.
    pub country_rates: HashMap<String, Decimal>,
    /// Country used to look up `country_rates`.
    pub customer_country: Option<String>,
    /// Rate used when no other source resolves.
    pub fallback_rate: Decimal,
}

impl Default for TaxConfig {
    fn default() -> Self {
        Self {
            prices_include_tax: false,
            customer_rate: None,
            country_rates: HashMap::new(),
            customer_country: None,
            fallback_rate: Decimal::ZERO,
        }
    }
}

impl TaxConfig {
    /// Resolve the effective tax rate: explicit customer rate, else the
    /// per-country default table, else the global fallback.
    #[must_use]
    pub fn effective_rate(&self) -> Decimal {
        if let Some(rate) = self.customer_rate {
            return rate;
        }
        if let Some(country) = &self.customer_country
            && let Some(rate) = self.country_rates.get(country)
        {
            return *rate;
        }
        self.fallback_rate
    }
}

/// Cart size ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitsConfig {
    /// Maximum number of distinct lines.
    pub max_items: usize,
    /// Maximum quantity on a single line.
    pub max_quantity_per_item: u32,
    /// Total-quantity level that triggers a soft warning.
    pub soft_quantity_ceiling: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_items: 100,
            max_quantity_per_item: 999,
            soft_quantity_ceiling: 500,
        }
    }
}

/// Synchronization settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Conflict resolution strategy.
    pub strategy: ResolutionStrategy,
    /// Background sync interval.
    pub interval: Duration,
    /// Offline queue capacity (oldest entries dropped beyond this).
    pub queue_capacity: usize,
    /// Replay attempts before a queued action is discarded.
    pub max_retries: u32,
    /// Whether coupons present only remotely are treated as removed.
    ///
    /// The reference behavior counts them without escalating a blocking
    /// conflict; kept configurable rather than silently changed.
    pub treat_remote_only_coupons_as_removed: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            strategy: ResolutionStrategy::MergeSmart,
            interval: Duration::from_secs(300),
            queue_capacity: 64,
            max_retries: 3,
            treat_remote_only_coupons_as_removed: true,
        }
    }
}

/// Fully-resolved engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Tax resolution settings.
    pub tax: TaxConfig,
    /// Monetary rounding mode.
    pub rounding: RoundingMode,
    /// Cart size ceilings.
    pub limits: LimitsConfig,
    /// Synchronization settings.
    pub sync: SyncConfig,
    /// Storage key for the persisted cart document.
    pub cart_key: String,
    /// ISO 4217 currency code for new carts.
    pub currency: String,
}

impl EngineConfig {
    /// Start building a configuration over defaults.
    #[must_use]
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }
}

/// Builder producing an immutable [`EngineConfig`].
#[derive(Debug, Clone)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tax: TaxConfig::default(),
            rounding: RoundingMode::default(),
            limits: LimitsConfig::default(),
            sync: SyncConfig::default(),
            cart_key: "cartkit:cart".to_string(),
            currency: "USD".to_string(),
        }
    }
}

impl Default for EngineConfigBuilder {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }
}

impl EngineConfigBuilder {
    /// Override the tax settings.
    #[must_use]
    pub fn tax(mut self, tax: TaxConfig) -> Self {
        self.config.tax = tax;
        self
    }

    /// Override the rounding mode.
    #[must_use]
    pub const fn rounding(mut self, rounding: RoundingMode) -> Self {
        self.config.rounding = rounding;
        self
    }

    /// Override the cart size ceilings.
    #[must_use]
    pub const fn limits(mut self, limits: LimitsConfig) -> Self {
        self.config.limits = limits;
        self
    }

    /// Override the sync settings.
    #[must_use]
    pub fn sync(mut self, sync: SyncConfig) -> Self {
        self.config.sync = sync;
        self
    }

    /// Override the conflict resolution strategy only.
    #[must_use]
    pub const fn resolution_strategy(mut self, strategy: ResolutionStrategy) -> Self {
        self.config.sync.strategy = strategy;
        self
    }

    /// Override the storage key for the persisted cart.
    #[must_use]
    pub fn cart_key(mut self, key: impl Into<String>) -> Self {
        self.config.cart_key = key.into();
        self
    }

    /// Override the currency code for new carts.
    #[must_use]
    pub fn currency(mut self, currency: impl Into<String>) -> Self {
        self.config.currency = currency.into();
        self
    }

    /// Produce the resolved configuration.
    #[must_use]
    pub fn build(self) -> EngineConfig {
        self.config
    }
}

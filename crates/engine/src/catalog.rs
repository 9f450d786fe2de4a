//! Collaborator seams consumed by the engine.
//!
//! The transport layer, catalog providers, and remote cart store live
//! outside this crate; the engine consumes them through these narrow
//! traits. [`CachedCatalog`] adds short-TTL memoization over a catalog
//! provider so validation passes do not refetch the same product per item.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tracing::debug;

use cartkit_core::{Cart, CouponSnapshot, ProductSnapshot};

use crate::error::{EngineError, Result};

/// Who is driving the engine right now.
///
/// Supplied by an external auth collaborator. Sync treats a missing
/// authentication as a hard precondition failure, not a retryable error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Whether the user has authenticated.
    pub is_authenticated: bool,
    /// Authenticated customer id, once known.
    pub user_id: Option<String>,
    /// Session identifier (always present).
    pub session_id: String,
}

impl Identity {
    /// An anonymous session.
    #[must_use]
    pub fn anonymous(session_id: impl Into<String>) -> Self {
        Self {
            is_authenticated: false,
            user_id: None,
            session_id: session_id.into(),
        }
    }

    /// An authenticated customer.
    #[must_use]
    pub fn authenticated(user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            is_authenticated: true,
            user_id: Some(user_id.into()),
            session_id: session_id.into(),
        }
    }
}

/// Live product data lookup.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Fetch the current snapshot for a product.
    ///
    /// # Errors
    ///
    /// `NotFound` when the product does not exist; `Transport` when the
    /// lookup's own retries are exhausted.
    async fn get_product(&self, product_id: &str) -> Result<ProductSnapshot>;
}

/// Live coupon data lookup.
#[async_trait]
pub trait CouponProvider: Send + Sync {
    /// Fetch the current snapshot for a coupon code.
    ///
    /// # Errors
    ///
    /// `NotFound` when the code does not exist; `Transport` on exhausted
    /// retries.
    async fn get_coupon(&self, code: &str) -> Result<CouponSnapshot>;
}

/// Remote cart storage for an authenticated identity.
#[async_trait]
pub trait RemoteCartStore: Send + Sync {
    /// Fetch the remote cart, `None` when the identity has none yet.
    ///
    /// # Errors
    ///
    /// `Transport` on network failure.
    async fn fetch(&self, identity: &Identity) -> Result<Option<Cart>>;

    /// Upload a cart for the identity, replacing any previous copy.
    ///
    /// # Errors
    ///
    /// `Transport` on network failure or server rejection.
    async fn upload(&self, identity: &Identity, cart: &Cart) -> Result<()>;
}

/// Connectivity detection seam for the offline queue.
pub trait ConnectivityProbe: Send + Sync {
    /// Whether the network is currently reachable.
    fn is_online(&self) -> bool;
}

/// Probe that always reports online; the default for hosts that do not
/// track connectivity themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

impl ConnectivityProbe for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }
}

/// Short-TTL memoizing wrapper over a [`CatalogProvider`].
///
/// A validation pass touches every item in the cart; without memoization a
/// cart with five lines of the same product would fetch it five times.
#[derive(Clone)]
pub struct CachedCatalog {
    provider: Arc<dyn CatalogProvider>,
    cache: Cache<String, ProductSnapshot>,
}

impl CachedCatalog {
    /// Wrap `provider` with a cache of `capacity` entries and `ttl` expiry.
    #[must_use]
    pub fn new(provider: Arc<dyn CatalogProvider>, capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();
        Self { provider, cache }
    }

    /// Drop all cached snapshots.
    pub async fn invalidate_all(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }
}

#[async_trait]
impl CatalogProvider for CachedCatalog {
    async fn get_product(&self, product_id: &str) -> Result<ProductSnapshot> {
        if let Some(snapshot) = self.cache.get(product_id).await {
            debug!(product_id, "catalog cache hit");
            return Ok(snapshot);
        }
        let snapshot = self.provider.get_product(product_id).await?;
        self.cache
            .insert(product_id.to_string(), snapshot.clone())
            .await;
        Ok(snapshot)
    }
}

/// Convenience constructor for a `NotFound` product error.
#[must_use]
pub fn product_not_found(product_id: &str) -> EngineError {
    EngineError::NotFound(format!("product not found: {product_id}"))
}

//! The cart engine orchestrator.
//!
//! Owns the in-memory cart snapshot (single-writer), exposes the mutation
//! API, and delegates to the totals calculator, persistence store,
//! validation engine, and sync engine. Every successful mutation recomputes
//! totals and persists the new snapshot before returning it.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use cartkit_core::{Cart, CartItem, ItemKey, QueuedAction};

use crate::catalog::{
    AlwaysOnline, CatalogProvider, ConnectivityProbe, CouponProvider, Identity, RemoteCartStore,
};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::persistence::{CartStore, MemoryStore};
use crate::sync::{OfflineQueue, SyncEngine, SyncObserver, SyncState};
use crate::totals::TotalsCalculator;
use crate::validation::{ValidationEngine, ValidationReport};

/// A request to add a product to the cart.
#[derive(Debug, Clone)]
pub struct AddItemRequest {
    /// Product id.
    pub product_id: String,
    /// Variation id for variable products.
    pub variation_id: Option<String>,
    /// Quantity to add (must be positive).
    pub quantity: u32,
    /// Selected attribute pairs (part of the item key).
    pub attributes: Vec<(String, String)>,
    /// Replace an existing line with the same key instead of increasing
    /// its quantity.
    pub replace: bool,
}

impl AddItemRequest {
    /// A simple-product add with no attributes.
    #[must_use]
    pub fn simple(product_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            variation_id: None,
            quantity,
            attributes: Vec::new(),
            replace: false,
        }
    }
}

struct Inner {
    config: EngineConfig,
    catalog: Arc<dyn CatalogProvider>,
    coupons: Arc<dyn CouponProvider>,
    store: Arc<dyn CartStore>,
    connectivity: Arc<dyn ConnectivityProbe>,
    calculator: TotalsCalculator,
    validator: ValidationEngine,
    sync: Option<Arc<SyncEngine>>,
    cart: tokio::sync::Mutex<Option<Cart>>,
    queue: Mutex<OfflineQueue>,
    identity: Mutex<Identity>,
    background: Mutex<Option<JoinHandle<()>>>,
}

/// The cart domain engine.
///
/// Cheap to clone; all clones share the same snapshot and configuration.
#[derive(Clone)]
pub struct CartEngine {
    inner: Arc<Inner>,
}

/// Builder wiring collaborators into a [`CartEngine`].
pub struct CartEngineBuilder {
    config: EngineConfig,
    catalog: Option<Arc<dyn CatalogProvider>>,
    coupons: Option<Arc<dyn CouponProvider>>,
    store: Option<Arc<dyn CartStore>>,
    remote: Option<Arc<dyn RemoteCartStore>>,
    connectivity: Arc<dyn ConnectivityProbe>,
    identity: Option<Identity>,
}

impl CartEngineBuilder {
    fn new(config: EngineConfig) -> Self {
        Self {
            config,
            catalog: None,
            coupons: None,
            store: None,
            remote: None,
            connectivity: Arc::new(AlwaysOnline),
            identity: None,
        }
    }

    /// Wire the catalog lookup collaborator.
    #[must_use]
    pub fn catalog(mut self, catalog: Arc<dyn CatalogProvider>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Wire the coupon lookup collaborator.
    #[must_use]
    pub fn coupons(mut self, coupons: Arc<dyn CouponProvider>) -> Self {
        self.coupons = Some(coupons);
        self
    }

    /// Wire the persistence strategy. Defaults to [`MemoryStore`].
    #[must_use]
    pub fn store(mut self, store: Arc<dyn CartStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Wire the remote cart store, enabling sync.
    #[must_use]
    pub fn remote(mut self, remote: Arc<dyn RemoteCartStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Wire a connectivity probe. Defaults to always-online.
    #[must_use]
    pub fn connectivity(mut self, probe: Arc<dyn ConnectivityProbe>) -> Self {
        self.connectivity = probe;
        self
    }

    /// Set the initial identity. Defaults to a fresh anonymous session.
    #[must_use]
    pub fn identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Build the engine.
    ///
    /// # Errors
    ///
    /// `Validation` when the catalog or coupon collaborator is missing.
    pub fn build(self) -> Result<CartEngine> {
        let catalog = self.catalog.ok_or_else(|| {
            EngineError::validation("MISSING_COLLABORATOR", "catalog provider is required")
        })?;
        let coupons = self.coupons.ok_or_else(|| {
            EngineError::validation("MISSING_COLLABORATOR", "coupon provider is required")
        })?;
        let store: Arc<dyn CartStore> = self.store.unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let identity = self
            .identity
            .unwrap_or_else(|| Identity::anonymous(uuid::Uuid::new_v4().to_string()));

        let calculator =
            TotalsCalculator::new(self.config.tax.clone(), self.config.rounding);
        let validator = ValidationEngine::new(self.config.limits, calculator.clone());
        let sync = self.remote.map(|remote| {
            Arc::new(SyncEngine::new(
                remote,
                self.config.sync.clone(),
                calculator.clone(),
            ))
        });
        let queue = OfflineQueue::new(
            self.config.sync.queue_capacity,
            self.config.sync.max_retries,
        );

        Ok(CartEngine {
            inner: Arc::new(Inner {
                config: self.config,
                catalog,
                coupons,
                store,
                connectivity: self.connectivity,
                calculator,
                validator,
                sync,
                cart: tokio::sync::Mutex::new(None),
                queue: Mutex::new(queue),
                identity: Mutex::new(identity),
                background: Mutex::new(None),
            }),
        })
    }
}

impl CartEngine {
    /// Start building an engine with the given configuration.
    #[must_use]
    pub fn builder(config: EngineConfig) -> CartEngineBuilder {
        CartEngineBuilder::new(config)
    }

    /// The current identity driving the engine.
    ///
    /// # Panics
    ///
    /// Panics if the identity lock is poisoned, which only happens after
    /// a panic while holding it.
    #[must_use]
    pub fn identity(&self) -> Identity {
        self.inner
            .identity
            .lock()
            .expect("identity lock poisoned")
            .clone()
    }

    /// Replace the identity, e.g. after the session authenticates.
    ///
    /// # Panics
    ///
    /// Panics if the identity lock is poisoned.
    pub fn set_identity(&self, identity: Identity) {
        *self
            .inner
            .identity
            .lock()
            .expect("identity lock poisoned") = identity;
    }

    /// The current cart snapshot, loading or creating it on first use.
    ///
    /// # Errors
    ///
    /// `Shape` when a stored document fails the shape check.
    pub async fn get_cart(&self) -> Result<Cart> {
        let mut guard = self.inner.cart.lock().await;
        Ok(self.load_or_create(&mut guard).await?.clone())
    }

    /// Add a product to the cart.
    ///
    /// If a line with the same item key exists, its quantity is increased
    /// (or the line replaced when `replace` is set). Size ceilings are
    /// enforced before the mutation is committed. While offline, the
    /// action is buffered for later replay instead.
    ///
    /// # Errors
    ///
    /// `Validation` for ceiling or quantity violations, `NotFound` for an
    /// unknown product, `Transport` when the catalog lookup fails.
    #[instrument(skip(self, request), fields(product_id = %request.product_id, quantity = request.quantity))]
    pub async fn add_item(&self, request: AddItemRequest) -> Result<Cart> {
        if request.quantity == 0 {
            return Err(EngineError::validation(
                "INVALID_QUANTITY",
                "quantity must be positive",
            ));
        }

        if !self.inner.connectivity.is_online() {
            return self
                .buffer_offline(QueuedAction::AddItem {
                    product_id: request.product_id.clone(),
                    variation_id: request.variation_id.clone(),
                    quantity: request.quantity,
                    attributes: request.attributes.clone(),
                    replace: request.replace,
                })
                .await;
        }

        let snapshot = self.inner.catalog.get_product(&request.product_id).await?;
        if !snapshot.published {
            return Err(crate::catalog::product_not_found(&request.product_id));
        }

        let mut guard = self.inner.cart.lock().await;
        let cart = self.load_or_create(&mut guard).await?;
        let now = chrono::Utc::now();
        let key = ItemKey::derive(
            &snapshot.id,
            request.variation_id.as_deref(),
            &request.attributes,
        );

        let max_quantity = self.inner.config.limits.max_quantity_per_item;
        let check_quantity = |quantity: u32| -> Result<()> {
            if quantity > max_quantity {
                return Err(EngineError::validation(
                    "INVALID_QUANTITY",
                    format!("quantity exceeds the per-item maximum of {max_quantity}"),
                ));
            }
            if let Some(limits) = snapshot.quantity_limits
                && !limits.allows(quantity)
            {
                return Err(EngineError::validation(
                    "INVALID_QUANTITY",
                    format!(
                        "quantity {quantity} violates limits (min {}, max {}, step {})",
                        limits.min, limits.max, limits.step
                    ),
                ));
            }
            Ok(())
        };
        match cart.find_item_mut(&key) {
            Some(existing) if request.replace => {
                check_quantity(request.quantity)?;
                existing.set_quantity(request.quantity, now);
            }
            Some(existing) => {
                let combined = existing.quantity.saturating_add(request.quantity);
                check_quantity(combined)?;
                existing.set_quantity(combined, now);
            }
            None => {
                if cart.items.len() >= self.inner.config.limits.max_items {
                    return Err(EngineError::validation(
                        "MAX_ITEMS_EXCEEDED",
                        format!(
                            "cart is limited to {} distinct items",
                            self.inner.config.limits.max_items
                        ),
                    ));
                }
                check_quantity(request.quantity)?;
                cart.items.push(CartItem::from_snapshot(
                    &snapshot,
                    request.variation_id,
                    request.quantity,
                    request.attributes,
                    now,
                ));
            }
        }

        self.commit(cart).await;
        Ok(cart.clone())
    }

    /// Set the quantity of an existing line; zero removes it.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown item key, `Validation` for quantity
    /// violations.
    #[instrument(skip(self), fields(key = %key, quantity))]
    pub async fn update_item(&self, key: &ItemKey, quantity: u32) -> Result<Cart> {
        if quantity == 0 {
            return self.remove_item(key).await;
        }

        if !self.inner.connectivity.is_online() {
            return self
                .buffer_offline(QueuedAction::UpdateItem {
                    key: key.clone(),
                    quantity,
                })
                .await;
        }

        let mut guard = self.inner.cart.lock().await;
        let cart = self.load_or_create(&mut guard).await?;
        let max_quantity = self.inner.config.limits.max_quantity_per_item;
        if quantity > max_quantity {
            return Err(EngineError::validation(
                "INVALID_QUANTITY",
                format!("quantity exceeds the per-item maximum of {max_quantity}"),
            ));
        }

        let now = chrono::Utc::now();
        let item = cart
            .find_item_mut(key)
            .ok_or_else(|| EngineError::NotFound(format!("cart item not found: {key}")))?;
        if let Some(limits) = item.limits
            && !limits.allows(quantity)
        {
            return Err(EngineError::validation(
                "INVALID_QUANTITY",
                format!(
                    "quantity {quantity} violates limits (min {}, max {}, step {})",
                    limits.min, limits.max, limits.step
                ),
            ));
        }
        item.set_quantity(quantity, now);

        self.commit(cart).await;
        Ok(cart.clone())
    }

    /// Remove a line from the cart.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown item key.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn remove_item(&self, key: &ItemKey) -> Result<Cart> {
        if !self.inner.connectivity.is_online() {
            return self
                .buffer_offline(QueuedAction::RemoveItem { key: key.clone() })
                .await;
        }

        let mut guard = self.inner.cart.lock().await;
        let cart = self.load_or_create(&mut guard).await?;
        let before = cart.items.len();
        cart.items.retain(|item| &item.key != key);
        if cart.items.len() == before {
            return Err(EngineError::NotFound(format!("cart item not found: {key}")));
        }

        self.commit(cart).await;
        Ok(cart.clone())
    }

    /// Empty the cart, dropping items, coupons, and fees.
    ///
    /// # Errors
    ///
    /// `Shape` when the stored snapshot fails the shape check on lazy load.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> Result<Cart> {
        if !self.inner.connectivity.is_online() {
            return self.buffer_offline(QueuedAction::Clear).await;
        }

        let mut guard = self.inner.cart.lock().await;
        let cart = self.load_or_create(&mut guard).await?;
        cart.items.clear();
        cart.applied_coupons.clear();
        cart.fees.clear();

        self.commit(cart).await;
        Ok(cart.clone())
    }

    /// Apply a discount code.
    ///
    /// Eligibility is re-validated against live coupon data immediately
    /// before attaching; a previously cached validity is never trusted.
    ///
    /// # Errors
    ///
    /// `Validation` when the coupon is ineligible (expired, usage limit,
    /// minimum not met, individual-use conflict, no eligible items);
    /// `NotFound` for an unknown code. The applied-coupons list is not
    /// mutated on failure.
    #[instrument(skip(self), fields(code = %code))]
    pub async fn apply_coupon(&self, code: &str) -> Result<Cart> {
        if !self.inner.connectivity.is_online() {
            return self
                .buffer_offline(QueuedAction::ApplyCoupon { code: code.into() })
                .await;
        }

        let snapshot = self.inner.coupons.get_coupon(code).await?;

        let mut guard = self.inner.cart.lock().await;
        let cart = self.load_or_create(&mut guard).await?;
        let now = chrono::Utc::now();

        if cart
            .applied_coupons
            .iter()
            .any(|coupon| coupon.code.eq_ignore_ascii_case(code))
        {
            return Err(EngineError::validation(
                "COUPON_ALREADY_APPLIED",
                format!("coupon {code} is already applied"),
            ));
        }

        let candidate: cartkit_core::AppliedCoupon = snapshot.into();
        if candidate.is_expired(now) {
            return Err(EngineError::validation(
                "COUPON_EXPIRED",
                format!("coupon {code} has expired"),
            ));
        }
        if candidate.is_usage_exhausted() {
            return Err(EngineError::validation(
                "COUPON_USAGE_LIMIT",
                format!("coupon {code} has reached its usage limit"),
            ));
        }
        if let Some(minimum) = candidate.minimum_amount
            && cart.totals.subtotal < minimum
        {
            return Err(EngineError::validation(
                "COUPON_MIN_NOT_MET",
                format!("coupon {code} requires a minimum subtotal of {minimum}"),
            ));
        }
        if let Some(maximum) = candidate.maximum_amount
            && cart.totals.subtotal > maximum
        {
            return Err(EngineError::validation(
                "COUPON_MAX_EXCEEDED",
                format!("coupon {code} is limited to subtotals up to {maximum}"),
            ));
        }
        let individual_conflict = (candidate.individual_use && !cart.applied_coupons.is_empty())
            || cart.applied_coupons.iter().any(|c| c.individual_use);
        if individual_conflict {
            return Err(EngineError::validation(
                "COUPON_INDIVIDUAL_USE",
                format!("coupon {code} cannot be combined with other coupons"),
            ));
        }
        if !cart.is_empty()
            && !cart
                .items
                .iter()
                .any(|item| candidate.applies_to(&item.product_id))
        {
            return Err(EngineError::validation(
                "COUPON_NOT_APPLICABLE",
                format!("coupon {code} does not apply to any item in the cart"),
            ));
        }

        cart.applied_coupons.push(candidate);
        self.commit(cart).await;
        Ok(cart.clone())
    }

    /// Remove an applied discount code.
    ///
    /// # Errors
    ///
    /// `NotFound` when the code is not applied.
    #[instrument(skip(self), fields(code = %code))]
    pub async fn remove_coupon(&self, code: &str) -> Result<Cart> {
        if !self.inner.connectivity.is_online() {
            return self
                .buffer_offline(QueuedAction::RemoveCoupon { code: code.into() })
                .await;
        }

        let mut guard = self.inner.cart.lock().await;
        let cart = self.load_or_create(&mut guard).await?;
        let before = cart.applied_coupons.len();
        cart.applied_coupons
            .retain(|coupon| !coupon.code.eq_ignore_ascii_case(code));
        if cart.applied_coupons.len() == before {
            return Err(EngineError::NotFound(format!("coupon not applied: {code}")));
        }

        self.commit(cart).await;
        Ok(cart.clone())
    }

    /// Validate the current snapshot against live catalog data.
    ///
    /// # Errors
    ///
    /// `Transport` when a catalog lookup fails outright.
    pub async fn validate_cart(&self) -> Result<ValidationReport> {
        let cart = self.get_cart().await?;
        self.inner
            .validator
            .validate(&cart, self.inner.catalog.as_ref())
            .await
    }

    /// Reconcile with the remote cart store and adopt the merged result.
    ///
    /// # Errors
    ///
    /// `Sync` when no remote store is wired, `Auth` when the identity is
    /// anonymous, `Busy` when a sync is already in flight, `Transport` on
    /// remote failure. The local snapshot is untouched on error.
    #[instrument(skip(self))]
    pub async fn sync_with_server(&self) -> Result<Cart> {
        let sync = self.sync_engine()?;
        let identity = self.identity();
        let local = self.get_cart().await?;

        let outcome = sync.sync(&local, &identity).await?;
        info!(
            conflicts = outcome.conflicts.len(),
            coupons_removed = outcome.coupons_removed,
            "sync completed, adopting merged cart"
        );

        let mut guard = self.inner.cart.lock().await;
        *guard = Some(outcome.cart.clone());
        if let Err(error) = self.inner.store.save(&outcome.cart).await {
            warn!(%error, "failed to persist merged cart; continuing in memory");
        }
        Ok(outcome.cart)
    }

    /// Current sync engine state, `Idle` when sync is not wired.
    #[must_use]
    pub fn sync_state(&self) -> SyncState {
        self.inner
            .sync
            .as_ref()
            .map_or(SyncState::Idle, |sync| sync.state())
    }

    /// Register a sync event handler.
    ///
    /// # Errors
    ///
    /// `Sync` when no remote store is wired.
    pub fn add_sync_event_handler(&self, handler: SyncObserver) -> Result<()> {
        self.sync_engine()?.add_observer(handler);
        Ok(())
    }

    /// Start the background sync timer at the configured interval.
    ///
    /// Enabling twice replaces the previous timer. The timer is started
    /// and stopped independently of individual sync calls.
    ///
    /// # Errors
    ///
    /// `Sync` when no remote store is wired.
    ///
    /// # Panics
    ///
    /// Panics if the timer handle lock is poisoned.
    pub fn enable_sync(&self) -> Result<()> {
        self.sync_engine()?;
        let interval = self.inner.config.sync.interval;
        let engine = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(10)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await; // First tick fires immediately; skip it.
            loop {
                ticker.tick().await;
                match engine.sync_with_server().await {
                    Ok(_) => debug!("background sync pass completed"),
                    Err(EngineError::Busy) => debug!("background sync skipped, already in flight"),
                    Err(error) => warn!(%error, "background sync pass failed"),
                }
            }
        });

        let mut slot = self
            .inner
            .background
            .lock()
            .expect("background lock poisoned");
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
        Ok(())
    }

    /// Stop the background sync timer, releasing its task handle.
    ///
    /// # Panics
    ///
    /// Panics if the timer handle lock is poisoned.
    pub fn disable_sync(&self) {
        let mut slot = self
            .inner
            .background
            .lock()
            .expect("background lock poisoned");
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }

    /// Replay buffered offline actions.
    ///
    /// Entries that fail with a retryable error are requeued with their
    /// retry counter incremented and dropped once the configured maximum
    /// is exceeded; non-retryable failures are discarded immediately.
    ///
    /// Returns the number of actions applied successfully.
    ///
    /// # Errors
    ///
    /// Returns `Ok` even when individual entries fail; only a failure to
    /// read the snapshot surfaces as `Err`.
    ///
    /// # Panics
    ///
    /// Panics if the queue lock is poisoned.
    #[instrument(skip(self))]
    pub async fn process_offline_queue(&self) -> Result<usize> {
        if !self.inner.connectivity.is_online() {
            debug!("still offline, leaving queue untouched");
            return Ok(0);
        }

        let entries = {
            let mut queue = self.inner.queue.lock().expect("queue lock poisoned");
            queue.drain()
        };
        let mut applied = 0;

        for entry in entries {
            // Connectivity can drop mid-replay; replaying then would only
            // re-buffer the action and reset its retry counter, so requeue
            // the original entry instead.
            if !self.inner.connectivity.is_online() {
                let mut queue = self.inner.queue.lock().expect("queue lock poisoned");
                if !queue.requeue(entry) {
                    warn!("queued action dropped after exhausting retries");
                }
                continue;
            }
            let result = self.replay(entry.action.clone()).await;
            match result {
                Ok(()) => applied += 1,
                Err(error) if error.is_retryable() => {
                    let mut queue = self.inner.queue.lock().expect("queue lock poisoned");
                    if !queue.requeue(entry) {
                        warn!(%error, "queued action dropped after exhausting retries");
                    }
                }
                Err(error) => {
                    warn!(%error, "queued action rejected, discarding");
                }
            }
        }

        Ok(applied)
    }

    /// Number of actions waiting in the offline queue.
    ///
    /// # Panics
    ///
    /// Panics if the queue lock is poisoned.
    #[must_use]
    pub fn offline_queue_len(&self) -> usize {
        self.inner.queue.lock().expect("queue lock poisoned").len()
    }

    async fn replay(&self, action: QueuedAction) -> Result<()> {
        match action {
            QueuedAction::AddItem {
                product_id,
                variation_id,
                quantity,
                attributes,
                replace,
            } => {
                self.add_item(AddItemRequest {
                    product_id,
                    variation_id,
                    quantity,
                    attributes,
                    replace,
                })
                .await?;
            }
            QueuedAction::UpdateItem { key, quantity } => {
                self.update_item(&key, quantity).await?;
            }
            QueuedAction::RemoveItem { key } => {
                self.remove_item(&key).await?;
            }
            QueuedAction::Clear => {
                self.clear_cart().await?;
            }
            QueuedAction::ApplyCoupon { code } => {
                self.apply_coupon(&code).await?;
            }
            QueuedAction::RemoveCoupon { code } => {
                self.remove_coupon(&code).await?;
            }
        }
        Ok(())
    }

    fn sync_engine(&self) -> Result<&Arc<SyncEngine>> {
        self.inner
            .sync
            .as_ref()
            .ok_or_else(|| EngineError::Sync("no remote cart store configured".into()))
    }

    /// Buffer an action while offline and return the unchanged snapshot.
    async fn buffer_offline(&self, action: QueuedAction) -> Result<Cart> {
        {
            let mut queue = self.inner.queue.lock().expect("queue lock poisoned");
            queue.push(action);
        }
        debug!("offline, action buffered for replay");
        self.get_cart().await
    }

    /// Lazily load the snapshot from the store, creating a fresh cart when
    /// nothing was persisted yet.
    async fn load_or_create<'a>(&self, slot: &'a mut Option<Cart>) -> Result<&'a mut Cart> {
        if slot.is_none() {
            let cart = match self.inner.store.load().await? {
                Some(cart) => cart,
                None => {
                    let mut cart = Cart::new(
                        self.identity().session_id,
                        self.inner.config.currency.clone(),
                        chrono::Utc::now(),
                    );
                    cart.prices_include_tax = self.inner.config.tax.prices_include_tax;
                    cart
                }
            };
            *slot = Some(cart);
        }
        match slot.as_mut() {
            Some(cart) => Ok(cart),
            None => Err(EngineError::Persistence(
                "cart snapshot unavailable after load".into(),
            )),
        }
    }

    /// Recompute totals, refresh counts, and persist the snapshot.
    ///
    /// Persistence failures are logged, not propagated: the in-memory
    /// session keeps working even when durable storage is unavailable.
    async fn commit(&self, cart: &mut Cart) {
        let now = chrono::Utc::now();
        cart.refresh_counts(now);
        cart.totals = self.inner.calculator.calculate(
            &cart.items,
            &cart.applied_coupons,
            &cart.shipping,
            &cart.fees,
        );
        if let Err(error) = self.inner.store.save(cart).await {
            warn!(%error, "failed to persist cart; continuing in memory");
        }
    }

    /// Tear the engine down: stop the background timer.
    ///
    /// In-flight sync operations are not forcibly cancelled; callers
    /// should let pending futures settle before dropping the engine.
    pub fn shutdown(&self) {
        self.disable_sync();
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.background.lock()
            && let Some(handle) = slot.take()
        {
            handle.abort();
        }
    }
}

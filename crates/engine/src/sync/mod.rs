//! Reconciliation of a local cart with the remote copy.
//!
//! The sync engine never mutates the engine's snapshot directly: it
//! produces a merged candidate that the cart engine adopts after a
//! successful upload. A failed sync leaves the last-known-good state
//! untouched.

mod merge;
mod queue;

pub use merge::{MergeOutcome, ResolutionStrategy, merge_carts};
pub use queue::OfflineQueue;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use cartkit_core::{Cart, SyncConflict};

use crate::catalog::{Identity, RemoteCartStore};
use crate::config::SyncConfig;
use crate::error::{EngineError, ErrorReport, Result};
use crate::totals::TotalsCalculator;

/// Lifecycle of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// No sync has run or the last one was fully absorbed.
    #[default]
    Idle,
    /// A sync pass is in flight.
    Syncing,
    /// The last pass merged and uploaded cleanly.
    Synced,
    /// The last pass hit an unrecoverable error.
    Failed,
    /// The last pass detected divergences (still resolved and uploaded).
    Conflict,
}

/// Events delivered to registered observers.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A sync pass began.
    Started,
    /// A divergence was detected; delivered before resolution is applied.
    ConflictDetected(SyncConflict),
    /// The pass finished; the merged cart was uploaded.
    Completed {
        /// Conflicts resolved during the pass.
        conflicts: usize,
        /// Remote-only coupons treated as removed.
        coupons_removed: usize,
    },
    /// The pass failed; the local snapshot is untouched.
    Failed(ErrorReport),
}

/// Observer callback. Notification is synchronous, in registration order.
pub type SyncObserver = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

/// Result of a successful sync pass.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    /// The merged cart adopted by the engine, totals recomputed.
    pub cart: Cart,
    /// Conflicts that were detected and resolved.
    pub conflicts: Vec<SyncConflict>,
    /// Remote-only coupons treated as removed.
    pub coupons_removed: usize,
}

/// Reconciles the local cart with the remote store for an authenticated
/// identity.
pub struct SyncEngine {
    remote: Arc<dyn RemoteCartStore>,
    config: SyncConfig,
    calculator: TotalsCalculator,
    state: Mutex<SyncState>,
    observers: Mutex<Vec<SyncObserver>>,
}

impl SyncEngine {
    /// Create a sync engine over the given remote store.
    #[must_use]
    pub fn new(
        remote: Arc<dyn RemoteCartStore>,
        config: SyncConfig,
        calculator: TotalsCalculator,
    ) -> Self {
        Self {
            remote,
            config,
            calculator,
            state: Mutex::new(SyncState::Idle),
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Current lifecycle state.
    ///
    /// # Panics
    ///
    /// Panics if the state lock is poisoned, which only happens after a
    /// panic while holding it.
    #[must_use]
    pub fn state(&self) -> SyncState {
        *self.state.lock().expect("sync state lock poisoned")
    }

    /// Register an observer. Observers are notified synchronously in
    /// registration order; a panicking observer never blocks later
    /// observers or the sync itself.
    pub fn add_observer(&self, observer: SyncObserver) {
        self.observers
            .lock()
            .expect("observer lock poisoned")
            .push(observer);
    }

    fn notify(&self, event: &SyncEvent) {
        let observers = self
            .observers
            .lock()
            .expect("observer lock poisoned")
            .clone();
        for observer in observers {
            let outcome = catch_unwind(AssertUnwindSafe(|| observer(event)));
            if outcome.is_err() {
                warn!("sync observer panicked; continuing with remaining observers");
            }
        }
    }

    fn set_state(&self, next: SyncState) {
        *self.state.lock().expect("sync state lock poisoned") = next;
    }

    /// Try to move `Idle`/`Synced`/`Failed`/`Conflict` into `Syncing`.
    ///
    /// A sync requested while another is in flight is rejected with
    /// `Busy` rather than silently racing.
    fn begin(&self) -> Result<()> {
        let mut state = self.state.lock().expect("sync state lock poisoned");
        if *state == SyncState::Syncing {
            return Err(EngineError::Busy);
        }
        *state = SyncState::Syncing;
        Ok(())
    }

    /// Reconcile `local` with the remote cart for `identity`.
    ///
    /// # Errors
    ///
    /// `Auth` when the identity is not authenticated (hard precondition,
    /// not retryable), `Busy` when a sync is already in flight, and
    /// `Transport`/`Sync` on remote failures. On error the caller's
    /// snapshot is untouched.
    #[instrument(skip(self, local, identity), fields(session = %identity.session_id))]
    pub async fn sync(&self, local: &Cart, identity: &Identity) -> Result<SyncOutcome> {
        if !identity.is_authenticated {
            return Err(EngineError::Auth("sync requires an authenticated identity".into()));
        }
        self.begin()?;
        self.notify(&SyncEvent::Started);

        match self.sync_inner(local, identity).await {
            Ok(outcome) => {
                self.set_state(if outcome.conflicts.is_empty() {
                    SyncState::Synced
                } else {
                    SyncState::Conflict
                });
                self.notify(&SyncEvent::Completed {
                    conflicts: outcome.conflicts.len(),
                    coupons_removed: outcome.coupons_removed,
                });
                Ok(outcome)
            }
            Err(error) => {
                self.set_state(SyncState::Failed);
                self.notify(&SyncEvent::Failed(error.to_report()));
                Err(error)
            }
        }
    }

    async fn sync_inner(&self, local: &Cart, identity: &Identity) -> Result<SyncOutcome> {
        let remote_cart = self.remote.fetch(identity).await?;
        let now = chrono::Utc::now();

        let Some(remote_cart) = remote_cart else {
            // First sync for this identity: upload local as-is.
            let mut uploaded = local.clone();
            uploaded.customer_id.clone_from(&identity.user_id);
            uploaded.last_sync_at = Some(now);
            self.remote.upload(identity, &uploaded).await?;
            return Ok(SyncOutcome {
                cart: uploaded,
                conflicts: Vec::new(),
                coupons_removed: 0,
            });
        };

        let outcome = merge_carts(
            local,
            &remote_cart,
            self.config.strategy,
            self.config.treat_remote_only_coupons_as_removed,
        );

        // Observers see each conflict before the resolution is applied to
        // the uploaded copy, so a consumer can override the choice.
        for conflict in &outcome.conflicts {
            self.notify(&SyncEvent::ConflictDetected(conflict.clone()));
        }

        let mut merged = outcome.cart;
        merged.totals = self.calculator.calculate(
            &merged.items,
            &merged.applied_coupons,
            &merged.shipping,
            &merged.fees,
        );
        merged.customer_id.clone_from(&identity.user_id);
        merged.last_sync_at = Some(now);

        self.remote.upload(identity, &merged).await?;

        Ok(SyncOutcome {
            cart: merged,
            conflicts: outcome.conflicts,
            coupons_removed: outcome.coupons_removed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RoundingMode, TaxConfig};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex as AsyncMutex;

    fn item(product_id: &str, quantity: u32) -> cartkit_core::CartItem {
        use cartkit_core::{ProductSnapshot, StockStatus};
        use rust_decimal_macros::dec;
        let snapshot = ProductSnapshot {
            id: product_id.into(),
            name: format!("Product {product_id}"),
            published: true,
            price: dec!(10.00),
            regular_price: dec!(10.00),
            sale_price: None,
            stock_status: StockStatus::InStock,
            stock_quantity: Some(100),
            backorders_allowed: false,
            is_variable: false,
            variation_attributes: vec![],
            quantity_limits: None,
        };
        cartkit_core::CartItem::from_snapshot(&snapshot, None, quantity, vec![], Utc::now())
    }

    struct FakeRemote {
        stored: AsyncMutex<Option<Cart>>,
        fail_uploads: bool,
    }

    impl FakeRemote {
        fn empty() -> Self {
            Self {
                stored: AsyncMutex::new(None),
                fail_uploads: false,
            }
        }

        fn with(cart: Cart) -> Self {
            Self {
                stored: AsyncMutex::new(Some(cart)),
                fail_uploads: false,
            }
        }
    }

    #[async_trait]
    impl RemoteCartStore for FakeRemote {
        async fn fetch(&self, _identity: &Identity) -> Result<Option<Cart>> {
            Ok(self.stored.lock().await.clone())
        }

        async fn upload(&self, _identity: &Identity, cart: &Cart) -> Result<()> {
            if self.fail_uploads {
                return Err(EngineError::Transport("upload refused".into()));
            }
            *self.stored.lock().await = Some(cart.clone());
            Ok(())
        }
    }

    fn engine_over(remote: FakeRemote) -> SyncEngine {
        SyncEngine::new(
            Arc::new(remote),
            SyncConfig::default(),
            TotalsCalculator::new(TaxConfig::default(), RoundingMode::TotalsOnly),
        )
    }

    #[tokio::test]
    async fn test_unauthenticated_sync_is_a_hard_error() {
        let engine = engine_over(FakeRemote::empty());
        let cart = Cart::new("session-1", "USD", Utc::now());
        let result = engine.sync(&cart, &Identity::anonymous("session-1")).await;
        assert!(matches!(result, Err(EngineError::Auth(_))));
        assert_eq!(engine.state(), SyncState::Idle);
    }

    #[tokio::test]
    async fn test_first_sync_uploads_local_as_is() {
        let engine = engine_over(FakeRemote::empty());
        let cart = Cart::new("session-1", "USD", Utc::now());
        let outcome = engine
            .sync(&cart, &Identity::authenticated("u-1", "session-1"))
            .await
            .expect("sync");
        assert!(outcome.conflicts.is_empty());
        assert_eq!(outcome.cart.customer_id.as_deref(), Some("u-1"));
        assert!(outcome.cart.last_sync_at.is_some());
        assert_eq!(engine.state(), SyncState::Synced);
    }

    #[tokio::test]
    async fn test_failed_upload_sets_failed_state() {
        let mut remote = FakeRemote::empty();
        remote.fail_uploads = true;
        let engine = engine_over(remote);
        let cart = Cart::new("session-1", "USD", Utc::now());
        let result = engine
            .sync(&cart, &Identity::authenticated("u-1", "session-1"))
            .await;
        assert!(matches!(result, Err(EngineError::Transport(_))));
        assert_eq!(engine.state(), SyncState::Failed);

        // Failure is not a stuck state: a new sync can start.
        assert!(engine.begin().is_ok());
    }

    #[tokio::test]
    async fn test_reentrant_sync_is_rejected_as_busy() {
        let engine = engine_over(FakeRemote::empty());
        engine.begin().expect("first begin");
        let cart = Cart::new("session-1", "USD", Utc::now());
        let result = engine
            .sync(&cart, &Identity::authenticated("u-1", "session-1"))
            .await;
        assert!(matches!(result, Err(EngineError::Busy)));
    }

    #[tokio::test]
    async fn test_observers_see_conflicts_and_completion() {
        let now = Utc::now();
        let mut remote_cart = Cart::new("session-2", "USD", now);
        remote_cart.items.push(item("5", 1));
        remote_cart.refresh_counts(now);

        let engine = engine_over(FakeRemote::with(remote_cart));

        let conflicts_seen = Arc::new(AtomicUsize::new(0));
        let completions_seen = Arc::new(AtomicUsize::new(0));
        let (c, d) = (conflicts_seen.clone(), completions_seen.clone());
        engine.add_observer(Arc::new(move |event| match event {
            SyncEvent::ConflictDetected(_) => {
                c.fetch_add(1, Ordering::SeqCst);
            }
            SyncEvent::Completed { .. } => {
                d.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        }));
        // A panicking observer must not block the one registered above
        // from receiving later events, nor abort the sync.
        engine.add_observer(Arc::new(|_event| panic!("bad observer")));

        let mut local = Cart::new("session-1", "USD", now);
        local.items.push(item("5", 3));
        local.refresh_counts(now);

        let outcome = engine
            .sync(&local, &Identity::authenticated("u-1", "session-1"))
            .await
            .expect("sync");

        assert_eq!(outcome.conflicts.len(), 1);
        assert_eq!(outcome.cart.items[0].quantity, 3); // merge_smart takes max
        assert_eq!(conflicts_seen.load(Ordering::SeqCst), 1);
        assert_eq!(completions_seen.load(Ordering::SeqCst), 1);
        assert_eq!(engine.state(), SyncState::Conflict);
    }
}

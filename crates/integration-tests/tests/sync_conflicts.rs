//! Integration tests for remote reconciliation through the full engine:
//! first-sync upload, conflict resolution strategies, and failure
//! recovery.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use rust_decimal_macros::dec;

use cartkit_core::{Cart, CartItem};
use cartkit_engine::{
    AddItemRequest, CartEngine, EngineConfig, EngineError, Identity, ResolutionStrategy,
    SyncConfig, SyncEvent, SyncState,
};
use cartkit_integration_tests::fixtures::{FakeCatalog, FakeCoupons, FakeRemote, product};

fn engine_with(remote: Arc<FakeRemote>, strategy: ResolutionStrategy) -> CartEngine {
    let catalog = FakeCatalog::with(vec![
        product("sku-1", dec!(10.00)),
        product("sku-2", dec!(20.00)),
    ]);
    let config = EngineConfig::builder()
        .sync(SyncConfig {
            strategy,
            ..SyncConfig::default()
        })
        .build();

    CartEngine::builder(config)
        .catalog(Arc::new(catalog))
        .coupons(Arc::new(FakeCoupons::default()))
        .remote(remote)
        .identity(Identity::authenticated("cust-7", "sess-7"))
        .build()
        .expect("engine wiring")
}

fn remote_cart_with(product_id: &str, quantity: u32, price: rust_decimal::Decimal) -> Cart {
    let now = Utc::now();
    let mut cart = Cart::new("server-session", "USD", now);
    cart.items.push(CartItem::from_snapshot(
        &product(product_id, price),
        None,
        quantity,
        vec![],
        now,
    ));
    cart.refresh_counts(now);
    cart
}

// =============================================================================
// Upload and Adoption
// =============================================================================

#[tokio::test]
async fn test_first_sync_uploads_local_cart() {
    let remote = Arc::new(FakeRemote::default());
    let engine = engine_with(remote.clone(), ResolutionStrategy::MergeSmart);

    engine
        .add_item(AddItemRequest::simple("sku-1", 2))
        .await
        .expect("add");
    let cart = engine.sync_with_server().await.expect("sync");

    assert_eq!(remote.upload_count(), 1);
    assert_eq!(cart.customer_id.as_deref(), Some("cust-7"));
    assert!(cart.last_sync_at.is_some());
    assert_eq!(engine.sync_state(), SyncState::Synced);

    let stored = remote.stored().expect("uploaded cart");
    assert_eq!(stored.items[0].quantity, 2);
}

#[tokio::test]
async fn test_unauthenticated_sync_is_rejected() {
    let remote = Arc::new(FakeRemote::default());
    let engine = engine_with(remote, ResolutionStrategy::MergeSmart);
    engine.set_identity(Identity::anonymous("sess-anon"));

    let error = engine.sync_with_server().await.expect_err("anonymous");
    assert!(matches!(error, EngineError::Auth(_)));
}

// =============================================================================
// Conflict Resolution
// =============================================================================

#[tokio::test]
async fn test_merge_smart_takes_larger_quantity() {
    let remote = Arc::new(FakeRemote::with_cart(remote_cart_with(
        "sku-1",
        5,
        dec!(10.00),
    )));
    let engine = engine_with(remote, ResolutionStrategy::MergeSmart);

    engine
        .add_item(AddItemRequest::simple("sku-1", 2))
        .await
        .expect("add");
    let cart = engine.sync_with_server().await.expect("sync");

    assert_eq!(cart.items[0].quantity, 5);
    assert_eq!(cart.totals.subtotal, dec!(50.00));
    assert_eq!(engine.sync_state(), SyncState::Conflict);
}

#[tokio::test]
async fn test_merge_quantities_sums_both_sides() {
    let remote = Arc::new(FakeRemote::with_cart(remote_cart_with(
        "sku-1",
        5,
        dec!(10.00),
    )));
    let engine = engine_with(remote, ResolutionStrategy::MergeQuantities);

    engine
        .add_item(AddItemRequest::simple("sku-1", 2))
        .await
        .expect("add");
    let cart = engine.sync_with_server().await.expect("sync");

    assert_eq!(cart.items[0].quantity, 7);
}

#[tokio::test]
async fn test_local_wins_keeps_local_quantity() {
    let remote = Arc::new(FakeRemote::with_cart(remote_cart_with(
        "sku-1",
        5,
        dec!(10.00),
    )));
    let engine = engine_with(remote, ResolutionStrategy::LocalWins);

    engine
        .add_item(AddItemRequest::simple("sku-1", 2))
        .await
        .expect("add");
    let cart = engine.sync_with_server().await.expect("sync");

    assert_eq!(cart.items[0].quantity, 2);
}

#[tokio::test]
async fn test_remote_only_items_are_adopted() {
    let remote = Arc::new(FakeRemote::with_cart(remote_cart_with(
        "sku-2",
        1,
        dec!(20.00),
    )));
    let engine = engine_with(remote, ResolutionStrategy::MergeSmart);

    engine
        .add_item(AddItemRequest::simple("sku-1", 1))
        .await
        .expect("add");
    let cart = engine.sync_with_server().await.expect("sync");

    assert_eq!(cart.items.len(), 2);
    assert_eq!(cart.totals.subtotal, dec!(30.00));
}

// =============================================================================
// Events and Failure
// =============================================================================

#[tokio::test]
async fn test_observers_see_conflicts_and_completion() {
    let remote = Arc::new(FakeRemote::with_cart(remote_cart_with(
        "sku-1",
        9,
        dec!(10.00),
    )));
    let engine = engine_with(remote, ResolutionStrategy::MergeSmart);

    let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    engine
        .add_sync_event_handler(Arc::new(move |event| {
            let label = match event {
                SyncEvent::Started => "started".to_string(),
                SyncEvent::ConflictDetected(conflict) => {
                    let key = conflict
                        .item_key
                        .as_ref()
                        .map_or("-", cartkit_core::ItemKey::as_str);
                    format!("conflict:{key}")
                }
                SyncEvent::Completed { conflicts, .. } => format!("completed:{conflicts}"),
                SyncEvent::Failed(report) => format!("failed:{}", report.code),
            };
            sink.lock().expect("event sink").push(label);
        }))
        .expect("handler");

    engine
        .add_item(AddItemRequest::simple("sku-1", 3))
        .await
        .expect("add");
    engine.sync_with_server().await.expect("sync");

    let seen = events.lock().expect("event sink").clone();
    assert_eq!(seen.first().map(String::as_str), Some("started"));
    assert!(seen.iter().any(|label| label.starts_with("conflict:")));
    assert_eq!(seen.last().map(String::as_str), Some("completed:1"));
}

#[tokio::test]
async fn test_failed_sync_preserves_local_snapshot() {
    let remote = Arc::new(FakeRemote::default());
    remote.set_fail_uploads(true);
    let engine = engine_with(remote.clone(), ResolutionStrategy::MergeSmart);

    engine
        .add_item(AddItemRequest::simple("sku-1", 2))
        .await
        .expect("add");
    let error = engine.sync_with_server().await.expect_err("upload refused");
    assert!(matches!(error, EngineError::Transport(_)));
    assert_eq!(engine.sync_state(), SyncState::Failed);

    // Local state untouched; a later sync succeeds.
    let cart = engine.get_cart().await.expect("snapshot");
    assert_eq!(cart.items[0].quantity, 2);

    remote.set_fail_uploads(false);
    let cart = engine.sync_with_server().await.expect("retry");
    assert_eq!(cart.items[0].quantity, 2);
    assert_eq!(engine.sync_state(), SyncState::Synced);
}

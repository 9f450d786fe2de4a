//! Integration tests for offline buffering and replay.

use std::sync::Arc;

use rust_decimal_macros::dec;

use cartkit_engine::{AddItemRequest, CartEngine, EngineConfig, SyncConfig};
use cartkit_integration_tests::fixtures::{FakeCatalog, FakeCoupons, TogglingProbe, product};

fn engine_with(probe: Arc<TogglingProbe>, queue_capacity: usize) -> CartEngine {
    let catalog = FakeCatalog::with(vec![product("sku-1", dec!(10.00))]);
    let config = EngineConfig::builder()
        .sync(SyncConfig {
            queue_capacity,
            ..SyncConfig::default()
        })
        .build();

    CartEngine::builder(config)
        .catalog(Arc::new(catalog))
        .coupons(Arc::new(FakeCoupons::default()))
        .connectivity(probe)
        .build()
        .expect("engine wiring")
}

#[tokio::test]
async fn test_offline_actions_buffer_and_replay_in_order() {
    let probe = Arc::new(TogglingProbe::new(false));
    let engine = engine_with(probe.clone(), 64);

    engine
        .add_item(AddItemRequest::simple("sku-1", 2))
        .await
        .expect("buffered add");
    engine
        .add_item(AddItemRequest::simple("sku-1", 3))
        .await
        .expect("buffered add");
    assert_eq!(engine.offline_queue_len(), 2);

    // Nothing applied while offline.
    let cart = engine.get_cart().await.expect("snapshot");
    assert!(cart.is_empty());

    probe.set_online(true);
    let applied = engine.process_offline_queue().await.expect("replay");
    assert_eq!(applied, 2);
    assert_eq!(engine.offline_queue_len(), 0);

    let cart = engine.get_cart().await.expect("snapshot");
    assert_eq!(cart.items[0].quantity, 5);
    assert_eq!(cart.totals.subtotal, dec!(50.00));
}

#[tokio::test]
async fn test_buffered_add_keeps_its_attributes_on_replay() {
    let probe = Arc::new(TogglingProbe::new(false));
    let engine = engine_with(probe.clone(), 64);

    let mut request = AddItemRequest::simple("sku-1", 1);
    request.attributes = vec![("size".into(), "large".into())];
    engine.add_item(request).await.expect("buffered add");

    probe.set_online(true);
    assert_eq!(engine.process_offline_queue().await.expect("replay"), 1);

    // An online add with the same attributes must land on the same line.
    let mut request = AddItemRequest::simple("sku-1", 2);
    request.attributes = vec![("size".into(), "large".into())];
    let cart = engine.add_item(request).await.expect("online add");
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 3);
}

#[tokio::test]
async fn test_queue_capacity_drops_oldest_entry() {
    let probe = Arc::new(TogglingProbe::new(false));
    let engine = engine_with(probe.clone(), 2);

    for quantity in 1..=3 {
        engine
            .add_item(AddItemRequest::simple("sku-1", quantity))
            .await
            .expect("buffered add");
    }
    assert_eq!(engine.offline_queue_len(), 2);

    probe.set_online(true);
    engine.process_offline_queue().await.expect("replay");

    // The quantity-1 add fell off the ring; 2 + 3 remain.
    let cart = engine.get_cart().await.expect("snapshot");
    assert_eq!(cart.items[0].quantity, 5);
}

#[tokio::test]
async fn test_replay_while_offline_is_a_no_op() {
    let probe = Arc::new(TogglingProbe::new(false));
    let engine = engine_with(probe, 64);

    engine
        .add_item(AddItemRequest::simple("sku-1", 1))
        .await
        .expect("buffered add");

    let applied = engine.process_offline_queue().await.expect("replay");
    assert_eq!(applied, 0);
    assert_eq!(engine.offline_queue_len(), 1);
}

#[tokio::test]
async fn test_invalid_buffered_action_is_discarded_on_replay() {
    let probe = Arc::new(TogglingProbe::new(false));
    let engine = engine_with(probe.clone(), 64);

    engine
        .add_item(AddItemRequest::simple("discontinued", 1))
        .await
        .expect("buffered add");
    probe.set_online(true);

    let applied = engine.process_offline_queue().await.expect("replay");
    assert_eq!(applied, 0);
    assert_eq!(engine.offline_queue_len(), 0);
}

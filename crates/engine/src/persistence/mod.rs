//! Strategy-selectable durable storage for a single cart snapshot.
//!
//! The store owns the durable copy and is the sole source of truth across
//! process restarts. Every strategy round-trips timestamps via RFC 3339
//! and runs the cart shape check before trusting a loaded document.

mod local;

pub use local::{IndexedDirStore, JsonFileStore};

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::warn;

use cartkit_core::Cart;
use cartkit_core::shape::validate_cart_shape;

use crate::catalog::{Identity, RemoteCartStore};
use crate::error::Result;

/// Durable storage for a single cart snapshot.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Persist the snapshot, replacing any previous copy.
    ///
    /// # Errors
    ///
    /// `Persistence` when the backing storage fails; callers treat this as
    /// non-fatal to the in-memory session.
    async fn save(&self, cart: &Cart) -> Result<()>;

    /// Load the stored snapshot, `None` when nothing was saved yet.
    ///
    /// # Errors
    ///
    /// `Shape` when a stored document fails the cart shape check;
    /// `Persistence` on storage failure.
    async fn load(&self) -> Result<Option<Cart>>;

    /// Discard the stored snapshot.
    ///
    /// # Errors
    ///
    /// `Persistence` on storage failure.
    async fn clear(&self) -> Result<()>;
}

/// Serialize a cart to its stored JSON document.
pub(crate) fn encode(cart: &Cart) -> Result<String> {
    Ok(serde_json::to_string(cart)?)
}

/// Parse and shape-check a stored document into a cart.
///
/// Rejects (never coerces) documents that fail the shape invariant.
pub(crate) fn decode(raw: &str) -> Result<Cart> {
    let document: serde_json::Value = serde_json::from_str(raw)?;
    validate_cart_shape(&document)?;
    Ok(serde_json::from_value(document)?)
}

/// No persistence: saves and clears are no-ops, loads find nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStore;

#[async_trait]
impl CartStore for NoopStore {
    async fn save(&self, _cart: &Cart) -> Result<()> {
        Ok(())
    }

    async fn load(&self) -> Result<Option<Cart>> {
        Ok(None)
    }

    async fn clear(&self) -> Result<()> {
        Ok(())
    }
}

/// Session-scoped in-process storage; gone when the process exits.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slot: Arc<RwLock<Option<String>>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn save(&self, cart: &Cart) -> Result<()> {
        let encoded = encode(cart)?;
        *self.slot.write().await = Some(encoded);
        Ok(())
    }

    async fn load(&self) -> Result<Option<Cart>> {
        let guard = self.slot.read().await;
        guard.as_deref().map(decode).transpose()
    }

    async fn clear(&self) -> Result<()> {
        *self.slot.write().await = None;
        Ok(())
    }
}

/// Remote-backed storage delegating to a [`RemoteCartStore`] collaborator.
///
/// When no collaborator is wired in, the store degrades to `Ok(None)` and
/// no-op saves with a logged warning instead of crashing the engine.
#[derive(Clone)]
pub struct RemoteBackedStore {
    remote: Option<Arc<dyn RemoteCartStore>>,
    identity: Identity,
}

impl RemoteBackedStore {
    /// Create a store backed by `remote` for `identity`.
    #[must_use]
    pub fn new(remote: Option<Arc<dyn RemoteCartStore>>, identity: Identity) -> Self {
        Self { remote, identity }
    }
}

#[async_trait]
impl CartStore for RemoteBackedStore {
    async fn save(&self, cart: &Cart) -> Result<()> {
        match &self.remote {
            Some(remote) => remote.upload(&self.identity, cart).await,
            None => {
                warn!("remote cart store not configured; save skipped");
                Ok(())
            }
        }
    }

    async fn load(&self) -> Result<Option<Cart>> {
        match &self.remote {
            Some(remote) => remote.fetch(&self.identity).await,
            None => {
                warn!("remote cart store not configured; nothing to load");
                Ok(None)
            }
        }
    }

    async fn clear(&self) -> Result<()> {
        if self.remote.is_none() {
            warn!("remote cart store not configured; clear skipped");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_memory_store_round_trips() {
        let store = MemoryStore::new();
        assert!(store.load().await.expect("load").is_none());

        let cart = Cart::new("session-1", "USD", Utc::now());
        store.save(&cart).await.expect("save");
        let loaded = store.load().await.expect("load").expect("cart present");
        assert_eq!(loaded, cart);

        store.clear().await.expect("clear");
        assert!(store.load().await.expect("load").is_none());
    }

    #[tokio::test]
    async fn test_decode_rejects_malformed_document() {
        let result = decode(r#"{"session_id": "s-1"}"#);
        assert!(matches!(
            result,
            Err(crate::error::EngineError::Shape(_))
        ));
    }

    #[tokio::test]
    async fn test_noop_store_persists_nothing() {
        let store = NoopStore;
        let cart = Cart::new("session-1", "USD", Utc::now());
        store.save(&cart).await.expect("save");
        assert!(store.load().await.expect("load").is_none());
    }

    #[tokio::test]
    async fn test_remote_store_without_collaborator_degrades() {
        let store = RemoteBackedStore::new(None, Identity::anonymous("s-1"));
        let cart = Cart::new("session-1", "USD", Utc::now());
        store.save(&cart).await.expect("save is a no-op");
        assert!(store.load().await.expect("load").is_none());
        store.clear().await.expect("clear is a no-op");
    }
}

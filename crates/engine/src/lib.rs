//! Cartkit engine library.
//!
//! The offline-tolerant cart domain engine: totals calculation,
//! persistence, validation, and remote synchronization behind a single
//! orchestrating [`CartEngine`]. Host applications wire in their own
//! catalog, coupon, and remote-store collaborators through the traits in
//! [`catalog`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod persistence;
pub mod sync;
pub mod totals;
pub mod validation;

pub use catalog::{
    AlwaysOnline, CachedCatalog, CatalogProvider, ConnectivityProbe, CouponProvider, Identity,
    RemoteCartStore,
};
pub use config::{EngineConfig, EngineConfigBuilder, LimitsConfig, RoundingMode, SyncConfig, TaxConfig};
pub use engine::{AddItemRequest, CartEngine, CartEngineBuilder};
pub use error::{EngineError, ErrorReport, Result};
pub use persistence::{CartStore, IndexedDirStore, JsonFileStore, MemoryStore, NoopStore, RemoteBackedStore};
pub use sync::{ResolutionStrategy, SyncEngine, SyncEvent, SyncObserver, SyncOutcome, SyncState};
pub use totals::TotalsCalculator;
pub use validation::{ValidationCode, ValidationEngine, ValidationIssue, ValidationReport};

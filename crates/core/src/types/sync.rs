//! Reconciliation conflicts and the offline action queue entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::key::ItemKey;

/// The kind of divergence found between local and remote carts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Same item key, different quantities.
    ItemQuantity,
    /// Item exists remotely but not locally.
    ItemMissingLocal,
    /// Item exists locally but not remotely.
    ItemMissingRemote,
    /// Applied coupon sets diverge.
    Coupon,
    /// Stored totals diverge beyond tolerance.
    TotalMismatch,
}

/// One divergence detected during reconciliation.
///
/// Reported to observers before the active strategy's resolution is
/// applied, so a consumer can override the automatic choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// What kind of divergence this is.
    pub kind: ConflictKind,
    /// The item key involved, when applicable.
    pub item_key: Option<ItemKey>,
    /// The local side of the divergence.
    pub local_value: serde_json::Value,
    /// The remote side of the divergence.
    pub remote_value: serde_json::Value,
    /// Human-readable explanation.
    pub message: String,
    /// The value the active strategy will resolve to.
    pub resolution: serde_json::Value,
}

/// A mutation buffered while offline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum QueuedAction {
    /// Add a product to the cart.
    AddItem {
        /// Product id.
        product_id: String,
        /// Variation id for variable products.
        variation_id: Option<String>,
        /// Quantity to add.
        quantity: u32,
        /// Selected attribute pairs; part of the item key, so they must
        /// survive buffering for the replayed add to land on the same line.
        #[serde(default)]
        attributes: Vec<(String, String)>,
        /// Replace an existing line instead of increasing its quantity.
        #[serde(default)]
        replace: bool,
    },
    /// Set the quantity of an existing line.
    UpdateItem {
        /// Target item key.
        key: ItemKey,
        /// New quantity.
        quantity: u32,
    },
    /// Remove a line.
    RemoveItem {
        /// Target item key.
        key: ItemKey,
    },
    /// Empty the cart.
    Clear,
    /// Apply a discount code.
    ApplyCoupon {
        /// The code to apply.
        code: String,
    },
    /// Remove a discount code.
    RemoveCoupon {
        /// The code to remove.
        code: String,
    },
}

/// A buffered mutation with its retry bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncQueueEntry {
    /// The buffered mutation.
    pub action: QueuedAction,
    /// When the mutation was queued.
    pub queued_at: DateTime<Utc>,
    /// Replay attempts so far.
    pub retries: u32,
}

impl SyncQueueEntry {
    /// Wrap an action queued at `now` with zero retries.
    #[must_use]
    pub const fn new(action: QueuedAction, now: DateTime<Utc>) -> Self {
        Self {
            action,
            queued_at: now,
            retries: 0,
        }
    }
}

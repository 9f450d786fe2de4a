//! Per-item-key reconciliation of a local and a remote cart.

use serde::{Deserialize, Serialize};
use serde_json::json;

use cartkit_core::{Cart, ConflictKind, SyncConflict};

/// Rule used to deterministically resolve a quantity conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// Keep the local quantity.
    LocalWins,
    /// Keep the remote quantity.
    ServerWins,
    /// Sum both quantities.
    MergeQuantities,
    /// Take the maximum of the two.
    #[default]
    MergeSmart,
}

impl ResolutionStrategy {
    /// Resolve a quantity divergence.
    #[must_use]
    pub const fn resolve(self, local: u32, remote: u32) -> u32 {
        match self {
            Self::LocalWins => local,
            Self::ServerWins => remote,
            Self::MergeQuantities => local.saturating_add(remote),
            Self::MergeSmart => {
                if local >= remote { local } else { remote }
            }
        }
    }
}

/// Outcome of merging two carts.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// The merged candidate cart (totals not yet recomputed).
    pub cart: Cart,
    /// Quantity conflicts surfaced for escalation.
    pub conflicts: Vec<SyncConflict>,
    /// Coupons present only remotely, counted per the removal policy.
    pub coupons_removed: usize,
}

/// Merge `remote` into `local` per item key.
///
/// Items present on one side only are kept as-is (additions and removals
/// are non-conflicting). Items present on both sides with equal quantity
/// are kept; differing quantities raise an `ItemQuantity` conflict resolved
/// by `strategy`. Coupons merge by code union; with
/// `remote_only_coupons_removed` set, codes present only remotely are
/// treated as removed and counted rather than escalated.
#[must_use]
pub fn merge_carts(
    local: &Cart,
    remote: &Cart,
    strategy: ResolutionStrategy,
    remote_only_coupons_removed: bool,
) -> MergeOutcome {
    let mut merged = local.clone();
    let mut conflicts = Vec::new();
    let now = chrono::Utc::now();

    for item in &mut merged.items {
        if let Some(remote_item) = remote.find_item(&item.key)
            && remote_item.quantity != item.quantity
        {
            let resolved = strategy.resolve(item.quantity, remote_item.quantity);
            conflicts.push(SyncConflict {
                kind: ConflictKind::ItemQuantity,
                item_key: Some(item.key.clone()),
                local_value: json!(item.quantity),
                remote_value: json!(remote_item.quantity),
                message: format!(
                    "item {} has quantity {} locally and {} remotely",
                    item.key, item.quantity, remote_item.quantity
                ),
                resolution: json!(resolved),
            });
            item.set_quantity(resolved, now);
        }
    }

    // Items only the remote knows about are non-conflicting additions.
    for remote_item in &remote.items {
        if local.find_item(&remote_item.key).is_none() {
            merged.items.push(remote_item.clone());
        }
    }

    let mut coupons_removed = 0;
    for remote_coupon in &remote.applied_coupons {
        let known_locally = merged
            .applied_coupons
            .iter()
            .any(|coupon| coupon.code == remote_coupon.code);
        if !known_locally {
            if remote_only_coupons_removed {
                coupons_removed += 1;
            } else {
                merged.applied_coupons.push(remote_coupon.clone());
            }
        }
    }

    merged.refresh_counts(now);

    MergeOutcome {
        cart: merged,
        conflicts,
        coupons_removed,
    }
}

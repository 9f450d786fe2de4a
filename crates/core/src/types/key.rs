//! Deterministic item identity for merge, update, and remove operations.
//!
//! An [`ItemKey`] is derived from the product id, the optional variation id,
//! and the selected attribute pairs sorted by name. Two add requests for the
//! same product/variation/attributes always produce the same key, regardless
//! of the order the attributes were supplied in.

use serde::{Deserialize, Serialize};

/// Composite identity of a cart line.
///
/// The key is the unit of "sameness": adding an item whose key matches an
/// existing line merges into that line instead of creating a new one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemKey(String);

impl ItemKey {
    /// Derive the key for a (product, variation, attributes) combination.
    ///
    /// Attribute pairs are sorted by name before encoding, so insertion
    /// order never changes the derived key.
    #[must_use]
    pub fn derive(
        product_id: &str,
        variation_id: Option<&str>,
        attributes: &[(String, String)],
    ) -> Self {
        let mut sorted: Vec<&(String, String)> = attributes.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        let mut key = String::from(product_id);
        key.push(':');
        key.push_str(variation_id.unwrap_or(""));
        for (name, value) in sorted {
            key.push('|');
            key.push_str(name);
            key.push('=');
            key.push_str(value);
        }
        Self(key)
    }

    /// Wrap an already-derived key (e.g. read back from storage).
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The underlying string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ItemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

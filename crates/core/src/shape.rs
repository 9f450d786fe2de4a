//! Structural validation for storage-loaded cart documents.
//!
//! Persistence strategies run this check on raw JSON before trusting a
//! stored payload as a [`crate::Cart`]. A failed check is a typed error,
//! never a silent coercion.

use serde_json::Value;
use thiserror::Error;

/// Why a stored document failed the cart shape check.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShapeError {
    /// The document root is not a JSON object.
    #[error("cart document is not an object")]
    NotAnObject,

    /// A required field is absent.
    #[error("cart document is missing field `{0}`")]
    MissingField(&'static str),

    /// A field holds the wrong JSON type.
    #[error("cart field `{field}` has wrong type (expected {expected})")]
    WrongType {
        /// The offending field.
        field: &'static str,
        /// The expected JSON type.
        expected: &'static str,
    },

    /// An items entry is malformed.
    #[error("cart item at index {index} is malformed: {reason}")]
    MalformedItem {
        /// Position in the items array.
        index: usize,
        /// What was wrong.
        reason: &'static str,
    },
}

const REQUIRED_STRING_FIELDS: &[&str] = &["session_id", "currency", "created_at", "updated_at"];

/// Check that a raw JSON document has the structural shape of a `Cart`.
///
/// This is intentionally a shape check, not a full semantic validation:
/// it guards deserialization of untrusted storage, while business-rule
/// validation stays with the validation engine.
///
/// # Errors
///
/// Returns the first [`ShapeError`] encountered.
pub fn validate_cart_shape(document: &Value) -> Result<(), ShapeError> {
    let object = document.as_object().ok_or(ShapeError::NotAnObject)?;

    let items = object
        .get("items")
        .ok_or(ShapeError::MissingField("items"))?;
    let items = items.as_array().ok_or(ShapeError::WrongType {
        field: "items",
        expected: "array",
    })?;

    for (index, item) in items.iter().enumerate() {
        let item = item.as_object().ok_or(ShapeError::MalformedItem {
            index,
            reason: "not an object",
        })?;
        for field in ["key", "product_id"] {
            if !item.get(field).is_some_and(Value::is_string) {
                return Err(ShapeError::MalformedItem {
                    index,
                    reason: "missing key or product_id",
                });
            }
        }
        if !item.get("quantity").is_some_and(Value::is_u64) {
            return Err(ShapeError::MalformedItem {
                index,
                reason: "quantity is not a non-negative integer",
            });
        }
    }

    if !object.get("item_count").is_some_and(Value::is_u64) {
        return Err(ShapeError::WrongType {
            field: "item_count",
            expected: "non-negative integer",
        });
    }

    if !object.get("totals").is_some_and(Value::is_object) {
        return Err(ShapeError::MissingField("totals"));
    }

    for field in REQUIRED_STRING_FIELDS {
        match object.get(*field) {
            None => return Err(ShapeError::MissingField(field)),
            Some(value) if !value.is_string() => {
                return Err(ShapeError::WrongType {
                    field,
                    expected: "string",
                });
            }
            Some(_) => {}
        }
    }

    Ok(())
}

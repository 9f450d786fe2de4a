//! Engine error taxonomy.
//!
//! Every error carries a stable kind; validation errors additionally carry
//! the machine-readable code the validation engine produced. Transport and
//! rate-limit errors are retryable; validation, persistence, and auth
//! errors are not.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use cartkit_core::shape::ShapeError;

/// Errors produced by the cart engine and its components.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A request violated a cart business rule.
    #[error("validation failed [{code}]: {message}")]
    Validation {
        /// Stable machine-readable code (e.g. `INVALID_QUANTITY`).
        code: String,
        /// Human-readable explanation.
        message: String,
        /// Optional structured context.
        details: Option<serde_json::Value>,
    },

    /// A referenced product or coupon does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The transport collaborator exhausted its retries.
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote platform rate-limited the request.
    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Durable storage failed; the in-memory session continues.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// A stored document failed the cart shape check.
    #[error("stored cart rejected: {0}")]
    Shape(#[from] ShapeError),

    /// Sync requires an authenticated identity.
    #[error("authentication required: {0}")]
    Auth(String),

    /// Reconciliation with the remote cart failed.
    #[error("sync failed: {0}")]
    Sync(String),

    /// A sync was requested while another is in flight.
    #[error("sync already in progress")]
    Busy,

    /// JSON (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    /// Build a validation error with a stable code.
    #[must_use]
    pub fn validation(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Build a validation error carrying structured details.
    #[must_use]
    pub fn validation_with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self::Validation {
            code: code.into(),
            message: message.into(),
            details: Some(details),
        }
    }

    /// Whether a retry of the same operation may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::RateLimited(_))
    }

    /// Stable kind code for reporting.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::NotFound(_) => "not_found",
            Self::Transport(_) => "transport",
            Self::RateLimited(_) => "rate_limited",
            Self::Persistence(_) => "persistence",
            Self::Shape(_) => "shape",
            Self::Auth(_) => "auth",
            Self::Sync(_) => "sync",
            Self::Busy => "busy",
            Self::Serialization(_) => "serialization",
        }
    }

    /// Convert into a serializable report for observers.
    #[must_use]
    pub fn to_report(&self) -> ErrorReport {
        let details = match self {
            Self::Validation { details, .. } => details.clone(),
            _ => None,
        };
        ErrorReport {
            code: self.kind().to_string(),
            message: self.to_string(),
            details,
            timestamp: Utc::now(),
            retryable: self.is_retryable(),
        }
    }
}

/// Serializable error report delivered to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Stable kind code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Optional structured context.
    pub details: Option<serde_json::Value>,
    /// When the error was reported.
    pub timestamp: DateTime<Utc>,
    /// Whether a retry may succeed.
    pub retryable: bool,
}

/// Result type alias for `EngineError`.
pub type Result<T> = std::result::Result<T, EngineError>;

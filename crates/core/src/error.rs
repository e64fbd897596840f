//! Domain error model.

use thiserror::Error;

use crate::id::ProjectId;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every variant is a recoverable, caller-facing failure. Variants carry the
/// numbers a caller needs to render a precise message (ordered / received /
/// remaining quantities, available stock and its unit). Infrastructure
/// concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// A value failed validation (e.g. nothing to update, empty name).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A referenced item / order / receipt / project does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A receipt line points outside the purchase order's line list.
    #[error("invalid PO item index: {index} (order has {line_count} lines)")]
    InvalidReference { index: usize, line_count: usize },

    /// Cumulative receipts would exceed the ordered quantity of a PO line.
    #[error(
        "cannot receive {requested} of '{description}'. PO quantity: {ordered}, \
         already received: {already_received}, remaining: {remaining}"
    )]
    OverReceipt {
        line_index: usize,
        description: String,
        requested: f64,
        ordered: f64,
        already_received: f64,
        remaining: f64,
    },

    /// A decrement asks for more than is on hand.
    #[error("insufficient quantity of '{item_name}'. Available: {available} {unit}, requested: {requested}")]
    InsufficientStock {
        item_name: String,
        requested: f64,
        available: f64,
        unit: String,
    },

    /// Zero, negative or non-finite quantity where a valid one is required.
    #[error("invalid quantity {quantity}: {reason}")]
    InvalidQuantity { quantity: f64, reason: String },

    /// Transfer source and destination are the same project.
    #[error("source and destination project must be different ({project_id})")]
    SameProject { project_id: ProjectId },

    /// A concurrent writer won, or a natural key is already taken.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl core::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_quantity(quantity: f64, reason: impl Into<String>) -> Self {
        Self::InvalidQuantity {
            quantity,
            reason: reason.into(),
        }
    }

    /// Stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "validation_failed",
            DomainError::InvalidId(_) => "invalid_id",
            DomainError::NotFound { .. } => "not_found",
            DomainError::InvalidReference { .. } => "invalid_reference",
            DomainError::OverReceipt { .. } => "over_receipt",
            DomainError::InsufficientStock { .. } => "insufficient_stock",
            DomainError::InvalidQuantity { .. } => "invalid_quantity",
            DomainError::SameProject { .. } => "same_project",
            DomainError::Conflict(_) => "conflict",
        }
    }
}

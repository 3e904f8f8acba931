//! Error types for queue and watch operations.

use crate::types::ItemId;
use thiserror::Error;

/// Main error type for docket operations.
#[derive(Debug, Error)]
pub enum DocketError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An item with this id is already stored. The stored item is unmodified.
    #[error("Item already enqueued: {0}")]
    DuplicateId(ItemId),

    /// Completion found nothing to delete. The store cannot tell the causes
    /// apart: the item may never have been enqueued, may already be completed,
    /// or its lease may have expired and been reclaimed (and possibly handed
    /// to another consumer).
    #[error("Item is not processing, cannot complete: {0}")]
    CompletionFailed(ItemId),

    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// The storage backend failed while executing an operation.
    #[error("Store backend error: {0}")]
    Backend(String),

    /// The change feed transport failed. Fatal to the pump that was
    /// consuming it.
    #[error("Change feed error: {0}")]
    Feed(String),

    /// The feed reported a mutation kind this crate does not translate.
    /// Fatal to the pump; observers are notified before it stops.
    #[error("Unknown change operation: {0}")]
    UnknownOperation(String),
}

/// Result type for docket operations.
pub type Result<T> = std::result::Result<T, DocketError>;

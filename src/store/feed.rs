//! Change feed contract: an ordered mutation stream for one collection.

use crate::error::Result;
use crate::shutdown::ShutdownSignal;
use std::fmt;

/// Backend-reported operation label for one mutation.
///
/// The label set is open: backends emit kinds this crate has no translation
/// for (collection maintenance, sharding moves, and whatever future servers
/// add), and those arrive as [`FeedOp::Other`] carrying the raw label.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeedOp {
    Insert,
    Update,
    Replace,
    Delete,
    /// A label this crate does not translate. Fatal to a pump that sees it.
    Other(String),
}

impl fmt::Display for FeedOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedOp::Insert => write!(f, "insert"),
            FeedOp::Update => write!(f, "update"),
            FeedOp::Replace => write!(f, "replace"),
            FeedOp::Delete => write!(f, "delete"),
            FeedOp::Other(label) => write!(f, "{}", label),
        }
    }
}

/// One entry of a collection's mutation stream.
#[derive(Clone, Debug)]
pub enum FeedEvent<T> {
    /// A document-level mutation and the resulting document.
    Applied { op: FeedOp, item: T },
    /// The watched collection as a whole became unusable (dropped, renamed).
    /// No further mutations follow.
    Invalidated,
}

/// An ordered, blocking, cancellable stream of mutation events.
///
/// One feed serves one consumer; it is driven from a single thread.
pub trait ChangeFeed<T>: Send {
    /// Block until at least one event is available, then hand over everything
    /// buffered so far in stream order.
    ///
    /// Returns `Ok(None)` once `stop` fires; implementations must observe the
    /// signal while blocked so shutdown stays prompt. An empty batch is legal
    /// and means "nothing yet, ask again". A transport failure is an error
    /// and ends the stream.
    fn next_batch(&mut self, stop: &ShutdownSignal) -> Result<Option<Vec<FeedEvent<T>>>>;
}

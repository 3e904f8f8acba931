//! Notification payloads and the observer contract.

use crate::error::DocketError;
use crate::store::FeedOp;

/// What kind of mutation a change notification describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Replace,
    Delete,
}

impl TryFrom<FeedOp> for ChangeKind {
    type Error = DocketError;

    /// Translate a backend operation label.
    ///
    /// Labels outside the four document mutations come back as
    /// [`UnknownOperation`](DocketError::UnknownOperation), which is fatal to
    /// the pump that hits it.
    fn try_from(op: FeedOp) -> Result<Self, Self::Error> {
        match op {
            FeedOp::Insert => Ok(ChangeKind::Insert),
            FeedOp::Update => Ok(ChangeKind::Update),
            FeedOp::Replace => Ok(ChangeKind::Replace),
            FeedOp::Delete => Ok(ChangeKind::Delete),
            FeedOp::Other(label) => Err(DocketError::UnknownOperation(label)),
        }
    }
}

/// A translated change notification: what happened, and the document as the
/// mutation left it. Purely transient; never persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct RepositoryChange<T> {
    pub kind: ChangeKind,
    pub item: T,
}

/// Receives change notifications from a broadcaster.
///
/// Delivery is synchronous on the pump thread, in registration snapshot
/// order, with no isolation between observers: a slow `on_next` delays every
/// observer behind it and the next event. An observer that stays subscribed
/// sees at most one terminal call, `on_completed` or `on_error`, after which
/// nothing further is delivered.
pub trait Observer<T>: Send + Sync {
    /// One translated mutation, in stream order.
    fn on_next(&self, change: &RepositoryChange<T>);

    /// The pump hit a fatal condition and is stopping.
    fn on_error(&self, _error: &DocketError) {}

    /// The stream ended cleanly (invalidation or shutdown).
    fn on_completed(&self) {}
}

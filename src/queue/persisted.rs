//! The queue itself: enqueue, claim, complete.

use crate::error::{DocketError, Result};
use crate::queue::sweeper::{reclaim_pass, Sweeper};
use crate::store::{AtomicStore, ItemFilter, StateUpdate};
use crate::types::{ItemId, QueueState, Queueable};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Queue configuration.
#[derive(Clone, Debug)]
pub struct QueueConfig {
    /// Database the queue collection lives in.
    pub database: String,

    /// Collection holding the queue documents.
    pub collection: String,

    /// How long a claim may sit unfinished before the sweeper hands the item
    /// back to waiting consumers. Also the sweep period.
    pub stale_after: Duration,
}

impl QueueConfig {
    pub fn new(
        database: impl Into<String>,
        collection: impl Into<String>,
        stale_after: Duration,
    ) -> Self {
        QueueConfig {
            database: database.into(),
            collection: collection.into(),
            stale_after,
        }
    }
}

/// A persisted work queue with at-most-one-active-consumer semantics.
///
/// Every state transition is a single atomic operation of the backing store,
/// so any number of producers and consumers on any number of processes can
/// share one queue without further coordination. A claimed item that is never
/// completed is not lost: once its lease outlives the staleness threshold,
/// the background sweeper hands it back to waiting consumers.
pub struct PersistedQueue<T: Queueable> {
    store: Arc<dyn AtomicStore<T>>,
    config: QueueConfig,
    /// Held for its drop: joining the sweeper thread is what guarantees no
    /// sweep pass begins after the queue is gone.
    _sweeper: Sweeper,
}

impl<T: Queueable + Send + 'static> PersistedQueue<T> {
    /// Start a queue over `store`, spawning its stale-lease sweeper.
    pub fn new(store: Arc<dyn AtomicStore<T>>, config: QueueConfig) -> Result<Self> {
        let sweeper = Sweeper::spawn(
            Arc::clone(&store),
            config.stale_after,
            config.collection.clone(),
        )?;
        debug!(
            database = %config.database,
            collection = %config.collection,
            stale_after_ms = config.stale_after.as_millis() as u64,
            "queue started"
        );
        Ok(PersistedQueue {
            store,
            config,
            _sweeper: sweeper,
        })
    }

    /// Add `item` to the queue.
    ///
    /// A nil id is replaced with a freshly generated one, mutating the
    /// caller's item; the queue-owned fields are set to waiting as of now.
    /// An id collision fails with [`DuplicateId`](DocketError::DuplicateId)
    /// and leaves the stored item unmodified.
    pub fn enqueue(&self, item: &mut T) -> Result<()> {
        if item.id().is_nil() {
            item.set_id(ItemId::generate());
            trace!(id = %item.id(), "assigned fresh id to item");
        }
        StateUpdate::to(QueueState::Waiting).apply(item);

        self.store.insert(&*item)?;
        trace!(id = %item.id(), "enqueued item");
        Ok(())
    }

    /// Claim one waiting item, or `None` when nothing is waiting.
    ///
    /// The claim is a single atomic read-modify-write: the selected item is
    /// marked processing as of now, and no concurrent claimer can obtain the
    /// same item until its lease is completed or reclaimed. Which waiting
    /// item is claimed is unspecified.
    ///
    /// The returned copy shows the item as it was before the claim (state
    /// still waiting, previous change time); the claim itself is fully
    /// applied in the store. Use the returned item for its identity and
    /// payload, not its bookkeeping fields.
    pub fn dequeue_begin(&self) -> Result<Option<T>> {
        let claimed = self.store.find_one_and_update(
            &ItemFilter::state(QueueState::Waiting),
            StateUpdate::to(QueueState::Processing),
        )?;
        match &claimed {
            Some(item) => trace!(id = %item.id(), "claimed item"),
            None => trace!("nothing waiting to claim"),
        }
        Ok(claimed)
    }

    /// Complete `item`, removing it from the queue for good.
    ///
    /// Deletes the stored document only if it is still processing. A failure
    /// is ambiguous between three causes the store can no longer tell apart:
    /// the item was never enqueued, it was already completed, or its lease
    /// expired and the sweeper reclaimed it (after which another consumer may
    /// even have claimed it again).
    pub fn dequeue_complete(&self, item: &T) -> Result<()> {
        let removed = self
            .store
            .find_one_and_delete(&ItemFilter::id(item.id()).with_state(QueueState::Processing))?;
        match removed {
            Some(_) => {
                trace!(id = %item.id(), "completed item");
                Ok(())
            }
            None => Err(DocketError::CompletionFailed(item.id())),
        }
    }

    /// Hand every expired lease back to waiting consumers now, returning how
    /// many items were reclaimed.
    ///
    /// The sweeper runs this pass automatically every staleness period. You
    /// only need to call it manually to force a pass at a specific time.
    pub fn reclaim_stale(&self) -> Result<usize> {
        reclaim_pass(self.store.as_ref(), self.config.stale_after)
    }

    /// Configuration this queue was started with.
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }
}

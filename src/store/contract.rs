//! Storage contracts for queue items and stored entities.

use crate::error::Result;
use crate::types::{ItemId, QueueState, Queueable, Storable, Timestamp};

/// Conjunctive filter over the queue-owned fields of stored items.
///
/// Unset fields match anything. Backends translate the set fields into their
/// native query form; in-memory backends can use [`ItemFilter::matches`]
/// directly.
#[derive(Clone, Debug, Default)]
pub struct ItemFilter {
    pub id: Option<ItemId>,
    pub state: Option<QueueState>,
    /// Matches items whose last state change is strictly older than this.
    pub changed_before: Option<Timestamp>,
}

impl ItemFilter {
    /// Filter by id only.
    pub fn id(id: ItemId) -> Self {
        ItemFilter {
            id: Some(id),
            ..Default::default()
        }
    }

    /// Filter by state only.
    pub fn state(state: QueueState) -> Self {
        ItemFilter {
            state: Some(state),
            ..Default::default()
        }
    }

    /// Narrow this filter by state.
    pub fn with_state(mut self, state: QueueState) -> Self {
        self.state = Some(state);
        self
    }

    /// Narrow this filter to items whose last state change predates `cutoff`.
    pub fn with_changed_before(mut self, cutoff: Timestamp) -> Self {
        self.changed_before = Some(cutoff);
        self
    }

    /// Whether `item` satisfies every set field.
    pub fn matches(&self, item: &impl Queueable) -> bool {
        if let Some(id) = self.id {
            if item.id() != id {
                return false;
            }
        }
        if let Some(state) = self.state {
            if item.state() != state {
                return false;
            }
        }
        if let Some(cutoff) = self.changed_before {
            if item.last_state_changed() >= cutoff {
                return false;
            }
        }
        true
    }
}

/// A state transition applied by an atomic claim, release, or reclaim.
///
/// State and timestamp always move together; an item is never left with a
/// new state and a stale change time.
#[derive(Clone, Copy, Debug)]
pub struct StateUpdate {
    pub state: QueueState,
    pub changed_at: Timestamp,
}

impl StateUpdate {
    /// Transition into `state` stamped with the current time.
    pub fn to(state: QueueState) -> Self {
        StateUpdate {
            state,
            changed_at: Timestamp::now(),
        }
    }

    /// Write both fields onto `item`.
    pub fn apply(&self, item: &mut impl Queueable) {
        item.set_state(self.state);
        item.set_last_state_changed(self.changed_at);
    }
}

/// Storage contract for [`PersistedQueue`](crate::queue::PersistedQueue).
///
/// The queue performs no in-process locking of its own: every state
/// transition rides on one of these calls, so implementations must make each
/// call atomic with respect to concurrent callers on the same collection.
/// A document database's findAndModify family, a SQL `UPDATE .. RETURNING`,
/// or a mutex around an in-memory map all qualify.
pub trait AtomicStore<T: Queueable>: Send + Sync {
    /// Insert a new document.
    ///
    /// Id uniqueness is enforced here: inserting a document whose id collides
    /// with a stored one fails with
    /// [`DuplicateId`](crate::error::DocketError::DuplicateId) and leaves the
    /// stored document unmodified. Backends typically get this from a unique
    /// index on the id field.
    fn insert(&self, item: &T) -> Result<()>;

    /// Fetch one document matching `filter` without modifying it.
    fn find_one(&self, filter: &ItemFilter) -> Result<Option<T>>;

    /// Atomically select one document matching `filter`, apply `update`, and
    /// return the selected document as it was before the update.
    ///
    /// When several documents match, which one is selected is unspecified.
    /// Returns `None` (with nothing modified) when no document matches.
    fn find_one_and_update(&self, filter: &ItemFilter, update: StateUpdate) -> Result<Option<T>>;

    /// Atomically delete one document matching `filter` and return it, or
    /// `None` (with nothing deleted) when no document matches.
    fn find_one_and_delete(&self, filter: &ItemFilter) -> Result<Option<T>>;
}

/// CRUD surface over one collection of stored entities.
///
/// Predicates are plain closures evaluated against candidate entities;
/// translating richer query forms is a backend concern outside this crate.
pub trait Repository<T: Storable>: Send + Sync {
    /// Insert `item`, assigning an id when it has none and stamping the audit
    /// fields with the current time and `actor`. Returns the stored entity.
    fn add(&self, item: T, actor: &str) -> Result<T>;

    /// All entities, in unspecified order.
    fn find_all(&self) -> Result<Vec<T>>;

    /// All entities satisfying `predicate`, in unspecified order.
    fn find(&self, predicate: &dyn Fn(&T) -> bool) -> Result<Vec<T>>;

    /// One entity satisfying `predicate`, if any.
    fn find_one(&self, predicate: &dyn Fn(&T) -> bool) -> Result<Option<T>>;

    /// Replace the stored entity carrying the same id, restamping the
    /// modification audit fields. An unset id is
    /// [`InvalidOperation`](crate::error::DocketError::InvalidOperation); a
    /// missing target is [`NotFound`](crate::error::DocketError::NotFound).
    fn replace(&self, item: T, actor: &str) -> Result<T>;

    /// Remove the stored entity with `item`'s id. A missing target is
    /// [`NotFound`](crate::error::DocketError::NotFound).
    fn delete(&self, item: &T) -> Result<()>;
}

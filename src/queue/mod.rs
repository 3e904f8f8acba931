//! Persisted work queue with lease-based recovery.
//!
//! Items live in a backing document store and move through a two-state
//! lifecycle: waiting items are claimed atomically by consumers, processing
//! items either complete (and leave the store) or go stale and are handed
//! back to waiting consumers by a background sweeper. Any number of
//! producers and consumers can share one queue; the store's atomic
//! find-and-modify operations carry all of the coordination.
//!
//! # Example
//!
//! ```ignore
//! let store = Arc::new(MemoryStore::new());
//! let queue = PersistedQueue::new(
//!     store,
//!     QueueConfig::new("app", "jobs", Duration::from_secs(300)),
//! )?;
//!
//! queue.enqueue(&mut job)?;
//! if let Some(job) = queue.dequeue_begin()? {
//!     // ... do the work ...
//!     queue.dequeue_complete(&job)?;
//! }
//! ```

mod persisted;
mod sweeper;

pub use persisted::{PersistedQueue, QueueConfig};

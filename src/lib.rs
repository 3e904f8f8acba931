//! # docket
//!
//! Store-backed coordination primitives: a persisted work queue with
//! at-most-one-active-consumer semantics, and a change-feed broadcaster that
//! fans collection mutations out to in-process observers.
//!
//! ## Core Concepts
//!
//! - **PersistedQueue**: Items ride on a backing document store; claims are
//!   single atomic read-modify-writes, and stalled claims are handed back by
//!   a stale-lease sweeper
//! - **ChangeBroadcaster**: One thread pumps a collection's mutation feed
//!   and delivers translated changes synchronously to every observer
//! - **SubscriptionRegistry**: Copy-on-write observer set with lock-free
//!   snapshots and capability-based unsubscription
//! - **Contracts over backends**: `AtomicStore` and `ChangeFeed` describe
//!   what a backend must provide; the built-in memory backend implements
//!   both for tests and single-process use
//!
//! ## Example
//!
//! ```ignore
//! use docket::{MemoryStore, PersistedQueue, QueueConfig};
//!
//! let store = Arc::new(MemoryStore::new());
//! let queue = PersistedQueue::new(store, QueueConfig::new(
//!     "app",
//!     "jobs",
//!     Duration::from_secs(300),
//! ))?;
//!
//! queue.enqueue(&mut job)?;
//! if let Some(claimed) = queue.dequeue_begin()? {
//!     // ... do the work ...
//!     queue.dequeue_complete(&claimed)?;
//! }
//! ```

pub mod error;
pub mod queue;
pub mod shutdown;
pub mod store;
pub mod types;
pub mod watch;

// Re-exports
pub use error::{DocketError, Result};
pub use queue::{PersistedQueue, QueueConfig};
pub use shutdown::{ShutdownHandle, ShutdownSignal};
pub use store::{
    AtomicStore, ChangeFeed, FeedEvent, FeedOp, ItemFilter, MemoryFeed, MemoryRepository,
    MemoryStore, Repository, StateUpdate,
};
pub use types::*;
pub use watch::{
    ChangeBroadcaster, ChangeKind, Observer, PumpState, RepositoryChange, Subscription,
    SubscriptionRegistry,
};

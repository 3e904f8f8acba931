//! Storage contracts and the in-memory reference backend.
//!
//! The queue and the watch pipeline never talk to a database directly; they
//! talk to two narrow contracts defined here:
//! - [`AtomicStore`]: atomic find-and-modify operations over one collection
//!   of queueable documents
//! - [`ChangeFeed`]: an ordered, blocking, cancellable stream of mutation
//!   events for one collection
//!
//! A third contract, [`Repository`], is the general CRUD surface for stored
//! entities with audit bookkeeping.
//!
//! [`MemoryStore`] and [`MemoryRepository`] implement all of the above over
//! mutex-guarded maps so the whole system runs without an external database;
//! a real backend maps the contracts onto its own find-and-modify and change
//! stream primitives.

mod contract;
mod feed;
mod memory;

pub use contract::{AtomicStore, ItemFilter, Repository, StateUpdate};
pub use feed::{ChangeFeed, FeedEvent, FeedOp};
pub use memory::{MemoryFeed, MemoryRepository, MemoryStore};

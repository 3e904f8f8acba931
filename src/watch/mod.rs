//! Change-feed fan-out: pump, observer registry, notification payloads.
//!
//! A [`ChangeBroadcaster`] pumps one [`ChangeFeed`](crate::store::ChangeFeed)
//! on a dedicated thread, translates each backend mutation into a
//! [`RepositoryChange`], and delivers it synchronously to every registered
//! [`Observer`]. Observers come and go at any time through a copy-on-write
//! [`SubscriptionRegistry`]; the hot fan-out path never takes a lock.
//!
//! # Example
//!
//! ```ignore
//! let repo = MemoryRepository::new();
//! let broadcaster = ChangeBroadcaster::spawn(repo.watch())?;
//!
//! let observer = Arc::new(MyObserver::default());
//! let subscription = broadcaster.subscribe(&observer);
//!
//! repo.add(doc, "worker")?;        // observer.on_next(Insert, doc)
//! subscription.unsubscribe();      // or just drop it
//! ```

mod broadcaster;
mod registry;
mod types;

pub use broadcaster::{ChangeBroadcaster, PumpState};
pub use registry::{Subscription, SubscriptionRegistry};
pub use types::{ChangeKind, Observer, RepositoryChange};

//! In-memory reference backend.
//!
//! Everything here runs under plain mutexes: one lock guards one logical
//! collection, which trivially gives the atomicity the contracts demand. The
//! point is not performance but a faithful stand-in for a real document
//! store, so the queue, the watch pipeline, and their tests run end to end
//! without any external service.

use crate::error::{DocketError, Result};
use crate::shutdown::ShutdownSignal;
use crate::store::contract::{AtomicStore, ItemFilter, Repository, StateUpdate};
use crate::store::feed::{ChangeFeed, FeedEvent, FeedOp};
use crate::types::{ItemId, Queueable, Storable, Timestamp};
use crossbeam_channel::{select, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

/// In-memory [`AtomicStore`].
///
/// Every operation takes the collection mutex for its whole duration, so each
/// call is atomic exactly as the contract requires. Hash-map iteration order
/// provides the unspecified pick among multiple matches.
pub struct MemoryStore<T> {
    items: Mutex<HashMap<ItemId, T>>,
}

impl<T> MemoryStore<T> {
    pub fn new() -> Self {
        MemoryStore {
            items: Mutex::new(HashMap::new()),
        }
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        MemoryStore::new()
    }
}

impl<T: Queueable + Clone + Send> AtomicStore<T> for MemoryStore<T> {
    fn insert(&self, item: &T) -> Result<()> {
        let mut items = self.items.lock();
        if items.contains_key(&item.id()) {
            return Err(DocketError::DuplicateId(item.id()));
        }
        items.insert(item.id(), item.clone());
        Ok(())
    }

    fn find_one(&self, filter: &ItemFilter) -> Result<Option<T>> {
        let items = self.items.lock();
        Ok(items.values().find(|item| filter.matches(*item)).cloned())
    }

    fn find_one_and_update(&self, filter: &ItemFilter, update: StateUpdate) -> Result<Option<T>> {
        let mut items = self.items.lock();
        let key = match items.values().find(|item| filter.matches(*item)) {
            Some(found) => found.id(),
            None => return Ok(None),
        };
        match items.get_mut(&key) {
            Some(entry) => {
                let before = entry.clone();
                update.apply(entry);
                Ok(Some(before))
            }
            None => Ok(None),
        }
    }

    fn find_one_and_delete(&self, filter: &ItemFilter) -> Result<Option<T>> {
        let mut items = self.items.lock();
        let key = match items.values().find(|item| filter.matches(*item)) {
            Some(found) => found.id(),
            None => return Ok(None),
        };
        Ok(items.remove(&key))
    }
}

/// In-memory observable [`Repository`].
///
/// Mutations are mirrored onto every feed handed out by [`watch`]
/// (`add` → insert, `replace` → replace, `delete` → delete). Events are
/// emitted while the collection lock is held, so feed order always matches
/// commit order.
///
/// [`watch`]: MemoryRepository::watch
pub struct MemoryRepository<T> {
    entries: Mutex<HashMap<String, T>>,
    taps: Mutex<Vec<Sender<FeedEvent<T>>>>,
}

impl<T: Clone> MemoryRepository<T> {
    pub fn new() -> Self {
        MemoryRepository {
            entries: Mutex::new(HashMap::new()),
            taps: Mutex::new(Vec::new()),
        }
    }

    /// Open a feed mirroring this repository's mutations from now on.
    pub fn watch(&self) -> MemoryFeed<T> {
        let (tx, rx) = unbounded();
        self.taps.lock().push(tx);
        MemoryFeed { events: rx }
    }

    /// End every outstanding feed as if the backing collection had been
    /// dropped: each feed receives the invalidation marker and then nothing
    /// else. Later mutations are not mirrored anywhere.
    pub fn invalidate(&self) {
        // Taking the collection lock serializes against writers, so no
        // mutation event can land after the invalidation marker.
        let _entries = self.entries.lock();
        let mut taps = self.taps.lock();
        for tap in taps.iter() {
            let _ = tap.send(FeedEvent::Invalidated);
        }
        taps.clear();
    }

    /// Deliver `event` to every live feed, pruning closed ones.
    ///
    /// Callers hold the collection lock, which is what pins feed order to
    /// commit order.
    fn emit(&self, event: FeedEvent<T>) {
        let mut taps = self.taps.lock();
        taps.retain(|tap| tap.send(event.clone()).is_ok());
    }
}

impl<T: Clone> Default for MemoryRepository<T> {
    fn default() -> Self {
        MemoryRepository::new()
    }
}

impl<T: Storable + Clone + Send> Repository<T> for MemoryRepository<T> {
    fn add(&self, mut item: T, actor: &str) -> Result<T> {
        let mut entries = self.entries.lock();
        if item.id().is_empty() {
            item.set_id(Uuid::new_v4().to_string());
        }
        if entries.contains_key(item.id()) {
            return Err(DocketError::InvalidOperation(format!(
                "entity already stored: {}",
                item.id()
            )));
        }

        let now = Timestamp::now();
        let audit = item.audit_mut();
        audit.created_at = now;
        audit.created_by = actor.to_string();
        audit.modified_at = now;
        audit.modified_by = actor.to_string();

        entries.insert(item.id().to_string(), item.clone());
        self.emit(FeedEvent::Applied {
            op: FeedOp::Insert,
            item: item.clone(),
        });
        Ok(item)
    }

    fn find_all(&self) -> Result<Vec<T>> {
        Ok(self.entries.lock().values().cloned().collect())
    }

    fn find(&self, predicate: &dyn Fn(&T) -> bool) -> Result<Vec<T>> {
        let entries = self.entries.lock();
        Ok(entries.values().filter(|e| predicate(e)).cloned().collect())
    }

    fn find_one(&self, predicate: &dyn Fn(&T) -> bool) -> Result<Option<T>> {
        let entries = self.entries.lock();
        Ok(entries.values().find(|e| predicate(e)).cloned())
    }

    fn replace(&self, mut item: T, actor: &str) -> Result<T> {
        if item.id().is_empty() {
            return Err(DocketError::InvalidOperation(
                "cannot replace an entity without an id".to_string(),
            ));
        }

        let mut entries = self.entries.lock();
        if !entries.contains_key(item.id()) {
            return Err(DocketError::NotFound(item.id().to_string()));
        }

        let audit = item.audit_mut();
        audit.modified_at = Timestamp::now();
        audit.modified_by = actor.to_string();

        entries.insert(item.id().to_string(), item.clone());
        self.emit(FeedEvent::Applied {
            op: FeedOp::Replace,
            item: item.clone(),
        });
        Ok(item)
    }

    fn delete(&self, item: &T) -> Result<()> {
        let mut entries = self.entries.lock();
        match entries.remove(item.id()) {
            Some(removed) => {
                // Unlike a real change stream, the removed entity is still at
                // hand here, so delete events carry it in full.
                self.emit(FeedEvent::Applied {
                    op: FeedOp::Delete,
                    item: removed,
                });
                Ok(())
            }
            None => Err(DocketError::NotFound(item.id().to_string())),
        }
    }
}

/// [`ChangeFeed`] over an in-process channel.
///
/// Backs [`MemoryRepository::watch`], and via [`pair`](MemoryFeed::pair) also
/// serves as a hand-driven feed for exercising pumps directly.
pub struct MemoryFeed<T> {
    events: Receiver<FeedEvent<T>>,
}

impl<T> MemoryFeed<T> {
    /// A feed plus the sender that drives it.
    pub fn pair() -> (Sender<FeedEvent<T>>, MemoryFeed<T>) {
        let (tx, rx) = unbounded();
        (tx, MemoryFeed { events: rx })
    }
}

impl<T: Send> ChangeFeed<T> for MemoryFeed<T> {
    fn next_batch(&mut self, stop: &ShutdownSignal) -> Result<Option<Vec<FeedEvent<T>>>> {
        select! {
            recv(self.events) -> msg => match msg {
                Ok(first) => {
                    // Hand over everything buffered behind the first event so
                    // a burst costs one wakeup.
                    let mut batch = vec![first];
                    batch.extend(self.events.try_iter());
                    Ok(Some(batch))
                }
                Err(_) => Err(DocketError::Feed("change feed disconnected".to_string())),
            },
            recv(stop.as_receiver()) -> _ => Ok(None),
        }
    }
}

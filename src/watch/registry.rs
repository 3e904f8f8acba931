//! Copy-on-write observer registry.

use crate::error::DocketError;
use crate::watch::types::Observer;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

type ObserverList<T> = Vec<Weak<dyn Observer<T>>>;

/// Thread-safe observer set with copy-on-write snapshots.
///
/// Readers (the fan-out path) load the current immutable list without
/// locking. Every mutation builds a replacement list under a narrow lock and
/// swaps it in whole; the lock is never held while an observer callback
/// runs. Observers are held weakly: the registry never keeps one alive, and
/// entries whose observer is gone are pruned on the next mutation.
pub struct SubscriptionRegistry<T> {
    snapshot: ArcSwap<ObserverList<T>>,
    /// Serializes mutations; the flag inside marks the registry closed after
    /// its terminal broadcast.
    mutate: Mutex<bool>,
}

impl<T> SubscriptionRegistry<T> {
    pub fn new() -> Self {
        SubscriptionRegistry {
            snapshot: ArcSwap::from_pointee(Vec::new()),
            mutate: Mutex::new(false),
        }
    }

    /// Register `observer`, returning the capability that unsubscribes it.
    ///
    /// Subscribing the same observer (by identity) twice does not duplicate
    /// it, but still returns a fresh capability; either capability removes
    /// the single registration. Once the registry has broadcast a terminal
    /// notification it is closed, and subscribing becomes inert: the
    /// returned capability is valid but nothing was registered.
    pub fn subscribe<O>(self: &Arc<Self>, observer: &Arc<O>) -> Subscription<T>
    where
        O: Observer<T> + 'static,
    {
        let target = Arc::downgrade(observer) as Weak<dyn Observer<T>>;

        let closed = self.mutate.lock();
        if !*closed {
            let current = self.snapshot.load();
            let mut next: ObserverList<T> = current
                .iter()
                .filter(|weak| weak.strong_count() > 0)
                .cloned()
                .collect();
            if !next.iter().any(|weak| Weak::ptr_eq(weak, &target)) {
                next.push(target.clone());
            }
            self.snapshot.store(Arc::new(next));
        }
        drop(closed);

        Subscription {
            registry: Arc::downgrade(self),
            target,
        }
    }

    /// Lock-free snapshot of the current observer list.
    ///
    /// The list is immutable; mutations that land after this call swap in a
    /// different list and never touch the one returned here.
    pub fn snapshot(&self) -> Arc<ObserverList<T>> {
        self.snapshot.load_full()
    }

    /// Number of currently registered live observers.
    pub fn observer_count(&self) -> usize {
        self.snapshot
            .load()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Whether the terminal broadcast has happened.
    pub fn is_closed(&self) -> bool {
        *self.mutate.lock()
    }

    /// Deliver `on_completed` to every registered observer exactly once,
    /// empty the registry, and close it.
    pub fn complete_all(&self) {
        for weak in self.take_and_close().iter() {
            if let Some(observer) = weak.upgrade() {
                observer.on_completed();
            }
        }
    }

    /// Deliver `on_error` to every registered observer, empty the registry,
    /// and close it.
    pub fn fail_all(&self, error: &DocketError) {
        for weak in self.take_and_close().iter() {
            if let Some(observer) = weak.upgrade() {
                observer.on_error(error);
            }
        }
    }

    /// Swap in the empty list and mark the registry closed, handing back
    /// what was registered.
    ///
    /// Capture and clear happen atomically under the mutation lock; delivery
    /// then runs outside it. A concurrent subscriber therefore either lands
    /// before the swap and hears the terminal notification, or after it and
    /// is inert.
    fn take_and_close(&self) -> Arc<ObserverList<T>> {
        let mut closed = self.mutate.lock();
        *closed = true;
        self.snapshot.swap(Arc::new(Vec::new()))
    }

    /// Remove `target`. Idempotent; reached only through a `Subscription`.
    fn remove(&self, target: &Weak<dyn Observer<T>>) {
        let _closed = self.mutate.lock();
        let current = self.snapshot.load();
        let next: ObserverList<T> = current
            .iter()
            .filter(|weak| weak.strong_count() > 0 && !Weak::ptr_eq(weak, target))
            .cloned()
            .collect();
        self.snapshot.store(Arc::new(next));
    }
}

impl<T> Default for SubscriptionRegistry<T> {
    fn default() -> Self {
        SubscriptionRegistry::new()
    }
}

/// Capability to unsubscribe one observer.
///
/// Unsubscription happens only through this handle: explicitly via
/// [`unsubscribe`](Subscription::unsubscribe) (idempotent) or implicitly by
/// dropping it. A capability that outlives its registry is a safe no-op.
#[must_use = "dropping a Subscription unsubscribes its observer"]
pub struct Subscription<T> {
    registry: Weak<SubscriptionRegistry<T>>,
    target: Weak<dyn Observer<T>>,
}

impl<T> Subscription<T> {
    /// Remove the observer from the registry. Safe to call any number of
    /// times, and after the registry or the observer is gone.
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.target);
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watch::types::RepositoryChange;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        nexts: AtomicUsize,
        errors: AtomicUsize,
        completions: AtomicUsize,
    }

    impl Observer<String> for Counting {
        fn on_next(&self, _change: &RepositoryChange<String>) {
            self.nexts.fetch_add(1, Ordering::SeqCst);
        }
        fn on_error(&self, _error: &DocketError) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
        fn on_completed(&self) {
            self.completions.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn registry() -> Arc<SubscriptionRegistry<String>> {
        Arc::new(SubscriptionRegistry::new())
    }

    #[test]
    fn test_subscribe_same_observer_twice_registers_once() {
        let registry = registry();
        let observer = Arc::new(Counting::default());

        let first = registry.subscribe(&observer);
        let second = registry.subscribe(&observer);
        assert_eq!(registry.observer_count(), 1);

        // A different observer is a different identity.
        let other = Arc::new(Counting::default());
        let third = registry.subscribe(&other);
        assert_eq!(registry.observer_count(), 2);

        drop((first, second, third));
    }

    #[test]
    fn test_either_capability_removes_the_single_registration() {
        let registry = registry();
        let observer = Arc::new(Counting::default());

        let first = registry.subscribe(&observer);
        let second = registry.subscribe(&observer);

        first.unsubscribe();
        assert_eq!(registry.observer_count(), 0);

        // Idempotent, on both capabilities.
        first.unsubscribe();
        second.unsubscribe();
        assert_eq!(registry.observer_count(), 0);
    }

    #[test]
    fn test_dropping_the_capability_unsubscribes() {
        let registry = registry();
        let observer = Arc::new(Counting::default());

        let subscription = registry.subscribe(&observer);
        assert_eq!(registry.observer_count(), 1);
        drop(subscription);
        assert_eq!(registry.observer_count(), 0);
    }

    #[test]
    fn test_capability_outliving_the_registry_is_a_noop() {
        let observer = Arc::new(Counting::default());
        let subscription = {
            let registry = registry();
            registry.subscribe(&observer)
        };
        subscription.unsubscribe();
    }

    #[test]
    fn test_registry_does_not_keep_observers_alive() {
        let registry = registry();
        let observer = Arc::new(Counting::default());
        let subscription = registry.subscribe(&observer);

        drop(observer);
        assert_eq!(registry.observer_count(), 0);

        // The dead entry is pruned by the next mutation.
        let survivor = Arc::new(Counting::default());
        let other = registry.subscribe(&survivor);
        assert_eq!(registry.snapshot().len(), 1);

        drop((subscription, other));
    }

    #[test]
    fn test_snapshots_are_immune_to_later_mutations() {
        let registry = registry();
        let observer = Arc::new(Counting::default());
        let subscription = registry.subscribe(&observer);

        let snapshot = registry.snapshot();
        subscription.unsubscribe();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.observer_count(), 0);
    }

    #[test]
    fn test_complete_all_notifies_exactly_once_and_closes() {
        let registry = registry();
        let a = Arc::new(Counting::default());
        let b = Arc::new(Counting::default());
        let subs = (registry.subscribe(&a), registry.subscribe(&b));

        registry.complete_all();
        assert_eq!(a.completions.load(Ordering::SeqCst), 1);
        assert_eq!(b.completions.load(Ordering::SeqCst), 1);
        assert_eq!(registry.observer_count(), 0);
        assert!(registry.is_closed());

        // Already empty; nobody hears a second completion.
        registry.complete_all();
        assert_eq!(a.completions.load(Ordering::SeqCst), 1);

        drop(subs);
    }

    #[test]
    fn test_subscribing_to_a_closed_registry_is_inert() {
        let registry = registry();
        registry.complete_all();

        let late = Arc::new(Counting::default());
        let subscription = registry.subscribe(&late);
        assert_eq!(registry.observer_count(), 0);

        subscription.unsubscribe();
    }

    #[test]
    fn test_fail_all_delivers_the_error() {
        let registry = registry();
        let observer = Arc::new(Counting::default());
        let _subscription = registry.subscribe(&observer);

        registry.fail_all(&DocketError::UnknownOperation("rename".into()));
        assert_eq!(observer.errors.load(Ordering::SeqCst), 1);
        assert_eq!(observer.completions.load(Ordering::SeqCst), 0);
        assert!(registry.is_closed());
    }
}

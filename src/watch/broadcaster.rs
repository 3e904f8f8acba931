//! The change pump: one thread draining a feed into the observer set.

use crate::error::Result;
use crate::shutdown::{ShutdownHandle, ShutdownSignal};
use crate::store::{ChangeFeed, FeedEvent};
use crate::watch::registry::{Subscription, SubscriptionRegistry};
use crate::watch::types::{ChangeKind, Observer, RepositoryChange};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, trace};

/// Pump lifecycle.
///
/// Every path into `Stopped` notifies observers first: `on_completed` after
/// invalidation or shutdown, `on_error` after a fault. The two intermediate
/// states are visible while that terminal broadcast is in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PumpState {
    /// Consuming the feed and delivering events.
    Running,
    /// The feed was invalidated; completion is being broadcast.
    Invalidated,
    /// A fatal condition was hit; the failure is being broadcast.
    Faulted,
    /// The pump thread has exited. Terminal.
    Stopped,
}

/// Shared lifecycle cell. Discriminants follow declaration order.
struct StateCell(AtomicU8);

impl StateCell {
    fn new() -> Self {
        StateCell(AtomicU8::new(PumpState::Running as u8))
    }

    fn set(&self, state: PumpState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }

    fn get(&self) -> PumpState {
        match self.0.load(Ordering::SeqCst) {
            0 => PumpState::Running,
            1 => PumpState::Invalidated,
            2 => PumpState::Faulted,
            _ => PumpState::Stopped,
        }
    }
}

/// Owns the observer registry and the pump thread over one change feed.
///
/// The pump translates each backend mutation and delivers it synchronously
/// to every observer in the current registration snapshot. Termination is
/// final: after invalidation, a fault, or shutdown, this broadcaster never
/// delivers again; watching anew means building a fresh broadcaster over a
/// fresh feed.
pub struct ChangeBroadcaster<T> {
    registry: Arc<SubscriptionRegistry<T>>,
    state: Arc<StateCell>,
    shutdown: Option<ShutdownHandle>,
    pump: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> ChangeBroadcaster<T> {
    /// Start pumping `feed` on a dedicated thread.
    pub fn spawn<F>(feed: F) -> Result<Self>
    where
        F: ChangeFeed<T> + 'static,
    {
        let registry = Arc::new(SubscriptionRegistry::new());
        let state = Arc::new(StateCell::new());
        let (shutdown, signal) = ShutdownSignal::pair();

        let pump_registry = Arc::clone(&registry);
        let pump_state = Arc::clone(&state);
        let pump = thread::Builder::new()
            .name("docket-pump".to_string())
            .spawn(move || pump_loop(feed, pump_registry, pump_state, signal))?;

        Ok(ChangeBroadcaster {
            registry,
            state,
            shutdown: Some(shutdown),
            pump: Some(pump),
        })
    }
}

impl<T> ChangeBroadcaster<T> {
    /// Register an observer for all subsequent changes.
    ///
    /// The observer is held weakly and deduplicated by identity; see
    /// [`SubscriptionRegistry::subscribe`]. Subscribing after the pump has
    /// terminated yields an inert capability.
    pub fn subscribe<O>(&self, observer: &Arc<O>) -> Subscription<T>
    where
        O: Observer<T> + 'static,
    {
        self.registry.subscribe(observer)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PumpState {
        self.state.get()
    }

    /// Number of observers currently registered.
    pub fn observer_count(&self) -> usize {
        self.registry.observer_count()
    }

    /// Stop the pump and wait for it to exit.
    ///
    /// A pump stopped this way broadcasts `on_completed` on its way out; one
    /// that already terminated is left as it ended. Dropping the broadcaster
    /// does the same.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.shutdown.take();
        if let Some(pump) = self.pump.take() {
            let _ = pump.join();
        }
    }
}

impl<T> Drop for ChangeBroadcaster<T> {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

fn pump_loop<T, F>(
    mut feed: F,
    registry: Arc<SubscriptionRegistry<T>>,
    state: Arc<StateCell>,
    signal: ShutdownSignal,
) where
    F: ChangeFeed<T>,
{
    debug!("pump started");
    drain(&mut feed, &registry, &state, &signal);
    state.set(PumpState::Stopped);
    debug!("pump stopped");
}

/// Run the fetch/translate/deliver loop until a terminal condition.
///
/// Whichever way the loop ends, observers hear about it before this returns.
fn drain<T, F>(
    feed: &mut F,
    registry: &SubscriptionRegistry<T>,
    state: &StateCell,
    signal: &ShutdownSignal,
) where
    F: ChangeFeed<T>,
{
    loop {
        let batch = match feed.next_batch(signal) {
            Ok(Some(batch)) => batch,
            Ok(None) => {
                // Shutdown: still a clean end of the stream for observers.
                debug!("pump cancelled, completing observers");
                registry.complete_all();
                return;
            }
            Err(err) => {
                state.set(PumpState::Faulted);
                error!(error = %err, "change feed failed, notifying observers");
                registry.fail_all(&err);
                return;
            }
        };

        for event in batch {
            match event {
                FeedEvent::Applied { op, item } => match ChangeKind::try_from(op) {
                    Ok(kind) => deliver(registry, RepositoryChange { kind, item }),
                    Err(err) => {
                        state.set(PumpState::Faulted);
                        error!(error = %err, "untranslatable change, notifying observers");
                        registry.fail_all(&err);
                        return;
                    }
                },
                FeedEvent::Invalidated => {
                    state.set(PumpState::Invalidated);
                    debug!("feed invalidated, completing observers");
                    registry.complete_all();
                    return;
                }
            }
        }
    }
}

/// Fan one change out to the current snapshot, in order, on this thread.
fn deliver<T>(registry: &SubscriptionRegistry<T>, change: RepositoryChange<T>) {
    let observers = registry.snapshot();
    trace!(kind = ?change.kind, observers = observers.len(), "delivering change");
    for weak in observers.iter() {
        if let Some(observer) = weak.upgrade() {
            observer.on_next(&change);
        }
    }
}

//! Background reclamation of stale leases.

use crate::error::Result;
use crate::shutdown::{ShutdownHandle, ShutdownSignal};
use crate::store::{AtomicStore, ItemFilter, StateUpdate};
use crate::types::{QueueState, Queueable, Timestamp};
use crossbeam_channel::{select, tick};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// One reclamation pass: hand every expired lease back to waiting consumers.
///
/// Loops the atomic find-and-update until no expired item remains, so one
/// pass drains however many leases expired at once. Returns the number of
/// items reclaimed. Reclaimed items are stamped as waiting as of now and are
/// indistinguishable from freshly enqueued ones.
pub(crate) fn reclaim_pass<T: Queueable>(
    store: &dyn AtomicStore<T>,
    stale_after: Duration,
) -> Result<usize> {
    let cutoff = Timestamp::now().minus(stale_after);
    let expired = ItemFilter::state(QueueState::Processing).with_changed_before(cutoff);
    let release = StateUpdate::to(QueueState::Waiting);

    let mut reclaimed = 0;
    while let Some(item) = store.find_one_and_update(&expired, release)? {
        trace!(id = %item.id(), "reclaimed stale lease");
        reclaimed += 1;
    }
    Ok(reclaimed)
}

/// Periodic sweeper thread, with period equal to the staleness threshold.
///
/// The first pass fires one full period after spawn. A failed pass is logged
/// and contained; the following tick runs normally. Dropping the sweeper
/// fires its shutdown signal and joins the thread, so no pass begins after
/// drop returns.
pub(crate) struct Sweeper {
    shutdown: Option<ShutdownHandle>,
    thread: Option<JoinHandle<()>>,
}

impl Sweeper {
    pub(crate) fn spawn<T>(
        store: Arc<dyn AtomicStore<T>>,
        stale_after: Duration,
        collection: String,
    ) -> Result<Self>
    where
        T: Queueable + Send + 'static,
    {
        let (shutdown, signal) = ShutdownSignal::pair();
        let thread = thread::Builder::new()
            .name("docket-sweeper".to_string())
            .spawn(move || run(store, stale_after, collection, signal))?;
        Ok(Sweeper {
            shutdown: Some(shutdown),
            thread: Some(thread),
        })
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.shutdown.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn run<T: Queueable>(
    store: Arc<dyn AtomicStore<T>>,
    stale_after: Duration,
    collection: String,
    signal: ShutdownSignal,
) {
    debug!(
        collection = %collection,
        period_ms = stale_after.as_millis() as u64,
        "sweeper started"
    );
    let ticker = tick(stale_after);
    loop {
        select! {
            recv(ticker) -> _ => match reclaim_pass(store.as_ref(), stale_after) {
                Ok(0) => {}
                Ok(count) => {
                    debug!(collection = %collection, count, "sweeper reclaimed stale leases");
                }
                Err(err) => {
                    // Contained: the next tick runs normally, and foreground
                    // operations never wait on the sweeper.
                    warn!(collection = %collection, error = %err, "sweep pass failed");
                }
            },
            recv(signal.as_receiver()) -> _ => break,
        }
    }
    debug!(collection = %collection, "sweeper stopped");
}

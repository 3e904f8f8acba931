//! Drop-to-fire shutdown signalling.
//!
//! A `ShutdownHandle`/`ShutdownSignal` pair rides on channel disconnection:
//! the handle owns the sender half and never sends anything, so every watcher
//! is released the moment the handle is dropped or triggered. Watchers can
//! poll the signal or feed its receiver into a `select!` arm, which makes the
//! same primitive work for periodic timers and for blocking fetches.

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};

/// Owner half of a shutdown signal.
///
/// Dropping the handle fires the signal for every associated
/// [`ShutdownSignal`], including clones.
pub struct ShutdownHandle {
    _tx: Sender<()>,
}

impl ShutdownHandle {
    /// Fire the signal now. Equivalent to dropping the handle.
    pub fn trigger(self) {
        // Dropping the sender disconnects every watcher.
    }
}

/// Watcher half of a shutdown signal.
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: Receiver<()>,
}

impl ShutdownSignal {
    /// Create a connected handle/signal pair.
    pub fn pair() -> (ShutdownHandle, ShutdownSignal) {
        let (tx, rx) = bounded(0);
        (ShutdownHandle { _tx: tx }, ShutdownSignal { rx })
    }

    /// Whether the owning handle has been dropped or triggered.
    pub fn is_triggered(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Raw receiver for use in `select!` arms.
    ///
    /// The channel never carries messages; a `recv` on it returns an error
    /// exactly when the signal fires, so treat any completion of this arm as
    /// the shutdown notification.
    pub fn as_receiver(&self) -> &Receiver<()> {
        &self.rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_signal_starts_untriggered() {
        let (_handle, signal) = ShutdownSignal::pair();
        assert!(!signal.is_triggered());
    }

    #[test]
    fn test_drop_fires_signal() {
        let (handle, signal) = ShutdownSignal::pair();
        drop(handle);
        assert!(signal.is_triggered());
    }

    #[test]
    fn test_trigger_fires_signal() {
        let (handle, signal) = ShutdownSignal::pair();
        handle.trigger();
        assert!(signal.is_triggered());
    }

    #[test]
    fn test_clones_all_see_the_signal() {
        let (handle, signal) = ShutdownSignal::pair();
        let clone = signal.clone();
        drop(handle);
        assert!(signal.is_triggered());
        assert!(clone.is_triggered());
    }

    #[test]
    fn test_receiver_unblocks_on_trigger() {
        let (handle, signal) = ShutdownSignal::pair();
        let waiter = thread::spawn(move || {
            // Errors out when the handle goes away; that is the signal.
            signal.as_receiver().recv().unwrap_err();
        });
        thread::sleep(Duration::from_millis(20));
        handle.trigger();
        waiter.join().unwrap();
    }
}

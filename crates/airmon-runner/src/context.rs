//! Shared runtime state: bus lock and cooperative shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::{Mutex, MutexGuard};

/// State shared between the workers and the aggregator.
///
/// The bus lock serializes transactions across workers: multiple device
/// addresses can sit on the same physical bus, and an interleaved write/read
/// pair from two devices corrupts both framings. Holders keep the guard for
/// the full write + settle + read span of a protocol operation.
///
/// Shutdown is cooperative. [`request_shutdown`](Self::request_shutdown) sets
/// the flag and closes the wake channel so workers blocked between timer ticks
/// wake immediately; nobody is interrupted mid-transaction.
pub struct RuntimeContext {
    bus: Mutex<()>,
    shutdown: AtomicBool,
    wake_tx: Mutex<Option<Sender<()>>>,
    wake_rx: Receiver<()>,
}

impl RuntimeContext {
    /// Create a fresh context for one daemon session.
    pub fn new() -> Arc<Self> {
        let (wake_tx, wake_rx) = bounded(0);
        Arc::new(RuntimeContext {
            bus: Mutex::new(()),
            shutdown: AtomicBool::new(false),
            wake_tx: Mutex::new(Some(wake_tx)),
            wake_rx,
        })
    }

    /// Acquire the shared bus lock.
    pub fn lock_bus(&self) -> MutexGuard<'_, ()> {
        self.bus.lock()
    }

    /// Raise the shutdown flag and wake every blocked worker.
    ///
    /// Safe to call from signal context: it only flips an atomic and drops a
    /// channel sender.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.wake_tx.lock().take();
    }

    /// Whether shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// A receiver that becomes permanently ready once shutdown is requested.
    pub fn wake_receiver(&self) -> Receiver<()> {
        self.wake_rx.clone()
    }
}

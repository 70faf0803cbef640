//! Cooperative shutdown signalling for sync workers.
//!
//! A watch channel carries a single boolean; workers poll it at batch and
//! level boundaries, so a cancellation request unwinds through the warden
//! instead of tearing connections down mid-transaction.

use tokio::sync::watch;

/// Transmitter side of the shutdown signal.
pub type ShutdownTx = watch::Sender<bool>;

/// Receiver side of the shutdown signal.
pub type ShutdownRx = watch::Receiver<bool>;

/// Creates a shutdown channel in the "not requested" state.
pub fn create_shutdown() -> (ShutdownTx, ShutdownRx) {
    watch::channel(false)
}

/// Whether shutdown has been requested.
pub fn is_triggered(rx: &ShutdownRx) -> bool {
    *rx.borrow()
}

//! Shared cancellation signal.
//!
//! Every long-running unit holds a [`watch::Receiver<bool>`]; the process
//! flips it to `true` once on SIGINT/SIGTERM.

use tokio::sync::watch;

/// Creates the shutdown sender and its first receiver.
pub fn channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Resolves once shutdown has been requested or the sender is gone.
pub async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Returns true if shutdown has already been requested.
pub fn is_cancelled(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow()
}

use std::sync::Arc;
use tokio::sync::watch;

/// Cancellation token threaded through every suspendable operation.
///
/// Replaces the usual "is-still-mounted" liveness flag: background tasks hold
/// a clone and check it before each state mutation, and long waits race
/// against [`CancelToken::cancelled`]. Cancellation is sticky; a token is
/// never un-cancelled.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Cancel the token, waking everything parked in `cancelled()`.
    /// Calling this more than once is a no-op.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the token is cancelled. Safe to call after cancellation.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // wait_for returns immediately if already true; the sender half lives
        // in self, so the channel cannot close while we wait.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

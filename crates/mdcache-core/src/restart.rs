//! Restart requests raised after a successful deploy.
//!
//! The process never restarts itself. The host (the HTTP server here) waits
//! on [`RestartSignal::requested`], drains in-flight responses, and exits so
//! the process supervisor can start the new code.

use std::sync::Arc;

use tokio::sync::watch;

/// Cloneable, idempotent restart flag.
#[derive(Debug, Clone)]
pub struct RestartSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for RestartSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl RestartSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Ask the host to restart. Repeated calls have no further effect.
    pub fn request(&self) {
        let newly = self.tx.send_if_modified(|requested| {
            let changed = !*requested;
            *requested = true;
            changed
        });
        if newly {
            tracing::info!(event = "restart.requested", "restart requested");
        }
    }

    pub fn is_requested(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`request`](Self::request) has been called.
    pub async fn requested(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so `wait_for` cannot observe a closed channel.
        let _ = rx.wait_for(|requested| *requested).await;
    }
}

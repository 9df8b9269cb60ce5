use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;

/// Cooperative cancellation shared between the Ctrl+C handler and the
/// sync loops. Work stops at the next checkpoint, never mid-request.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    inner: Arc<ShutdownInner>,
}

#[derive(Debug, Default)]
struct ShutdownInner {
    requested: AtomicBool,
    notify: Notify,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_requested(&self) -> bool {
        self.inner.requested.load(Ordering::Acquire)
    }

    pub fn request(&self) {
        self.inner.requested.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    /// Resolves once shutdown has been requested.
    pub async fn requested(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_requested() {
                return;
            }
            notified.await;
        }
    }

    /// Sleep for `duration` unless shutdown is requested first.
    /// Returns `false` when the sleep was cut short.
    pub async fn sleep(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.is_requested();
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => !self.is_requested(),
            _ = self.requested() => false,
        }
    }

    /// Install the Ctrl+C handler: the first press requests shutdown, the
    /// second one exits immediately.
    pub fn install_ctrl_c_handler(&self) {
        let shutdown = self.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = ?e, "Failed to install Ctrl+C handler");
                return;
            }
            eprintln!("\nShutdown requested, finishing the current operation...");
            eprintln!("Press Ctrl+C again to force quit.");
            tracing::warn!("Shutdown requested");
            shutdown.request();

            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("Force quit!");
                std::process::exit(130);
            }
        });
    }
}

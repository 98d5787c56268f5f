//! Graceful Stop
//!
//! Cooperative cancellation token. Long-running loops poll it between
//! records; work already started is allowed to finish.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Shared stop flag. Clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct StopSignal {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    stopped: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. Returns `true` only for the call that set it.
    pub fn request_stop(&self) -> bool {
        let first = !self.inner.stopped.swap(true, Ordering::SeqCst);
        if first {
            self.inner.notify.notify_waiters();
        }
        first
    }

    pub fn should_stop(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Resolve once stop has been requested.
    pub async fn stopped(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.should_stop() {
                return;
            }
            notified.await;
        }
    }

    /// Request stop on Ctrl+C.
    pub fn install_ctrl_c_handler(&self) -> tokio::task::JoinHandle<()> {
        let signal = self.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    if signal.request_stop() {
                        tracing::warn!(
                            "Graceful shutdown requested, finishing current record then exiting"
                        );
                    }
                }
                Err(error) => {
                    tracing::error!(error = %error, "Failed to listen for Ctrl+C");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_request_stop_once() {
        let signal = StopSignal::new();
        assert!(!signal.should_stop());
        assert!(signal.request_stop());
        assert!(!signal.request_stop());
        assert!(signal.should_stop());
    }

    #[test]
    fn test_clones_share_flag() {
        let signal = StopSignal::new();
        let clone = signal.clone();
        clone.request_stop();
        assert!(signal.should_stop());
    }

    #[tokio::test]
    async fn test_stopped_wakes_waiter() {
        let signal = StopSignal::new();
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.stopped().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        signal.request_stop();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_stopped_pending_until_requested() {
        let signal = StopSignal::new();
        let mut waiter = tokio_test::task::spawn(signal.stopped());

        tokio_test::assert_pending!(waiter.poll());
        signal.request_stop();

        assert!(waiter.is_woken());
        tokio_test::assert_ready!(waiter.poll());
    }

    #[tokio::test]
    async fn test_stopped_after_stop_returns_immediately() {
        let signal = StopSignal::new();
        signal.request_stop();
        tokio::time::timeout(Duration::from_millis(100), signal.stopped())
            .await
            .unwrap();
    }
}

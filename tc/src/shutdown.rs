//! Cancellation signal shared between signal handlers and the capture loop

use tokio::sync::watch;
use tracing::debug;

/// Create a connected trigger/signal pair
pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, ShutdownSignal { rx })
}

/// Requests shutdown
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    /// Request shutdown; idempotent
    pub fn trigger(&self) {
        debug!("ShutdownTrigger::trigger: called");
        self.tx.send_replace(true);
    }

    /// Another receiver for this trigger
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Observes a shutdown request
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        drop(tx);
        Self { rx }
    }

    /// Non-blocking check
    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown has been requested
    ///
    /// Pends forever if the trigger is dropped without firing.
    pub async fn requested(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|requested| *requested).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_initially_not_requested() {
        let (_trigger, signal) = shutdown_channel();
        assert!(!signal.is_requested());
    }

    #[test]
    fn test_trigger_visible_to_all_clones() {
        let (trigger, signal) = shutdown_channel();
        let clone = signal.clone();
        let subscribed = trigger.signal();

        trigger.trigger();
        trigger.trigger();

        assert!(signal.is_requested());
        assert!(clone.is_requested());
        assert!(subscribed.is_requested());
    }

    #[tokio::test]
    async fn test_requested_resolves_after_trigger() {
        let (trigger, signal) = shutdown_channel();

        let waiter = tokio::spawn(async move { signal.requested().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        trigger.trigger();

        let result = tokio::time::timeout(Duration::from_secs(1), waiter).await;
        assert!(result.is_ok(), "requested() should resolve once triggered");
    }

    #[tokio::test]
    async fn test_never_does_not_resolve() {
        let signal = ShutdownSignal::never();
        assert!(!signal.is_requested());

        let result = tokio::time::timeout(Duration::from_millis(20), signal.requested()).await;
        assert!(result.is_err());
    }
}

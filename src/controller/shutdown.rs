//! # Shutdown Signal
//!
//! Process-wide shutdown broadcast. In-flight provider calls race against it
//! so a stopping controller does not finish an upload and then write status
//! for it.

use tokio::sync::watch;

/// Receiving side of the shutdown broadcast
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

/// Sending side; `trigger` wakes every [`ShutdownSignal`]
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

impl ShutdownSignal {
    /// Create a connected trigger/signal pair
    #[must_use]
    pub fn channel() -> (ShutdownTrigger, Self) {
        let (tx, rx) = watch::channel(false);
        (ShutdownTrigger { tx }, Self { rx })
    }

    /// A signal that never fires
    #[must_use]
    pub fn never() -> Self {
        let (trigger, signal) = Self::channel();
        drop(trigger);
        signal
    }

    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown has been triggered
    ///
    /// Never resolves if the trigger was dropped without firing.
    pub async fn triggered(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|stopped| *stopped).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_wakes_waiters() {
        let (trigger, signal) = ShutdownSignal::channel();
        assert!(!signal.is_triggered());

        let waiter = signal.clone();
        let handle = tokio::spawn(async move { waiter.triggered().await });
        trigger.trigger();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("waiter should wake")
            .unwrap();
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn test_never_does_not_resolve() {
        let signal = ShutdownSignal::never();
        let result = tokio::time::timeout(Duration::from_millis(20), signal.triggered()).await;
        assert!(result.is_err());
        assert!(!signal.is_triggered());
    }

    #[tokio::test]
    async fn test_cloned_trigger_keeps_signal_alive() {
        let (trigger, signal) = ShutdownSignal::channel();
        let leader_side = trigger.clone();
        drop(trigger);

        leader_side.trigger();
        tokio::time::timeout(Duration::from_secs(1), signal.triggered())
            .await
            .expect("signal should fire from the cloned trigger");
    }
}

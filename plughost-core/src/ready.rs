//! One-shot signals: the batch ready signal and the host-mounted barrier.

use std::sync::Arc;
use tokio::sync::watch;

/// Cloneable one-shot signal. Waiters registered before or after
/// [`ReadySignal::resolve`] all complete.
#[derive(Debug, Clone)]
pub struct ReadySignal {
    tx: Arc<watch::Sender<bool>>,
}

impl ReadySignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn resolve(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_resolved(&self) -> bool {
        *self.tx.borrow()
    }

    /// Re-arms the signal.
    pub fn reset(&self) {
        self.tx.send_replace(false);
    }

    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot observe a close.
        let _ = rx.wait_for(|resolved| *resolved).await;
    }
}

impl Default for ReadySignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn waiters_complete_after_resolve() {
        let signal = ReadySignal::new();
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.wait().await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!waiter.is_finished());

        signal.resolve();
        waiter.await.unwrap();
        assert!(signal.is_resolved());

        // late waiter returns immediately
        signal.wait().await;
    }

    #[tokio::test]
    async fn reset_rearms() {
        let signal = ReadySignal::new();
        signal.resolve();
        signal.reset();
        assert!(!signal.is_resolved());
    }
}

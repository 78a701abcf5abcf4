//! Request cancellation signal.

use tokio::sync::watch;

use crate::error::{MediaError, MediaResult};

/// Receiving half of a request's cancellation flag.
///
/// Cloned into every long-running step of a request. A signal built with
/// [`CancelSignal::never`] never fires.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelSignal {
    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx: Some(rx) }
    }

    /// Create a sender/signal pair. Sending `true` cancels.
    pub fn channel() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self::new(rx))
    }

    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Return `Err(Cancelled)` if the flag is set.
    pub fn check(&self) -> MediaResult<()> {
        if self.is_cancelled() {
            Err(MediaError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolve once the flag is set. Pends forever if the sender is gone.
    pub async fn cancelled(&self) {
        let Some(rx) = &self.rx else {
            return std::future::pending().await;
        };
        let mut rx = rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return std::future::pending().await;
            }
        }
    }

    /// Raw receiver for collaborators that take one directly.
    pub fn receiver(&self) -> Option<watch::Receiver<bool>> {
        self.rx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_cancelled_wakes_waiter() {
        let (tx, signal) = CancelSignal::channel();
        let mut waiter = task::spawn(signal.cancelled());

        assert_pending!(waiter.poll());
        tx.send(true).unwrap();
        assert!(waiter.is_woken());
        assert_ready!(waiter.poll());
    }

    #[test]
    fn test_dropped_sender_never_cancels() {
        let (tx, signal) = CancelSignal::channel();
        let mut waiter = task::spawn(signal.cancelled());

        assert_pending!(waiter.poll());
        drop(tx);
        assert_pending!(waiter.poll());
        assert!(signal.check().is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_resolves_after_send() {
        let (tx, signal) = CancelSignal::channel();
        assert!(signal.check().is_ok());

        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.cancelled().await })
        };
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("cancellation not observed")
            .unwrap();
        assert!(matches!(signal.check(), Err(MediaError::Cancelled)));
    }

    #[tokio::test]
    async fn test_never_does_not_fire() {
        let signal = CancelSignal::never();
        assert!(!signal.is_cancelled());
        let result = tokio::time::timeout(Duration::from_millis(20), signal.cancelled()).await;
        assert!(result.is_err());
    }
}

//! Job-level cancellation.
//!
//! One [`CancelSignal`] per job; workers hold [`CancelWatcher`] clones and
//! observe the signal at their suspension points. Cancellation is
//! level-triggered: once signalled it stays signalled.

use std::sync::Arc;
use tokio::sync::watch;

#[derive(Clone)]
pub struct CancelSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelSignal {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn watcher(&self) -> CancelWatcher {
        CancelWatcher {
            rx: self.tx.subscribe(),
        }
    }
}

#[derive(Clone)]
pub struct CancelWatcher {
    rx: watch::Receiver<bool>,
}

impl CancelWatcher {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the job is cancelled; pends forever otherwise.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                // signal dropped without firing: this job will never cancel
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn watcher_observes_cancellation() {
        let signal = CancelSignal::new();
        let mut watcher = signal.watcher();
        assert!(!watcher.is_cancelled());
        signal.cancel();
        assert!(watcher.is_cancelled());
        watcher.cancelled().await; // resolves immediately
    }
}

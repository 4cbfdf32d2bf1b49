use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

/// A token the aggregation worker checks for cancellation.
#[derive(Clone)]
pub struct CancellationToken(watch::Receiver<bool>);

impl CancellationToken {
    /// Resolves once cancellation is signalled or the handle is dropped.
    pub async fn cancelled(&mut self) {
        while !*self.0.borrow_and_update() {
            if self.0.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Owns a running worker task and its stop signal.
pub struct TickerHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl TickerHandle {
    /// Pairs a fresh token with the sender kept by the handle.
    pub fn channel() -> (watch::Sender<bool>, CancellationToken) {
        let (tx, rx) = watch::channel(false);
        (tx, CancellationToken(rx))
    }

    pub fn new(stop: watch::Sender<bool>, task: JoinHandle<()>) -> Self {
        TickerHandle { stop, task }
    }

    /// Signal the worker to stop after its current pass.
    pub fn cancel(&self) {
        // Ignore error if the worker already exited
        let _ = self.stop.send(true);
    }

    /// Cancel and wait for the worker to finish.
    pub async fn shutdown(self) {
        self.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "aggregation worker ended abnormally");
        }
    }
}

//! Missing-products polling
//!
//! Periodically asks the backend which products have not been counted yet
//! and republishes the list and count to observers. A failed tick keeps
//! the previous snapshot; a transient network blip must not blank out the
//! missing-count badge.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;

use barinv_common::types::MissingSnapshot;

use crate::gateway::ApiGateway;

/// Periodic poll of the "not yet counted" view.
pub struct MissingProductsMonitor;

impl MissingProductsMonitor {
    /// Start polling every `interval`. The first tick fires immediately.
    /// The returned handle owns the task; dropping or stopping it releases
    /// the timer.
    pub fn start(gateway: Arc<ApiGateway>, interval: Duration) -> PollHandle {
        let (tx, rx) = watch::channel(MissingSnapshot::default());
        let task = tokio::spawn(poll_loop(gateway, interval, tx));
        PollHandle { task, rx }
    }
}

/// Cancellable handle to a running poll task, owned by whichever scope
/// started it.
pub struct PollHandle {
    task: JoinHandle<()>,
    rx: watch::Receiver<MissingSnapshot>,
}

impl PollHandle {
    /// Latest published snapshot.
    pub fn latest(&self) -> MissingSnapshot {
        self.rx.borrow().clone()
    }

    /// Receiver for observing snapshot updates.
    pub fn subscribe(&self) -> watch::Receiver<MissingSnapshot> {
        self.rx.clone()
    }

    /// Stop polling and release the timer.
    pub fn stop(self) {
        // Drop impl aborts the task
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn poll_loop(
    gateway: Arc<ApiGateway>,
    interval: Duration,
    tx: watch::Sender<MissingSnapshot>,
) {
    let mut ticker = time::interval(interval);
    tracing::info!(interval_ms = interval.as_millis() as u64, "missing-products poll started");

    loop {
        ticker.tick().await;

        match gateway.list_missing_products().await {
            Ok((products, count)) => {
                let snapshot = MissingSnapshot {
                    products,
                    count,
                    updated_at: Some(Utc::now()),
                };
                tracing::debug!(count, "missing-products snapshot updated");
                if tx.send(snapshot).is_err() {
                    // No observers left
                    return;
                }
            }
            Err(e) => {
                // Previous snapshot is retained
                tracing::warn!(error = %e, "missing-products poll failed; keeping last snapshot");
            }
        }
    }
}

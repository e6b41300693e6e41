//! Background backend health polling.

use std::time::Duration;

use docchat_transport::BackendClient;
use futures_util::future::{AbortHandle, Abortable};
use tokio::sync::watch;

/// Periodic `/health` prober. Publishes the latest reachability; `None`
/// until the first probe completes. Stops when dropped.
#[derive(Debug)]
pub(crate) struct HealthPoller {
    rx: watch::Receiver<Option<bool>>,
    abort_handle: AbortHandle,
}

impl HealthPoller {
    pub(crate) fn spawn(client: BackendClient, interval: Duration) -> Self {
        let (tx, rx) = watch::channel(None);
        let (abort_handle, abort_registration) = AbortHandle::new_pair();

        let task = async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                // First tick completes immediately.
                ticker.tick().await;
                let healthy = probe(&client).await;
                if tx.send(Some(healthy)).is_err() {
                    break;
                }
            }
        };

        tokio::spawn(async move {
            let _ = Abortable::new(task, abort_registration).await;
        });

        Self { rx, abort_handle }
    }

    /// Latest result not yet observed.
    pub(crate) fn try_latest(&mut self) -> Option<bool> {
        match self.rx.has_changed() {
            Ok(true) => *self.rx.borrow_and_update(),
            _ => None,
        }
    }

    /// Wait for the next published result. `None` once the task has stopped.
    pub(crate) async fn changed(&mut self) -> Option<bool> {
        loop {
            self.rx.changed().await.ok()?;
            if let Some(healthy) = *self.rx.borrow_and_update() {
                return Some(healthy);
            }
        }
    }
}

impl Drop for HealthPoller {
    fn drop(&mut self) {
        self.abort_handle.abort();
    }
}

pub(crate) async fn probe(client: &BackendClient) -> bool {
    match client.probe_health().await {
        Ok(healthy) => {
            if !healthy {
                tracing::warn!("Backend reachable but not reporting ok");
            }
            healthy
        }
        Err(e) => {
            tracing::debug!(%e, "Health probe failed");
            false
        }
    }
}

//! Background reconciliation driven by connectivity changes.
//!
//! The embedding application publishes [`Connectivity`] on a `watch`
//! channel (from an OS network monitor, a health probe, or a failed call).
//! Every transition to `Online`, and the initial state if already online,
//! triggers one sequential drain. Dropping the sender stops the worker.

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::sync::{DrainReport, Reconciler};

/// Whether the server is believed reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Online,
    Offline,
}

/// Single worker that drains the offline queue when connectivity returns.
#[derive(Debug)]
pub struct ReconciliationWorker {
    reconciler: Reconciler,
    connectivity: watch::Receiver<Connectivity>,
    reports: Option<tokio::sync::mpsc::UnboundedSender<DrainReport>>,
}

impl ReconciliationWorker {
    pub fn new(reconciler: Reconciler, connectivity: watch::Receiver<Connectivity>) -> Self {
        Self {
            reconciler,
            connectivity,
            reports: None,
        }
    }

    /// Forward every drain report, e.g. to show rejected intents to the user.
    pub fn with_reports(mut self, reports: tokio::sync::mpsc::UnboundedSender<DrainReport>) -> Self {
        self.reports = Some(reports);
        self
    }

    /// Spawn the worker on the current runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        loop {
            let state = *self.connectivity.borrow_and_update();
            if state == Connectivity::Online {
                self.drain_once().await;
            }
            if self.connectivity.changed().await.is_err() {
                tracing::debug!("connectivity channel closed, reconciliation worker stopping");
                return;
            }
        }
    }

    async fn drain_once(&self) {
        match self.reconciler.drain().await {
            Ok(report) => {
                if let Some(reports) = &self.reports {
                    let _ = reports.send(report);
                }
            }
            Err(e) => tracing::error!(error = %e, "offline queue drain failed"),
        }
    }
}

//! # Offline Reconciliation
//!
//! [`Reconciler::submit`] sends an intent straight to the server and falls
//! back to the offline queue only when the server cannot be reached.
//! Application rejections (a stale credential, a malformed entry) are
//! returned to the caller and never queued.
//!
//! [`Reconciler::drain`] replays the queue oldest first, one intent at a
//! time. An intent leaves the queue only once the server has answered it:
//!
//! | Server answer | Queue | Report |
//! |---|---|---|
//! | success | removed | `applied` |
//! | batch with retryable entry failures | kept | `retained` |
//! | application rejection | removed | `rejected` |
//! | unreachable / 502-504 | kept, drain stops | `remaining` |
//! | API token refused | kept, drain stops | error |
//!
//! Replaying an intent the server already applied is harmless: check-in is
//! upgrade-only and overrides are upserts.

use uuid::Uuid;

use crate::api::RollcallClient;
use crate::error::{ClientError, QueueError, SyncError};
use crate::queue::{Intent, OfflineIntent, OfflineQueue};
use crate::types::{BatchResponse, CheckInResponse, FailedEntry};

/// Server acknowledgement of one intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    CheckIn(CheckInResponse),
    Override(BatchResponse),
}

/// Outcome of [`Reconciler::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// The server applied the intent.
    Applied(Ack),
    /// The server applied part of a batch; the transiently failed entries
    /// were queued as a new intent.
    Partial { ack: BatchResponse, queued: Uuid },
    /// The server was unreachable; the intent is saved offline.
    Queued(Uuid),
}

/// A queued intent the server refused during a drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    pub local_id: Uuid,
    pub intent: Intent,
    /// API error code, e.g. `INVALID_CREDENTIAL`, or `ENTRY_FAILED` for
    /// entries of an otherwise applied batch.
    pub code: String,
    pub message: String,
}

/// Result of one [`Reconciler::drain`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Intents acknowledged and removed.
    pub applied: Vec<Uuid>,
    /// Intents refused and removed, for the user to act on.
    pub rejected: Vec<Rejected>,
    /// Intents answered but kept because some entries may still succeed.
    pub retained: Vec<Uuid>,
    /// Intents still queued when the drain finished.
    pub remaining: usize,
    /// The drain stopped early because the server became unreachable.
    pub interrupted: bool,
}

/// Sends intents, queueing them while the server is unreachable.
#[derive(Debug, Clone)]
pub struct Reconciler {
    client: RollcallClient,
    queue: OfflineQueue,
}

impl Reconciler {
    pub fn new(client: RollcallClient, queue: OfflineQueue) -> Self {
        Self { client, queue }
    }

    pub fn client(&self) -> &RollcallClient {
        &self.client
    }

    pub fn queue(&self) -> &OfflineQueue {
        &self.queue
    }

    /// Send `intent` now, or queue it if the server cannot be reached.
    pub async fn submit(&self, intent: Intent) -> Result<Submission, SyncError> {
        match self.send(&intent).await {
            Ok(Ack::Override(batch)) if batch.has_retryable() => {
                let entries = retryable_entries(&intent, &batch.failed);
                let queued = self.queue.enqueue(Intent::Override { entries }).await?;
                Ok(Submission::Partial {
                    ack: batch,
                    queued: queued.local_id,
                })
            }
            Ok(ack) => Ok(Submission::Applied(ack)),
            Err(e) if e.is_transient() => {
                tracing::warn!(error = %e, kind = intent.kind(), "server unreachable, saving offline");
                let queued = self.queue.enqueue(intent).await?;
                Ok(Submission::Queued(queued.local_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Replay the queue against the server, oldest first.
    pub async fn drain(&self) -> Result<DrainReport, SyncError> {
        let mut report = DrainReport::default();
        for queued in self.queue.pending().await? {
            match self.send(&queued.intent).await {
                Ok(Ack::Override(batch)) if batch.has_retryable() => {
                    tracing::debug!(local_id = %queued.local_id, "batch partly applied, keeping");
                    report.retained.push(queued.local_id);
                }
                Ok(ack) => {
                    self.acknowledge(&queued, &ack, &mut report).await?;
                }
                Err(e) if e.is_transient() => {
                    tracing::info!(error = %e, "server unreachable, drain paused");
                    report.interrupted = true;
                    break;
                }
                Err(e) if e.is_auth_failure() => {
                    tracing::error!(error = %e, "API token refused, queue kept");
                    return Err(e.into());
                }
                Err(e) => {
                    tracing::warn!(local_id = %queued.local_id, error = %e, "queued intent rejected");
                    self.queue.remove(queued.local_id).await?;
                    report.rejected.push(Rejected {
                        local_id: queued.local_id,
                        intent: queued.intent.clone(),
                        code: e.code().unwrap_or("REJECTED").to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }
        report.remaining = self.queue.len().await?;
        tracing::info!(
            applied = report.applied.len(),
            rejected = report.rejected.len(),
            remaining = report.remaining,
            "offline queue drained"
        );
        Ok(report)
    }

    async fn acknowledge(
        &self,
        queued: &OfflineIntent,
        ack: &Ack,
        report: &mut DrainReport,
    ) -> Result<(), QueueError> {
        self.queue.remove(queued.local_id).await?;
        if let Ack::Override(batch) = ack {
            for failed in &batch.failed {
                report.rejected.push(Rejected {
                    local_id: queued.local_id,
                    intent: queued.intent.clone(),
                    code: "ENTRY_FAILED".into(),
                    message: format!(
                        "entry {} (student {} on {}): {}",
                        failed.index, failed.student_id, failed.day, failed.reason
                    ),
                });
            }
        }
        report.applied.push(queued.local_id);
        Ok(())
    }

    async fn send(&self, intent: &Intent) -> Result<Ack, ClientError> {
        match intent {
            Intent::CheckIn { credential } => self.client.check_in(credential).await.map(Ack::CheckIn),
            Intent::Override { entries } => self.client.apply_batch(entries).await.map(Ack::Override),
        }
    }
}

fn retryable_entries(intent: &Intent, failed: &[FailedEntry]) -> Vec<crate::types::OverrideEntry> {
    let Intent::Override { entries } = intent else {
        return Vec::new();
    };
    failed
        .iter()
        .filter(|f| f.retryable)
        .filter_map(|f| entries.get(f.index).copied())
        .collect()
}

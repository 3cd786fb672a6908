//! # Override Processor
//!
//! Applies a teacher's batch of explicit status assignments. Two phases:
//!
//! 1. **Validation.** Every entry is checked before anything is written. One
//!    structurally bad entry (non-numeric `studentId`, missing `day`,
//!    non-string or unknown `status`) rejects the whole batch with the list of
//!    offending entries.
//! 2. **Application.** Each entry is an unconditional upsert, so an override
//!    may downgrade (`Present` to `Absent`). Entries are applied
//!    independently; a persistence failure on one is reported in
//!    [`BatchOutcome::failed`] and the rest still go through.
//!
//! All applied changes of a batch are published as one event.

use std::sync::Arc;

use rollcall_core::{AttendanceChange, AttendanceStatus, SchoolDay, StudentId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::broadcast::ChangeBroadcaster;
use crate::error::{LedgerError, MalformedItem};
use crate::store::{AttendanceStore, Roster};

/// One validated status assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideItem {
    /// Target student.
    pub student_id: StudentId,
    /// Target day.
    pub day: SchoolDay,
    /// Status to set.
    pub status: AttendanceStatus,
}

/// An entry that passed validation but could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedItem {
    /// Zero-based position in the submitted batch.
    pub index: usize,
    /// Target student.
    pub student_id: StudentId,
    /// Target day.
    pub day: SchoolDay,
    /// Why the write failed.
    pub reason: String,
    /// Whether resubmitting the entry later may succeed.
    pub retryable: bool,
}

/// Result of applying a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    /// Number of entries written.
    pub applied: usize,
    /// Entries that could not be written.
    pub failed: Vec<FailedItem>,
}

/// Validates and applies override batches.
#[derive(Clone)]
pub struct OverrideProcessor {
    roster: Arc<dyn Roster>,
    store: Arc<dyn AttendanceStore>,
    broadcaster: ChangeBroadcaster,
}

impl std::fmt::Debug for OverrideProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverrideProcessor").finish_non_exhaustive()
    }
}

impl OverrideProcessor {
    /// Assemble a processor from its collaborators.
    pub fn new(
        roster: Arc<dyn Roster>,
        store: Arc<dyn AttendanceStore>,
        broadcaster: ChangeBroadcaster,
    ) -> Self {
        Self {
            roster,
            store,
            broadcaster,
        }
    }

    /// Check every entry of a raw batch.
    ///
    /// # Errors
    ///
    /// [`LedgerError::EmptyBatch`] for `[]`, otherwise
    /// [`LedgerError::MalformedBatch`] listing every bad entry.
    pub fn validate_batch(items: &[Value]) -> Result<Vec<OverrideItem>, LedgerError> {
        if items.is_empty() {
            return Err(LedgerError::EmptyBatch);
        }
        let mut valid = Vec::with_capacity(items.len());
        let mut malformed = Vec::new();
        for (index, item) in items.iter().enumerate() {
            match parse_item(item) {
                Ok(parsed) => valid.push(parsed),
                Err(reason) => malformed.push(MalformedItem {
                    index,
                    item: item.clone(),
                    reason,
                }),
            }
        }
        if malformed.is_empty() {
            Ok(valid)
        } else {
            Err(LedgerError::MalformedBatch(malformed))
        }
    }

    /// Validate then apply a raw batch.
    pub async fn apply_batch(&self, items: &[Value]) -> Result<BatchOutcome, LedgerError> {
        let items = Self::validate_batch(items).map_err(|e| {
            tracing::warn!(error = %e, "override batch rejected");
            e
        })?;
        Ok(self.apply_items(&items).await)
    }

    /// Apply already-validated entries.
    pub async fn apply_items(&self, items: &[OverrideItem]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let mut changes = Vec::with_capacity(items.len());

        for (index, item) in items.iter().enumerate() {
            match self.apply_one(item).await {
                Ok(change) => {
                    outcome.applied += 1;
                    changes.push(change);
                }
                Err(e) => {
                    tracing::warn!(
                        student_id = %item.student_id,
                        day = %item.day,
                        error = %e,
                        "override entry failed"
                    );
                    outcome.failed.push(FailedItem {
                        index,
                        student_id: item.student_id,
                        day: item.day,
                        reason: e.to_string(),
                        retryable: e.is_transient(),
                    });
                }
            }
        }

        tracing::info!(
            applied = outcome.applied,
            failed = outcome.failed.len(),
            "override batch committed"
        );
        self.broadcaster.publish(changes);
        outcome
    }

    async fn apply_one(&self, item: &OverrideItem) -> Result<AttendanceChange, LedgerError> {
        let student = self
            .roster
            .student(item.student_id)
            .await?
            .ok_or(LedgerError::UnknownStudent(item.student_id))?;
        let record = self
            .store
            .upsert_status(&student, item.day, item.status)
            .await?;
        tracing::info!(
            student_id = %record.student_id,
            day = %record.day,
            status = %record.status,
            "attendance overridden"
        );
        Ok(record.change())
    }
}

fn parse_item(item: &Value) -> Result<OverrideItem, String> {
    let obj = item
        .as_object()
        .ok_or_else(|| "entry must be an object".to_string())?;

    let student_id = match obj.get("studentId") {
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| "studentId must be an integer".to_string())?,
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("studentId \"{s}\" is not numeric"))?,
        Some(_) => return Err("studentId must be numeric".to_string()),
        None => return Err("studentId is required".to_string()),
    };

    let day = match obj.get("day") {
        Some(Value::String(s)) => SchoolDay::parse(s).map_err(|e| e.to_string())?,
        Some(Value::Null) | None => return Err("day is required".to_string()),
        Some(_) => return Err("day must be a YYYY-MM-DD string".to_string()),
    };

    let status = match obj.get("status") {
        Some(Value::String(s)) => s.parse::<AttendanceStatus>().map_err(|e| e.to_string())?,
        _ => return Err("status must be a string".to_string()),
    };

    Ok(OverrideItem {
        student_id: StudentId::new(student_id),
        day,
        status,
    })
}

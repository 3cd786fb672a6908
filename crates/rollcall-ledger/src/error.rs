//! # Ledger Errors
//!
//! Two layers: [`StoreError`] is what a persistence backend reports,
//! [`LedgerError`] is what the engine's operations return. Only
//! [`StoreError::Unavailable`] (and calendar lookups that failed to answer)
//! count as transient; every other variant is a rejected operation that
//! retrying will not fix.

use rollcall_core::StudentId;
use serde::Serialize;
use thiserror::Error;

/// Errors reported by an attendance, roster or credential backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend could not be reached or timed out.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A write referenced a student the roster does not know.
    #[error("unknown student: {0}")]
    UnknownStudent(StudentId),

    /// Persisted data could not be interpreted.
    #[error("corrupt store data: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// The calendar oracle could not answer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("calendar lookup failed: {0}")]
pub struct CalendarError(pub String);

/// One structurally invalid entry of an override batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MalformedItem {
    /// Zero-based position in the submitted batch.
    pub index: usize,
    /// The entry exactly as submitted.
    pub item: serde_json::Value,
    /// Why the entry was rejected.
    pub reason: String,
}

/// Errors returned by ledger operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    /// The presented credential is forged, malformed or no longer current.
    #[error("invalid credential")]
    InvalidCredential,

    /// The referenced student is not enrolled.
    #[error("unknown student: {0}")]
    UnknownStudent(StudentId),

    /// An override batch contained no items.
    #[error("override batch is empty")]
    EmptyBatch,

    /// One or more override items failed structural validation. Nothing was written.
    #[error("{} malformed item(s) in override batch", .0.len())]
    MalformedBatch(Vec<MalformedItem>),

    /// The calendar oracle failed.
    #[error(transparent)]
    Calendar(#[from] CalendarError),

    /// The backing store failed.
    #[error(transparent)]
    Store(StoreError),
}

impl LedgerError {
    /// Whether the failure is transient (eligible for queuing and retry).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Store(e) => e.is_transient(),
            Self::Calendar(_) => true,
            _ => false,
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnknownStudent(id) => Self::UnknownStudent(id),
            other => Self::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unavailable_is_transient() {
        assert!(StoreError::Unavailable("timeout".into()).is_transient());
        assert!(!StoreError::Corrupt("bad status".into()).is_transient());
        assert!(!StoreError::UnknownStudent(StudentId::new(1)).is_transient());
    }

    #[test]
    fn store_unknown_student_lifts_to_ledger_variant() {
        let err = LedgerError::from(StoreError::UnknownStudent(StudentId::new(9)));
        assert_eq!(err, LedgerError::UnknownStudent(StudentId::new(9)));
        assert!(!err.is_transient());
    }

    #[test]
    fn unavailable_store_stays_transient() {
        let err = LedgerError::from(StoreError::Unavailable("pool timed out".into()));
        assert!(err.is_transient());
    }

    #[test]
    fn malformed_batch_display_counts_items() {
        let err = LedgerError::MalformedBatch(vec![
            MalformedItem {
                index: 0,
                item: serde_json::json!({}),
                reason: "missing day".into(),
            },
            MalformedItem {
                index: 3,
                item: serde_json::json!(7),
                reason: "not an object".into(),
            },
        ]);
        assert_eq!(err.to_string(), "2 malformed item(s) in override batch");
    }
}

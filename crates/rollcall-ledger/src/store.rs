//! # Persistence Seams
//!
//! The engine talks to its backends only through these traits. Every
//! conditional write the ledger depends on is expressed as one trait method
//! so that an implementation can execute it atomically (a single write lock
//! in memory, a single `INSERT ... ON CONFLICT` statement in SQL).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rollcall_core::{
    AttendanceRecord, AttendanceStatus, ClassId, SchoolDay, Student, StudentId,
};

use crate::error::StoreError;

/// Read-only view of the roster collaborator.
#[async_trait]
pub trait Roster: Send + Sync {
    /// Every currently enrolled student.
    async fn enrolled_students(&self) -> Result<Vec<Student>, StoreError>;

    /// Look up one enrolled student.
    async fn student(&self, id: StudentId) -> Result<Option<Student>, StoreError>;
}

/// Result of the upgrade-only presence write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceWrite {
    /// No row existed; one was created directly as `Present`.
    Created,
    /// An existing row moved from `from` to `Present`.
    Upgraded {
        /// Status before the write.
        from: AttendanceStatus,
    },
    /// The row was already `Present`; nothing was written.
    AlreadyPresent,
}

impl PresenceWrite {
    /// Whether the store actually changed.
    pub fn changed(&self) -> bool {
        !matches!(self, Self::AlreadyPresent)
    }
}

/// The attendance ledger, keyed by `(student_id, day)`.
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Create a `Pending` row unless one already exists for the key.
    ///
    /// Returns `true` if a row was created. A duplicate is a no-op, not an
    /// error.
    async fn insert_pending(&self, student: &Student, day: SchoolDay) -> Result<bool, StoreError>;

    /// Set the row to `Present` if it is not already, creating it when absent.
    ///
    /// Must be a single conditional write so two concurrent replays of the
    /// same check-in produce exactly one transition.
    async fn mark_present(
        &self,
        student: &Student,
        day: SchoolDay,
    ) -> Result<PresenceWrite, StoreError>;

    /// Unconditionally set the status of the row, creating it when absent.
    async fn upsert_status(
        &self,
        student: &Student,
        day: SchoolDay,
        status: AttendanceStatus,
    ) -> Result<AttendanceRecord, StoreError>;

    /// Fetch a single row.
    async fn get(
        &self,
        student_id: StudentId,
        day: SchoolDay,
    ) -> Result<Option<AttendanceRecord>, StoreError>;

    /// All rows for `day`, optionally restricted to one class, ordered by student.
    async fn list_day(
        &self,
        day: SchoolDay,
        class_id: Option<ClassId>,
    ) -> Result<Vec<AttendanceRecord>, StoreError>;
}

/// The single active credential of a student.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Owner of the credential.
    pub student_id: StudentId,
    /// The opaque secret rendered into the scannable code.
    pub secret_value: String,
    /// When the credential was issued.
    pub issued_at: DateTime<Utc>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("student_id", &self.student_id)
            .field("secret_value", &"[REDACTED]")
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

/// Storage for the one-per-student credential.
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    /// Store `credential`, replacing any previous credential of the same student.
    async fn put(&self, credential: Credential) -> Result<(), StoreError>;

    /// The current credential of `student_id`, if any.
    async fn get(&self, student_id: StudentId) -> Result<Option<Credential>, StoreError>;
}

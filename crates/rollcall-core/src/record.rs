//! # Ledger Records
//!
//! The row types shared by the ledger engine, the HTTP surface and the
//! client. JSON field names are camelCase to match the wire contract.

use serde::{Deserialize, Serialize};

use crate::day::SchoolDay;
use crate::identity::{ClassId, StudentId};
use crate::status::AttendanceStatus;

/// An enrolled student as seen by the ledger.
///
/// Owned by the roster collaborator; referenced, never mutated, here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    /// Roster identity.
    pub id: StudentId,
    /// Class the student is currently enrolled in.
    pub enrolled_class_id: ClassId,
}

impl Student {
    /// Build a student reference.
    pub const fn new(id: StudentId, enrolled_class_id: ClassId) -> Self {
        Self {
            id,
            enrolled_class_id,
        }
    }
}

/// One ledger row. `(student_id, day)` is the natural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    /// Student the row belongs to.
    pub student_id: StudentId,
    /// Class the student was enrolled in when the row was created.
    pub class_id: ClassId,
    /// The school day.
    pub day: SchoolDay,
    /// Current status.
    pub status: AttendanceStatus,
}

impl AttendanceRecord {
    /// A freshly materialized row for `student` on `day`.
    pub fn pending(student: &Student, day: SchoolDay) -> Self {
        Self {
            student_id: student.id,
            class_id: student.enrolled_class_id,
            day,
            status: AttendanceStatus::Pending,
        }
    }

    /// The change tuple describing this row's current state.
    pub fn change(&self) -> AttendanceChange {
        AttendanceChange {
            student_id: self.student_id,
            day: self.day,
            status: self.status,
        }
    }
}

/// A committed `(student_id, day, status)` tuple, as pushed to live viewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceChange {
    /// Student whose row changed.
    pub student_id: StudentId,
    /// Day of the changed row.
    pub day: SchoolDay,
    /// Status after the change.
    pub status: AttendanceStatus,
}

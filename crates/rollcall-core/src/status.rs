//! # Attendance Status
//!
//! The five values a ledger row can hold. `Pending` is the only unsettled
//! value; every other status counts as settled, but settlement never blocks
//! a later explicit override.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Attendance status of one student on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    /// Row materialized, nobody has acted on it yet.
    Pending,
    /// Checked in or marked present by a teacher.
    Present,
    /// Absent with permission.
    Excused,
    /// Absent due to illness.
    Sick,
    /// Absent without explanation.
    Absent,
}

impl AttendanceStatus {
    /// Every status, in display order.
    pub const ALL: [AttendanceStatus; 5] = [
        Self::Pending,
        Self::Present,
        Self::Excused,
        Self::Sick,
        Self::Absent,
    ];

    /// Return the wire representation of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Present => "present",
            Self::Excused => "excused",
            Self::Sick => "sick",
            Self::Absent => "absent",
        }
    }

    /// Whether the row has been settled (anything other than `Pending`).
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AttendanceStatus {
    type Err = ValidationError;

    /// Case-insensitive parse of the wire representation.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == lowered)
            .ok_or_else(|| ValidationError::InvalidStatus(s.to_string()))
    }
}

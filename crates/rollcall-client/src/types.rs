//! Request and response bodies of the rollcall API.
//!
//! Responses do not use `deny_unknown_fields`, so a newer server can add
//! fields without breaking older clients.

use rollcall_core::{AttendanceStatus, SchoolDay, StudentId};
use serde::{Deserialize, Serialize};

/// `POST /v1/check-in` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInRequest {
    pub credential: String,
}

/// `POST /v1/check-in` response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInResponse {
    pub student_id: StudentId,
    pub already_present: bool,
}

/// One entry of a `PATCH /v1/attendance` batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideEntry {
    pub student_id: StudentId,
    pub day: SchoolDay,
    pub status: AttendanceStatus,
}

/// An override entry the server could not apply.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedEntry {
    pub index: usize,
    pub student_id: StudentId,
    pub day: SchoolDay,
    pub reason: String,
    #[serde(default)]
    pub retryable: bool,
}

/// `PATCH /v1/attendance` response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub applied: usize,
    #[serde(default)]
    pub failed: Vec<FailedEntry>,
}

impl BatchResponse {
    /// Some entries failed for transient reasons and can be resubmitted.
    pub fn has_retryable(&self) -> bool {
        self.failed.iter().any(|f| f.retryable)
    }
}

/// `GET /v1/attendance/ensure-day` response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsureDayResponse {
    pub day: SchoolDay,
    pub created_count: usize,
    pub skipped: bool,
    #[serde(default)]
    pub failed: Vec<StudentId>,
}

/// `POST /v1/students/{id}/credential` response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialResponse {
    pub student_id: StudentId,
    pub secret_value: String,
}

/// Error envelope returned by the API.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorDetail {
    pub code: String,
}

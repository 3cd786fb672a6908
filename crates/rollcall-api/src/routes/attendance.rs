//! # Attendance Ledger API
//!
//! Teacher overrides, day generation and the read side of the ledger:
//!
//! - `PATCH /v1/attendance`: batch of status overrides.
//! - `GET /v1/attendance/ensure-day`: materialize a day's `pending` rows.
//! - `GET /v1/attendance`, `GET /v1/attendance/today`: day listings.
//! - `GET /v1/classes/{class_id}/summary`: per-class settlement.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use rollcall_core::{AttendanceRecord, ClassId, SchoolDay};
use rollcall_ledger::{BatchOutcome, ClassSummary, EnsureDayOutcome};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::{extract_json, extract_path, extract_query};
use crate::state::AppState;

// ── DTOs ────────────────────────────────────────────────────────────────────

/// One override entry. Documented shape only: entries are validated
/// individually so malformed ones can be reported by index.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OverrideEntry {
    /// Integer, or a string of digits.
    pub student_id: i64,
    /// `YYYY-MM-DD`.
    pub day: String,
    /// `pending`, `present`, `excused`, `sick` or `absent` (case-insensitive).
    pub status: String,
}

/// An override that could not be applied.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FailedEntry {
    pub index: usize,
    pub student_id: i64,
    pub day: String,
    pub reason: String,
    /// `true` when the failure was transient and the entry can be resubmitted.
    pub retryable: bool,
}

/// Result of an override batch.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub applied: usize,
    pub failed: Vec<FailedEntry>,
}

impl From<BatchOutcome> for BatchResponse {
    fn from(outcome: BatchOutcome) -> Self {
        Self {
            applied: outcome.applied,
            failed: outcome
                .failed
                .into_iter()
                .map(|f| FailedEntry {
                    index: f.index,
                    student_id: f.student_id.get(),
                    day: f.day.to_string(),
                    reason: f.reason,
                    retryable: f.retryable,
                })
                .collect(),
        }
    }
}

/// Result of day generation.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnsureDayResponse {
    pub day: String,
    /// Rows created by this call (0 when repeated).
    pub created_count: usize,
    /// `true` when the day is not a school day.
    pub skipped: bool,
    /// Students whose row could not be written; calling again retries them.
    pub failed: Vec<i64>,
}

impl EnsureDayResponse {
    fn new(day: SchoolDay, outcome: EnsureDayOutcome) -> Self {
        Self {
            day: day.to_string(),
            created_count: outcome.created_count,
            skipped: outcome.skipped,
            failed: outcome.failed.into_iter().map(|id| id.get()).collect(),
        }
    }
}

/// One ledger row.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEntry {
    pub student_id: i64,
    pub class_id: i64,
    pub day: String,
    pub status: String,
}

impl From<AttendanceRecord> for AttendanceEntry {
    fn from(record: AttendanceRecord) -> Self {
        Self {
            student_id: record.student_id.get(),
            class_id: record.class_id.get(),
            day: record.day.to_string(),
            status: record.status.as_str().to_string(),
        }
    }
}

/// Rows per status.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusCountsDto {
    pub pending: usize,
    pub present: usize,
    pub excused: usize,
    pub sick: usize,
    pub absent: usize,
}

/// Settlement view of one class on one day.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClassSummaryResponse {
    pub class_id: i64,
    pub day: String,
    pub total: usize,
    pub counts: StatusCountsDto,
    /// Every row has left `pending`. `false` for a class with no rows.
    pub settled: bool,
}

impl From<ClassSummary> for ClassSummaryResponse {
    fn from(summary: ClassSummary) -> Self {
        let c = summary.counts;
        Self {
            class_id: summary.class_id.get(),
            day: summary.day.to_string(),
            total: summary.total,
            counts: StatusCountsDto {
                pending: c.pending,
                present: c.present,
                excused: c.excused,
                sick: c.sick,
                absent: c.absent,
            },
            settled: summary.settled,
        }
    }
}

// ── Queries ─────────────────────────────────────────────────────────────────

/// Day selector; defaults to today.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DayQuery {
    /// `YYYY-MM-DD`.
    pub day: Option<String>,
}

/// Day and optional class filter.
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct LedgerQuery {
    /// `YYYY-MM-DD`; defaults to today.
    pub day: Option<String>,
    pub class_id: Option<i64>,
}

/// Optional class filter.
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct ClassQuery {
    pub class_id: Option<i64>,
}

fn resolve_day(state: &AppState, day: Option<&str>) -> Result<SchoolDay, AppError> {
    match day {
        Some(raw) => Ok(SchoolDay::parse(raw)?),
        None => Ok(state.ledger.today()),
    }
}

// ── Handlers ────────────────────────────────────────────────────────────────

#[utoipa::path(
    patch,
    path = "/v1/attendance",
    request_body = Vec<OverrideEntry>,
    responses(
        (status = 200, description = "Per-entry results", body = BatchResponse),
        (status = 400, description = "Batch rejected, nothing written; details lists malformed entries", body = crate::error::ErrorBody),
    ),
    tag = "attendance"
)]
pub async fn apply_overrides(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<Vec<serde_json::Value>>, JsonRejection>,
) -> Result<Json<BatchResponse>, AppError> {
    require_role(&caller, Role::Teacher)?;
    let entries = extract_json(body)?;
    let outcome = state.ledger.overrides().apply_batch(&entries).await?;
    Ok(Json(outcome.into()))
}

#[utoipa::path(
    get,
    path = "/v1/attendance/ensure-day",
    params(DayQuery),
    responses(
        (status = 200, description = "Day materialized (or skipped)", body = EnsureDayResponse),
        (status = 503, description = "Calendar or store unavailable", body = crate::error::ErrorBody),
    ),
    tag = "attendance"
)]
pub async fn ensure_day(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<DayQuery>, QueryRejection>,
) -> Result<Json<EnsureDayResponse>, AppError> {
    require_role(&caller, Role::Admin)?;
    let query = extract_query(query)?;
    let day = resolve_day(&state, query.day.as_deref())?;
    let outcome = state.ledger.generator().ensure_day(day).await?;
    Ok(Json(EnsureDayResponse::new(day, outcome)))
}

#[utoipa::path(
    get,
    path = "/v1/attendance",
    params(LedgerQuery),
    responses(
        (status = 200, description = "Ledger rows of the day", body = Vec<AttendanceEntry>),
    ),
    tag = "attendance"
)]
pub async fn list_attendance(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<LedgerQuery>, QueryRejection>,
) -> Result<Json<Vec<AttendanceEntry>>, AppError> {
    require_role(&caller, Role::Teacher)?;
    let query = extract_query(query)?;
    let day = resolve_day(&state, query.day.as_deref())?;
    let records = state
        .ledger
        .list_day(day, query.class_id.map(ClassId::new))
        .await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/v1/attendance/today",
    params(ClassQuery),
    responses(
        (status = 200, description = "Today's ledger rows", body = Vec<AttendanceEntry>),
    ),
    tag = "attendance"
)]
pub async fn list_today(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<ClassQuery>, QueryRejection>,
) -> Result<Json<Vec<AttendanceEntry>>, AppError> {
    require_role(&caller, Role::Teacher)?;
    let query = extract_query(query)?;
    let records = state
        .ledger
        .list_day(state.ledger.today(), query.class_id.map(ClassId::new))
        .await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/v1/classes/{class_id}/summary",
    params(
        ("class_id" = i64, Path, description = "Class identifier"),
        DayQuery,
    ),
    responses(
        (status = 200, description = "Per-status counts and settlement flag", body = ClassSummaryResponse),
    ),
    tag = "attendance"
)]
pub async fn class_summary(
    State(state): State<AppState>,
    caller: CallerIdentity,
    class_id: Result<Path<i64>, PathRejection>,
    query: Result<Query<DayQuery>, QueryRejection>,
) -> Result<Json<ClassSummaryResponse>, AppError> {
    require_role(&caller, Role::Teacher)?;
    let class_id = extract_path(class_id)?;
    let query = extract_query(query)?;
    let day = resolve_day(&state, query.day.as_deref())?;
    let summary = state
        .ledger
        .class_summary(ClassId::new(class_id), day)
        .await?;
    Ok(Json(summary.into()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/attendance", get(list_attendance).patch(apply_overrides))
        .route("/v1/attendance/ensure-day", get(ensure_day))
        .route("/v1/attendance/today", get(list_today))
        .route("/v1/classes/{class_id}/summary", get(class_summary))
}

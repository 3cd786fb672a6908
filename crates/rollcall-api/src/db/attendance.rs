//! Attendance ledger persistence operations.
//!
//! All functions take a `&PgPool` and operate on the `attendance` table.

use chrono::NaiveDate;
use rollcall_core::{
    AttendanceRecord, AttendanceStatus, ClassId, SchoolDay, Student, StudentId,
};
use rollcall_ledger::{PresenceWrite, StoreError};
use sqlx::PgPool;

use super::parse_status;

/// Create a `pending` row unless one exists. Returns `true` if inserted.
pub async fn insert_pending(
    pool: &PgPool,
    student: &Student,
    day: SchoolDay,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO attendance (student_id, class_id, day, status)
         VALUES ($1, $2, $3, 'pending')
         ON CONFLICT (student_id, day) DO NOTHING",
    )
    .bind(student.id.get())
    .bind(student.enrolled_class_id.get())
    .bind(day.as_date())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Status the row had before a presence write.
#[derive(Debug, sqlx::FromRow)]
pub struct PresenceRow {
    pub prior_status: Option<String>,
}

impl PresenceRow {
    /// `None` (no row returned) means the row was already `present`.
    pub fn into_write(row: Option<Self>) -> Result<PresenceWrite, StoreError> {
        match row {
            None => Ok(PresenceWrite::AlreadyPresent),
            Some(Self { prior_status: None }) => Ok(PresenceWrite::Created),
            Some(Self {
                prior_status: Some(raw),
            }) => Ok(PresenceWrite::Upgraded {
                from: parse_status(&raw)?,
            }),
        }
    }
}

/// Upgrade-only presence write.
///
/// The `prior` CTE reads the statement snapshot, so the returned status is
/// the one this statement replaced. If a concurrent statement already set
/// the row to `present`, the conflict clause re-checks the latest version,
/// skips the update and returns no row.
pub async fn mark_present(
    pool: &PgPool,
    student: &Student,
    day: SchoolDay,
) -> Result<Option<PresenceRow>, sqlx::Error> {
    sqlx::query_as::<_, PresenceRow>(
        "WITH prior AS (
             SELECT status FROM attendance WHERE student_id = $1 AND day = $3
         )
         INSERT INTO attendance (student_id, class_id, day, status)
         VALUES ($1, $2, $3, 'present')
         ON CONFLICT (student_id, day) DO UPDATE
             SET status = 'present', updated_at = now()
             WHERE attendance.status <> 'present'
         RETURNING (SELECT status FROM prior) AS prior_status",
    )
    .bind(student.id.get())
    .bind(student.enrolled_class_id.get())
    .bind(day.as_date())
    .fetch_optional(pool)
    .await
}

/// Unconditionally set the status, creating the row when absent. An
/// existing row keeps its class.
pub async fn upsert_status(
    pool: &PgPool,
    student: &Student,
    day: SchoolDay,
    status: AttendanceStatus,
) -> Result<AttendanceRow, sqlx::Error> {
    sqlx::query_as::<_, AttendanceRow>(
        "INSERT INTO attendance (student_id, class_id, day, status)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (student_id, day) DO UPDATE
             SET status = EXCLUDED.status, updated_at = now()
         RETURNING student_id, class_id, day, status",
    )
    .bind(student.id.get())
    .bind(student.enrolled_class_id.get())
    .bind(day.as_date())
    .bind(status.as_str())
    .fetch_one(pool)
    .await
}

/// Fetch one row by its natural key.
pub async fn get(
    pool: &PgPool,
    student_id: StudentId,
    day: SchoolDay,
) -> Result<Option<AttendanceRow>, sqlx::Error> {
    sqlx::query_as::<_, AttendanceRow>(
        "SELECT student_id, class_id, day, status
         FROM attendance WHERE student_id = $1 AND day = $2",
    )
    .bind(student_id.get())
    .bind(day.as_date())
    .fetch_optional(pool)
    .await
}

/// Rows of one day, optionally restricted to a class, ordered by student.
pub async fn list_day(
    pool: &PgPool,
    day: SchoolDay,
    class_id: Option<ClassId>,
) -> Result<Vec<AttendanceRow>, sqlx::Error> {
    sqlx::query_as::<_, AttendanceRow>(
        "SELECT student_id, class_id, day, status
         FROM attendance
         WHERE day = $1 AND ($2::BIGINT IS NULL OR class_id = $2)
         ORDER BY student_id",
    )
    .bind(day.as_date())
    .bind(class_id.map(ClassId::get))
    .fetch_all(pool)
    .await
}

/// Internal row type for SQLx deserialization.
#[derive(Debug, sqlx::FromRow)]
pub struct AttendanceRow {
    student_id: i64,
    class_id: i64,
    day: NaiveDate,
    status: String,
}

impl AttendanceRow {
    pub fn into_record(self) -> Result<AttendanceRecord, StoreError> {
        Ok(AttendanceRecord {
            student_id: StudentId::new(self.student_id),
            class_id: ClassId::new(self.class_id),
            day: SchoolDay::from_date(self.day),
            status: parse_status(&self.status)?,
        })
    }
}

//! # Database Persistence Layer
//!
//! PostgreSQL persistence for the ledger via SQLx.
//!
//! The database layer is optional. When `DATABASE_URL` is set the ledger,
//! roster and credentials live in PostgreSQL; when absent the API runs on
//! the in-memory backend and state does not survive a restart.
//!
//! Each table has its own module of free functions taking `&PgPool`.
//! [`PgStore`] adapts them to the ledger's persistence traits. Conditional
//! writes are single `INSERT ... ON CONFLICT` statements against the
//! `UNIQUE (student_id, day)` constraint, so concurrent requests serialize
//! on the row rather than in the process.

pub mod attendance;
pub mod credentials;
pub mod students;

use async_trait::async_trait;
use rollcall_core::{
    AttendanceRecord, AttendanceStatus, ClassId, SchoolDay, Student, StudentId,
};
use rollcall_ledger::{
    AttendanceStore, Credential, CredentialRepository, PresenceWrite, Roster, StoreError,
};
use sqlx::postgres::{PgPool, PgPoolOptions};

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if `DATABASE_URL` is not set (in-memory mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set, running in-memory only. \
                 The ledger will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}

/// Classify a driver error. Foreign key violations mean the student row is
/// missing; connection-level failures are transient.
pub(crate) fn store_error(err: sqlx::Error, student: Option<StudentId>) -> StoreError {
    match err {
        sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => match student {
            Some(id) => StoreError::UnknownStudent(id),
            None => StoreError::Corrupt(err.to_string()),
        },
        sqlx::Error::Database(_)
        | sqlx::Error::RowNotFound
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::TypeNotFound { .. } => StoreError::Corrupt(err.to_string()),
        other => StoreError::Unavailable(other.to_string()),
    }
}

/// Parse a persisted status column.
pub(crate) fn parse_status(raw: &str) -> Result<AttendanceStatus, StoreError> {
    raw.parse()
        .map_err(|_| StoreError::Corrupt(format!("unknown attendance status '{raw}'")))
}

/// The ledger's persistence traits over one connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Roster for PgStore {
    async fn enrolled_students(&self) -> Result<Vec<Student>, StoreError> {
        students::list_enrolled(&self.pool)
            .await
            .map_err(|e| store_error(e, None))
    }

    async fn student(&self, id: StudentId) -> Result<Option<Student>, StoreError> {
        students::get_enrolled(&self.pool, id)
            .await
            .map_err(|e| store_error(e, None))
    }
}

#[async_trait]
impl AttendanceStore for PgStore {
    async fn insert_pending(&self, student: &Student, day: SchoolDay) -> Result<bool, StoreError> {
        attendance::insert_pending(&self.pool, student, day)
            .await
            .map_err(|e| store_error(e, Some(student.id)))
    }

    async fn mark_present(
        &self,
        student: &Student,
        day: SchoolDay,
    ) -> Result<PresenceWrite, StoreError> {
        let row = attendance::mark_present(&self.pool, student, day)
            .await
            .map_err(|e| store_error(e, Some(student.id)))?;
        attendance::PresenceRow::into_write(row)
    }

    async fn upsert_status(
        &self,
        student: &Student,
        day: SchoolDay,
        status: AttendanceStatus,
    ) -> Result<AttendanceRecord, StoreError> {
        attendance::upsert_status(&self.pool, student, day, status)
            .await
            .map_err(|e| store_error(e, Some(student.id)))?
            .into_record()
    }

    async fn get(
        &self,
        student_id: StudentId,
        day: SchoolDay,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        attendance::get(&self.pool, student_id, day)
            .await
            .map_err(|e| store_error(e, None))?
            .map(attendance::AttendanceRow::into_record)
            .transpose()
    }

    async fn list_day(
        &self,
        day: SchoolDay,
        class_id: Option<ClassId>,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        attendance::list_day(&self.pool, day, class_id)
            .await
            .map_err(|e| store_error(e, None))?
            .into_iter()
            .map(attendance::AttendanceRow::into_record)
            .collect()
    }
}

#[async_trait]
impl CredentialRepository for PgStore {
    async fn put(&self, credential: Credential) -> Result<(), StoreError> {
        let student_id = credential.student_id;
        credentials::upsert(&self.pool, &credential)
            .await
            .map_err(|e| store_error(e, Some(student_id)))
    }

    async fn get(&self, student_id: StudentId) -> Result<Option<Credential>, StoreError> {
        credentials::get(&self.pool, student_id)
            .await
            .map_err(|e| store_error(e, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_failures_are_transient() {
        let err = store_error(sqlx::Error::PoolTimedOut, Some(StudentId::new(1)));
        assert!(err.is_transient());
        let err = store_error(sqlx::Error::PoolClosed, None);
        assert!(err.is_transient());
    }

    #[test]
    fn missing_row_is_not_transient() {
        let err = store_error(sqlx::Error::RowNotFound, None);
        assert!(matches!(err, StoreError::Corrupt(_)));
    }

    #[test]
    fn persisted_status_round_trips() {
        for status in AttendanceStatus::ALL {
            assert_eq!(parse_status(status.as_str()).unwrap(), status);
        }
        assert!(matches!(parse_status("late"), Err(StoreError::Corrupt(_))));
    }
}

//! # Ledger Generator
//!
//! Materializes a day's `Pending` rows before anyone interacts with them.
//! Every insert is conditional on the natural key, so concurrent or repeated
//! calls for the same day converge on one row per student. A failed insert
//! is logged and reported but does not stop the loop; the next call picks up
//! whatever is still missing.

use std::sync::Arc;

use rollcall_core::{SchoolDay, StudentId};
use serde::Serialize;

use crate::calendar::Calendar;
use crate::error::LedgerError;
use crate::store::{AttendanceStore, Roster};

/// Result of [`LedgerGenerator::ensure_day`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsureDayOutcome {
    /// Rows created by this call.
    pub created_count: usize,
    /// `true` if the day is a non-school day and nothing was attempted.
    pub skipped: bool,
    /// Students whose insert failed; a later call retries them.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<StudentId>,
}

/// Idempotent day materializer.
#[derive(Clone)]
pub struct LedgerGenerator {
    store: Arc<dyn AttendanceStore>,
    roster: Arc<dyn Roster>,
    calendar: Arc<dyn Calendar>,
}

impl std::fmt::Debug for LedgerGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerGenerator").finish_non_exhaustive()
    }
}

impl LedgerGenerator {
    /// Assemble a generator from its collaborators.
    pub fn new(
        store: Arc<dyn AttendanceStore>,
        roster: Arc<dyn Roster>,
        calendar: Arc<dyn Calendar>,
    ) -> Self {
        Self {
            store,
            roster,
            calendar,
        }
    }

    /// Ensure every enrolled student has a row for `day`.
    ///
    /// # Errors
    ///
    /// Fails only when the calendar or the roster cannot be read. Individual
    /// insert failures are returned in [`EnsureDayOutcome::failed`].
    pub async fn ensure_day(&self, day: SchoolDay) -> Result<EnsureDayOutcome, LedgerError> {
        if self.calendar.is_non_school_day(day).await? {
            tracing::debug!(day = %day, "non-school day, generation skipped");
            return Ok(EnsureDayOutcome {
                skipped: true,
                ..EnsureDayOutcome::default()
            });
        }

        let students = self.roster.enrolled_students().await?;
        let mut outcome = EnsureDayOutcome::default();
        for student in &students {
            match self.store.insert_pending(student, day).await {
                Ok(true) => outcome.created_count += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(
                        student_id = %student.id,
                        day = %day,
                        error = %e,
                        "failed to create pending attendance row"
                    );
                    outcome.failed.push(student.id);
                }
            }
        }

        tracing::info!(
            day = %day,
            enrolled = students.len(),
            created = outcome.created_count,
            failed = outcome.failed.len(),
            "ledger generated"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::WeekdayCalendar;
    use crate::error::{CalendarError, StoreError};
    use crate::memory::MemoryStore;
    use crate::store::PresenceWrite;
    use async_trait::async_trait;
    use rollcall_core::{AttendanceRecord, AttendanceStatus, ClassId, Student};

    fn student(id: i64) -> Student {
        Student::new(StudentId::new(id), ClassId::new(1))
    }

    fn day(s: &str) -> SchoolDay {
        SchoolDay::parse(s).unwrap()
    }

    fn generator(backend: &MemoryStore) -> LedgerGenerator {
        LedgerGenerator::new(
            Arc::new(backend.clone()),
            Arc::new(backend.clone()),
            Arc::new(WeekdayCalendar::new()),
        )
    }

    #[tokio::test]
    async fn creates_pending_row_per_student() {
        let backend = MemoryStore::with_roster([student(1), student(2), student(42)]);
        let outcome = generator(&backend).ensure_day(day("2025-03-10")).await.unwrap();
        assert_eq!(outcome.created_count, 3);
        assert!(!outcome.skipped);
        let rows = backend.list_day(day("2025-03-10"), None).await.unwrap();
        assert!(rows.iter().all(|r| r.status == AttendanceStatus::Pending));
    }

    #[tokio::test]
    async fn second_call_is_a_no_op() {
        let backend = MemoryStore::with_roster([student(1), student(2)]);
        let generator = generator(&backend);
        generator.ensure_day(day("2025-03-10")).await.unwrap();
        let before = backend.list_day(day("2025-03-10"), None).await.unwrap();
        let again = generator.ensure_day(day("2025-03-10")).await.unwrap();
        assert_eq!(again.created_count, 0);
        assert_eq!(backend.list_day(day("2025-03-10"), None).await.unwrap(), before);
    }

    #[tokio::test]
    async fn concurrent_calls_create_one_row_each() {
        let backend = MemoryStore::with_roster((1..=50).map(student));
        let generator = generator(&backend);
        let (a, b) = tokio::join!(
            generator.ensure_day(day("2025-03-10")),
            generator.ensure_day(day("2025-03-10"))
        );
        assert_eq!(a.unwrap().created_count + b.unwrap().created_count, 50);
        assert_eq!(backend.record_count(), 50);
    }

    #[tokio::test]
    async fn saturday_is_skipped() {
        let backend = MemoryStore::with_roster([student(42)]);
        let outcome = generator(&backend).ensure_day(day("2025-03-15")).await.unwrap();
        assert_eq!(
            outcome,
            EnsureDayOutcome {
                created_count: 0,
                skipped: true,
                failed: vec![]
            }
        );
        assert_eq!(backend.record_count(), 0);
    }

    #[tokio::test]
    async fn existing_settled_row_is_untouched() {
        let s = student(42);
        let backend = MemoryStore::with_roster([s]);
        backend
            .upsert_status(&s, day("2025-03-10"), AttendanceStatus::Sick)
            .await
            .unwrap();
        generator(&backend).ensure_day(day("2025-03-10")).await.unwrap();
        let row = AttendanceStore::get(&backend, s.id, day("2025-03-10"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, AttendanceStatus::Sick);
    }

    /// Wraps a memory store and fails inserts for one student until healed.
    struct FlakyStore {
        inner: MemoryStore,
        broken: parking_lot::Mutex<Option<StudentId>>,
    }

    #[async_trait]
    impl AttendanceStore for FlakyStore {
        async fn insert_pending(&self, student: &Student, day: SchoolDay) -> Result<bool, StoreError> {
            if *self.broken.lock() == Some(student.id) {
                return Err(StoreError::Unavailable("connection reset".into()));
            }
            self.inner.insert_pending(student, day).await
        }
        async fn mark_present(&self, s: &Student, d: SchoolDay) -> Result<PresenceWrite, StoreError> {
            self.inner.mark_present(s, d).await
        }
        async fn upsert_status(
            &self,
            s: &Student,
            d: SchoolDay,
            status: AttendanceStatus,
        ) -> Result<AttendanceRecord, StoreError> {
            self.inner.upsert_status(s, d, status).await
        }
        async fn get(&self, id: StudentId, d: SchoolDay) -> Result<Option<AttendanceRecord>, StoreError> {
            AttendanceStore::get(&self.inner, id, d).await
        }
        async fn list_day(
            &self,
            d: SchoolDay,
            c: Option<ClassId>,
        ) -> Result<Vec<AttendanceRecord>, StoreError> {
            self.inner.list_day(d, c).await
        }
    }

    #[tokio::test]
    async fn partial_failure_is_resumable() {
        let backend = MemoryStore::with_roster([student(1), student(2), student(3)]);
        let flaky = Arc::new(FlakyStore {
            inner: backend.clone(),
            broken: parking_lot::Mutex::new(Some(StudentId::new(2))),
        });
        let generator = LedgerGenerator::new(
            flaky.clone(),
            Arc::new(backend.clone()),
            Arc::new(WeekdayCalendar::new()),
        );

        let first = generator.ensure_day(day("2025-03-10")).await.unwrap();
        assert_eq!(first.created_count, 2);
        assert_eq!(first.failed, vec![StudentId::new(2)]);

        *flaky.broken.lock() = None;
        let second = generator.ensure_day(day("2025-03-10")).await.unwrap();
        assert_eq!(second.created_count, 1);
        assert!(second.failed.is_empty());
        assert_eq!(backend.record_count(), 3);
    }

    struct DownCalendar;

    #[async_trait]
    impl Calendar for DownCalendar {
        async fn is_non_school_day(&self, _day: SchoolDay) -> Result<bool, CalendarError> {
            Err(CalendarError("holiday service timed out".into()))
        }
    }

    #[tokio::test]
    async fn calendar_failure_is_transient_error() {
        let backend = MemoryStore::with_roster([student(1)]);
        let generator = LedgerGenerator::new(
            Arc::new(backend.clone()),
            Arc::new(backend.clone()),
            Arc::new(DownCalendar),
        );
        let err = generator.ensure_day(day("2025-03-10")).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(backend.record_count(), 0);
    }
}

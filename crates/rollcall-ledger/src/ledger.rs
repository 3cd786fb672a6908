//! # Ledger Facade
//!
//! Wires the components together over one set of backends and exposes the
//! read-side queries (day listings and per-class settlement summaries).

use std::sync::Arc;

use rollcall_core::{AttendanceRecord, AttendanceStatus, ClassId, DayClock, SchoolDay};
use serde::Serialize;

use crate::broadcast::ChangeBroadcaster;
use crate::calendar::Calendar;
use crate::checkin::CheckInProcessor;
use crate::credential::{CredentialSigner, CredentialStore};
use crate::error::LedgerError;
use crate::generator::LedgerGenerator;
use crate::overrides::OverrideProcessor;
use crate::store::{AttendanceStore, CredentialRepository, Roster};

/// Backends and configuration a [`Ledger`] is built from.
pub struct LedgerParts {
    /// Attendance rows.
    pub store: Arc<dyn AttendanceStore>,
    /// Enrolled students.
    pub roster: Arc<dyn Roster>,
    /// Student credentials.
    pub credentials: Arc<dyn CredentialRepository>,
    /// Non-school-day oracle.
    pub calendar: Arc<dyn Calendar>,
    /// Credential signing key.
    pub signer: CredentialSigner,
    /// Day normalization.
    pub clock: DayClock,
    /// Change fan-out.
    pub broadcaster: ChangeBroadcaster,
}

/// Per-status counts for one class on one day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub pending: usize,
    pub present: usize,
    pub excused: usize,
    pub sick: usize,
    pub absent: usize,
}

impl StatusCounts {
    fn add(&mut self, status: AttendanceStatus) {
        match status {
            AttendanceStatus::Pending => self.pending += 1,
            AttendanceStatus::Present => self.present += 1,
            AttendanceStatus::Excused => self.excused += 1,
            AttendanceStatus::Sick => self.sick += 1,
            AttendanceStatus::Absent => self.absent += 1,
        }
    }
}

/// Settlement view of a class: `settled` once every row is non-`Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSummary {
    pub class_id: ClassId,
    pub day: SchoolDay,
    pub total: usize,
    pub counts: StatusCounts,
    /// `false` for a class with no rows yet.
    pub settled: bool,
}

impl ClassSummary {
    /// Summarize `records` (assumed to belong to `class_id` on `day`).
    pub fn from_records(class_id: ClassId, day: SchoolDay, records: &[AttendanceRecord]) -> Self {
        let mut counts = StatusCounts::default();
        for record in records {
            counts.add(record.status);
        }
        Self {
            class_id,
            day,
            total: records.len(),
            counts,
            settled: !records.is_empty() && records.iter().all(|r| r.status.is_settled()),
        }
    }
}

/// The assembled attendance engine.
#[derive(Clone)]
pub struct Ledger {
    clock: DayClock,
    store: Arc<dyn AttendanceStore>,
    credentials: CredentialStore,
    generator: LedgerGenerator,
    check_in: CheckInProcessor,
    overrides: OverrideProcessor,
    broadcaster: ChangeBroadcaster,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("clock", &self.clock)
            .field("credentials", &self.credentials)
            .field("viewers", &self.broadcaster.subscriber_count())
            .finish_non_exhaustive()
    }
}

impl Ledger {
    /// Build every component over the shared backends.
    pub fn new(parts: LedgerParts) -> Self {
        let LedgerParts {
            store,
            roster,
            credentials,
            calendar,
            signer,
            clock,
            broadcaster,
        } = parts;

        let credentials = CredentialStore::new(credentials, roster.clone(), Arc::new(signer));
        let generator = LedgerGenerator::new(store.clone(), roster.clone(), calendar);
        let check_in = CheckInProcessor::new(
            credentials.clone(),
            roster.clone(),
            store.clone(),
            broadcaster.clone(),
            clock,
        );
        let overrides = OverrideProcessor::new(roster, store.clone(), broadcaster.clone());

        Self {
            clock,
            store,
            credentials,
            generator,
            check_in,
            overrides,
            broadcaster,
        }
    }

    /// The day-normalizing clock.
    pub fn clock(&self) -> DayClock {
        self.clock
    }

    /// Today's school day.
    pub fn today(&self) -> SchoolDay {
        self.clock.today()
    }

    /// Credential issuance and verification.
    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Day materialization.
    pub fn generator(&self) -> &LedgerGenerator {
        &self.generator
    }

    /// Credential check-in.
    pub fn check_in(&self) -> &CheckInProcessor {
        &self.check_in
    }

    /// Teacher overrides.
    pub fn overrides(&self) -> &OverrideProcessor {
        &self.overrides
    }

    /// Change fan-out.
    pub fn broadcaster(&self) -> &ChangeBroadcaster {
        &self.broadcaster
    }

    /// The ledger of `day`, optionally for one class.
    pub async fn list_day(
        &self,
        day: SchoolDay,
        class_id: Option<ClassId>,
    ) -> Result<Vec<AttendanceRecord>, LedgerError> {
        Ok(self.store.list_day(day, class_id).await?)
    }

    /// Settlement summary of `class_id` on `day`.
    pub async fn class_summary(
        &self,
        class_id: ClassId,
        day: SchoolDay,
    ) -> Result<ClassSummary, LedgerError> {
        let records = self.store.list_day(day, Some(class_id)).await?;
        Ok(ClassSummary::from_records(class_id, day, &records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::WeekdayCalendar;
    use crate::memory::MemoryStore;
    use rollcall_core::{Student, StudentId};

    fn monday() -> SchoolDay {
        SchoolDay::parse("2025-03-10").unwrap()
    }

    fn ledger(backend: &MemoryStore) -> Ledger {
        Ledger::new(LedgerParts {
            store: Arc::new(backend.clone()),
            roster: Arc::new(backend.clone()),
            credentials: Arc::new(backend.clone()),
            calendar: Arc::new(WeekdayCalendar::new()),
            signer: CredentialSigner::generate(),
            clock: DayClock::default().pinned(monday()),
            broadcaster: ChangeBroadcaster::default(),
        })
    }

    #[test]
    fn summary_of_empty_class_is_unsettled() {
        let summary = ClassSummary::from_records(ClassId::new(1), monday(), &[]);
        assert_eq!(summary.total, 0);
        assert!(!summary.settled);
    }

    #[test]
    fn one_pending_row_keeps_class_unsettled() {
        let row = |id, status| AttendanceRecord {
            student_id: StudentId::new(id),
            class_id: ClassId::new(7),
            day: monday(),
            status,
        };
        let records = [
            row(1, AttendanceStatus::Absent),
            row(2, AttendanceStatus::Pending),
        ];
        let summary = ClassSummary::from_records(ClassId::new(7), monday(), &records);
        assert_eq!(summary.total, 2);
        assert!(!summary.settled);

        let summary = ClassSummary::from_records(ClassId::new(7), monday(), &records[..1]);
        assert!(summary.settled);
    }

    #[tokio::test]
    async fn class_settles_when_no_row_is_pending() {
        let a = Student::new(StudentId::new(1), ClassId::new(7));
        let b = Student::new(StudentId::new(2), ClassId::new(7));
        let backend = MemoryStore::with_roster([a, b]);
        let ledger = ledger(&backend);
        ledger.generator().ensure_day(monday()).await.unwrap();

        let summary = ledger.class_summary(ClassId::new(7), monday()).await.unwrap();
        assert_eq!(summary.counts.pending, 2);
        assert!(!summary.settled);

        backend
            .upsert_status(&a, monday(), AttendanceStatus::Present)
            .await
            .unwrap();
        backend
            .upsert_status(&b, monday(), AttendanceStatus::Sick)
            .await
            .unwrap();
        let summary = ledger.class_summary(ClassId::new(7), monday()).await.unwrap();
        assert_eq!(summary.counts.present, 1);
        assert_eq!(summary.counts.sick, 1);
        assert!(summary.settled);
    }

    #[tokio::test]
    async fn today_follows_clock() {
        let backend = MemoryStore::new();
        assert_eq!(ledger(&backend).today(), monday());
    }
}

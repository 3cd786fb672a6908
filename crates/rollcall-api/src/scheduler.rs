//! # Daily Generation Scheduler
//!
//! Runs `ensure_day(today)` once per day at a configured school-local time.
//! A run that fails, or leaves students unwritten, is retried after
//! [`RETRY_DELAY`] instead of waiting for the next day. On startup a run
//! happens immediately when the configured time has already passed, so a
//! restart mid-morning still materializes the day.
//!
//! Generation is idempotent, so overlapping with a manual
//! `GET /v1/attendance/ensure-day` is harmless.

use std::time::Duration;

use chrono::{Days, NaiveDateTime, NaiveTime};
use rollcall_ledger::{EnsureDayOutcome, Ledger, LedgerError};
use tokio::task::JoinHandle;

/// Wait before retrying a failed or partial run.
pub const RETRY_DELAY: Duration = Duration::from_secs(300);

/// The first local instant at `at` strictly after `now`.
pub fn next_run_after(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        today
    } else {
        now.date()
            .checked_add_days(Days::new(1))
            .map(|d| d.and_time(at))
            .unwrap_or(today)
    }
}

/// Background daily generation.
#[derive(Debug, Clone)]
pub struct DailyGeneration {
    ledger: Ledger,
    at: NaiveTime,
}

impl DailyGeneration {
    pub fn new(ledger: Ledger, at: NaiveTime) -> Self {
        Self { ledger, at }
    }

    /// Spawn the loop on the current runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Generate today's ledger once.
    pub async fn run_once(&self) -> Result<EnsureDayOutcome, LedgerError> {
        let day = self.ledger.today();
        let outcome = self.ledger.generator().ensure_day(day).await?;
        tracing::info!(
            day = %day,
            created = outcome.created_count,
            skipped = outcome.skipped,
            failed = outcome.failed.len(),
            "daily generation finished"
        );
        Ok(outcome)
    }

    async fn run(self) {
        let now = self.now_local();
        let mut wait = if now.time() >= self.at {
            Duration::ZERO
        } else {
            self.until_next(now)
        };
        tracing::info!(at = %self.at, "daily generation scheduled");

        loop {
            tokio::time::sleep(wait).await;
            wait = match self.run_once().await {
                Ok(outcome) if outcome.failed.is_empty() => self.until_next(self.now_local()),
                Ok(outcome) => {
                    tracing::warn!(
                        failed = outcome.failed.len(),
                        retry_in_secs = RETRY_DELAY.as_secs(),
                        "daily generation incomplete"
                    );
                    RETRY_DELAY
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        retry_in_secs = RETRY_DELAY.as_secs(),
                        "daily generation failed"
                    );
                    RETRY_DELAY
                }
            };
        }
    }

    fn now_local(&self) -> NaiveDateTime {
        self.ledger.clock().now_local().naive_local()
    }

    fn until_next(&self, now: NaiveDateTime) -> Duration {
        (next_run_after(now, self.at) - now)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::NaiveDate;
    use rollcall_core::{ClassId, DayClock, SchoolDay, Student, StudentId};
    use rollcall_ledger::{ChangeBroadcaster, CredentialSigner, LedgerParts, MemoryStore, WeekdayCalendar};

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn moment(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap().and_time(at(h, m))
    }

    #[test]
    fn next_run_is_later_today_before_the_hour() {
        assert_eq!(next_run_after(moment(10, 5, 59), at(6, 0)), moment(10, 6, 0));
    }

    #[test]
    fn next_run_is_tomorrow_at_or_after_the_hour() {
        assert_eq!(next_run_after(moment(10, 6, 0), at(6, 0)), moment(11, 6, 0));
        assert_eq!(next_run_after(moment(10, 23, 30), at(6, 0)), moment(11, 6, 0));
    }

    #[test]
    fn next_run_crosses_month_end() {
        let now = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap().and_time(at(7, 0));
        let expected = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap().and_time(at(6, 0));
        assert_eq!(next_run_after(now, at(6, 0)), expected);
    }

    #[tokio::test]
    async fn run_once_generates_today() {
        let backend = MemoryStore::with_roster([
            Student::new(StudentId::new(1), ClassId::new(1)),
            Student::new(StudentId::new(2), ClassId::new(1)),
        ]);
        let ledger = Ledger::new(LedgerParts {
            store: Arc::new(backend.clone()),
            roster: Arc::new(backend.clone()),
            credentials: Arc::new(backend.clone()),
            calendar: Arc::new(WeekdayCalendar::new()),
            signer: CredentialSigner::generate(),
            clock: DayClock::default().pinned(SchoolDay::parse("2025-03-10").unwrap()),
            broadcaster: ChangeBroadcaster::default(),
        });
        let job = DailyGeneration::new(ledger, at(6, 0));
        assert_eq!(job.run_once().await.unwrap().created_count, 2);
        assert_eq!(job.run_once().await.unwrap().created_count, 0);
        assert_eq!(backend.record_count(), 2);
    }
}

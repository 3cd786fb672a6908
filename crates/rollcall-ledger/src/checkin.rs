//! # Check-In Processor
//!
//! Turns a presented credential into an upgrade-only transition of today's
//! row to `Present`. The transition is a single conditional write in the
//! store ([`AttendanceStore::mark_present`]); replaying the same credential
//! from two devices yields one transition and one `alreadyPresent`
//! observation. A row that the generator has not created yet is created
//! directly as `Present`.
//!
//! Check-in upgrades `Excused` and `Sick` as well as `Pending` and
//! `Absent`: a student who shows up after all counts as present.

use std::sync::Arc;

use rollcall_core::{AttendanceChange, AttendanceStatus, DayClock, SchoolDay, StudentId};
use serde::{Deserialize, Serialize};

use crate::broadcast::ChangeBroadcaster;
use crate::credential::CredentialStore;
use crate::error::LedgerError;
use crate::store::{AttendanceStore, PresenceWrite, Roster};

/// Result of a successful check-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInOutcome {
    /// The student the credential belongs to.
    pub student_id: StudentId,
    /// `true` if the row was already `Present` and nothing was written.
    pub already_present: bool,
}

/// Credential-bound, upgrade-only presence marking.
#[derive(Clone)]
pub struct CheckInProcessor {
    credentials: CredentialStore,
    roster: Arc<dyn Roster>,
    store: Arc<dyn AttendanceStore>,
    broadcaster: ChangeBroadcaster,
    clock: DayClock,
}

impl std::fmt::Debug for CheckInProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckInProcessor")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl CheckInProcessor {
    /// Assemble a processor from its collaborators.
    pub fn new(
        credentials: CredentialStore,
        roster: Arc<dyn Roster>,
        store: Arc<dyn AttendanceStore>,
        broadcaster: ChangeBroadcaster,
        clock: DayClock,
    ) -> Self {
        Self {
            credentials,
            roster,
            store,
            broadcaster,
            clock,
        }
    }

    /// Check in the holder of `presented` for today.
    pub async fn check_in(&self, presented: &str) -> Result<CheckInOutcome, LedgerError> {
        self.check_in_on(presented, self.clock.today()).await
    }

    /// Check in the holder of `presented` for an explicit `day`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidCredential`] if the secret is not current.
    /// - [`LedgerError::UnknownStudent`] if the student has left the roster.
    pub async fn check_in_on(
        &self,
        presented: &str,
        day: SchoolDay,
    ) -> Result<CheckInOutcome, LedgerError> {
        let student_id = match self.credentials.resolve(presented).await {
            Ok(id) => id,
            Err(LedgerError::InvalidCredential) => {
                tracing::warn!(day = %day, "check-in rejected: invalid credential");
                return Err(LedgerError::InvalidCredential);
            }
            Err(e) => return Err(e),
        };

        let student = self
            .roster
            .student(student_id)
            .await?
            .ok_or(LedgerError::UnknownStudent(student_id))?;

        let write = self.store.mark_present(&student, day).await?;
        if write.changed() {
            tracing::info!(
                student_id = %student_id,
                day = %day,
                status = %AttendanceStatus::Present,
                transition = ?write,
                "check-in committed"
            );
            self.broadcaster.publish(vec![AttendanceChange {
                student_id,
                day,
                status: AttendanceStatus::Present,
            }]);
        } else {
            tracing::debug!(student_id = %student_id, day = %day, "repeat check-in");
        }

        Ok(CheckInOutcome {
            student_id,
            already_present: write == PresenceWrite::AlreadyPresent,
        })
    }
}

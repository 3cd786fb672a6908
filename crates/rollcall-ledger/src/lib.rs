//! # rollcall-ledger: Attendance Ledger & Synchronization Engine
//!
//! Owns every write to the attendance ledger. Each school day gets exactly
//! one row per enrolled student, keyed by `(student_id, day)`:
//!
//! | Component | Module | Writes |
//! |-----------|--------|--------|
//! | Credential store | [`credential`] | credentials (sole writer) |
//! | Ledger generator | [`generator`] | `Pending` rows, conditional insert |
//! | Check-in processor | [`checkin`] | `* -> Present`, upgrade-only |
//! | Override processor | [`overrides`] | `* -> *`, unconditional upsert |
//! | Change broadcaster | [`broadcast`] | nothing; fans out committed changes |
//!
//! ## Concurrency
//!
//! There is no in-process coordination between requests. All ordering
//! guarantees come from the conditional writes behind the [`store`] traits,
//! which a backend must execute atomically on the natural key.
//!
//! ## Backends
//!
//! [`memory::MemoryStore`] implements every seam in process. The API crate
//! supplies a PostgreSQL implementation.

pub mod broadcast;
pub mod calendar;
pub mod checkin;
pub mod credential;
pub mod error;
pub mod generator;
pub mod ledger;
pub mod memory;
pub mod overrides;
pub mod store;

pub use broadcast::{ChangeBroadcaster, ChangeEvent};
pub use calendar::{Calendar, WeekdayCalendar};
pub use checkin::{CheckInOutcome, CheckInProcessor};
pub use credential::{CredentialSigner, CredentialStore, KeyError};
pub use error::{CalendarError, LedgerError, MalformedItem, StoreError};
pub use generator::{EnsureDayOutcome, LedgerGenerator};
pub use ledger::{ClassSummary, Ledger, LedgerParts, StatusCounts};
pub use memory::MemoryStore;
pub use overrides::{BatchOutcome, FailedItem, OverrideItem, OverrideProcessor};
pub use store::{AttendanceStore, Credential, CredentialRepository, PresenceWrite, Roster};

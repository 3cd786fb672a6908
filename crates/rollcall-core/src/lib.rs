#![deny(missing_docs)]

//! # rollcall-core: Foundational Types for the Attendance Ledger
//!
//! Every other crate in the workspace depends on this one. It performs no
//! I/O and has no internal crate dependencies.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** You cannot pass a [`ClassId`]
//!    where a [`StudentId`] is expected.
//!
//! 2. **One canonical calendar day.** [`SchoolDay`] carries no time of day.
//!    "Today" is derived only through [`DayClock`], which fixes the school's
//!    reference offset so that two machines with different local clocks agree.
//!
//! 3. **One [`AttendanceStatus`] enum.** Parsing, display and settlement
//!    checks live next to the enum; no free-floating status strings.

pub mod day;
pub mod error;
pub mod identity;
pub mod record;
pub mod status;

pub use day::{DayClock, SchoolDay};
pub use error::ValidationError;
pub use identity::{ClassId, StudentId};
pub use record::{AttendanceChange, AttendanceRecord, Student};
pub use status::AttendanceStatus;

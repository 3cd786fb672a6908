//! # API Route Modules
//!
//! - `checkin`: credential scan to `present`.
//! - `attendance`: overrides, day generation, ledger listings, class summaries.
//! - `credentials`: credential issuance.
//! - `events`: live change stream (SSE).

pub mod attendance;
pub mod checkin;
pub mod credentials;
pub mod events;

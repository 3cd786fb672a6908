//! # rollcall-client: Typed Client and Offline Queue
//!
//! Talks to the rollcall attendance API and keeps check-ins and overrides
//! that could not reach it in a local SQLite file until they can.
//!
//! - [`RollcallClient`]: one method per API operation.
//! - [`OfflineQueue`]: durable FIFO of [`Intent`]s keyed by a stable
//!   `local_id`.
//! - [`Reconciler`]: submit-or-queue, and ordered replay.
//! - [`ReconciliationWorker`]: replays on every transition to online.
//! - [`RetryPolicy`]: how often a call is resent before it counts as
//!   unreachable.
//!
//! Only transport failures and gateway statuses (502, 503, 504) send an
//! intent to the queue. A rejected credential is surfaced immediately.

pub mod api;
pub mod config;
pub mod error;
pub mod queue;
pub(crate) mod retry;
pub mod sync;
pub mod types;
pub mod worker;

pub use api::RollcallClient;
pub use config::ClientConfig;
pub use error::{ClientError, QueueError, SyncError};
pub use queue::{Intent, OfflineIntent, OfflineQueue};
pub use retry::RetryPolicy;
pub use sync::{Ack, DrainReport, Reconciler, Rejected, Submission};
pub use worker::{Connectivity, ReconciliationWorker};

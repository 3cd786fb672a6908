//! # Middleware Stack
//!
//! Tower middleware for the API layer:
//! - [`metrics`]: Prometheus request metrics.
//!
//! Authentication lives in [`crate::auth`]; tracing uses `tower_http`'s
//! `TraceLayer` directly.

pub mod metrics;

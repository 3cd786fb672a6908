//! # rollcall-api: Attendance Ledger HTTP Service
//!
//! Axum front end over [`rollcall_ledger::Ledger`].
//!
//! ## API Surface
//!
//! | Route | Module | Role |
//! |-------|--------|------|
//! | `POST /v1/check-in` | [`routes::checkin`] | teacher |
//! | `PATCH /v1/attendance` | [`routes::attendance`] | teacher |
//! | `GET /v1/attendance`, `/v1/attendance/today` | [`routes::attendance`] | teacher |
//! | `GET /v1/classes/{class_id}/summary` | [`routes::attendance`] | teacher |
//! | `GET /v1/attendance/ensure-day` | [`routes::attendance`] | admin |
//! | `POST /v1/students/{student_id}/credential` | [`routes::credentials`] | admin |
//! | `GET /v1/events` | [`routes::events`] | teacher |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → AuthMiddleware → Handler
//! ```
//!
//! Health probes and `/metrics` are mounted outside the auth middleware.

pub mod auth;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod scheduler;
pub mod state;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Router};
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::middleware::metrics::ApiMetrics;
use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };
    let metrics = ApiMetrics::new();

    let api = Router::new()
        .merge(routes::checkin::router())
        .merge(routes::attendance::router())
        .merge(routes::credentials::router())
        .merge(routes::events::router())
        .merge(openapi::router())
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(from_fn(auth::auth_middleware))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(Extension(metrics.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(auth_config))
        .with_state(state.clone());

    let unauthenticated = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(prometheus_metrics))
        .layer(Extension(metrics))
        .with_state(state);

    Router::new().merge(unauthenticated).merge(api)
}

/// `GET /metrics`: Prometheus scrape endpoint.
///
/// Refreshes the ledger gauges from today's rows before encoding.
async fn prometheus_metrics(
    State(state): State<AppState>,
    Extension(metrics): Extension<ApiMetrics>,
) -> impl IntoResponse {
    match state.ledger.list_day(state.ledger.today(), None).await {
        Ok(records) => {
            metrics.attendance_today().reset();
            for status in rollcall_core::AttendanceStatus::ALL {
                let count = records.iter().filter(|r| r.status == status).count();
                metrics
                    .attendance_today()
                    .with_label_values(&[status.as_str()])
                    .set(count as f64);
            }
        }
        Err(e) => tracing::warn!(error = %e, "skipping ledger gauges on scrape"),
    }
    metrics
        .event_viewers()
        .set(state.ledger.broadcaster().subscriber_count() as i64);
    metrics
        .signing_key_ephemeral()
        .set(i64::from(state.key_ephemeral));

    match metrics.gather_and_encode() {
        Ok(body) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to encode Prometheus metrics: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e).into_response()
        }
    }
}

/// Liveness probe. Always 200 while the process runs.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe. 503 when the database (if configured) is unreachable.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if let Some(pool) = &state.db_pool {
        if let Err(e) = sqlx::query("SELECT 1").execute(pool).await {
            tracing::warn!("Database health check failed: {e}");
            return (StatusCode::SERVICE_UNAVAILABLE, "database unreachable").into_response();
        }
    }
    (StatusCode::OK, "ready").into_response()
}

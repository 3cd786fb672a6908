//! # rollcall-api: Binary Entry Point
//!
//! Starts the attendance service. Uses PostgreSQL when `DATABASE_URL` is
//! set, otherwise an in-memory ledger that is lost on restart.

use rollcall_api::scheduler::DailyGeneration;
use rollcall_api::state::{AppConfig, AppState};
use rollcall_ledger::MemoryStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = AppConfig::from_env().map_err(|e| {
        tracing::error!("Invalid configuration: {e}");
        e
    })?;
    let port = config.port;

    let db_pool = rollcall_api::db::init_pool().await.map_err(|e| {
        tracing::error!("Database initialization failed: {e}");
        e
    })?;

    let state = match db_pool {
        Some(pool) => {
            for student in &config.roster_seed {
                rollcall_api::db::students::upsert(&pool, student).await?;
            }
            if !config.roster_seed.is_empty() {
                tracing::info!(students = config.roster_seed.len(), "roster seed applied");
            }
            AppState::with_postgres(config, pool)?
        }
        None => {
            tracing::warn!("Running with in-memory ledger; attendance is lost on restart");
            AppState::in_memory(config, MemoryStore::new())?
        }
    };

    tracing::info!(
        today = %state.ledger.today(),
        holidays = state.config.calendar.holiday_count(),
        "ledger ready"
    );

    if let Some(at) = state.config.daily_generation_at {
        DailyGeneration::new(state.ledger.clone(), at).spawn();
    }

    let app = rollcall_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Rollcall API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

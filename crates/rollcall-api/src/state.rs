//! # Application State & Configuration
//!
//! [`AppConfig`] is read once from the environment at startup. [`AppState`]
//! holds the assembled [`Ledger`] (over either the in-memory or the
//! PostgreSQL backend) and is cloned into every handler.

use std::sync::Arc;

use chrono::NaiveTime;
use rollcall_core::{ClassId, DayClock, Student, StudentId};
use rollcall_ledger::{
    ChangeBroadcaster, CredentialSigner, KeyError, Ledger, LedgerParts, MemoryStore,
    WeekdayCalendar,
};
use sqlx::PgPool;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::db::PgStore;

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 8800;

/// Default local time of the daily ledger generation.
pub const DEFAULT_GENERATION_AT: &str = "06:00";

/// Configuration errors detected at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("PORT must be a port number, got \"{0}\"")]
    InvalidPort(String),

    #[error("SCHOOL_UTC_OFFSET_HOURS: {0}")]
    InvalidOffset(String),

    #[error("SCHOOL_HOLIDAYS: {0}")]
    InvalidHolidays(String),

    #[error("DAILY_GENERATION_AT must be HH:MM or \"off\", got \"{0}\"")]
    InvalidGenerationTime(String),

    #[error("ROSTER_SEED entry \"{0}\" is not student_id:class_id")]
    InvalidRosterSeed(String),

    #[error("CREDENTIAL_SIGNING_KEY_HEX: {0}")]
    SigningKey(#[from] KeyError),
}

/// Application configuration.
///
/// Custom `Debug` redacts the auth token and the signing key.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Static bearer secret. If `None`, authentication is disabled.
    pub auth_token: Option<String>,
    /// School-local day normalization.
    pub clock: DayClock,
    /// Weekends plus `SCHOOL_HOLIDAYS`.
    pub calendar: WeekdayCalendar,
    /// Local time of the daily generation run; `None` disables the scheduler.
    pub daily_generation_at: Option<NaiveTime>,
    /// Hex-encoded Ed25519 secret for credential signing.
    pub signing_key_hex: Option<Zeroizing<String>>,
    /// Students enrolled at startup.
    pub roster_seed: Vec<Student>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("clock", &self.clock)
            .field("holidays", &self.calendar.holiday_count())
            .field("daily_generation_at", &self.daily_generation_at)
            .field(
                "signing_key_hex",
                &self.signing_key_hex.as_ref().map(|_| "[REDACTED]"),
            )
            .field("roster_seed", &self.roster_seed.len())
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            auth_token: None,
            clock: DayClock::default(),
            calendar: WeekdayCalendar::new(),
            daily_generation_at: NaiveTime::from_hms_opt(6, 0, 0),
            signing_key_hex: None,
            roster_seed: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(raw))?,
            None => DEFAULT_PORT,
        };

        let auth_token = lookup("AUTH_TOKEN").filter(|t| !t.is_empty());

        let clock = match lookup("SCHOOL_UTC_OFFSET_HOURS") {
            Some(raw) => {
                let hours: i32 = raw
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidOffset(format!("not an integer: \"{raw}\"")))?;
                DayClock::from_offset_hours(hours)
                    .map_err(|e| ConfigError::InvalidOffset(e.to_string()))?
            }
            None => DayClock::default(),
        };

        let calendar = match lookup("SCHOOL_HOLIDAYS") {
            Some(list) => WeekdayCalendar::parse_holidays(&list)
                .map_err(|e| ConfigError::InvalidHolidays(e.to_string()))?,
            None => WeekdayCalendar::new(),
        };

        let daily_generation_at = parse_generation_at(
            lookup("DAILY_GENERATION_AT")
                .as_deref()
                .unwrap_or(DEFAULT_GENERATION_AT),
        )?;

        let signing_key_hex = lookup("CREDENTIAL_SIGNING_KEY_HEX")
            .filter(|k| !k.trim().is_empty())
            .map(Zeroizing::new);

        let roster_seed = match lookup("ROSTER_SEED") {
            Some(seed) => parse_roster_seed(&seed)?,
            None => Vec::new(),
        };

        Ok(Self {
            port,
            auth_token,
            clock,
            calendar,
            daily_generation_at,
            signing_key_hex,
            roster_seed,
        })
    }
}

/// `HH:MM` school-local time, or `off`.
pub fn parse_generation_at(raw: &str) -> Result<Option<NaiveTime>, ConfigError> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("off") {
        return Ok(None);
    }
    NaiveTime::parse_from_str(raw, "%H:%M")
        .map(Some)
        .map_err(|_| ConfigError::InvalidGenerationTime(raw.to_string()))
}

/// Comma-separated `student_id:class_id` pairs.
pub fn parse_roster_seed(seed: &str) -> Result<Vec<Student>, ConfigError> {
    seed.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let invalid = || ConfigError::InvalidRosterSeed(entry.to_string());
            let (student, class) = entry.split_once(':').ok_or_else(invalid)?;
            let student: i64 = student.trim().parse().map_err(|_| invalid())?;
            let class: i64 = class.trim().parse().map_err(|_| invalid())?;
            Ok(Student::new(StudentId::new(student), ClassId::new(class)))
        })
        .collect()
}

/// Load the credential signing key, or generate one for development.
///
/// Returns the signer and whether it is ephemeral. An ephemeral key means
/// every credential issued by this process stops verifying after a restart.
pub fn load_or_generate_signer(
    hex: Option<&str>,
) -> Result<(CredentialSigner, bool), KeyError> {
    match hex {
        Some(hex) => Ok((CredentialSigner::from_hex(hex)?, false)),
        None => {
            tracing::warn!(
                "CREDENTIAL_SIGNING_KEY_HEX not set, generating an ephemeral key. \
                 Issued credentials will not verify after restart."
            );
            Ok((CredentialSigner::generate(), true))
        }
    }
}

/// Shared application state accessible to all route handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub ledger: Ledger,
    pub config: AppConfig,
    /// Present in PostgreSQL mode; used by the readiness probe.
    pub db_pool: Option<PgPool>,
    /// `true` when the signing key was generated at startup.
    pub key_ephemeral: bool,
}

impl AppState {
    /// Wrap an already assembled ledger.
    pub fn from_ledger(ledger: Ledger, config: AppConfig, db_pool: Option<PgPool>) -> Self {
        Self {
            ledger,
            config,
            db_pool,
            key_ephemeral: false,
        }
    }

    /// Assemble the ledger over an in-memory backend. The configured roster
    /// seed is enrolled into `backend`.
    pub fn in_memory(config: AppConfig, backend: MemoryStore) -> Result<Self, ConfigError> {
        for student in &config.roster_seed {
            backend.enroll(*student);
        }
        let (signer, key_ephemeral) = load_or_generate_signer(signing_key(&config))?;
        let ledger = Ledger::new(LedgerParts {
            store: Arc::new(backend.clone()),
            roster: Arc::new(backend.clone()),
            credentials: Arc::new(backend),
            calendar: Arc::new(config.calendar.clone()),
            signer,
            clock: config.clock,
            broadcaster: ChangeBroadcaster::default(),
        });
        Ok(Self {
            ledger,
            config,
            db_pool: None,
            key_ephemeral,
        })
    }

    /// Assemble the ledger over PostgreSQL.
    pub fn with_postgres(config: AppConfig, pool: PgPool) -> Result<Self, ConfigError> {
        let (signer, key_ephemeral) = load_or_generate_signer(signing_key(&config))?;
        let store = PgStore::new(pool.clone());
        let ledger = Ledger::new(LedgerParts {
            store: Arc::new(store.clone()),
            roster: Arc::new(store.clone()),
            credentials: Arc::new(store),
            calendar: Arc::new(config.calendar.clone()),
            signer,
            clock: config.clock,
            broadcaster: ChangeBroadcaster::default(),
        });
        Ok(Self {
            ledger,
            config,
            db_pool: Some(pool),
            key_ephemeral,
        })
    }
}

fn signing_key(config: &AppConfig) -> Option<&str> {
    config.signing_key_hex.as_ref().map(|k| k.as_str())
}

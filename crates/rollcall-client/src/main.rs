//! # rollcall CLI entry point
//!
//! Command-line front end for scanning stations and office scripts. Check-ins
//! and overrides that cannot reach the server are saved to the offline queue;
//! `rollcall drain` replays them.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rollcall_core::{AttendanceStatus, SchoolDay, StudentId};
use tracing_subscriber::EnvFilter;

use rollcall_client::types::OverrideEntry;
use rollcall_client::{
    Ack, ClientConfig, Intent, OfflineQueue, Reconciler, RollcallClient, Submission,
};

/// Rollcall attendance client.
///
/// Connection settings come from ROLLCALL_API_URL, ROLLCALL_API_TOKEN,
/// ROLLCALL_TIMEOUT_SECS and ROLLCALL_QUEUE_PATH.
#[derive(Parser, Debug)]
#[command(name = "rollcall", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check a student in with the secret read from their code.
    CheckIn {
        /// Scanned credential.
        credential: String,
    },

    /// Set one status for several students on one day.
    Override {
        /// Day in YYYY-MM-DD.
        #[arg(long)]
        day: SchoolDay,
        /// pending, present, excused, sick or absent.
        #[arg(long)]
        status: AttendanceStatus,
        /// Student identifiers.
        #[arg(required = true)]
        students: Vec<StudentId>,
    },

    /// Create the day's pending rows (admin token).
    EnsureDay {
        /// Day in YYYY-MM-DD; the server's today when omitted.
        #[arg(long)]
        day: Option<SchoolDay>,
    },

    /// Issue a new credential for a student, revoking the old one (admin token).
    IssueCredential {
        student: StudentId,
    },

    /// Replay intents saved while offline.
    Drain,

    /// List intents saved while offline.
    Pending,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match run(cli.command).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(command: Command) -> Result<u8> {
    let config = ClientConfig::from_env().context("loading client configuration")?;
    let client = RollcallClient::new(&config)?;

    match command {
        Command::EnsureDay { day } => {
            let resp = client.ensure_day(day).await?;
            if resp.skipped {
                println!("{}: not a school day, nothing generated", resp.day);
            } else {
                println!("{}: {} rows created", resp.day, resp.created_count);
            }
            for id in &resp.failed {
                println!("  failed: student {id}");
            }
            Ok(if resp.failed.is_empty() { 0 } else { 2 })
        }
        Command::IssueCredential { student } => {
            let resp = client.issue_credential(student).await?;
            println!("{}", resp.secret_value);
            Ok(0)
        }
        command => {
            let queue = OfflineQueue::open(&config.queue_path)
                .await
                .with_context(|| format!("opening offline queue {}", config.queue_path.display()))?;
            let reconciler = Reconciler::new(client, queue.clone());
            let code = run_queued(&reconciler, command).await;
            queue.close().await;
            code
        }
    }
}

async fn run_queued(reconciler: &Reconciler, command: Command) -> Result<u8> {
    let intent = match command {
        Command::CheckIn { credential } => Intent::CheckIn { credential },
        Command::Override { day, status, students } => Intent::Override {
            entries: students
                .into_iter()
                .map(|student_id| OverrideEntry {
                    student_id,
                    day,
                    status,
                })
                .collect(),
        },
        Command::Drain => {
            let report = reconciler.drain().await?;
            println!(
                "applied {}, rejected {}, still queued {}",
                report.applied.len(),
                report.rejected.len(),
                report.remaining
            );
            for rejected in &report.rejected {
                println!("  rejected {} [{}]: {}", rejected.local_id, rejected.code, rejected.message);
            }
            return Ok(if report.remaining == 0 { 0 } else { 2 });
        }
        Command::Pending => {
            for queued in reconciler.queue().pending().await? {
                println!(
                    "{}  {}  {}",
                    queued.created_at.to_rfc3339(),
                    queued.local_id,
                    queued.intent.kind()
                );
            }
            return Ok(0);
        }
        Command::EnsureDay { .. } | Command::IssueCredential { .. } => {
            anyhow::bail!("command does not use the offline queue")
        }
    };

    match reconciler.submit(intent).await? {
        Submission::Applied(Ack::CheckIn(resp)) => {
            if resp.already_present {
                println!("student {} was already present", resp.student_id);
            } else {
                println!("student {} marked present", resp.student_id);
            }
            Ok(0)
        }
        Submission::Applied(Ack::Override(batch)) => {
            println!("{} applied", batch.applied);
            for failed in &batch.failed {
                println!("  student {}: {}", failed.student_id, failed.reason);
            }
            Ok(if batch.failed.is_empty() { 0 } else { 2 })
        }
        Submission::Partial { ack, queued } => {
            println!("{} applied, retryable entries saved offline as {queued}", ack.applied);
            Ok(2)
        }
        Submission::Queued(local_id) => {
            println!("server unreachable, saved offline as {local_id}");
            Ok(3)
        }
    }
}

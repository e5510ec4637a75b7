//! Vitrine operational CLI
//!
//! The composition root: builds the configuration and the connection
//! manager, runs one command against it, and wires process signals into
//! the manager's idempotent shutdown path. Exits 0 after a graceful stop
//! and 1 when the run ended in a fault.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use vitrine_core::Value;
use vitrine_db::{ConnectionManager, DbConfig};

#[derive(Parser)]
#[command(
    name = "vitrine",
    about = "Operational tooling for the vitrine data service",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Probe the database and print a health report
    Health,
    /// Print current pool statistics
    Stats,
    /// Execute a single SQL statement with positional parameters
    Query {
        /// SQL text, with $1..$n placeholders
        sql: String,
        /// Positional parameter values
        params: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match DbConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            return ExitCode::from(1);
        }
    };

    let manager = Arc::new(ConnectionManager::new(config));

    // Every exit path funnels through the same shutdown call below:
    // signals exit 0, command failures and panicked tasks exit 1.
    let worker = tokio::spawn(run(cli.command, manager.clone()));

    let code = tokio::select! {
        joined = worker => match joined {
            Ok(Ok(())) => 0,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "command failed");
                1
            }
            Err(e) => {
                tracing::error!(error = %e, "command task panicked");
                1
            }
        },
        signal = wait_for_signal() => match signal {
            Ok(name) => {
                tracing::info!(signal = name, "termination signal received");
                0
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for signals");
                1
            }
        },
    };

    manager.shutdown().await;
    ExitCode::from(code)
}

async fn run(command: Command, manager: Arc<ConnectionManager>) -> anyhow::Result<()> {
    match command {
        Command::Health => {
            let report = manager.health_check().await;
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("serialize health report")?
            );
            if !report.status.is_healthy() {
                anyhow::bail!("database is unhealthy");
            }
        }
        Command::Stats => {
            let stats = manager.stats();
            println!(
                "{}",
                serde_json::to_string_pretty(&stats).context("serialize stats")?
            );
        }
        Command::Query { sql, params } => {
            let params: Vec<Value> = params.iter().map(|raw| parse_param(raw)).collect();
            let set = manager.execute(&sql, &params).await?;
            let rows: Vec<_> = set.rows.iter().map(|row| row.to_map()).collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&rows).context("serialize rows")?
            );
            tracing::info!(
                rows = set.row_count,
                elapsed_ms = set.execution_time_ms,
                "statement completed"
            );
        }
    }
    Ok(())
}

/// Guess a parameter's SQL type from its literal form
fn parse_param(raw: &str) -> Value {
    if raw.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    if let Ok(v) = raw.parse::<bool>() {
        return Value::Bool(v);
    }
    if let Ok(v) = raw.parse::<i64>() {
        return Value::Int64(v);
    }
    if let Ok(v) = raw.parse::<f64>() {
        return Value::Float64(v);
    }
    Value::String(raw.to_string())
}

/// Resolve when the process receives an interrupt or terminate signal
#[cfg(unix)]
async fn wait_for_signal() -> anyhow::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for SIGINT")?;
            Ok("interrupt")
        }
        _ = terminate.recv() => Ok("terminate"),
    }
}

/// Resolve when the process receives an interrupt signal
#[cfg(not(unix))]
async fn wait_for_signal() -> anyhow::Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for SIGINT")?;
    Ok("interrupt")
}

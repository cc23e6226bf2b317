//! teanote-migrate: offline tool that moves tea-note ratings between the
//! legacy flat columns and the versioned rating-schema tables.
//!
//! Reports are written to stdout as JSON; logs go to stderr or `LOG_FILE`.

mod config;

use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use teanote_db::{log_pool_metrics, Database, Direction, MigrationPlan, MigrationState};

use crate::config::{redact_url, LogConfig, LogFormat, MigrateConfig, DEFAULT_LOG_FILTER};

#[derive(Parser)]
#[command(name = "teanote-migrate")]
#[command(author, version, about = "Rating schema migration for tea notes")]
#[command(propagate_version = true)]
struct Cli {
    /// PostgreSQL connection string (overrides DATABASE_URL)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Move legacy rating/ratings columns into the rating schema tables
    Up,

    /// Restore the legacy rating/ratings columns and drop the schema tables
    Down,

    /// Show whether the database is legacy, normalized or inconsistent
    Status,

    /// Print the steps of a migration without touching the database
    Plan {
        /// Which plan to print
        #[arg(short, long, value_enum, default_value_t = DirectionArg::Up)]
        direction: DirectionArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DirectionArg {
    Up,
    Down,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Up => Direction::Up,
            DirectionArg::Down => Direction::Down,
        }
    }
}

#[derive(Serialize)]
struct StatusReport {
    #[serde(flatten)]
    state: MigrationState,
    schema: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_config = LogConfig::from_env();
    let _file_guard = init_tracing(&log_config);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(
                subsystem = "cli",
                component = "teanote_migrate",
                error = %format!("{:#}", e),
                "Command failed"
            );
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let output = match cli.command {
        Commands::Plan { direction } => MigrationPlan::for_direction(direction.into()).render(),
        Commands::Up => {
            let db = connect(cli.database_url).await?;
            let report = db.migrator.up().await.context("forward migration failed")?;
            finish(&db).await;
            serde_json::to_string_pretty(&report)? + "\n"
        }
        Commands::Down => {
            let db = connect(cli.database_url).await?;
            let report = db.migrator.down().await.context("backward migration failed")?;
            finish(&db).await;
            serde_json::to_string_pretty(&report)? + "\n"
        }
        Commands::Status => {
            let (db, config) = connect_with_config(cli.database_url).await?;
            let state = db.migrator.status().await.context("status check failed")?;
            finish(&db).await;
            serde_json::to_string_pretty(&StatusReport {
                state,
                schema: config.schema,
            })? + "\n"
        }
    };
    print!("{}", output);
    Ok(())
}

async fn connect(database_url: Option<String>) -> anyhow::Result<Database> {
    Ok(connect_with_config(database_url).await?.0)
}

async fn connect_with_config(
    database_url: Option<String>,
) -> anyhow::Result<(Database, MigrateConfig)> {
    let config = MigrateConfig::from_env(database_url).context("invalid configuration")?;
    info!(
        subsystem = "cli",
        component = "teanote_migrate",
        database_url = %redact_url(&config.database_url),
        schema = config.schema.as_deref().unwrap_or("(default)"),
        "Connecting to database"
    );
    let db = Database::connect_with_config(&config.database_url, config.pool_config())
        .await
        .context("failed to connect to database")?;
    Ok((db, config))
}

async fn finish(db: &Database) {
    log_pool_metrics(db.pool());
    db.pool().close().await;
}

/// Install the global subscriber. Returns the file writer guard, which must
/// live until exit so buffered lines are flushed.
fn init_tracing(config: &LogConfig) -> Option<WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(env_filter);

    let guard = if let Some(ref path) = config.file {
        let file_dir = path.parent().unwrap_or(Path::new("."));
        let file_name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("teanote-migrate.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        match config.format {
            LogFormat::Json => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init(),
            LogFormat::Text => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(config.ansi.unwrap_or(false)),
                )
                .init(),
        }
        Some(guard)
    } else {
        // stdout carries the report
        match config.format {
            LogFormat::Json => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init(),
            LogFormat::Text => {
                let mut layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
                if let Some(ansi) = config.ansi {
                    layer = layer.with_ansi(ansi);
                }
                registry.with(layer).init();
            }
        }
        None
    };

    info!(
        log_format = ?config.format,
        log_file = config
            .file
            .as_deref()
            .and_then(|p| p.to_str())
            .unwrap_or("(stderr)"),
        "Logging initialized"
    );
    guard
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_plan_direction() {
        let cli = Cli::try_parse_from(["teanote-migrate", "plan", "--direction", "down"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Plan {
                direction: DirectionArg::Down
            }
        ));

        let cli = Cli::try_parse_from(["teanote-migrate", "plan"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Plan {
                direction: DirectionArg::Up
            }
        ));
    }

    #[test]
    fn test_global_database_url_flag() {
        let cli = Cli::try_parse_from([
            "teanote-migrate",
            "up",
            "--database-url",
            "postgres://localhost/tea",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Up));
        assert_eq!(cli.database_url.as_deref(), Some("postgres://localhost/tea"));
    }

    #[test]
    fn test_unknown_command_rejected() {
        assert!(Cli::try_parse_from(["teanote-migrate", "sideways"]).is_err());
    }
}

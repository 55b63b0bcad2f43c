//! Offline administration CLI for a stashQ database.
//!
//! ## Commands
//!
//! - `stashq status` - Queue sizes, pause flag, counters
//! - `stashq list` - Page through a scope
//! - `stashq export` / `stashq import` - Move jobs as JSON
//! - `stashq archive` / `stashq play` - Move jobs in and out of the archive
//! - `stashq delete` / `stashq wipe` / `stashq interrupt` - Remove jobs
//! - `stashq pause` / `stashq resume` / `stashq toggle` - Pause gate
//! - `stashq takeover` - Reassign not-yet-started jobs to a client
//! - `stashq recover` - Requeue jobs left Running by a stopped process
//!
//! The database path comes from `--db` or `STASHQ_DB_PATH`.

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::queue::sqlite::SqliteConfig;
use crate::queue::ControllerConfig;
use crate::telemetry::LogFormat;

/// stashQ - persistent priority job queue administration.
#[derive(Debug, Parser)]
#[command(name = "stashq")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// SQLite database file.
    #[arg(long, env = "STASHQ_DB_PATH", default_value = "stashq.db")]
    pub db: PathBuf,

    /// Output format.
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,

    /// Log format (logs go to stderr).
    #[arg(long, default_value = "pretty")]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Get the effective configuration.
    #[must_use]
    pub fn config(&self) -> Config {
        Config {
            controller: ControllerConfig::from_env()
                .with_sqlite(SqliteConfig::from_env().with_path(&self.db)),
            format: self.format,
        }
    }
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show queue sizes and controller state.
    Status,
    /// Page through queued, archived or completed jobs.
    List(commands::ListArgs),
    /// Write every job in a scope as a JSON array.
    Export(commands::ExportArgs),
    /// Import jobs from a JSON array.
    Import(commands::ImportArgs),
    /// Archive pending jobs.
    Archive(commands::ArchiveArgs),
    /// Move archived (or pending) jobs back into the queue.
    Play(commands::PlayArgs),
    /// Delete jobs by id or by scope.
    Delete(commands::DeleteArgs),
    /// Delete every pending job.
    Wipe,
    /// Delete the running job (or all running jobs).
    Interrupt(commands::InterruptArgs),
    /// Stop dispatch.
    Pause,
    /// Restart dispatch.
    Resume,
    /// Flip the pause gate.
    Toggle,
    /// Reassign ownership of not-yet-started jobs.
    Takeover(commands::TakeoverArgs),
    /// Requeue jobs left Running by a stopped process.
    Recover,
}

impl Commands {
    /// Command name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::List(_) => "list",
            Self::Export(_) => "export",
            Self::Import(_) => "import",
            Self::Archive(_) => "archive",
            Self::Play(_) => "play",
            Self::Delete(_) => "delete",
            Self::Wipe => "wipe",
            Self::Interrupt(_) => "interrupt",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Toggle => "toggle",
            Self::Takeover(_) => "takeover",
            Self::Recover => "recover",
        }
    }
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output.
    Json,
}

/// CLI configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Controller (and database) settings.
    pub controller: ControllerConfig,
    /// Output format.
    pub format: OutputFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_config_from_flags() {
        let cli = Cli::parse_from([
            "stashq",
            "--db",
            "/tmp/queue.db",
            "--format",
            "json",
            "--log-format",
            "json",
            "status",
        ]);

        let config = cli.config();
        assert_eq!(config.controller.sqlite.path, PathBuf::from("/tmp/queue.db"));
        assert_eq!(config.format, OutputFormat::Json);
        assert_eq!(cli.log_format, LogFormat::Json);
        assert_eq!(cli.command.name(), "status");
    }

    #[test]
    fn test_play_args() {
        let cli = Cli::parse_from(["stashq", "play", "--ids", "3,1,2", "--front"]);
        match cli.command {
            Commands::Play(args) => {
                assert_eq!(args.ids, vec![3, 1, 2]);
                assert!(args.front);
                assert!(!args.all);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_delete_args_default_scope() {
        let cli = Cli::parse_from(["stashq", "delete", "--scope", "archive"]);
        match cli.command {
            Commands::Delete(args) => {
                assert!(args.job_ids.is_empty());
                assert_eq!(args.scope.as_deref(), Some("archive"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}

//! Command implementations.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tracing::info;

use super::{Commands, Config, OutputFormat};
use crate::protocol::{JobStatus, PageRequest, QueueEntry, QueueFilter, QueueItem, Scope};
use crate::queue::types::format_ms;
use crate::queue::QueueController;
use crate::telemetry::command_span;

/// Arguments shared by commands that accept a filter.
#[derive(Debug, Args)]
pub struct FilterArgs {
    /// Filter document, e.g. `{"workflow":{"value":"wf-1"}}`.
    #[arg(long)]
    pub filter: Option<String>,

    /// Only jobs of this workflow id (overrides --filter).
    #[arg(long)]
    pub workflow: Option<String>,
}

impl FilterArgs {
    fn to_filter(&self) -> Result<QueueFilter> {
        if let Some(workflow) = &self.workflow {
            return Ok(QueueFilter::workflow(workflow.clone()));
        }
        match &self.filter {
            Some(raw) => Ok(QueueFilter::from_json(raw)?),
            None => Ok(QueueFilter::default()),
        }
    }
}

/// Arguments for the list command.
#[derive(Debug, Args)]
pub struct ListArgs {
    /// Scope: queue, archive or completed.
    #[arg(long, default_value = "queue")]
    pub scope: String,

    /// Zero-based page number (clamped to the last page).
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pub page: i64,

    /// Rows per page (defaults to STASHQ_PAGE_SIZE or 100).
    #[arg(long)]
    pub page_size: Option<u64>,

    #[command(flatten)]
    pub filter: FilterArgs,
}

/// Arguments for the export command.
#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Scope: queue, archive or completed.
    #[arg(long, default_value = "queue")]
    pub scope: String,

    /// Output file (stdout when omitted).
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub filter: FilterArgs,
}

/// Arguments for the import command.
#[derive(Debug, Args)]
pub struct ImportArgs {
    /// JSON file holding an array of jobs.
    pub file: PathBuf,

    /// Import straight into the archive.
    #[arg(long)]
    pub archive: bool,

    /// Owning client id written into every job.
    #[arg(long)]
    pub client_id: Option<String>,
}

/// Arguments for the archive command.
#[derive(Debug, Args)]
pub struct ArchiveArgs {
    /// Row ids to archive (pending or running). Without ids, archives by filter.
    #[arg(long, value_delimiter = ',')]
    pub ids: Vec<i64>,

    #[command(flatten)]
    pub filter: FilterArgs,
}

/// Arguments for the play command.
#[derive(Debug, Args)]
pub struct PlayArgs {
    /// Row ids to play, in the order they should run.
    #[arg(long, value_delimiter = ',')]
    pub ids: Vec<i64>,

    /// Play the whole archive (optionally filtered) in creation order.
    #[arg(long, conflicts_with = "ids")]
    pub all: bool,

    /// Run the played jobs before everything already queued.
    #[arg(long)]
    pub front: bool,

    /// Owning client id written into every played job.
    #[arg(long)]
    pub client_id: Option<String>,

    #[command(flatten)]
    pub filter: FilterArgs,
}

/// Arguments for the delete command.
#[derive(Debug, Args)]
pub struct DeleteArgs {
    /// Job ids to delete, whatever their status.
    #[arg(long = "job-id", value_delimiter = ',')]
    pub job_ids: Vec<String>,

    /// Delete a whole scope instead: queue, archive or completed.
    #[arg(long, conflicts_with = "job_ids")]
    pub scope: Option<String>,

    #[command(flatten)]
    pub filter: FilterArgs,
}

/// Arguments for the interrupt command.
#[derive(Debug, Args)]
pub struct InterruptArgs {
    /// Running job to delete; all running jobs when omitted.
    pub job_id: Option<String>,
}

/// Arguments for the takeover command.
#[derive(Debug, Args)]
pub struct TakeoverArgs {
    /// New owning client id (32 lowercase hex characters).
    pub client_id: String,
}

/// Execute a command against the configured database.
///
/// # Errors
///
/// Returns an error if the database cannot be opened, the arguments are
/// invalid, or the queue operation fails.
pub fn execute(command: Commands, config: &Config) -> Result<()> {
    let db = config.controller.sqlite.path.display().to_string();
    let span = command_span(command.name(), &db);
    let _guard = span.enter();

    let queue = QueueController::open(config.controller.clone())
        .with_context(|| format!("Failed to open queue database {db}"))?;

    match command {
        Commands::Status => status(&queue, config),
        Commands::List(args) => list(&queue, &args, config),
        Commands::Export(args) => export(&queue, &args),
        Commands::Import(args) => import(&queue, args, config),
        Commands::Archive(args) => {
            let total = if args.ids.is_empty() {
                queue.archive(&args.filter.to_filter()?)?
            } else {
                queue.archive_by_ids(&args.ids)?
            };
            report(config, "archived", total)
        }
        Commands::Play(args) => {
            let client_id = args.client_id.as_deref();
            let total = if args.all {
                queue.play_archive(client_id, &args.filter.to_filter()?)?
            } else if args.ids.is_empty() {
                anyhow::bail!("Either provide --ids or use --all to play the archive")
            } else {
                queue.play_items(&args.ids, args.front, client_id)?
            };
            report(config, "played", total)
        }
        Commands::Delete(args) => {
            let deleted = match &args.scope {
                Some(scope) => {
                    let scope: Scope = scope.parse()?;
                    queue.delete_scope(scope, &args.filter.to_filter()?)?
                }
                None if args.job_ids.is_empty() => {
                    anyhow::bail!("Either provide --job-id or --scope")
                }
                None => queue.delete_items(&args.job_ids)?,
            };
            report(config, "deleted", deleted)
        }
        Commands::Wipe => report(config, "deleted", queue.wipe_pending()?),
        Commands::Interrupt(args) => {
            report(config, "deleted", queue.delete_running(args.job_id.as_deref())?)
        }
        Commands::Pause => {
            queue.pause()?;
            paused(&queue, config)
        }
        Commands::Resume => {
            queue.resume()?;
            paused(&queue, config)
        }
        Commands::Toggle => {
            queue.toggle()?;
            paused(&queue, config)
        }
        Commands::Takeover(args) => {
            let takeover = queue.takeover(&args.client_id)?;
            match config.format {
                OutputFormat::Json => print_json(&takeover),
                OutputFormat::Text => {
                    println!(
                        "Client {} takes over jobs queued before {}",
                        takeover.client_id,
                        format_ms(takeover.timestamp)
                    );
                    Ok(())
                }
            }
        }
        // Opening the store normally recovers already; report that run
        Commands::Recover => match queue.recover()?.or_else(|| queue.recovery_report()) {
            Some(report) => match config.format {
                OutputFormat::Json => print_json(&report),
                OutputFormat::Text => {
                    println!(
                        "Requeued {} job(s); priority counter at {}",
                        report.requeued, report.priority_counter
                    );
                    Ok(())
                }
            },
            None => {
                println!("Recovery already ran");
                Ok(())
            }
        },
    }
}

fn status(queue: &QueueController, config: &Config) -> Result<()> {
    let status = queue.status()?;

    match config.format {
        OutputFormat::Json => print_json(&status),
        OutputFormat::Text => {
            println!("Paused:    {}", status.paused);
            println!("Pending:   {}", status.pending);
            println!("Remaining: {}", status.remaining);
            println!("Archived:  {}", status.archived);
            println!("Completed: {}", status.completed);
            println!("Counter:   {}", status.priority_counter);
            if let Some(takeover) = &status.takeover {
                println!(
                    "Takeover:  {} since {}",
                    takeover.client_id,
                    format_ms(takeover.timestamp)
                );
            }
            Ok(())
        }
    }
}

fn list(queue: &QueueController, args: &ListArgs, config: &Config) -> Result<()> {
    let scope: Scope = args.scope.parse()?;
    let page_size = args
        .page_size
        .unwrap_or(config.controller.default_page_size);
    let request =
        PageRequest::new(scope, args.page, page_size).with_filter(args.filter.to_filter()?);
    let page = queue.page(&request)?;

    match config.format {
        OutputFormat::Json => print_json(&page),
        OutputFormat::Text => {
            println!(
                "Page {}/{} ({} total)",
                page.info.page, page.info.last_page, page.info.total
            );
            if page.pending.is_empty() {
                println!("No jobs found");
            }
            for entry in &page.pending {
                print_entry(entry);
            }
            Ok(())
        }
    }
}

fn export(queue: &QueueController, args: &ExportArgs) -> Result<()> {
    let scope: Scope = args.scope.parse()?;
    let mut entries = queue.full_listing(scope, &args.filter.to_filter()?)?;
    // Listing is newest first; export oldest first so import keeps the order
    entries.reverse();
    let items: Vec<QueueItem> = entries.into_iter().map(|entry| entry.item).collect();

    let json = serde_json::to_string_pretty(&items)?;
    match &args.output {
        Some(path) => {
            fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(count = items.len(), path = %path.display(), "Exported jobs");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{json}")?;
        }
    }
    Ok(())
}

fn import(queue: &Arc<QueueController>, args: ImportArgs, config: &Config) -> Result<()> {
    let raw = fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let items: Vec<QueueItem> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of jobs", args.file.display()))?;

    let target = if args.archive {
        JobStatus::Archived
    } else {
        JobStatus::Pending
    };
    let outcome = queue.import_batch(items, args.client_id.as_deref(), target)?;

    match config.format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "inserted": outcome.inserted,
            "submitted": outcome.submitted,
            "skipped": outcome.skipped(),
        })),
        OutputFormat::Text => {
            println!(
                "Imported {} of {} job(s), {} skipped",
                outcome.inserted,
                outcome.submitted,
                outcome.skipped()
            );
            Ok(())
        }
    }
}

fn paused(queue: &QueueController, config: &Config) -> Result<()> {
    let paused = queue.is_paused();
    match config.format {
        OutputFormat::Json => print_json(&serde_json::json!({ "paused": paused })),
        OutputFormat::Text => {
            println!("{}", if paused { "Paused" } else { "Running" });
            Ok(())
        }
    }
}

fn report(config: &Config, action: &str, count: usize) -> Result<()> {
    match config.format {
        OutputFormat::Json => print_json(&serde_json::json!({ action: count })),
        OutputFormat::Text => {
            println!("{} {count} job(s)", capitalize(action));
            Ok(())
        }
    }
}

fn print_entry(entry: &QueueEntry) {
    println!(
        "  #{:<6} {:<36} p={:<8} {:<9} {} {}",
        entry.id,
        entry.job_id,
        entry.priority,
        entry.status.as_str(),
        format_ms(entry.created_at),
        entry.name.as_deref().unwrap_or("-"),
    );
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

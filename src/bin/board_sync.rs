//! Board Sync CLI
//!
//! Terminal client for the project board. Reads go through the cache, writes
//! through the same optimistic coordinator the UI uses.
//!
//! Usage:
//!   cargo run --features cli --bin board_sync -- projects --owner u-123
//!   cargo run --features cli --bin board_sync -- create-project --name "Launch" \
//!     --start 2025-01-01 --end 2025-02-01 --member ana@example.com
//!   cargo run --features cli --bin board_sync -- tasks --project 4 --project 7
//!   cargo run --features cli --bin board_sync -- calendar --year 2025 --month 3
//!
//! Connection settings come from `--config <file.yaml>` or `BOARD_*`
//! environment variables (a `.env` file is honoured).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;

use board_client::{BoardGateway, HttpTableStore, StaticCredentials};
use board_sync::notify::{Notification, RecordingNotifier, Severity};
use board_sync::telemetry::init_tracing;
use board_sync::views::{CalendarView, ProjectsView, TasksView, ViewContext};
use board_sync::{Caches, QueryKey, SyncConfig};
use board_types::{EntityId, Priority, ProjectStatus};

#[derive(Parser, Debug)]
#[command(name = "board_sync")]
#[command(about = "Project board terminal client")]
struct Args {
    /// YAML config file (defaults to BOARD_* environment variables)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Bearer credential issued by the identity provider
    #[arg(long, env = "BOARD_TOKEN")]
    token: Option<String>,

    /// Output rows as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List projects
    Projects {
        /// Only projects owned by this user
        #[arg(long)]
        owner: Option<String>,
    },
    /// Create a project
    CreateProject {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        /// "On track", "At risk", "Off track" or "Completed"
        #[arg(long, default_value = "On track")]
        status: ProjectStatus,
        /// "Low", "Medium", "High" or "Urgent"
        #[arg(long, default_value = "Medium")]
        priority: Priority,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Email to invite (repeatable)
        #[arg(long = "member")]
        members: Vec<String>,
        #[arg(long)]
        owner: Option<String>,
    },
    /// List tasks of one or more projects
    Tasks {
        #[arg(long = "project", required = true)]
        projects: Vec<i64>,
    },
    /// Show a month of due dates and deadlines
    Calendar {
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        month: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("board_sync=warn,board_client=warn");

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => SyncConfig::from_file(path)?,
        None => SyncConfig::from_env()?,
    };

    let store = Arc::new(
        HttpTableStore::new(config.to_store_config()).context("configuring table store")?,
    );
    let credentials = Arc::new(match &args.token {
        Some(token) => StaticCredentials::new(token.clone()),
        None => StaticCredentials::anonymous(),
    });
    let gateway = BoardGateway::new(store, credentials);
    let notifier = Arc::new(RecordingNotifier::new());
    let ctx = ViewContext::new(gateway, Caches::new(), notifier.clone(), config.display);
    let refetchers = if config.cache.background_refetch {
        ctx.spawn_refetchers()
    } else {
        Vec::new()
    };

    let outcome = run(&args, ctx).await;
    for handle in refetchers {
        handle.abort();
    }
    print_notifications(&notifier.drain());
    outcome
}

async fn run(args: &Args, ctx: ViewContext) -> Result<()> {
    match &args.command {
        Command::Projects { owner } => {
            let view = ProjectsView::new(ctx, owner.clone());
            view.mount().await?;
            let key = match owner {
                Some(owner) => QueryKey::ProjectsByOwner(owner.clone()),
                None => QueryKey::Projects,
            };
            let rows = view.rows_in(&key, Utc::now());

            if args.json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
                return Ok(());
            }
            println!("{}", format!("{} projects", rows.len()).bold());
            for row in rows {
                println!(
                    "  {:>5}  {:<30} {:<10} {:<8} {:>3}%  due {}",
                    row.id.to_string().dimmed(),
                    row.name,
                    status_colour(row.status),
                    row.priority,
                    row.progress,
                    row.due
                );
            }
        }

        Command::CreateProject {
            name,
            description,
            status,
            priority,
            start,
            end,
            members,
            owner,
        } => {
            let view = ProjectsView::new(ctx, owner.clone());
            view.open_create();
            view.edit_form(|form| {
                form.name = name.clone();
                form.description = description.clone().unwrap_or_default();
                form.status = *status;
                form.priority = *priority;
                form.start_date = *start;
                form.end_date = *end;
                form.member_emails = members.clone();
            });

            let project = view.submit_create().await?;
            println!("{} {} (#{})", "Created".green().bold(), project.name, project.id);
            view.settle_follow_ups().await;
        }

        Command::Tasks { projects } => {
            let views: Vec<TasksView> = projects
                .iter()
                .map(|id| TasksView::new(ctx.clone(), EntityId::Server(*id)))
                .collect();
            let loaded = futures::future::join_all(views.iter().map(|v| v.mount())).await;

            let today = Utc::now().date_naive();
            for (view, result) in views.iter().zip(loaded) {
                let key = view.key();
                if let Err(err) = result {
                    println!("{} {}: {}", "✗".red(), key, err.message);
                    continue;
                }
                let rows = view.rows(today);
                if args.json {
                    println!("{}", serde_json::to_string_pretty(&rows)?);
                    continue;
                }
                println!("{}", key.to_string().bold());
                for row in rows {
                    let due = if row.overdue {
                        row.due.red().to_string()
                    } else {
                        row.due.normal().to_string()
                    };
                    println!(
                        "  {:>5}  {:<30} {:<12} {:<8} {}",
                        row.id.to_string().dimmed(),
                        row.title,
                        row.status,
                        row.priority,
                        due
                    );
                }
            }
        }

        Command::Calendar { year, month } => {
            let today = Utc::now().date_naive();
            let view = CalendarView::new(
                ctx,
                year.unwrap_or(today.year()),
                month.unwrap_or(today.month()),
            );
            view.mount().await?;

            let (year, month) = view.month();
            if args.json {
                println!("{}", serde_json::to_string_pretty(&view.items())?);
                return Ok(());
            }
            println!("{}", format!("{year}-{month:02}").bold());
            for (day, items) in view.days() {
                for item in items {
                    println!("  {day:>2}  {:?}  {}", item.kind, item.title);
                }
            }
        }
    }
    Ok(())
}

fn status_colour(status: &str) -> colored::ColoredString {
    match status {
        "On track" => status.green(),
        "At risk" => status.yellow(),
        "Off track" => status.red(),
        _ => status.normal(),
    }
}

fn print_notifications(notes: &[Notification]) {
    for note in notes {
        let title = match note.severity {
            Severity::Success => note.title.green(),
            Severity::Info => note.title.normal(),
            Severity::Warning => note.title.yellow(),
            Severity::Error => note.title.red(),
        };
        match &note.detail {
            Some(detail) => eprintln!("{title}: {detail}"),
            None => eprintln!("{title}"),
        }
    }
}

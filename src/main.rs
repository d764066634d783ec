//! Command-line front end for the daily planning engine.

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use dayplan::config::Config;
use dayplan::db::{today_utc, Database};
use dayplan::error::ApiError;
use dayplan::oracle::{IntelligenceService, Oracle, OracleError};
use dayplan::types::{NewTask, TaskFilters, TaskStatus};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dayplan", version, about = "Daily planning and completion engine")]
struct Cli {
    /// Owner ID operations are scoped to.
    #[arg(long, global = true, default_value = "local")]
    user: String,

    /// Database path (overrides config).
    #[arg(long, global = true)]
    db: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a task.
    Add {
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// Due date (YYYY-MM-DD).
        #[arg(long, value_parser = dayplan::validate::parse_plan_date)]
        due: Option<NaiveDate>,
        /// Priority 1 (low) through 4 (urgent); defaults to 2.
        #[arg(long)]
        priority: Option<i32>,
        #[arg(long)]
        minutes: Option<i32>,
        #[arg(long)]
        energy: Option<i32>,
        #[arg(long)]
        category: Option<String>,
    },
    /// List tasks, newest first.
    List {
        #[arg(long)]
        priority: Option<i32>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        include_cancelled: bool,
        #[arg(long)]
        cursor: Option<String>,
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Show one task.
    Show { task_id: String },
    /// Mark a task completed.
    Done { task_id: String },
    /// Cancel a task (soft delete).
    Cancel { task_id: String },
    /// Daily plan operations.
    Plan {
        #[command(subcommand)]
        command: PlanCommand,
    },
    /// Suggest an ordering for pending tasks.
    Suggest,
    /// Parse natural-language input into task fields.
    Parse { text: String },
    /// Aggregate completion insights.
    Insights {
        #[arg(long, default_value_t = 30)]
        days: i64,
    },
}

#[derive(Subcommand)]
enum PlanCommand {
    /// Create or update the plan for a date.
    Set {
        #[arg(value_parser = dayplan::validate::parse_plan_date)]
        date: NaiveDate,
        /// Task IDs in planned order; replaces the existing order wholesale.
        #[arg(long, num_args = 1..)]
        order: Option<Vec<String>>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        mood: Option<i32>,
    },
    /// Show the plan for a date.
    Show {
        #[arg(value_parser = dayplan::validate::parse_plan_date)]
        date: NaiveDate,
    },
    /// List recent plans.
    List {
        #[arg(long, default_value_t = 7)]
        days: i64,
    },
    /// Replace the task order of an existing plan.
    Reorder {
        #[arg(value_parser = dayplan::validate::parse_plan_date)]
        date: NaiveDate,
        #[arg(required = true)]
        order: Vec<String>,
    },
    /// Record end-of-day outcomes and reconcile task state.
    Complete {
        #[arg(value_parser = dayplan::validate::parse_plan_date)]
        date: NaiveDate,
        /// Task IDs that were completed.
        #[arg(long, num_args = 0..)]
        done: Vec<String>,
        /// Task IDs that were skipped.
        #[arg(long, num_args = 0..)]
        skipped: Vec<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        mood: Option<i32>,
    },
    /// Completion statistics for a date.
    Reflect {
        #[arg(value_parser = dayplan::validate::parse_plan_date)]
        date: NaiveDate,
    },
}

/// Placeholder oracle for a CLI with no backend configured; every call
/// reports unavailable, so suggestions come from the deterministic ranker.
struct UnconfiguredOracle;

#[async_trait::async_trait]
impl Oracle for UnconfiguredOracle {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, OracleError> {
        Err(OracleError::Unavailable("no oracle configured".to_string()))
    }
}

fn date_to_ms(date: NaiveDate) -> i64 {
    date.and_time(chrono::NaiveTime::MIN).and_utc().timestamp_millis()
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load_or_default();

    if let Err(err) = run(cli, config).await {
        // Surface the structured {code, message, field} shape on stderr.
        let api_err = ApiError::from(err);
        match serde_json::to_string_pretty(&api_err) {
            Ok(json) => eprintln!("{json}"),
            Err(_) => eprintln!("{api_err}"),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    let db_path = cli.db.unwrap_or(config.storage.db_path.clone());
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let db = Database::open(&db_path)?;
    let user = cli.user;

    match cli.command {
        Command::Add {
            title,
            description,
            due,
            priority,
            minutes,
            energy,
            category,
        } => {
            let task = db.create_task(
                &user,
                NewTask {
                    title,
                    description,
                    due_date: due.map(date_to_ms),
                    priority,
                    estimated_minutes: minutes,
                    energy_level: energy,
                    category,
                },
            )?;
            print_json(&task)?;
        }
        Command::List {
            priority,
            status,
            category,
            search,
            include_cancelled,
            cursor,
            limit,
        } => {
            let status = match status.as_deref() {
                Some(s) => Some(
                    TaskStatus::from_str(s)
                        .ok_or_else(|| anyhow::anyhow!("unknown status: {s}"))?,
                ),
                None => None,
            };
            let filters = TaskFilters {
                priority,
                status,
                category,
                search,
                due_after: None,
                due_before: None,
                include_cancelled,
            };
            let page = db.list_tasks(
                &user,
                &filters,
                cursor.as_deref(),
                limit.unwrap_or(config.paging.default_page_size),
            )?;
            print_json(&page)?;
        }
        Command::Show { task_id } => {
            let task = db.get_task(&user, &task_id)?;
            print_json(&task)?;
        }
        Command::Done { task_id } => {
            let task = db.complete_task(&user, &task_id, None)?;
            print_json(&task)?;
        }
        Command::Cancel { task_id } => {
            let task = db.cancel_task(&user, &task_id)?;
            print_json(&task)?;
        }
        Command::Plan { command } => run_plan(&db, &user, command)?,
        Command::Suggest => {
            let filters = TaskFilters {
                status: Some(TaskStatus::Pending),
                ..Default::default()
            };
            let page = db.list_tasks(&user, &filters, None, 100)?;
            let service = IntelligenceService::new(Arc::new(UnconfiguredOracle))
                .with_timeout(Duration::from_secs(config.oracle.timeout_seconds));
            let suggestion = service
                .suggest_order(&page.tasks, &serde_json::Value::Null)
                .await;
            print_json(&suggestion)?;
        }
        Command::Parse { text } => {
            let service = IntelligenceService::new(Arc::new(UnconfiguredOracle))
                .with_timeout(Duration::from_secs(config.oracle.timeout_seconds));
            let parsed = service
                .parse_task(&text, &config.oracle.timezone, today_utc())
                .await;
            print_json(&parsed)?;
        }
        Command::Insights { days } => {
            let insights = db.get_insights(&user, days)?;
            print_json(&insights)?;
        }
    }

    Ok(())
}

fn run_plan(db: &Database, user: &str, command: PlanCommand) -> Result<()> {
    match command {
        PlanCommand::Set {
            date,
            order,
            notes,
            mood,
        } => {
            let plan = db.upsert_plan(user, date, order, notes, mood)?;
            print_json(&plan)?;
        }
        PlanCommand::Show { date } => {
            let plan = db.get_plan(user, date)?;
            print_json(&plan)?;
        }
        PlanCommand::List { days } => {
            let plans = db.list_plans(user, days)?;
            print_json(&plans)?;
        }
        PlanCommand::Reorder { date, order } => {
            let plan = db.reorder_plan(user, date, order)?;
            print_json(&plan)?;
        }
        PlanCommand::Complete {
            date,
            done,
            skipped,
            notes,
            mood,
        } => {
            let mut outcomes: HashMap<String, bool> = HashMap::new();
            for id in done {
                outcomes.insert(id, true);
            }
            for id in skipped {
                outcomes.insert(id, false);
            }
            let stats = db.complete_plan(user, date, &outcomes, notes, mood)?;
            print_json(&stats)?;
        }
        PlanCommand::Reflect { date } => {
            let stats = db.get_reflection(user, date)?;
            print_json(&stats)?;
        }
    }

    Ok(())
}

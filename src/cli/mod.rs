//! CLI module for Switchyard
//!
//! Provides commands:
//! - `route`: Route one or more tasks and print the answers
//! - `classify`: Show the category and rule for a task
//! - `plan`: Show the candidate chain a task would walk
//! - `status`: Per-provider status and today's ledger

use crate::app::AppConfig;
use clap::{Parser, Subcommand};
use switchyard_llm::Category;

pub mod classify;
pub mod plan;
pub mod route;
pub mod status;

/// Switchyard CLI
#[derive(Parser, Debug)]
#[command(name = "switchyard")]
#[command(about = "Route tasks across rate-limited, budget-metered and local inference providers")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Route tasks (concurrently) and print the answers
    Route {
        /// Task descriptions, one per argument
        #[arg(required = true, value_name = "TASK")]
        tasks: Vec<String>,
        /// Skip classification and use this category
        #[arg(long)]
        category: Option<Category>,
        /// Give up on each task after this many seconds
        #[arg(long)]
        deadline_secs: Option<u64>,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
        /// Print route statistics afterwards
        #[arg(long)]
        stats: bool,
        /// Echo prompts instead of calling real backends
        #[arg(long)]
        dry_run: bool,
    },
    /// Show the category and routing rule for a task
    Classify {
        /// Task description
        task: String,
    },
    /// Show the estimate and candidate chain for a task
    Plan {
        /// Task description
        task: String,
        /// Skip classification and use this category
        #[arg(long)]
        category: Option<Category>,
    },
    /// Show provider status and today's usage
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Run the CLI command
pub async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Route {
            tasks,
            category,
            deadline_secs,
            json,
            stats,
            dry_run,
        }) => {
            let options = route::RouteOptions {
                category,
                deadline: deadline_secs.map(std::time::Duration::from_secs),
                json,
                stats,
                dry_run,
            };
            route::run(config, tasks, options).await
        }
        Some(Commands::Classify { task }) => classify::run(&config, &task),
        Some(Commands::Plan { task, category }) => plan::run(config, &task, category).await,
        Some(Commands::Status { json }) => status::run(config, json).await,
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}

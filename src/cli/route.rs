//! CLI command: `switchyard route`
//!
//! Routes every task concurrently through one router and prints each
//! answer (or the failure with its candidate trail).

use crate::app::{App, AppConfig};
use futures::future::join_all;
use std::time::Duration;
use switchyard_llm::{Category, QueryResult, RouterError};

/// Flags for the route subcommand.
#[derive(Debug, Clone, Default)]
pub struct RouteOptions {
    pub category: Option<Category>,
    pub deadline: Option<Duration>,
    pub json: bool,
    pub stats: bool,
    pub dry_run: bool,
}

/// Run the route subcommand.
pub async fn run(config: AppConfig, tasks: Vec<String>, options: RouteOptions) -> anyhow::Result<()> {
    let app = App::build(config, options.dry_run).await?;
    let router = &app.router;

    let results = join_all(
        tasks
            .iter()
            .map(|task| router.route(task, options.category, options.deadline)),
    )
    .await;

    let failures = results.iter().filter(|r| r.is_err()).count();

    if options.json {
        let items: Vec<_> = tasks
            .iter()
            .zip(&results)
            .map(|(task, result)| json_result(task, result))
            .collect();
        let mut output = serde_json::json!({ "results": items });
        if options.stats {
            output["stats"] = serde_json::to_value(router.stats().await)?;
        }
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for (task, result) in tasks.iter().zip(&results) {
            print_result(task, result);
        }
        if options.stats {
            print_stats(&app).await;
        }
    }

    app.close().await;

    if failures > 0 {
        anyhow::bail!("{} of {} task(s) failed", failures, tasks.len());
    }
    Ok(())
}

fn json_result(task: &str, result: &Result<QueryResult, RouterError>) -> serde_json::Value {
    match result {
        Ok(answer) => serde_json::json!({
            "task": task,
            "ok": true,
            "result": answer,
        }),
        Err(e) => serde_json::json!({
            "task": task,
            "ok": false,
            "error": {
                "code": e.code(),
                "message": e.to_string(),
                "attempts": e.attempts(),
            },
        }),
    }
}

fn print_result(task: &str, result: &Result<QueryResult, RouterError>) {
    println!();
    println!("  Task: {}", task);
    match result {
        Ok(answer) => {
            println!(
                "  Provider: {} ({})  |  Tokens: {} in / {} out  |  Cost: ${:.6}",
                answer.provider, answer.model, answer.input_tokens, answer.output_tokens, answer.cost
            );
            println!("  {}", "-".repeat(72));
            for line in answer.text.lines() {
                println!("  {}", line);
            }
        }
        Err(e) => {
            println!("  Failed [{}]", e.code());
            for attempt in e.attempts() {
                println!("    - {}", attempt);
            }
            if e.attempts().is_empty() {
                println!("    {}", e);
            }
        }
    }
}

async fn print_stats(app: &App) {
    let stats = app.router.stats().await;

    println!();
    println!("  Route Statistics");
    println!("  {}", "-".repeat(72));
    println!(
        "  Requests: {}  |  Success: {:.1}%  |  Degraded: {}  |  Cost: ${:.6}",
        stats.total_requests, stats.success_rate, stats.degraded_requests, stats.total_cost
    );
    for (provider, p) in &stats.by_provider {
        println!(
            "  {:<16} served {:<4} failed {:<4} tokens {:<8}",
            provider, p.served, p.failed_attempts, p.total_tokens
        );
    }
    for (provider, count) in &stats.fallback_counts {
        println!("  fallback from {}: {}", provider, count);
    }
    for (code, count) in &stats.error_counts {
        println!("  error {}: {}", code, count);
    }
    println!();
}

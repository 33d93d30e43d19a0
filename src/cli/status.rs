//! CLI command: `switchyard status`
//!
//! Displays per-provider status (window usage, capacity, provider details)
//! and today's rows from the usage ledger.

use crate::app::{App, AppConfig};
use switchyard_core::ledger::today;

/// Run the status subcommand.
pub async fn run(config: AppConfig, json: bool) -> anyhow::Result<()> {
    let app = App::build(config, false).await?;
    let statuses = app.router.provider_status().await;
    let usage = app.ledger.entries_for(today()).await?;

    if json {
        let output = serde_json::json!({
            "providers": statuses,
            "today": usage,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        app.close().await;
        return Ok(());
    }

    println!();
    println!("  Provider Status");
    println!("  {}", "-".repeat(72));
    println!(
        "  {:<12} {:<16} {:>10} {:>8} {:>10} {:>12}",
        "Provider", "Kind", "Context", "Req/min", "Tok/min", "Capacity"
    );
    println!("  {}", "-".repeat(72));

    if statuses.is_empty() {
        println!("  (no providers registered)");
    }
    for status in &statuses {
        println!(
            "  {:<12} {:<16} {:>10} {:>8} {:>10} {:>12}",
            status.id,
            status.kind.as_str(),
            status.context_window,
            status.window.requests,
            status.window.tokens,
            status.available_capacity
        );
    }

    println!("  {}", "-".repeat(72));
    println!("  Today ({})", today());
    if usage.is_empty() {
        println!("  (no requests recorded yet)");
    }
    for row in &usage {
        println!(
            "  {:<12} requests {:<6} tokens {:<10} cost ${:.6}",
            row.provider, row.request_count, row.token_count, row.cost
        );
    }
    println!();

    app.close().await;
    Ok(())
}

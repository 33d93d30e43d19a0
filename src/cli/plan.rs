//! CLI command: `switchyard plan`
//!
//! Shows the candidate chain a task would walk without sending anything.

use crate::app::{App, AppConfig};
use switchyard_llm::Category;

/// Run the plan subcommand.
pub async fn run(config: AppConfig, task: &str, category: Option<Category>) -> anyhow::Result<()> {
    let app = App::build(config, false).await?;
    let router = &app.router;

    let category = category.unwrap_or_else(|| router.classify(task));
    let estimate = router.estimate(task, None);
    let chain = router.candidate_chain(category, estimate);

    println!();
    println!("  Category: {}", category);
    println!(
        "  Estimate: {} tokens (large-prompt threshold {})",
        estimate,
        router.config().large_prompt_threshold
    );
    println!("  {}", "-".repeat(72));
    println!("  {:<4} {:<16} {:<16} {:>10} Context", "#", "Provider", "Kind", "Tokens");

    if chain.is_empty() {
        println!("  (no providers registered)");
    }
    for (position, id) in chain.iter().enumerate() {
        if let Some(provider) = router.provider(id) {
            println!(
                "  {:<4} {:<16} {:<16} {:>10} {}",
                position + 1,
                id,
                provider.kind().as_str(),
                router.estimate(task, Some(id)),
                provider.context_window()
            );
        }
    }
    println!();

    app.close().await;
    Ok(())
}

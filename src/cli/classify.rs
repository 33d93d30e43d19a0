//! CLI command: `switchyard classify`

use crate::app::AppConfig;
use switchyard_llm::{estimate_heuristic, RoutingTable, TaskClassifier};

/// Run the classify subcommand.
pub fn run(config: &AppConfig, task: &str) -> anyhow::Result<()> {
    let classifier = TaskClassifier::default();
    let category = classifier.classify(task);
    let table = RoutingTable::from_rules(config.routing.rules.clone());
    let rule = table.rule(category);

    println!();
    match classifier.matched_phrase(task) {
        Some((_, phrase)) => println!("  Category: {} (matched \"{}\")", category, phrase),
        None => println!("  Category: {} (default)", category),
    }
    println!("  Estimate: {} tokens", estimate_heuristic(task));
    println!("  {}", "-".repeat(72));
    println!("  Preferred:   {}", rule.preferred_provider);
    println!(
        "  Fallbacks:   {}",
        if rule.fallback_providers.is_empty() {
            "(none)".to_string()
        } else {
            rule.fallback_providers.join(", ")
        }
    );
    println!(
        "  Variant:     {}",
        rule.model_variant.as_deref().unwrap_or("(default)")
    );
    println!("  Max tokens:  {}", rule.max_tokens);
    println!("  Temperature: {}", rule.temperature);
    println!("  Priority:    {:?}", rule.priority);
    println!();

    Ok(())
}

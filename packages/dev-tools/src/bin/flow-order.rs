//! Task Order Inspector
//!
//! Reads a local cache record (`{nodes, edges, tag, savedAt}`) and prints
//! the task list the editor would show for it: the ordered partition with
//! step numbers, then the unordered nodes.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin flow-order -- ~/.cache/flowlist/flowlist%3Aabc.json
//!
//! # Verbose reconciliation logs
//! RUST_LOG=debug cargo run --bin flow-order -- record.json
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Logging level (e.g., "info", "debug", "trace")

use anyhow::Context;
use chrono::Utc;
use flowlist_core::{CacheRecord, CompletionState, TaskOrderController};
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let path = env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("usage: flow-order <cache-record.json>"))?;

    let raw = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read {}", path))?;
    let record = CacheRecord::parse(&raw).with_context(|| format!("Invalid record in {}", path))?;

    tracing::info!(
        "Loaded {} node(s) and {} edge(s) from {}",
        record.nodes.len(),
        record.edges.len(),
        path
    );

    let order = TaskOrderController::new().reconcile(&record.nodes, &record.edges);
    let completion = CompletionState::from_ids(record.completed.clone());
    let graph = record.graph();

    let tag = if record.tag.is_empty() {
        "(untagged)"
    } else {
        record.tag.as_str()
    };
    println!("{}", tag);
    if let Some(saved) = record.saved_time() {
        let age = Utc::now().signed_duration_since(saved);
        println!("saved {} ({}h ago)", saved.to_rfc3339(), age.num_hours());
    }

    let label = |id: &str| {
        graph
            .node(id)
            .map(|n| n.label().to_string())
            .unwrap_or_default()
    };
    let mark = |id: &str| if completion.is_complete(id) { "x" } else { " " };

    println!();
    println!("Ordered ({})", order.ordered.len());
    for (step, id) in order.ordered.iter().enumerate() {
        println!("  {:>3}. [{}] {} (#{})", step + 1, mark(id), label(id), id);
    }

    println!();
    println!("Unordered ({})", order.unordered.len());
    for id in &order.unordered {
        println!("       [{}] {} (#{})", mark(id), label(id), id);
    }

    Ok(())
}

//! Backends command implementation.

use anyhow::Result;
use console::style;

use qdispatch_hal::BackendRecord;

use super::common::{Context, create_dispatcher};

/// Execute the backends command.
pub async fn execute(
    ctx: &Context,
    owner: &str,
    provider: &str,
    routing_group: Option<&str>,
    json: bool,
) -> Result<()> {
    let dispatcher = create_dispatcher(ctx).await?;
    let catalog = dispatcher.catalog();

    let records = match routing_group {
        Some(group) => catalog.list(owner, provider, group).await?,
        None => catalog.list_all(owner, provider).await?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    println!(
        "{} {} backends cataloged for {}:\n",
        style("qdispatch").cyan().bold(),
        provider,
        style(owner).bold()
    );
    if records.is_empty() {
        println!("  (none)");
    }
    for record in &records {
        print_record(record);
    }
    Ok(())
}

fn print_record(record: &BackendRecord) {
    println!(
        "  {} {} ({})",
        if record.active {
            style("●").green()
        } else {
            style("○").red()
        },
        style(&record.name).bold(),
        record.kind
    );
    println!("    Qubits: {}", record.qubit_count);
    println!("    Routing group: {}", record.routing_group);
    if let Some(updated) = record.metadata.get("last_updated").and_then(|v| v.as_str()) {
        println!("    Last updated: {}", style(updated).dim());
    }
    println!();
}

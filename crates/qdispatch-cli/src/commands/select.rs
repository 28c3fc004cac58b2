//! Select command implementation.

use anyhow::Result;
use console::style;

use qdispatch_sched::ResourceRequest;

use super::common::{Context, create_dispatcher, parse_kind};

/// Execute the select command.
pub async fn execute(
    ctx: &Context,
    owner: &str,
    provider: &str,
    min_qubits: u32,
    kind: Option<&str>,
    routing_group: Option<&str>,
    json: bool,
) -> Result<()> {
    let kind = parse_kind(kind)?;
    let dispatcher = create_dispatcher(ctx).await?;

    let credential = dispatcher.credential(owner, provider).await?;
    let group = dispatcher.resolve_routing_group(&credential, routing_group);

    let mut request = ResourceRequest::new(min_qubits, &group);
    if let Some(kind) = kind {
        request = request.with_kind(kind);
    }

    let chosen = dispatcher.select_backend(owner, provider, &request).await?;

    if json {
        let output = serde_json::json!({
            "backend": chosen,
            "routingGroup": group,
            "request": request,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    match chosen {
        Some(name) => println!(
            "{} Selected {} in {}",
            style("✓").green().bold(),
            style(name).cyan().bold(),
            style(&group).dim()
        ),
        None => println!(
            "{} No cataloged backend in {} has {} or more qubits{}",
            style("○").yellow().bold(),
            style(&group).dim(),
            min_qubits,
            kind.map(|k| format!(" of kind {k}")).unwrap_or_default()
        ),
    }
    Ok(())
}

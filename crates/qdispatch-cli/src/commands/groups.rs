//! Groups command implementation.

use anyhow::Result;
use console::style;

use super::common::{Context, create_dispatcher};

/// Execute the groups command.
pub async fn execute(ctx: &Context, owner: &str, provider: &str) -> Result<()> {
    let dispatcher = create_dispatcher(ctx).await?;
    let groups = dispatcher.routing_groups(owner, provider).await?;

    println!(
        "{} Routing groups visible to {}:",
        style(provider).cyan().bold(),
        style(owner).bold()
    );
    for group in groups {
        println!("  {group}");
    }
    Ok(())
}

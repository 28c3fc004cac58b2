//! Refresh command implementation.

use std::time::Duration;

use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use super::common::{Context, create_dispatcher};

/// Execute the refresh command.
pub async fn execute(
    ctx: &Context,
    owner: &str,
    provider: &str,
    routing_group: Option<&str>,
) -> Result<()> {
    let dispatcher = create_dispatcher(ctx).await?;

    let spinner = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(template);
    }
    spinner.set_message(format!("Discovering {provider} backends..."));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let discovered = dispatcher
        .refresh_backends(owner, provider, routing_group)
        .await;
    spinner.finish_and_clear();
    let discovered = discovered?;

    println!(
        "{} Stored {} backend(s) for {} in {}",
        style("✓").green().bold(),
        discovered,
        style(owner).bold(),
        style(dispatcher.config().catalog_dir.display()).dim()
    );
    Ok(())
}

//! Monitor command implementation.
//!
//! Poll a job until it reaches a terminal state or the iteration budget is
//! spent, then print the result. Ctrl-C stops polling and reports the last
//! observed status.

use std::time::Duration;

use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use qdispatch_hal::{JobHandle, JobState};
use qdispatch_sched::{CancellationToken, JobResult, MonitorOutcome};

use super::common::{Context, create_dispatcher, print_counts};

/// Execute the monitor command.
#[allow(clippy::too_many_arguments)]
pub async fn execute(
    ctx: &Context,
    owner: &str,
    provider: &str,
    job_id: &str,
    backend: &str,
    routing_group: Option<&str>,
    interval: Option<u64>,
    max_iterations: Option<u32>,
    json: bool,
) -> Result<()> {
    let dispatcher = create_dispatcher(ctx).await?;
    let credential = dispatcher.credential(owner, provider).await?;
    let group = dispatcher.resolve_routing_group(&credential, routing_group);

    let mut config = dispatcher.config().monitor.clone();
    if let Some(secs) = interval {
        config.interval_secs = secs;
    }
    if let Some(max) = max_iterations {
        if max == 0 {
            anyhow::bail!("--max-iterations must be at least 1");
        }
        config.max_iterations = max;
    }

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(tokio::signal::ctrl_c(), cancel.clone()));

    let spinner = if json {
        None
    } else {
        println!(
            "{} Monitoring job {} on {} (every {}s, at most {} polls over {}s)",
            style("→").cyan().bold(),
            style(job_id).dim(),
            style(format!("{group}/{backend}")).dim(),
            config.interval_secs,
            config.max_iterations,
            config.max_wait().as_secs()
        );
        let spinner = ProgressBar::new_spinner();
        if let Ok(template) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            spinner.set_style(template);
        }
        spinner.set_message("Waiting for job to settle...");
        spinner.enable_steady_tick(Duration::from_millis(100));
        Some(spinner)
    };

    let handle = JobHandle::new(job_id, backend, group);
    let result = dispatcher
        .monitor_job(owner, provider, handle, &config, &cancel)
        .await;

    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let result = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }
    Ok(())
}

/// Cancel `cancel` once `signal` fires. A listener that cannot be installed
/// is logged and leaves monitoring running to completion.
async fn cancel_on_signal<F>(signal: F, cancel: CancellationToken)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => cancel.cancel(),
        Err(e) => warn!("cannot listen for Ctrl-C, monitoring is not interruptible: {e}"),
    }
}

fn print_result(result: &JobResult) {
    let state = result.status.state;
    let marker = match state {
        JobState::Done => style("✓").green().bold(),
        JobState::Error | JobState::Cancelled => style("✗").red().bold(),
        JobState::Pending | JobState::Running => style("…").yellow().bold(),
    };

    println!(
        "{} Job {} is {} after {} poll(s): {}",
        marker,
        style(&result.provider_job_id).dim(),
        style(state).bold(),
        result.polls,
        result.status.detail
    );

    match result.outcome {
        MonitorOutcome::Exhausted => println!(
            "  Still {}. Run the monitor again later to keep watching.",
            state
        ),
        MonitorOutcome::Cancelled => println!("  Monitoring interrupted."),
        MonitorOutcome::Terminal => {}
    }

    if let Some(counts) = &result.payload {
        print_counts(counts);
    }
    if let Some(err) = &result.result_error {
        println!("  {} {}", style("Result unavailable:").red(), err.reason);
    }
}

//! qdispatch Command-Line Interface
//!
//! Select a backend for a resource request, watch a submitted job, and keep
//! the local backend catalog up to date.
//!
//! ```text
//!   qdispatch refresh  --owner alice            discover backends into the catalog
//!   qdispatch backends --owner alice            list cataloged backends
//!   qdispatch select   --owner alice -q 5       pick the least busy eligible backend
//!   qdispatch monitor  --owner alice -j J -b B  poll a job until it settles
//! ```

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{backends, groups, monitor, refresh, select, version};

/// qdispatch - backend selection and job monitoring for remote quantum providers
#[derive(Parser)]
#[command(name = "qdispatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (YAML)
    #[arg(long, global = true, env = "QDISPATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Override the IBM Quantum legacy endpoint
    #[arg(long, global = true, env = "IBM_QUANTUM_ENDPOINT")]
    ibm_endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Who is asking, and of which provider.
#[derive(Args, Debug, Clone)]
struct Account {
    /// Owner whose credential and catalog are used
    #[arg(long, env = "QDISPATCH_OWNER")]
    owner: String,

    /// Provider name
    #[arg(long, default_value = "ibmq")]
    provider: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Choose the least busy backend satisfying a request
    Select {
        #[command(flatten)]
        account: Account,

        /// Minimum number of qubits
        #[arg(short = 'q', long)]
        min_qubits: u32,

        /// Backend kind (simulator, qpu)
        #[arg(short, long)]
        kind: Option<String>,

        /// Routing group (defaults to the credential's hub)
        #[arg(short, long)]
        routing_group: Option<String>,

        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Poll a submitted job until it is terminal or the budget runs out
    Monitor {
        #[command(flatten)]
        account: Account,

        /// Provider job ID
        #[arg(short, long)]
        job_id: String,

        /// Backend the job was submitted to
        #[arg(short, long)]
        backend: String,

        /// Routing group the job was submitted under
        #[arg(short, long)]
        routing_group: Option<String>,

        /// Seconds between polls
        #[arg(long)]
        interval: Option<u64>,

        /// Maximum number of polls
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// List cataloged backends
    Backends {
        #[command(flatten)]
        account: Account,

        /// Only show one routing group
        #[arg(short, long)]
        routing_group: Option<String>,

        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Discover backends and store them in the catalog
    Refresh {
        #[command(flatten)]
        account: Account,

        /// Routing group to refresh (defaults to the credential's hub)
        #[arg(short, long)]
        routing_group: Option<String>,
    },

    /// List routing groups visible to the credential
    Groups {
        #[command(flatten)]
        account: Account,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let ctx = commands::common::Context {
        config_path: cli.config,
        ibm_endpoint: cli.ibm_endpoint,
    };

    // Execute command
    let result = match cli.command {
        Commands::Select {
            account,
            min_qubits,
            kind,
            routing_group,
            json,
        } => {
            select::execute(
                &ctx,
                &account.owner,
                &account.provider,
                min_qubits,
                kind.as_deref(),
                routing_group.as_deref(),
                json,
            )
            .await
        }

        Commands::Monitor {
            account,
            job_id,
            backend,
            routing_group,
            interval,
            max_iterations,
            json,
        } => {
            monitor::execute(
                &ctx,
                &account.owner,
                &account.provider,
                &job_id,
                &backend,
                routing_group.as_deref(),
                interval,
                max_iterations,
                json,
            )
            .await
        }

        Commands::Backends {
            account,
            routing_group,
            json,
        } => {
            backends::execute(
                &ctx,
                &account.owner,
                &account.provider,
                routing_group.as_deref(),
                json,
            )
            .await
        }

        Commands::Refresh {
            account,
            routing_group,
        } => {
            refresh::execute(
                &ctx,
                &account.owner,
                &account.provider,
                routing_group.as_deref(),
            )
            .await
        }

        Commands::Groups { account } => {
            groups::execute(&ctx, &account.owner, &account.provider).await
        }

        Commands::Version => {
            version::execute();
            Ok(())
        }
    };

    // Handle errors
    if let Err(e) = result {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}

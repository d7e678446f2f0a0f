//! kube-capacity CLI
//!
//! Prints the CPU and memory requests, limits and utilization of a
//! Kubernetes cluster, rolled up per node and optionally per pod.

mod commands;
mod config;
mod output;

use anyhow::Result;
use capacity_lib::CapacityError;
use clap::{Parser, Subcommand, ValueEnum};
use commands::{capacity, configure};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const METRICS_HINT: &str =
    "Utilization requires metrics-server; see https://github.com/kubernetes-sigs/metrics-server";

/// Overview of resource requests, limits and utilization in a Kubernetes cluster
#[derive(Parser)]
#[command(name = "kube-capacity")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Include pods in the output
    #[arg(long, short)]
    pub pods: bool,

    /// Include utilization from metrics-server
    #[arg(long, short)]
    pub util: bool,

    /// Only include pods from this namespace
    #[arg(long, short)]
    pub namespace: Option<String>,

    /// Label selector to filter pods by
    #[arg(long, short = 'l')]
    pub pod_labels: Option<String>,

    /// Label selector to filter nodes by
    #[arg(long)]
    pub node_labels: Option<String>,

    /// Sort key: name, or <cpu|mem>.<request|limit|util>[.percentage]
    #[arg(long)]
    pub sort: Option<String>,

    /// Output format
    #[arg(long, short)]
    pub output: Option<output::OutputFormat>,

    /// Path to kubeconfig file (uses KUBECONFIG or ~/.kube/config if not specified)
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use
    #[arg(long)]
    pub context: Option<String>,

    /// Enable verbose logging
    #[arg(long, short)]
    pub verbose: bool,

    /// Log line format on stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Print the configuration file path
    Path,

    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            output::print_error(&format!("{err:#}"));

            let capacity_error = err.downcast_ref::<CapacityError>();
            if capacity_error.is_some_and(CapacityError::is_metrics_error) {
                output::print_warning(METRICS_HINT);
            }
            ExitCode::from(capacity_error.map(CapacityError::exit_code).unwrap_or(1))
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Some(Commands::Config(action)) => match action {
            ConfigCommands::Show => configure::show_config(),
            ConfigCommands::Path => configure::show_path(),
            ConfigCommands::Init { force } => configure::init_config(*force),
        },
        None => {
            let config = config::Config::load()?;
            let settings = capacity::Settings::resolve(&cli, &config)?;
            capacity::show_capacity(&settings).await
        }
    }
}

/// Logs go to stderr so report output stays machine readable
fn init_tracing(verbose: bool, format: LogFormat) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

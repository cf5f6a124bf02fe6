mod commands;
mod factory;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clusterflow_config::{ConfigError, SpecOverrides};
use clusterflow_core::{ClusterError, ClusterSpec};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Exit status for argument and validation failures
const EXIT_VALIDATION: i32 = -1;

#[derive(Parser)]
#[command(name = "clusterflow")]
#[command(about = "Launch, list and destroy service clusters from a KDL spec", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bootstrap and configure a cluster
    LaunchCluster(SpecArgs),
    /// Destroy every node of a cluster
    DestroyCluster(SpecArgs),
    /// Print the cluster's running nodes, one tab-separated line each
    ListCluster(SpecArgs),
    /// Show version information
    Version,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::LaunchCluster(_) => "launch-cluster",
            Commands::DestroyCluster(_) => "destroy-cluster",
            Commands::ListCluster(_) => "list-cluster",
            Commands::Version => "version",
        }
    }
}

/// Where the cluster spec comes from, plus per-field overrides
#[derive(Args, Debug, Clone)]
struct SpecArgs {
    /// Spec file (default: discovered cluster.kdl)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Service to run (e.g. cassandra)
    #[arg(long)]
    service_name: Option<String>,
    /// Cluster name; also selects the cluster in a multi-cluster spec file
    #[arg(short = 'n', long)]
    cluster_name: Option<String>,
    /// Provisioning provider (e.g. sakura-cloud)
    #[arg(long)]
    provider: Option<String>,
    /// Provider identity (access token)
    #[arg(long)]
    identity: Option<String>,
    /// Provider credential (access token secret)
    #[arg(long, env = "CLUSTERFLOW_CREDENTIAL", hide_env_values = true)]
    credential: Option<String>,
    /// Instance templates, e.g. "3 cassandra,1 cassandra+jmx"
    #[arg(long)]
    instance_templates: Option<String>,
    /// Base URL of the install script catalog
    #[arg(long)]
    run_url_base: Option<String>,
}

impl SpecArgs {
    fn load(&self) -> clusterflow_config::Result<ClusterSpec> {
        let overrides = SpecOverrides {
            service_name: self.service_name.clone(),
            cluster_name: self.cluster_name.clone(),
            provider: self.provider.clone(),
            identity: self.identity.clone(),
            credential: self.credential.clone(),
            instance_templates: self.instance_templates.clone(),
            run_url_base: self.run_url_base.clone(),
        };
        clusterflow_config::load_spec(self.config.as_deref(), &overrides)
    }
}

/// Errors the user fixes by changing arguments or the spec file
fn is_validation(err: &anyhow::Error) -> bool {
    if let Some(e) = err.downcast_ref::<ClusterError>() {
        return e.is_validation();
    }
    err.downcast_ref::<ConfigError>().is_some()
}

fn exit_with_usage(subcommand: &str, err: &anyhow::Error) -> ! {
    eprintln!("{} {}", "error:".red().bold(), err);
    let mut cli = Cli::command();
    let usage = match cli.find_subcommand_mut(subcommand) {
        Some(cmd) => cmd.render_usage(),
        None => cli.render_usage(),
    };
    eprintln!();
    eprintln!("{}", usage);
    std::process::exit(EXIT_VALIDATION);
}

async fn run(command: &Commands) -> anyhow::Result<()> {
    match command {
        Commands::LaunchCluster(args) => commands::launch::handle(&args.load()?).await,
        Commands::DestroyCluster(args) => commands::destroy::handle(&args.load()?).await,
        Commands::ListCluster(args) => commands::list::handle(&args.load()?).await,
        Commands::Version => {
            println!("clusterflow {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            std::process::exit(EXIT_VALIDATION);
        }
        Err(e) => e.exit(),
    };

    // stdout carries node listings, so logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run(&cli.command).await {
        Ok(()) => Ok(()),
        Err(e) if is_validation(&e) => exit_with_usage(cli.command.name(), &e),
        Err(e) => Err(e),
    }
}

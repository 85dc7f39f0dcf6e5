use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vigia::config::{Config, ConfigError};
use vigia::core::{
    ClusterConnectionMode, ClusterListener, ClusterSettings, LoggingClusterListener,
    NoOpClusterListener, ServerConnectionState,
};
use vigia::monitor::{ServerMonitorFactory, TcpProber};
use vigia::{ClusterError, MultiServerCluster};

#[derive(Parser)]
#[command(name = "vigia")]
#[command(about = "Topology tracker for MongoDB replica sets, sharded clusters and standalones")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Vigia Team")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track a cluster and log every topology change until interrupted
    Watch {
        /// Path to configuration file
        #[arg(short, long, default_value = "config/dev.toml")]
        config: PathBuf,
    },
    /// Wait until every server has been probed once and print the cluster
    Describe {
        /// Path to configuration file
        #[arg(short, long, default_value = "config/dev.toml")]
        config: PathBuf,
    },
    /// Generate example configuration files
    Config {
        /// Deployment kind (replica-set, sharded or standalone)
        #[arg(short, long)]
        kind: String,
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Validate configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Watch { config } => watch(config).await,
        Commands::Describe { config } => describe(config).await,
        Commands::Config { kind, output } => generate_config(kind, output),
        Commands::Validate { config } => validate_config(config),
        Commands::Version => {
            show_version();
            Ok(())
        }
    };

    if let Err(error) = &result {
        if let Some(summary) = failure_summary(error) {
            eprintln!("{}", summary);
        }
    }
    result
}

/// Severity line for failures that originate in the cluster layer
fn failure_summary(error: &anyhow::Error) -> Option<String> {
    let cluster_error = error.downcast_ref::<ClusterError>()?;
    let mut summary = format!("[{}] {}", cluster_error.severity(), cluster_error);
    if cluster_error.is_recoverable() {
        summary.push_str("\n  The cluster may still be converging; retry or raise server_selection_timeout_ms");
    }
    Some(summary)
}

fn load(config_path: &PathBuf) -> anyhow::Result<(Config, ClusterSettings)> {
    let config = Config::load_from_file(config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    let settings = config
        .cluster_settings()
        .context("Invalid cluster settings")?;

    if settings.mode() != ClusterConnectionMode::Multiple {
        bail!(
            "Connection mode {} is not tracked; use {}",
            settings.mode(),
            ClusterConnectionMode::Multiple
        );
    }

    Ok((config, settings))
}

fn start_cluster(
    config: &Config,
    settings: ClusterSettings,
    listener: Arc<dyn ClusterListener>,
) -> MultiServerCluster {
    let prober = TcpProber::with_intervals(config.heartbeat_interval(), config.heartbeat_timeout());
    let factory = ServerMonitorFactory::new(Arc::new(prober), Handle::current());
    MultiServerCluster::new("vigia", settings, Arc::new(factory), listener)
}

async fn watch(config_path: PathBuf) -> anyhow::Result<()> {
    let (config, settings) = load(&config_path)?;
    init_logging(&config)?;

    info!("Starting vigia v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from: {:?}", config_path);

    let cluster = start_cluster(&config, settings, Arc::new(LoggingClusterListener));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    info!("Shutting down");
    cluster.close();
    Ok(())
}

async fn describe(config_path: PathBuf) -> anyhow::Result<()> {
    let (config, settings) = load(&config_path)?;
    init_logging(&config)?;

    let cluster = start_cluster(&config, settings, Arc::new(NoOpClusterListener));
    let description = cluster
        .current_description(|d| !d.is_connecting(), config.server_selection_timeout())
        .await
        .context("Cluster did not finish its first round of probes")?;
    cluster.close();

    println!("Cluster type: {}", description.cluster_type());
    println!("Servers: {}", description.servers().len());
    for server in description.servers() {
        print!(
            "  {} {} {}",
            server.address(),
            server.state(),
            server.server_type()
        );
        if server.state() == ServerConnectionState::Connected {
            print!(" rtt={:?}", server.round_trip_time());
        }
        if let Some(primary) = server.primary() {
            print!(" primary={}", primary);
        }
        if let Some(error) = server.error() {
            print!(" ({})", error);
        }
        println!();
    }

    Ok(())
}

fn generate_config(kind: String, output: PathBuf) -> anyhow::Result<()> {
    println!("Generating {} configuration file: {:?}", kind, output);

    Config::create_example_config(&output, &kind).context("Failed to generate config")?;

    println!("Configuration file generated successfully!");
    println!("Edit the file to match your environment and run:");
    println!("  vigia watch --config {:?}", output);

    Ok(())
}

fn validate_config(config_path: PathBuf) -> anyhow::Result<()> {
    println!("Validating configuration file: {:?}", config_path);

    match Config::load_from_file(&config_path) {
        Ok(config) => {
            println!("✓ Configuration file is valid");
            println!("  Mode: {}", config.cluster.mode);
            println!("  Required cluster type: {}", config.cluster.required_cluster_type);
            if let Some(name) = &config.cluster.replica_set_name {
                println!("  Replica set name: {}", name);
            }
            println!("  Seed hosts: {} instances", config.cluster.hosts.len());
            for (i, host) in config.cluster.hosts.iter().enumerate() {
                println!("    {}: {}", i + 1, host);
            }
        }
        Err(e) => {
            eprintln!("✗ Configuration file validation failed:");
            match &e {
                ConfigError::IoError(msg) => eprintln!("  File error: {}", msg),
                ConfigError::ParseError(msg) => eprintln!("  Parse error: {}", msg),
                ConfigError::ValidationError(msg) => eprintln!("  Validation error: {}", msg),
                ConfigError::SerializeError(msg) => eprintln!("  Serialization error: {}", msg),
            }
            return Err(e.into());
        }
    }

    Ok(())
}

fn show_version() {
    println!("vigia v{}", env!("CARGO_PKG_VERSION"));
    println!("Topology tracker for MongoDB replica sets, sharded clusters and standalones");
    println!();
    println!(
        "Built with Rust {}",
        option_env!("CARGO_PKG_RUST_VERSION").unwrap_or("unknown")
    );
    println!("Target: {}", std::env::consts::ARCH);
}

fn init_logging(config: &Config) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match config.logging.format.as_str() {
        "json" => builder.json().try_init(),
        _ => builder.try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized at level: {}", config.logging.level);
    Ok(())
}

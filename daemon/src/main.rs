//! xledger daemon: runs the gateway and serves requests as JSON lines on
//! stdin/stdout.

mod factory;
mod transport;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::BufReader;
use xledger_gateway::{
    init_logging, Directories, GatewayBuilder, GatewayConfig, LogFormat, ShutdownController,
};
use xledger_store_lmdb::LmdbStore;

use crate::factory::BesuClientFactory;

#[derive(Parser)]
#[command(name = "xledger-daemon", about = "Ledger transaction gateway daemon")]
struct Cli {
    /// Path to a TOML configuration file. CLI flags and env vars override it.
    #[arg(long, env = "XLEDGER_CONFIG")]
    config: Option<PathBuf>,

    /// Directory of the LMDB store.
    #[arg(long, env = "XLEDGER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log format: "human" or "json".
    #[arg(long, env = "XLEDGER_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Log level filter, e.g. "info" or "debug,xledger_gateway=trace".
    #[arg(long, env = "XLEDGER_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the gateway, serving requests on stdin.
    Run,
    /// Print the effective configuration as TOML.
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Command::Run => {
            init_logging(config.log_format, &config.log_level)?;
            run(config).await
        }
        Command::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<GatewayConfig> {
    let mut config = match &cli.config {
        Some(path) => GatewayConfig::from_toml_file(&path.to_string_lossy())
            .with_context(|| format!("loading {}", path.display()))?,
        None => GatewayConfig::default(),
    };
    if let Some(data_dir) = &cli.data_dir {
        config.data_dir = data_dir.clone();
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    config.validate()?;
    Ok(config)
}

async fn run(config: GatewayConfig) -> anyhow::Result<()> {
    let store = Arc::new(
        LmdbStore::open(&config.data_dir)
            .with_context(|| format!("opening store at {}", config.data_dir.display()))?,
    );
    let shutdown = Arc::new(ShutdownController::new());

    let gateway = GatewayBuilder::new(config)
        .store(store.clone())
        .directories(Directories::new(store.clone(), store))
        .factory(Arc::new(BesuClientFactory))
        .shutdown(shutdown.clone())
        .build()?;

    // Subscribe before anything can trigger shutdown.
    let transport_shutdown = shutdown.subscribe();
    let signals = {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move { shutdown.wait_for_signal().await })
    };

    gateway.start();
    tracing::info!(
        default_ledger = gateway.ledgers().default_id(),
        data_dir = %gateway.config().data_dir.display(),
        "xledger daemon serving on stdin"
    );

    let served = transport::serve(
        &gateway,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        transport_shutdown,
    )
    .await;

    gateway.stop().await;
    signals.abort();
    served?;

    if let Some(reason) = shutdown.reason() {
        anyhow::bail!("stopped: {reason}");
    }
    tracing::info!("xledger daemon exited cleanly");
    Ok(())
}

//! `m200`: operator tool for M-200 gate readers.
//!
//! Settings come from defaults, an optional TOML file (`--config`) and
//! `M200_*` environment variables; `--host` and `--port` override all three.
//! Results are printed to stdout as JSON, logs go to stderr (`RUST_LOG`).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use m200_protocol::catalog::RelayAction;
use m200_reader::{
    AnyGateReader, ConfigStore, GateReader, InventoryOutcome, NullConfigStore, ReaderConfig,
    ReaderSession, TomlConfigStore,
};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// M-200 gate reader tool
#[derive(Parser)]
#[command(name = "m200")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file; confirmed power and network changes are written back to it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Reader host, overriding the configuration
    #[arg(long, global = true)]
    host: Option<String>,

    /// Reader TCP port, overriding the configuration
    #[arg(long, global = true)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show reader identification
    Info,

    /// Run one inventory cycle
    Inventory,

    /// Scan continuously and print every tag
    Scan {
        /// Stop after this many seconds
        #[arg(short, long, default_value_t = 10)]
        seconds: u64,
    },

    /// Show or set RF output power
    Power {
        /// New power in dBm (0-30)
        #[arg(long, value_name = "DBM")]
        set: Option<u8>,
    },

    /// Show the reader's network settings
    Network,

    /// Drive a gate relay
    Relay {
        /// Relay number
        #[arg(value_parser = clap::value_parser!(u8).range(1..=2))]
        relay: u8,

        action: RelayArg,

        /// Seconds before the relay reverts; 0 holds it
        #[arg(long, default_value_t = 0, value_name = "SECS")]
        hold: u8,
    },

    /// Show gate status and parameters
    Gate,
}

#[derive(Clone, Copy, ValueEnum)]
enum RelayArg {
    Open,
    Close,
}

impl From<RelayArg> for RelayAction {
    fn from(arg: RelayArg) -> Self {
        match arg {
            RelayArg::Open => RelayAction::Release,
            RelayArg::Close => RelayAction::Close,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let store: Arc<dyn ConfigStore> = match &cli.config {
        Some(path) => Arc::new(TomlConfigStore::new(path)),
        None => Arc::new(NullConfigStore),
    };

    let reader = AnyGateReader::from_config(config.clone(), store);
    if !reader.connect().await {
        bail!("Cannot reach reader at {}", config.addr());
    }

    let result = run(&cli.command, &reader).await;
    reader.disconnect().await;
    result
}

fn load_config(cli: &Cli) -> Result<ReaderConfig> {
    let mut config = ReaderConfig::load(cli.config.as_deref())?;
    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    config.validate()?;
    debug!(addr = %config.addr(), backend = ?config.backend, "Configuration loaded");
    Ok(config)
}

async fn run(command: &Commands, reader: &AnyGateReader) -> Result<()> {
    match command {
        Commands::Info => {
            let info = reader
                .device_info()
                .context("Reader did not report device info")?;
            print_json(&info)
        }
        Commands::Inventory => match reader.read_single_tag().await {
            InventoryOutcome::Error(e) => bail!("Inventory failed: {e}"),
            outcome => print_json(&outcome.into_tags()),
        },
        Commands::Scan { seconds } => scan(reader, Duration::from_secs(*seconds)).await,
        Commands::Power { set: Some(dbm) } => {
            if !m200(reader)?.set_power(*dbm).await {
                bail!("Reader did not accept {dbm} dBm");
            }
            info!(power_dbm = dbm, "RF power updated");
            Ok(())
        }
        Commands::Power { set: None } => {
            let power = m200(reader)?
                .get_power()
                .await
                .context("Failed to read RF power")?;
            print_json(&serde_json::json!({ "power_dbm": power }))
        }
        Commands::Network => {
            let params = m200(reader)?
                .get_network_config()
                .await
                .context("Failed to read network settings")?;
            print_json(&params)
        }
        Commands::Relay {
            relay,
            action,
            hold,
        } => {
            if !m200(reader)?
                .control_relay(*relay, (*action).into(), *hold)
                .await
            {
                bail!("Reader did not accept relay {relay} command");
            }
            Ok(())
        }
        Commands::Gate => {
            let session = m200(reader)?;
            let status = session
                .get_gate_status()
                .await
                .context("Failed to read gate status")?;
            let params = session
                .get_gate_params()
                .await
                .context("Failed to read gate parameters")?;
            print_json(&serde_json::json!({ "status": status, "params": params }))
        }
    }
}

async fn scan(reader: &AnyGateReader, duration: Duration) -> Result<()> {
    let (tx, mut rx) = mpsc::channel(256);
    if !reader.start_scanning(tx).await {
        bail!("Failed to start scanning");
    }
    info!(seconds = duration.as_secs(), "Scanning, Ctrl-C to stop");

    let deadline = tokio::time::sleep(duration);
    tokio::pin!(deadline);
    let mut seen = 0u64;
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => break,
            tag = rx.recv() => match tag {
                Some(tag) => {
                    seen += 1;
                    println!("{}", serde_json::to_string(&tag)?);
                }
                None => break,
            },
        }
    }

    reader.stop_scanning().await;
    info!(tags = seen, "Scan finished");
    Ok(())
}

/// Device configuration needs the M-200 backend.
fn m200(reader: &AnyGateReader) -> Result<&ReaderSession> {
    reader
        .session()
        .context("This command needs the m200 backend")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

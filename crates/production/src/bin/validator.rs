//! Quorum Validator Node
//!
//! Production binary for running a validator node.
//!
//! # Usage
//!
//! ```bash
//! # Start with configuration file
//! quorum-validator --config validator.toml
//!
//! # Override data directory
//! quorum-validator --config validator.toml --data-dir /var/lib/quorum
//! ```
//!
//! See [`NodeConfig`] for the configuration format.

use anyhow::{Context, Result};
use clap::Parser;
use quorum_ledger::{InMemoryMempool, InMemoryStateComputer};
use quorum_node::{NodeStateMachine, RecoveredState};
use quorum_production::network::{listen, TcpTransport};
use quorum_production::{
    init_telemetry, LoggingPacemaker, NodeConfig, ProductionRunner, SnapshotStore,
};
use quorum_types::{AccumulatorState, LedgerHeader};
use std::path::PathBuf;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Quorum Validator Node
///
/// Runs the vertex store, sync and ledger core of a validator.
#[derive(Parser, Debug)]
#[command(name = "quorum-validator")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: PathBuf,

    /// Data directory for snapshots (overrides config)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log filter directives (overrides config, not RUST_LOG)
    #[arg(long)]
    log_filter: Option<String>,
}

/// Capacity of the runner's event channels.
const CHANNEL_CAPACITY: usize = 10_000;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = NodeConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(data_dir) = cli.data_dir {
        config.storage.data_dir = data_dir;
    }
    if let Some(filter) = cli.log_filter {
        config.telemetry.log_filter = filter;
    }

    init_telemetry(&config.telemetry).context("initializing telemetry")?;

    let local = config.validator_id();
    let storage = SnapshotStore::open(&config.storage.data_dir).context("opening data dir")?;
    let recovered = match storage.load().context("loading durable state")? {
        Some(recovered) => recovered,
        None => {
            info!("No durable state found, starting from genesis");
            let genesis = RecoveredState::genesis(LedgerHeader::genesis(
                AccumulatorState::genesis(),
                0,
            ))?;
            storage.persist_vertex_store(&genesis.vertex_store)?;
            storage.persist_ledger_proof(&genesis.ledger_proof)?;
            genesis
        }
    };

    let validators = config.validator_set()?;
    if validators.is_empty() {
        warn!("No validator public keys configured, peer certificates will be rejected");
    }

    let seed = config.node.seed.unwrap_or(local.0);
    let state_computer = InMemoryStateComputer::new(&recovered.ledger_proof);
    let node = NodeStateMachine::recover(
        local,
        validators,
        config.sync.to_sync_config(),
        recovered,
        Box::new(state_computer),
        Box::new(InMemoryMempool::new()),
        seed,
    );

    let (inbound_tx, inbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (bound, _accept) = listen(config.network.listen_addr, inbound_tx)
        .await
        .with_context(|| format!("listening on {}", config.network.listen_addr))?;
    info!(validator = %local, addr = %bound, peers = config.peers().count(), "Listening");

    let transport = TcpTransport::connect(local, config.peers(), config.network.send_queue);
    let mut runner = ProductionRunner::new(
        node,
        transport,
        LoggingPacemaker,
        storage,
        inbound_rx,
        CHANNEL_CAPACITY,
    );
    let shutdown = runner.shutdown_handle();
    let mut task = tokio::spawn(runner.run());

    tokio::select! {
        result = &mut task => {
            return result.context("runner task panicked")?.map_err(Into::into);
        }
        _ = signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
        }
    }

    drop(shutdown);
    match task.await.context("runner task panicked")? {
        Ok(()) => info!("Validator stopped"),
        Err(e) => warn!(error = %e, "Validator stopped with error"),
    }
    Ok(())
}

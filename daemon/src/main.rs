//! `nakad`: entry point for running a naka node.

use std::path::PathBuf;

use clap::Parser;

use naka_node::{init_logging, LogFormat, Node, NodeConfig};

#[derive(Parser)]
#[command(name = "nakad", about = "naka proof-of-work node")]
struct Cli {
    /// Path to the initial-UTXO seed file.
    utxo_file: PathBuf,

    /// Operator HTTP port.
    http_port: u16,

    /// Peer RPC port.
    rpc_port: u16,

    /// Miner behavior mode (0 = honest; 1-4 inject misbehavior for tests).
    mode: u8,

    /// Peer endpoints (`host[:port]`), zero or more.
    peers: Vec<String>,

    /// Plain-text peers file, one `host[:port]` per line; merged with the
    /// positional endpoints.
    #[arg(long, env = "NAKA_PEERS_FILE")]
    peers_file: Option<PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, default_value = "info", env = "NAKA_LOG_LEVEL")]
    log_level: String,

    /// Log format: "human" or "json".
    #[arg(long, default_value = "human", env = "NAKA_LOG_FORMAT")]
    log_format: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(LogFormat::parse(&cli.log_format), &cli.log_level);

    let mut peers = cli.peers;
    if let Some(ref path) = cli.peers_file {
        peers.extend(naka_node::config::load_peers_file(path)?);
    }

    let config = NodeConfig {
        utxo_file: cli.utxo_file,
        http_port: cli.http_port,
        rpc_port: cli.rpc_port,
        mode: cli.mode,
        peers,
        log_format: cli.log_format,
        log_level: cli.log_level,
        ..NodeConfig::default()
    };

    tracing::info!(
        rpc_port = config.rpc_port,
        http_port = config.http_port,
        mode = config.mode,
        peers = ?config.peers,
        "starting node"
    );

    let node = Node::from_config(config).await?;
    node.start().await?;

    // Mining starts immediately; the operator surface can stop/restart it.
    node.start_mining().await?;

    node.shutdown.wait_for_signal().await;
    node.stop().await;

    tracing::info!("node exited cleanly");
    Ok(())
}

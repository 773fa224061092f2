use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

use optract::{
    config, logging, metrics, network, node, Capabilities, EcdsaVerifier, Inbound, MemoryStore, NodeEvent,
};

#[derive(Parser)]
#[command(author, version, about = "optract gossip node")]
struct Cli {
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Suppress routine network gossip logs
    #[arg(long, default_value_t = false)]
    quiet_net: bool,

    #[command(subcommand)]
    cmd: Option<Cmd>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Join the network and aggregate records (default)
    Run,
    /// Print the local gossip peer ID and exit
    PeerId,
}

/// Try the CLI path, then `config.toml` next to the executable, else the
/// embedded default.
fn load_config(path: &str) -> anyhow::Result<config::Config> {
    const EMBEDDED_CONFIG: &str = include_str!("../config.toml");
    match config::load(path) {
        Ok(c) => Ok(c),
        Err(e1) => {
            let candidate = std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|dir| dir.join("config.toml")));
            if let Some(candidate) = candidate {
                if let Ok(c) = config::load(&candidate) {
                    return Ok(c);
                }
            }
            warn!("could not read config from '{}': {:#}; using embedded defaults", path, e1);
            config::load_from_str(EMBEDDED_CONFIG)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.quiet_net);

    let cfg = load_config(&cli.config)?;

    if let Some(Cmd::PeerId) = cli.cmd {
        let id = network::peer_id_string(&cfg.net.resolved_identity_path())?;
        println!("{}", id);
        if let Some(ip) = &cfg.net.public_ip {
            println!("/ip4/{}/udp/{}/quic-v1/p2p/{}", ip, cfg.net.listen_port, id);
        }
        return Ok(());
    }

    let inbound = Inbound::new();
    let net = network::spawn(cfg.net.clone(), inbound.sender()).await?;
    let caps = Capabilities {
        transport: net,
        verifier: Arc::new(EcdsaVerifier),
        store: Arc::new(MemoryStore::new()),
    };
    let (handle, mut settlement) = node::spawn(&cfg, caps, inbound)?;

    if cfg.metrics.enabled {
        metrics::serve(cfg.metrics.clone(), handle.metrics().clone())?;
    }

    handle.join(&cfg.gossip.primary_topic).await?;

    let mut events = handle.subscribe();
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
            Some(epoch) = settlement.epochs.recv() => {
                if let Ok(stats) = handle.stats().await {
                    info!("epoch {}: {} records pooled, {} peers connected", epoch, stats.pooled, stats.connected);
                }
            }
            Some(record) = settlement.pending.recv() => {
                info!("pending record from validator 0x{}", hex::encode(&record.validator));
            }
            event = events.recv() => match event {
                Ok(NodeEvent::Connected) => info!("connected to the network; publishing enabled"),
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => warn!("event listener lagged by {}", n),
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    }
    handle.stop().await;
    Ok(())
}

//! Tracing subscriber setup for the binary.

use tracing_subscriber::EnvFilter;

/// Targets that log every gossip exchange.
const NETWORK_TARGETS: [&str; 3] = ["optract::network", "optract::gossip", "libp2p"];

/// Filter used when `RUST_LOG` is unset. `quiet_net` lowers only the
/// network targets to `warn`; node, epoch and pool logs stay at `info`.
pub fn default_filter(quiet_net: bool) -> String {
    if !quiet_net {
        return "info".to_string();
    }
    let mut directives = vec!["info".to_string()];
    directives.extend(NETWORK_TARGETS.iter().map(|target| format!("{}=warn", target)));
    directives.join(",")
}

pub fn init(quiet_net: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(quiet_net)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

use anyhow::Result;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::thread;

/// Pipeline gauges and counters, prefixed with `optract_`.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub peers: IntGauge,
    pub epoch: IntGauge,
    pub pooled: IntGauge,
    pub accepted: IntCounter,
    pub pending: IntCounter,
    pub rejected: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let peers = IntGauge::new("optract_peer_count", "Connected gossip peers")?;
        let epoch = IntGauge::new("optract_epoch", "Unix second the open epoch began")?;
        let pooled = IntGauge::new("optract_pool_records", "Ordinary records held in the pending pool")?;
        let accepted = IntCounter::new("optract_records_accepted_total", "Ordinary records filed into the pool")?;
        let pending = IntCounter::new("optract_pending_received_total", "Pending records received from validators")?;
        let rejected = IntCounterVec::new(
            Opts::new("optract_messages_rejected_total", "Inbound messages dropped, by reason"),
            &["reason"],
        )?;
        registry.register(Box::new(peers.clone()))?;
        registry.register(Box::new(epoch.clone()))?;
        registry.register(Box::new(pooled.clone()))?;
        registry.register(Box::new(accepted.clone()))?;
        registry.register(Box::new(pending.clone()))?;
        registry.register(Box::new(rejected.clone()))?;
        Ok(Self { registry, peers, epoch, pooled, accepted, pending, rejected })
    }

    pub fn registry(&self) -> &Registry { &self.registry }
}

pub fn serve(cfg: crate::config::Metrics, metrics: Metrics) -> Result<()> {
    let header: tiny_http::Header = "Content-Type: text/plain; version=0.0.4; charset=utf-8"
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid metrics content-type header"))?;
    let server = tiny_http::Server::http(&cfg.bind)
        .map_err(|e| anyhow::anyhow!("could not start metrics server on {}: {}", cfg.bind, e))?;
    tracing::info!("metrics listening on http://{}", cfg.bind);

    thread::spawn(move || {
        for request in server.incoming_requests() {
            let mut buffer = vec![];
            let encoder = TextEncoder::new();
            let metric_families = metrics.registry().gather();
            if encoder.encode(&metric_families, &mut buffer).is_err() {
                tracing::warn!("could not encode metrics");
                continue;
            }
            let response = tiny_http::Response::from_data(buffer).with_header(header.clone());
            let _ = request.respond(response);
        }
    });

    Ok(())
}

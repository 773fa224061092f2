//! The node actor.
//!
//! One task owns the seen/throttle sets, topic membership and the pending
//! pool. Network traffic arrives over the transport event channel and
//! everything a [`NodeHandle`] asks for over one command channel, each in
//! FIFO order. Neither can starve the rotation timer or the other.
//!
//! Out of the actor come [`NodeEvent`]s on a bounded broadcast ring for
//! observers, plus one lossless [`Settlement`] stream per settlement event
//! kind.

use crate::{
    config::Config,
    crypto::Verifier,
    epoch::RotationSchedule,
    error::Rejection,
    filter::{unix_now, Filter},
    gossip::GossipAdapter,
    metrics::Metrics,
    pool::{EpochId, PendingPool, PoolSnapshot},
    record::{OrdinaryRecord, PendingRecord, Record},
    router::{Routed, Router},
    storage::{ContentId, ContentStore},
    transport::{Inbound, PeerIdentity, SenderInfo, Transport, TransportEvent},
};
use anyhow::{anyhow, Result};
use rand::{rngs::StdRng, SeedableRng};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    OrdinaryReceived(OrdinaryRecord),
    PendingReceived(PendingRecord),
    EpochRotated { epoch: EpochId },
    /// First peer connection since start.
    Connected,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    pub topics: Vec<String>,
    pub peers_seen: usize,
    pub connected: usize,
    pub epoch: Option<EpochId>,
    pub pooled: usize,
    pub accepted: u64,
    pub pending: u64,
    pub rejected: BTreeMap<&'static str, u64>,
}

impl Stats {
    pub fn rejected(&self, reason: &str) -> u64 {
        self.rejected.get(reason).copied().unwrap_or(0)
    }
}

/// External collaborators, injected at construction.
#[derive(Clone)]
pub struct Capabilities {
    pub transport: Arc<dyn Transport>,
    pub verifier: Arc<dyn Verifier>,
    pub store: Arc<dyn ContentStore>,
}

/// Broadcast ring size for [`NodeHandle::subscribe`] receivers.
pub const EVENT_BUFFER: usize = 1024;

/// Inbound messages handled per turn before the timer and commands are
/// polled again.
const INBOUND_BURST: usize = 64;

/// Lossless per-kind streams for the settlement side. Each has exactly one
/// consumer; dropping a receiver just stops its deliveries.
pub struct Settlement {
    /// Id of every epoch opened, starting with the one opened at start.
    pub epochs: mpsc::UnboundedReceiver<EpochId>,
    pub pending: mpsc::UnboundedReceiver<PendingRecord>,
}

enum Command {
    Submit { payload: Vec<u8>, sender: SenderInfo },
    Join { topic: String, reply: oneshot::Sender<Result<bool>> },
    Leave { topic: String, reply: oneshot::Sender<Result<bool>> },
    Publish { topic: String, msg: Vec<u8>, reply: oneshot::Sender<bool> },
    Rotate { reply: oneshot::Sender<EpochId> },
    Stats { reply: oneshot::Sender<Stats> },
    Snapshot { reply: oneshot::Sender<PoolSnapshot> },
}

struct NodeState {
    filter: Filter,
    gossip: GossipAdapter,
    router: Router,
    pool: PendingPool,
    verifier: Arc<dyn Verifier>,
    network_id: u64,
    events: broadcast::Sender<NodeEvent>,
    epochs: mpsc::UnboundedSender<EpochId>,
    pending_tx: mpsc::UnboundedSender<PendingRecord>,
    metrics: Metrics,
    peers_seen: HashSet<PeerIdentity>,
    connected: usize,
    announced: bool,
    accepted: u64,
    pending: u64,
    rejected: BTreeMap<&'static str, u64>,
}

impl NodeState {
    fn emit(&self, event: NodeEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn on_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Message { payload, sender } => self.on_inbound(&payload, &sender),
            TransportEvent::Connected { peer, peers } => {
                self.peers_seen.insert(peer);
                self.connected = peers;
                self.metrics.peers.set(peers as i64);
                if !self.announced && peers >= 1 {
                    self.announced = true;
                    info!("found {} connected {}", peers, if peers == 1 { "peer" } else { "peers" });
                    self.emit(NodeEvent::Connected);
                }
            }
            TransportEvent::Disconnected { peer, peers } => {
                debug!("peer {} disconnected", peer);
                self.connected = peers;
                self.metrics.peers.set(peers as i64);
            }
        }
    }

    fn on_inbound(&mut self, payload: &[u8], sender: &SenderInfo) {
        if let Err(rejection) = self.on_message(payload, sender, unix_now()) {
            self.record_rejection(&rejection, sender);
        }
    }

    fn on_message(&mut self, payload: &[u8], sender: &SenderInfo, now: u64) -> Result<(), Rejection> {
        self.filter.admit(payload, sender, now)?;
        match self.router.route(&self.gossip, payload, sender)? {
            Routed::Pending(record) => {
                self.pending += 1;
                self.metrics.pending.inc();
                let _ = self.pending_tx.send(record.clone());
                self.emit(NodeEvent::PendingReceived(record));
            }
            Routed::Ordinary(record) => {
                self.emit(NodeEvent::OrdinaryReceived(record.clone()));
                let account = self.pool.admit(record, self.verifier.as_ref(), self.network_id)?;
                self.accepted += 1;
                self.metrics.accepted.inc();
                self.metrics.pooled.set(self.pool.len() as i64);
                debug!("pooled record from {} ({} held)", account, self.pool.held(&account));
            }
            Routed::Ignored { topic } => trace!("no handler for topic {}", topic),
        }
        Ok(())
    }

    fn record_rejection(&mut self, rejection: &Rejection, sender: &SenderInfo) {
        *self.rejected.entry(rejection.reason()).or_default() += 1;
        self.metrics.rejected.with_label_values(&[rejection.reason()]).inc();
        let from = sender.public.as_ref().map_or("<anonymous>", PeerIdentity::as_str);
        if rejection.is_filtered() {
            debug!("dropped message from {}: {}", from, rejection);
        } else {
            warn!("dropped message from {}: {}", from, rejection);
        }
    }

    fn rotate(&mut self) -> EpochId {
        let epoch = self.pool.rotate(unix_now());
        info!("epoch {} opened ({} records carried in past)", epoch, self.pool.len());
        self.metrics.epoch.set(epoch as i64);
        let _ = self.epochs.send(epoch);
        self.emit(NodeEvent::EpochRotated { epoch });
        epoch
    }

    fn join(&mut self, topic: &str) -> Result<bool> {
        let joined = self.gossip.join(topic)?;
        if joined {
            self.filter.reset();
        }
        Ok(joined)
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Submit { payload, sender } => self.on_inbound(&payload, &sender),
            Command::Join { topic, reply } => { let _ = reply.send(self.join(&topic)); }
            Command::Leave { topic, reply } => { let _ = reply.send(self.gossip.leave(&topic)); }
            Command::Publish { topic, msg, reply } => { let _ = reply.send(self.gossip.publish(&topic, msg)); }
            Command::Rotate { reply } => { let _ = reply.send(self.rotate()); }
            Command::Stats { reply } => { let _ = reply.send(self.stats()); }
            Command::Snapshot { reply } => { let _ = reply.send(self.pool.snapshot()); }
        }
    }

    fn stats(&self) -> Stats {
        Stats {
            topics: self.gossip.topics().to_vec(),
            peers_seen: self.peers_seen.len(),
            connected: self.connected,
            epoch: self.pool.epoch(),
            pooled: self.pool.len(),
            accepted: self.accepted,
            pending: self.pending,
            rejected: self.rejected.clone(),
        }
    }
}

#[derive(Clone)]
pub struct NodeHandle {
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<NodeEvent>,
    shutdown: broadcast::Sender<()>,
    stopped: watch::Receiver<bool>,
    store: Arc<dyn ContentStore>,
    metrics: Metrics,
    primary_topic: String,
}

impl NodeHandle {
    /// Every event in emission order, for observers. The ring holds
    /// [`EVENT_BUFFER`] events: a receiver that falls further behind gets
    /// `RecvError::Lagged` and the skipped events are gone. Consumers that
    /// must see every epoch or pending record use [`Settlement`] instead.
    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> { self.events.subscribe() }

    /// Feeds a message through the same pipeline as network traffic. It is
    /// queued behind earlier requests from any handle, so a later `stats()`
    /// already reflects it. False once the node has stopped.
    pub fn submit(&self, payload: Vec<u8>, sender: SenderInfo) -> bool {
        self.commands.send(Command::Submit { payload, sender }).is_ok()
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.commands.send(make(reply)).map_err(|_| anyhow!("node has stopped"))?;
        rx.await.map_err(|_| anyhow!("node has stopped"))
    }

    pub async fn join(&self, topic: &str) -> Result<bool> {
        let topic = topic.to_string();
        self.request(|reply| Command::Join { topic, reply }).await?
    }

    pub async fn leave(&self, topic: &str) -> Result<bool> {
        let topic = topic.to_string();
        self.request(|reply| Command::Leave { topic, reply }).await?
    }

    pub async fn publish(&self, topic: &str, msg: Vec<u8>) -> bool {
        let topic = topic.to_string();
        self.request(|reply| Command::Publish { topic, msg, reply }).await.unwrap_or(false)
    }

    /// Encodes `record` and publishes it on the primary topic.
    pub async fn publish_record(&self, record: &OrdinaryRecord) -> Result<bool> {
        let bytes = record.encode()?;
        Ok(self.publish(&self.primary_topic, bytes).await)
    }

    pub async fn rotate(&self) -> Result<EpochId> {
        self.request(|reply| Command::Rotate { reply }).await
    }

    pub async fn stats(&self) -> Result<Stats> {
        self.request(|reply| Command::Stats { reply }).await
    }

    pub async fn snapshot(&self) -> Result<PoolSnapshot> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    pub fn get(&self, id: &ContentId) -> Result<Option<Vec<u8>>> { self.store.get(id) }

    pub fn put(&self, bytes: &[u8]) -> Result<ContentId> { self.store.put(bytes) }

    pub fn metrics(&self) -> &Metrics { &self.metrics }

    /// Asks the actor to stop the rotation timer and the inbound loop and
    /// leave every topic. Returns without waiting; see [`NodeHandle::stop`].
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    /// Shuts down and waits until the actor has left its topics and exited.
    pub async fn stop(&self) {
        self.shutdown();
        let mut stopped = self.stopped.clone();
        // Err means the actor is already gone.
        let _ = stopped.wait_for(|done| *done).await;
    }
}

/// Starts the node actor. The transport in `caps` must deliver into
/// `inbound.sender()`.
pub fn spawn(cfg: &Config, caps: Capabilities, inbound: Inbound) -> Result<(NodeHandle, Settlement)> {
    let metrics = Metrics::new()?;
    let (events, _) = broadcast::channel(EVENT_BUFFER);
    let (epochs_tx, epochs) = mpsc::unbounded_channel();
    let (pending_tx, pending) = mpsc::unbounded_channel();
    let (shutdown, mut shutdown_rx) = broadcast::channel::<()>(1);
    let (stopped_tx, stopped) = watch::channel(false);
    let (command_tx, mut command_rx) = mpsc::unbounded_channel();
    let (_, mut inbound_rx) = inbound.split();

    let mut state = NodeState {
        filter: Filter::new(&cfg.gossip),
        gossip: GossipAdapter::new(caps.transport),
        router: Router::new(&cfg.gossip),
        pool: PendingPool::new(cfg.epoch.account_cap),
        verifier: caps.verifier,
        network_id: cfg.node.network_id,
        events: events.clone(),
        epochs: epochs_tx,
        pending_tx,
        metrics: metrics.clone(),
        peers_seen: HashSet::new(),
        connected: 0,
        announced: false,
        accepted: 0,
        pending: 0,
        rejected: BTreeMap::new(),
    };
    let schedule = RotationSchedule::from_config(&cfg.epoch);

    tokio::spawn(async move {
        let mut rng = StdRng::from_entropy();
        state.rotate();
        let timer = time::sleep(schedule.next_period(&mut rng));
        tokio::pin!(timer);

        loop {
            // Timer before traffic so a backlog cannot hold back rotation.
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                _ = &mut timer => {
                    state.rotate();
                    timer.as_mut().reset(time::Instant::now() + schedule.next_period(&mut rng));
                }
                Some(event) = inbound_rx.recv() => {
                    state.on_transport(event);
                    for _ in 1..INBOUND_BURST {
                        match inbound_rx.try_recv() {
                            Ok(event) => state.on_transport(event),
                            Err(_) => break,
                        }
                    }
                    // Requests queued meanwhile get their turn before the next burst.
                    while let Ok(command) = command_rx.try_recv() {
                        state.on_command(command);
                    }
                }
                Some(command) = command_rx.recv() => state.on_command(command),
            }
        }
        state.gossip.leave_all();
        info!("node stopped");
        let _ = stopped_tx.send(true);
    });

    let handle = NodeHandle {
        commands: command_tx,
        events,
        shutdown,
        stopped,
        store: caps.store,
        metrics,
        primary_topic: cfg.gossip.primary_topic.clone(),
    };
    Ok((handle, Settlement { epochs, pending }))
}

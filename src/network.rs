//! libp2p gossipsub transport.
//!
//! A swarm task owns the QUIC transport and the gossipsub behaviour; the
//! [`Network`] handle only queues commands for it, and everything the swarm
//! hears is forwarded as a [`TransportEvent`].

use crate::{
    config,
    transport::{PeerIdentity, SenderInfo, Transport, TransportEvent},
};
use anyhow::{anyhow, Context, Result};
use libp2p::gossipsub::{
    AllowAllSubscriptionFilter, Behaviour as Gossipsub, Event as GossipsubEvent, IdentTopic,
    IdentityTransform, MessageAuthenticity, PublishError,
};
use libp2p::{
    core::muxing::StreamMuxerBox, futures::StreamExt, gossipsub, identity, quic,
    swarm::SwarmEvent, Multiaddr, PeerId, Swarm, Transport as _,
};
use std::collections::{HashSet, VecDeque};
use std::{fs, path::Path, sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug)]
enum NetworkCommand {
    Subscribe(String),
    Unsubscribe(String),
    Publish { topic: String, data: Vec<u8> },
}

pub struct Network {
    command_tx: mpsc::UnboundedSender<NetworkCommand>,
    peer_id: PeerId,
}

impl Network {
    pub fn peer_id(&self) -> PeerId { self.peer_id }

    fn send(&self, command: NetworkCommand) -> Result<()> {
        self.command_tx.send(command).map_err(|_| anyhow!("network task has stopped"))
    }
}

impl Transport for Network {
    fn join(&self, topic: &str) -> Result<()> {
        self.send(NetworkCommand::Subscribe(topic.to_string()))
    }

    fn leave(&self, topic: &str) -> Result<()> {
        self.send(NetworkCommand::Unsubscribe(topic.to_string()))
    }

    fn publish(&self, topic: &str, bytes: Vec<u8>) -> Result<()> {
        self.send(NetworkCommand::Publish { topic: topic.to_string(), data: bytes })
    }
}

/// Loads the gossip keypair from `path`, generating and persisting one on
/// first run.
pub fn load_or_create_peer_identity(path: &Path) -> Result<identity::Keypair> {
    if path.exists() {
        let key_data = fs::read(path)
            .with_context(|| format!("couldn't read identity file {}", path.display()))?;
        return identity::Keypair::from_protobuf_encoding(&key_data)
            .with_context(|| format!("corrupt identity file {}", path.display()));
    }
    let keypair = identity::Keypair::generate_ed25519();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, keypair.to_protobuf_encoding()?)
        .with_context(|| format!("couldn't write identity file {}", path.display()))?;
    Ok(keypair)
}

pub fn peer_id_string(path: &Path) -> Result<String> {
    let keys = load_or_create_peer_identity(path)?;
    Ok(PeerId::from(keys.public()).to_string())
}

/// Port to try after `port` is taken; `None` past 65535.
pub fn next_listen_port(port: u16) -> Option<u16> {
    port.checked_add(1)
}

fn publish_or_queue(
    swarm: &mut Swarm<Gossipsub<IdentityTransform, AllowAllSubscriptionFilter>>,
    queued: &mut VecDeque<(String, Vec<u8>)>,
    topic: String,
    data: Vec<u8>,
) {
    match swarm.behaviour_mut().publish(IdentTopic::new(topic.as_str()), data.clone()) {
        Ok(_) => {}
        Err(PublishError::InsufficientPeers) => queued.push_back((topic, data)),
        Err(PublishError::Duplicate) => debug!("skipped duplicate publish on {}", topic),
        Err(e) => warn!("failed to publish on {}: {}", topic, e),
    }
}

pub async fn spawn(net_cfg: config::Net, events: mpsc::UnboundedSender<TransportEvent>) -> Result<Arc<Network>> {
    let id_keys = load_or_create_peer_identity(&net_cfg.resolved_identity_path())?;
    let peer_id = PeerId::from(id_keys.public());
    info!("local peer id: {}", peer_id);

    let transport = quic::tokio::Transport::new(quic::Config::new(&id_keys))
        .map(|(peer_id, muxer), _| (peer_id, StreamMuxerBox::new(muxer)))
        .boxed();

    let gossipsub_config = gossipsub::ConfigBuilder::default()
        .heartbeat_interval(Duration::from_secs(1))
        .validation_mode(gossipsub::ValidationMode::Strict)
        .mesh_n_low(0)
        .mesh_outbound_min(0)
        .flood_publish(true)
        .build()
        .map_err(|e| anyhow!("invalid gossipsub config: {}", e))?;

    let gs: Gossipsub<IdentityTransform, AllowAllSubscriptionFilter> = Gossipsub::new(
        MessageAuthenticity::Signed(id_keys.clone()),
        gossipsub_config,
    ).map_err(|e| anyhow!(e))?;

    let mut swarm = Swarm::new(
        transport,
        gs,
        peer_id,
        libp2p::swarm::Config::with_tokio_executor()
            .with_idle_connection_timeout(Duration::from_secs(20)),
    );

    let mut port = net_cfg.listen_port;
    loop {
        let listen_addr = format!("/ip4/0.0.0.0/udp/{}/quic-v1", port);
        match swarm.listen_on(listen_addr.parse()?) {
            Ok(_) => break,
            Err(e) if e.to_string().contains("Address already in use") => {
                port = next_listen_port(port)
                    .ok_or_else(|| anyhow!("no free UDP port from {} upward", net_cfg.listen_port))?;
            }
            Err(e) => return Err(e.into()),
        }
    }

    if let Some(public_ip) = &net_cfg.public_ip {
        let external_addr: Multiaddr = format!("/ip4/{}/udp/{}/quic-v1", public_ip, port).parse()?;
        swarm.add_external_address(external_addr);
    }

    for addr in &net_cfg.bootstrap {
        info!("dialing bootstrap node {}", addr);
        if let Err(e) = swarm.dial(addr.parse::<Multiaddr>()?) {
            warn!("failed to dial bootstrap node {}: {}", addr, e);
        }
    }

    let (command_tx, mut command_rx) = mpsc::unbounded_channel();
    let net = Arc::new(Network { command_tx, peer_id });

    let mut queued: VecDeque<(String, Vec<u8>)> = VecDeque::new();
    let mut connected_peers: HashSet<PeerId> = HashSet::new();

    tokio::spawn(async move {
        loop {
            let forwarded = tokio::select! {
                event = swarm.select_next_some() => match event {
                    SwarmEvent::NewListenAddr { address, .. } => {
                        info!("listening on {}", address);
                        Ok(())
                    }
                    SwarmEvent::ConnectionEstablished { peer_id, .. } => {
                        connected_peers.insert(peer_id);
                        for (topic, data) in std::mem::take(&mut queued) {
                            publish_or_queue(&mut swarm, &mut queued, topic, data);
                        }
                        events.send(TransportEvent::Connected {
                            peer: PeerIdentity::new(peer_id.to_string()),
                            peers: connected_peers.len(),
                        })
                    }
                    SwarmEvent::ConnectionClosed { peer_id, num_established, .. } => {
                        if num_established == 0 {
                            connected_peers.remove(&peer_id);
                        }
                        events.send(TransportEvent::Disconnected {
                            peer: PeerIdentity::new(peer_id.to_string()),
                            peers: connected_peers.len(),
                        })
                    }
                    SwarmEvent::Behaviour(GossipsubEvent::Message { message, .. }) => {
                        let sender = SenderInfo {
                            public: message.source.map(|p| PeerIdentity::new(p.to_string())),
                        };
                        events.send(TransportEvent::Message { payload: message.data, sender })
                    }
                    _ => Ok(()),
                },
                Some(command) = command_rx.recv() => {
                    match command {
                        NetworkCommand::Subscribe(topic) => {
                            if let Err(e) = swarm.behaviour_mut().subscribe(&IdentTopic::new(topic.as_str())) {
                                warn!("failed to subscribe to {}: {}", topic, e);
                            }
                        }
                        NetworkCommand::Unsubscribe(topic) => {
                            if let Err(e) = swarm.behaviour_mut().unsubscribe(&IdentTopic::new(topic.as_str())) {
                                warn!("failed to unsubscribe from {}: {}", topic, e);
                            }
                        }
                        NetworkCommand::Publish { topic, data } => {
                            publish_or_queue(&mut swarm, &mut queued, topic, data);
                        }
                    }
                    Ok(())
                }
                else => break,
            };
            if forwarded.is_err() {
                debug!("node dropped its inbound channel; stopping swarm task");
                break;
            }
        }
    });

    Ok(net)
}

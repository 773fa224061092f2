//! The seam between the node and whatever peer transport carries its bytes.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

/// Public identity a peer gossips under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerIdentity(String);

impl PeerIdentity {
    pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderInfo {
    /// Unsigned or anonymous messages arrive without one.
    pub public: Option<PeerIdentity>,
}

impl SenderInfo {
    pub fn new(identity: impl Into<String>) -> Self {
        Self { public: Some(PeerIdentity::new(identity)) }
    }

    pub fn anonymous() -> Self { Self { public: None } }
}

/// What actually travels over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub topic: String,
    pub msg: Vec<u8>,
}

impl Envelope {
    pub fn new(topic: impl Into<String>, msg: Vec<u8>) -> Self {
        Self { topic: topic.into(), msg }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

/// Everything the transport reports back, delivered in arrival order.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Message { payload: Vec<u8>, sender: SenderInfo },
    Connected { peer: PeerIdentity, peers: usize },
    Disconnected { peer: PeerIdentity, peers: usize },
}

/// Topic-level control of the peer transport.
///
/// Inbound traffic does not flow through this trait: a transport is built
/// with the sending half of a `TransportEvent` channel and the node owns the
/// receiving half.
pub trait Transport: Send + Sync {
    fn join(&self, topic: &str) -> anyhow::Result<()>;
    fn leave(&self, topic: &str) -> anyhow::Result<()>;
    fn publish(&self, topic: &str, bytes: Vec<u8>) -> anyhow::Result<()>;
}

/// The inbound event channel: the transport holds clones of the sender, the
/// node owns the receiver.
pub struct Inbound {
    tx: mpsc::UnboundedSender<TransportEvent>,
    rx: mpsc::UnboundedReceiver<TransportEvent>,
}

impl Inbound {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<TransportEvent> { self.tx.clone() }

    pub fn split(self) -> (mpsc::UnboundedSender<TransportEvent>, mpsc::UnboundedReceiver<TransportEvent>) {
        (self.tx, self.rx)
    }
}

impl Default for Inbound {
    fn default() -> Self { Self::new() }
}

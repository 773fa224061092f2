//! Turns filtered envelopes into typed records.

use crate::{
    config,
    error::Rejection,
    gossip::GossipAdapter,
    record::{OrdinaryRecord, PendingRecord, Record},
    transport::{Envelope, PeerIdentity, SenderInfo},
};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    Ordinary(OrdinaryRecord),
    Pending(PendingRecord),
    /// Subscribed topic without a record schema; nothing to emit.
    Ignored { topic: String },
}

pub struct Router {
    primary_topic: String,
    validators: HashSet<PeerIdentity>,
}

impl Router {
    pub fn new(cfg: &config::Gossip) -> Self {
        Self {
            primary_topic: cfg.primary_topic.clone(),
            validators: cfg.validators.iter().cloned().map(PeerIdentity::new).collect(),
        }
    }

    pub fn primary_topic(&self) -> &str { &self.primary_topic }

    pub fn is_validator(&self, sender: &SenderInfo) -> bool {
        sender.public.as_ref().is_some_and(|id| self.validators.contains(id))
    }

    pub fn route(&self, membership: &GossipAdapter, payload: &[u8], sender: &SenderInfo) -> Result<Routed, Rejection> {
        let envelope = Envelope::from_bytes(payload)
            .map_err(|e| Rejection::MalformedEnvelope(e.to_string()))?;
        if envelope.topic.is_empty() {
            return Err(Rejection::MalformedEnvelope("missing topic".into()));
        }
        if !membership.is_member(&envelope.topic) {
            return Err(Rejection::UnknownTopic(envelope.topic));
        }
        if envelope.topic != self.primary_topic {
            return Ok(Routed::Ignored { topic: envelope.topic });
        }
        if self.is_validator(sender) {
            Ok(Routed::Pending(PendingRecord::decode(&envelope.msg)?))
        } else {
            Ok(Routed::Ordinary(OrdinaryRecord::decode(&envelope.msg)?))
        }
    }
}

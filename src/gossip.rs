//! Topic membership on top of a [`Transport`].

use crate::transport::{Envelope, Transport};
use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::{info, warn};

pub struct GossipAdapter {
    transport: Arc<dyn Transport>,
    topics: Vec<String>,
}

impl GossipAdapter {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport, topics: Vec::new() }
    }

    /// Returns true when the topic was newly joined.
    pub fn join(&mut self, topic: &str) -> Result<bool> {
        if topic.is_empty() {
            bail!("topic must be a non-empty string");
        }
        if self.is_member(topic) {
            return Ok(false);
        }
        self.transport.join(topic)?;
        self.topics.push(topic.to_string());
        info!("joined topic {}", topic);
        Ok(true)
    }

    /// Returns true when the topic was a member.
    pub fn leave(&mut self, topic: &str) -> Result<bool> {
        let Some(pos) = self.topics.iter().position(|t| t == topic) else {
            return Ok(false);
        };
        self.topics.remove(pos);
        self.transport.leave(topic)?;
        info!("left topic {}", topic);
        Ok(true)
    }

    pub fn leave_all(&mut self) {
        for topic in std::mem::take(&mut self.topics) {
            if let Err(e) = self.transport.leave(&topic) {
                warn!("failed to leave {}: {}", topic, e);
            }
        }
    }

    /// Wraps `msg` in an envelope and hands it to the transport. False when
    /// not subscribed to `topic` or the transport refuses it.
    pub fn publish(&self, topic: &str, msg: Vec<u8>) -> bool {
        if !self.is_member(topic) {
            return false;
        }
        let bytes = match Envelope::new(topic, msg).to_bytes() {
            Ok(b) => b,
            Err(e) => {
                warn!("failed to encode envelope for {}: {}", topic, e);
                return false;
            }
        };
        match self.transport.publish(topic, bytes) {
            Ok(()) => true,
            Err(e) => {
                warn!("failed to publish on {}: {}", topic, e);
                false
            }
        }
    }

    pub fn is_member(&self, topic: &str) -> bool {
        self.topics.iter().any(|t| t == topic)
    }

    pub fn topics(&self) -> &[String] { &self.topics }
}

// Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use optract::{
    config::{self, Config},
    record::SignablePayload,
    Envelope, OrdinaryRecord, Signature, Transport, Verifier,
};

pub const VALIDATOR: &str = "validator-1";

pub struct AcceptAll;

impl Verifier for AcceptAll {
    fn verify(&self, _payload: &SignablePayload) -> bool { true }
}

pub struct RejectAll;

impl Verifier for RejectAll {
    fn verify(&self, _payload: &SignablePayload) -> bool { false }
}

/// Accepts everything and counts how often it was asked.
#[derive(Default)]
pub struct CountingVerifier {
    pub calls: AtomicUsize,
}

impl Verifier for CountingVerifier {
    fn verify(&self, _payload: &SignablePayload) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        true
    }
}

/// Transport that remembers every call instead of touching the network.
#[derive(Default)]
pub struct RecordingTransport {
    pub joined: Mutex<Vec<String>>,
    pub left: Mutex<Vec<String>>,
    pub published: Mutex<Vec<(String, Vec<u8>)>>,
}

impl Transport for RecordingTransport {
    fn join(&self, topic: &str) -> anyhow::Result<()> {
        self.joined.lock().unwrap().push(topic.to_string());
        Ok(())
    }

    fn leave(&self, topic: &str) -> anyhow::Result<()> {
        self.left.lock().unwrap().push(topic.to_string());
        Ok(())
    }

    fn publish(&self, topic: &str, bytes: Vec<u8>) -> anyhow::Result<()> {
        self.published.lock().unwrap().push((topic.to_string(), bytes));
        Ok(())
    }
}

pub fn recording_transport() -> Arc<RecordingTransport> {
    Arc::new(RecordingTransport::default())
}

pub fn test_config() -> Config {
    config::load_from_str(&format!(
        r#"
        [net]
        listen_port = 0

        [gossip]
        validators = ["{}"]

        [epoch]
        base_secs = 3600
        jitter_secs = 0

        [node]
        network_id = 7
        "#,
        VALIDATOR
    ))
    .expect("test config parses")
}

/// An ordinary record for `account` with a placeholder signature.
pub fn ordinary(account: u8, nonce: u8) -> OrdinaryRecord {
    OrdinaryRecord {
        nonce: vec![nonce],
        account: vec![account; 20],
        content: vec![0xc0; 32],
        since: vec![1],
        comment: Vec::new(),
        signature: Signature { v: vec![0x1c], r: vec![0x11; 32], s: vec![0x22; 32] },
    }
}

pub fn envelope(topic: &str, msg: Vec<u8>) -> Vec<u8> {
    Envelope::new(topic, msg).to_bytes().expect("envelope encodes")
}

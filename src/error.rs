//! Reasons an inbound message is dropped.
//!
//! None of these are fatal: every rejection is a local drop that the network
//! never hears about.

use crate::{codec::CodecError, record::Account};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("message already seen")]
    Duplicate,
    #[error("sender is sending too fast")]
    Throttled,
    #[error("message carries no sender identity")]
    MissingSender,
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),
    #[error("topic `{0}` is not subscribed")]
    UnknownTopic(String),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("record is not signed")]
    MissingSignature,
    #[error("signature does not belong to {account}")]
    BadSignature { account: Account },
    #[error("{account} already holds {cap} records")]
    CapacityExceeded { account: Account, cap: usize },
    #[error("no epoch is open")]
    NoActiveEpoch,
}

impl Rejection {
    /// Duplicate and rate-limited traffic is dropped without logging.
    pub fn is_filtered(&self) -> bool {
        matches!(self, Self::Duplicate | Self::Throttled | Self::MissingSender)
    }

    /// Stable label for counters.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Duplicate => "duplicate",
            Self::Throttled => "throttled",
            Self::MissingSender => "missing_sender",
            Self::MalformedEnvelope(_) => "malformed_envelope",
            Self::UnknownTopic(_) => "unknown_topic",
            Self::Codec(_) => "codec",
            Self::MissingSignature => "missing_signature",
            Self::BadSignature { .. } => "bad_signature",
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::NoActiveEpoch => "no_active_epoch",
        }
    }
}

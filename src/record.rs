//! Typed views over the three wire schemas.

use crate::codec::{self, CodecError, Fields, Schema, SIGNATURE_FIELDS};
use std::fmt;

/// Recoverable signature carried by every record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub v: Vec<u8>,
    pub r: Vec<u8>,
    pub s: Vec<u8>,
}

impl Default for Signature {
    fn default() -> Self {
        Self { v: vec![0x1c], r: Vec::new(), s: Vec::new() }
    }
}

impl Signature {
    pub fn is_present(&self) -> bool {
        !self.v.is_empty() && !self.r.is_empty() && !self.s.is_empty()
    }

    fn write(&self, fields: &mut Fields) {
        fields.set("v", self.v.clone());
        fields.set("r", self.r.clone());
        fields.set("s", self.s.clone());
    }

    fn read(fields: &mut Fields) -> Self {
        Self { v: fields.take("v"), r: fields.take("r"), s: fields.take("s") }
    }
}

/// Pool key for an ordinary record's author.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Account(Vec<u8>);

impl Account {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self { Self(bytes.into()) }
    pub fn as_bytes(&self) -> &[u8] { &self.0 }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

/// Everything a signature commits to, in one canonical byte layout per
/// schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignablePayload {
    pub schema: &'static str,
    pub body: Vec<(&'static str, Vec<u8>)>,
    /// Value of the field naming the expected signer.
    pub signer: Vec<u8>,
    pub signature: Signature,
    pub network_id: u64,
}

impl SignablePayload {
    /// `schema ‖ 0x00 ‖ (len ‖ value)* ‖ network_id (big-endian)`
    pub fn message(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.schema.len() + 1 + self.body.len() * 33 + 8);
        out.extend_from_slice(self.schema.as_bytes());
        out.push(0);
        for (_, value) in &self.body {
            out.push(value.len() as u8);
            out.extend_from_slice(value);
        }
        out.extend_from_slice(&self.network_id.to_be_bytes());
        out
    }

    pub fn digest(&self) -> [u8; 32] {
        crate::crypto::keccak256(&self.message())
    }
}

pub trait Record: Sized {
    const SCHEMA: Schema;
    /// Field holding the address the signature must recover to.
    const SIGNER: &'static str;

    fn to_fields(&self) -> Fields;
    fn from_fields(fields: Fields) -> Self;
    fn signature(&self) -> &Signature;

    fn encode(&self) -> Result<Vec<u8>, CodecError> {
        codec::encode(&Self::SCHEMA, &self.to_fields())
    }

    fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        codec::decode(&Self::SCHEMA, bytes).map(Self::from_fields)
    }

    fn signable(&self, network_id: u64) -> Result<SignablePayload, CodecError> {
        let canonical = codec::canonicalize(&Self::SCHEMA, &self.to_fields())?;
        let body = Self::SCHEMA
            .fields
            .iter()
            .filter(|f| !SIGNATURE_FIELDS.contains(&f.name))
            .map(|f| (f.name, canonical.get(f.name).unwrap_or_default().to_vec()))
            .collect();
        Ok(SignablePayload {
            schema: Self::SCHEMA.name,
            body,
            signer: canonical.get(Self::SIGNER).unwrap_or_default().to_vec(),
            signature: self.signature().clone(),
            network_id,
        })
    }
}

/// A vote on a piece of content, gossiped by ordinary accounts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrdinaryRecord {
    pub nonce: Vec<u8>,
    pub account: Vec<u8>,
    /// Storage identifier of the referenced media.
    pub content: Vec<u8>,
    pub since: Vec<u8>,
    /// Optional storage identifier of a comment.
    pub comment: Vec<u8>,
    pub signature: Signature,
}

impl OrdinaryRecord {
    pub fn account(&self) -> Account {
        Account::new(self.account.clone())
    }
}

impl Record for OrdinaryRecord {
    const SCHEMA: Schema = codec::ORDINARY;
    const SIGNER: &'static str = "account";

    fn to_fields(&self) -> Fields {
        let mut f = Fields::new()
            .with("nonce", self.nonce.clone())
            .with("account", self.account.clone())
            .with("content", self.content.clone())
            .with("since", self.since.clone())
            .with("comment", self.comment.clone());
        self.signature.write(&mut f);
        f
    }

    fn from_fields(mut f: Fields) -> Self {
        Self {
            nonce: f.take("nonce"),
            account: f.take("account"),
            content: f.take("content"),
            since: f.take("since"),
            comment: f.take("comment"),
            signature: Signature::read(&mut f),
        }
    }

    fn signature(&self) -> &Signature { &self.signature }
}

/// A validator's pending-batch record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PendingRecord {
    pub nonce: Vec<u8>,
    pub pending: Vec<u8>,
    pub validator: Vec<u8>,
    /// Storage identifier chaining to the previous cache.
    pub cache: Vec<u8>,
    pub since: Vec<u8>,
    pub signature: Signature,
}

impl Record for PendingRecord {
    const SCHEMA: Schema = codec::PENDING;
    const SIGNER: &'static str = "validator";

    fn to_fields(&self) -> Fields {
        let mut f = Fields::new()
            .with("nonce", self.nonce.clone())
            .with("pending", self.pending.clone())
            .with("validator", self.validator.clone())
            .with("cache", self.cache.clone())
            .with("since", self.since.clone());
        self.signature.write(&mut f);
        f
    }

    fn from_fields(mut f: Fields) -> Self {
        Self {
            nonce: f.take("nonce"),
            pending: f.take("pending"),
            validator: f.take("validator"),
            cache: f.take("cache"),
            since: f.take("since"),
            signature: Signature::read(&mut f),
        }
    }

    fn signature(&self) -> &Signature { &self.signature }
}

/// Settlement summary a validator publishes for an origin address.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SummaryRecord {
    pub validator: Vec<u8>,
    pub origin_address: Vec<u8>,
    pub start: Vec<u8>,
    pub end: Vec<u8>,
    pub spend: Vec<u8>,
    pub gain: Vec<u8>,
    pub accu_rewards: Vec<u8>,
    pub signature: Signature,
}

impl Record for SummaryRecord {
    const SCHEMA: Schema = codec::SUMMARY;
    const SIGNER: &'static str = "validator";

    fn to_fields(&self) -> Fields {
        let mut f = Fields::new()
            .with("validator", self.validator.clone())
            .with("originAddress", self.origin_address.clone())
            .with("start", self.start.clone())
            .with("end", self.end.clone())
            .with("spend", self.spend.clone())
            .with("gain", self.gain.clone())
            .with("accuRewards", self.accu_rewards.clone());
        self.signature.write(&mut f);
        f
    }

    fn from_fields(mut f: Fields) -> Self {
        Self {
            validator: f.take("validator"),
            origin_address: f.take("originAddress"),
            start: f.take("start"),
            end: f.take("end"),
            spend: f.take("spend"),
            gain: f.take("gain"),
            accu_rewards: f.take("accuRewards"),
            signature: Signature::read(&mut f),
        }
    }

    fn signature(&self) -> &Signature { &self.signature }
}

//! Signature verification seam and the secp256k1 implementation the node
//! ships with.

use crate::record::{SignablePayload, Signature as RecordSignature};
use anyhow::{anyhow, Result};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use sha3::{Digest, Keccak256};

/// 20-byte account address: the tail of keccak256(uncompressed pubkey).
pub type Address = [u8; 20];

/// Decides whether a record's signature is genuine.
pub trait Verifier: Send + Sync {
    fn verify(&self, payload: &SignablePayload) -> bool;
}

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Hashes gossip payloads for replay suppression.
pub fn content_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

pub fn address_from_pubkey(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    // Skip the 0x04 prefix.
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    address
}

fn parse_recovery_id(v: &[u8]) -> Result<RecoveryId> {
    let id = match v {
        [0] | [27] => 0,
        [1] | [28] => 1,
        _ => return Err(anyhow!("invalid recovery id {}", hex::encode(v))),
    };
    RecoveryId::try_from(id).map_err(|_| anyhow!("invalid recovery id {}", id))
}

/// Recovers the signing address of `payload`.
pub fn recover_address(payload: &SignablePayload) -> Result<Address> {
    let sig = &payload.signature;
    if sig.r.len() != 32 || sig.s.len() != 32 {
        return Err(anyhow!("r and s must be 32 bytes"));
    }
    let recovery_id = parse_recovery_id(&sig.v)?;
    let mut rs = [0u8; 64];
    rs[..32].copy_from_slice(&sig.r);
    rs[32..].copy_from_slice(&sig.s);
    let signature = Signature::from_slice(&rs).map_err(|e| anyhow!("malformed signature: {}", e))?;
    let key = VerifyingKey::recover_from_prehash(&payload.digest(), &signature, recovery_id)
        .map_err(|e| anyhow!("public key recovery failed: {}", e))?;
    Ok(address_from_pubkey(&key))
}

/// Produces a signature for `payload` that [`EcdsaVerifier`] accepts when the
/// payload's signer field holds this key's address.
pub fn sign_payload(key: &SigningKey, payload: &SignablePayload) -> Result<RecordSignature> {
    let (signature, recovery_id) = key
        .sign_prehash_recoverable(&payload.digest())
        .map_err(|e| anyhow!("signing failed: {}", e))?;
    let bytes = signature.to_bytes();
    Ok(RecordSignature {
        v: vec![recovery_id.to_byte() + 27],
        r: bytes[..32].to_vec(),
        s: bytes[32..].to_vec(),
    })
}

/// Verifies by recovering the secp256k1 signer and comparing it with the
/// record's signer field.
#[derive(Debug, Clone, Copy, Default)]
pub struct EcdsaVerifier;

impl Verifier for EcdsaVerifier {
    fn verify(&self, payload: &SignablePayload) -> bool {
        match recover_address(payload) {
            Ok(address) => address.as_slice() == payload.signer.as_slice(),
            Err(e) => {
                tracing::debug!("signature rejected: {}", e);
                false
            }
        }
    }
}

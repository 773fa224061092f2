// secp256k1 record signatures

mod common;

use common::ordinary;
use k256::ecdsa::SigningKey;
use optract::{
    crypto::{self, address_from_pubkey, sign_payload},
    EcdsaVerifier, OrdinaryRecord, PendingPool, PendingRecord, Record, Verifier,
};

const NET: u64 = 4;

fn signed_ordinary(key: &SigningKey, nonce: u8) -> OrdinaryRecord {
    let mut record = ordinary(0, nonce);
    record.account = address_from_pubkey(key.verifying_key()).to_vec();
    let payload = record.signable(NET).expect("record is well-formed");
    record.signature = sign_payload(key, &payload).expect("signing succeeds");
    record
}

#[test]
fn test_signed_record_verifies() {
    let key = SigningKey::random(&mut rand::thread_rng());
    let record = signed_ordinary(&key, 1);

    assert!(record.signature.v == vec![27] || record.signature.v == vec![28]);
    assert!(EcdsaVerifier.verify(&record.signable(NET).unwrap()));
    println!("✅ recovered signer matches the account field");
}

#[test]
fn test_signature_survives_the_wire() {
    let key = SigningKey::random(&mut rand::thread_rng());
    let record = signed_ordinary(&key, 9);

    let decoded = OrdinaryRecord::decode(&record.encode().unwrap()).unwrap();
    assert!(EcdsaVerifier.verify(&decoded.signable(NET).unwrap()));
}

#[test]
fn test_tampered_record_fails() {
    let key = SigningKey::random(&mut rand::thread_rng());
    let mut record = signed_ordinary(&key, 1);
    record.content = vec![0xee; 32];

    assert!(!EcdsaVerifier.verify(&record.signable(NET).unwrap()));
}

#[test]
fn test_signature_is_bound_to_network() {
    let key = SigningKey::random(&mut rand::thread_rng());
    let record = signed_ordinary(&key, 1);

    assert!(!EcdsaVerifier.verify(&record.signable(NET + 1).unwrap()));
}

#[test]
fn test_signature_from_other_key_fails() {
    let key = SigningKey::random(&mut rand::thread_rng());
    let other = SigningKey::random(&mut rand::thread_rng());
    let mut record = signed_ordinary(&key, 1);
    record.account = address_from_pubkey(other.verifying_key()).to_vec();

    assert!(!EcdsaVerifier.verify(&record.signable(NET).unwrap()));
}

#[test]
fn test_malformed_signature_fails_without_panicking() {
    let key = SigningKey::random(&mut rand::thread_rng());

    let mut bad_v = signed_ordinary(&key, 1);
    bad_v.signature.v = vec![5];
    assert!(!EcdsaVerifier.verify(&bad_v.signable(NET).unwrap()));

    let mut short_r = signed_ordinary(&key, 2);
    short_r.signature.r = vec![1; 16];
    assert!(!EcdsaVerifier.verify(&short_r.signable(NET).unwrap()));

    let mut zero_s = signed_ordinary(&key, 3);
    zero_s.signature.s = vec![0; 32];
    assert!(!EcdsaVerifier.verify(&zero_s.signable(NET).unwrap()));
}

#[test]
fn test_pending_record_signed_by_validator() {
    let key = SigningKey::random(&mut rand::thread_rng());
    let mut record = PendingRecord {
        nonce: vec![1],
        pending: vec![0x77; 32],
        validator: address_from_pubkey(key.verifying_key()).to_vec(),
        cache: vec![0x44; 32],
        since: vec![2],
        ..PendingRecord::default()
    };
    record.signature = sign_payload(&key, &record.signable(NET).unwrap()).unwrap();

    assert!(EcdsaVerifier.verify(&record.signable(NET).unwrap()));
}

#[test]
fn test_pool_accepts_genuinely_signed_records() {
    let key = SigningKey::random(&mut rand::thread_rng());
    let mut pool = PendingPool::new(12);
    pool.rotate(1_000);

    assert!(pool.admit(signed_ordinary(&key, 1), &EcdsaVerifier, NET).is_ok());

    let mut forged = signed_ordinary(&key, 2);
    forged.nonce = vec![3];
    assert!(pool.admit(forged, &EcdsaVerifier, NET).is_err());
    assert_eq!(pool.len(), 1);
}

#[test]
fn test_hash_helpers() {
    // keccak256("") is a well-known constant
    assert_eq!(
        hex::encode(crypto::keccak256(b"")),
        "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
    );
    assert_eq!(crypto::content_hash(b"abc"), crypto::content_hash(b"abc"));
    assert_ne!(crypto::content_hash(b"abc"), crypto::content_hash(b"abd"));
}

// Pending pool: per-account cap, epoch rotation and admission order

mod common;

use common::{ordinary, AcceptAll, CountingVerifier, RejectAll};
use optract::{Account, PendingPool, Rejection, Signature};
use std::sync::atomic::Ordering;

const NET: u64 = 7;

#[test]
fn test_admit_requires_open_epoch() {
    let mut pool = PendingPool::new(12);
    assert_eq!(pool.admit(ordinary(1, 1), &AcceptAll, NET), Err(Rejection::NoActiveEpoch));
    assert!(pool.is_empty());
}

#[test]
fn test_account_cap_is_twelve_records() {
    println!("🧪 Filling one account past its cap...");
    let mut pool = PendingPool::new(12);
    pool.rotate(1_000);

    for nonce in 0..12 {
        assert!(pool.admit(ordinary(0xaa, nonce), &AcceptAll, NET).is_ok(), "record {} fits", nonce);
    }
    let account = Account::new(vec![0xaa; 20]);
    assert_eq!(
        pool.admit(ordinary(0xaa, 12), &AcceptAll, NET),
        Err(Rejection::CapacityExceeded { account: account.clone(), cap: 12 })
    );
    assert_eq!(pool.held(&account), 12);
    assert_eq!(pool.len(), 12);

    // other accounts are unaffected
    assert!(pool.admit(ordinary(0xbb, 0), &AcceptAll, NET).is_ok());
    println!("✅ 13th record rejected, other accounts still admitted");
}

#[test]
fn test_cap_counts_records_carried_in_past() {
    let mut pool = PendingPool::new(12);
    pool.rotate(1_000);
    for nonce in 0..8 {
        pool.admit(ordinary(0xaa, nonce), &AcceptAll, NET).unwrap();
    }
    pool.rotate(1_040);

    for nonce in 8..12 {
        assert!(pool.admit(ordinary(0xaa, nonce), &AcceptAll, NET).is_ok());
    }
    assert!(matches!(
        pool.admit(ordinary(0xaa, 12), &AcceptAll, NET),
        Err(Rejection::CapacityExceeded { cap: 12, .. })
    ));
}

#[test]
fn test_cap_is_checked_before_signature() {
    let verifier = CountingVerifier::default();
    let mut pool = PendingPool::new(2);
    pool.rotate(1_000);

    pool.admit(ordinary(0xaa, 0), &verifier, NET).unwrap();
    pool.admit(ordinary(0xaa, 1), &verifier, NET).unwrap();
    assert!(pool.admit(ordinary(0xaa, 2), &verifier, NET).is_err());
    assert_eq!(verifier.calls.load(Ordering::SeqCst), 2, "capped record never reached the verifier");
}

#[test]
fn test_rotation_merges_current_into_past() {
    let mut pool = PendingPool::new(12);
    let first = pool.rotate(1_000);
    let r1 = ordinary(0xaa, 1);
    pool.admit(r1.clone(), &AcceptAll, NET).unwrap();

    let second = pool.rotate(1_040);
    assert_ne!(first, second);

    let snap = pool.snapshot();
    assert_eq!(snap.epoch, Some(second));
    assert!(snap.current.is_empty(), "new epoch starts empty");
    assert_eq!(snap.past.get(&Account::new(vec![0xaa; 20])), Some(&vec![r1]));
}

#[test]
fn test_rotation_appends_rather_than_overwrites() {
    let mut pool = PendingPool::new(12);
    let account = Account::new(vec![0xaa; 20]);
    let r1 = ordinary(0xaa, 1);
    let r2 = ordinary(0xaa, 2);

    pool.rotate(1_000);
    pool.admit(r1.clone(), &AcceptAll, NET).unwrap();
    pool.rotate(1_040);
    pool.admit(r2.clone(), &AcceptAll, NET).unwrap();
    pool.rotate(1_080);

    assert_eq!(pool.snapshot().past.get(&account), Some(&vec![r1, r2]));
}

#[test]
fn test_rotation_in_same_second_still_advances_epoch() {
    let mut pool = PendingPool::new(12);
    let a = pool.rotate(5_000);
    let b = pool.rotate(5_000);
    let c = pool.rotate(4_000);
    assert!(a < b && b < c, "epoch ids strictly increase: {} {} {}", a, b, c);
}

#[test]
fn test_unsigned_record_is_rejected() {
    let mut pool = PendingPool::new(12);
    pool.rotate(1_000);

    let mut record = ordinary(0xaa, 1);
    record.signature = Signature::default();
    assert_eq!(pool.admit(record, &AcceptAll, NET), Err(Rejection::MissingSignature));
}

#[test]
fn test_bad_signature_is_not_stored() {
    let mut pool = PendingPool::new(12);
    pool.rotate(1_000);

    let result = pool.admit(ordinary(0xaa, 1), &RejectAll, NET);
    assert!(matches!(result, Err(Rejection::BadSignature { .. })));
    assert!(pool.is_empty());

    // rejected admits leave no empty bucket behind after rotation
    pool.rotate(1_040);
    assert!(pool.snapshot().past.is_empty());
}

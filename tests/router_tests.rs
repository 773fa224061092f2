// Envelope routing and schema selection

mod common;

use common::{envelope, ordinary, recording_transport, VALIDATOR};
use optract::{
    config::Gossip,
    gossip::GossipAdapter,
    router::{Routed, Router},
    Record, Rejection, SenderInfo,
};

fn setup() -> (Router, GossipAdapter) {
    let cfg = Gossip { validators: vec![VALIDATOR.to_string()], ..Gossip::default() };
    let mut gossip = GossipAdapter::new(recording_transport());
    gossip.join("Optract").unwrap();
    gossip.join("Chatter").unwrap();
    (Router::new(&cfg), gossip)
}

/// Bytes that decode under both the ordinary and pending schemas.
fn ambiguous_record() -> Vec<u8> {
    let mut bytes = vec![1, 0x01];
    bytes.push(20);
    bytes.extend_from_slice(&[0xaa; 20]);
    bytes.push(20);
    bytes.extend_from_slice(&[0xbb; 20]);
    bytes.extend_from_slice(&[1, 0x05]);
    bytes.push(0);
    bytes.extend_from_slice(&[1, 0x1c]);
    bytes.push(32);
    bytes.extend_from_slice(&[0x11; 32]);
    bytes.push(32);
    bytes.extend_from_slice(&[0x22; 32]);
    bytes
}

#[test]
fn test_sender_identity_selects_schema() {
    let (router, gossip) = setup();
    let payload = envelope("Optract", ambiguous_record());

    match router.route(&gossip, &payload, &SenderInfo::new(VALIDATOR)).unwrap() {
        Routed::Pending(record) => assert_eq!(record.validator, vec![0xbb; 20]),
        other => panic!("validator traffic should be pending, got {:?}", other),
    }
    match router.route(&gossip, &payload, &SenderInfo::new("someone-else")).unwrap() {
        Routed::Ordinary(record) => assert_eq!(record.account, vec![0xaa; 20]),
        other => panic!("ordinary traffic expected, got {:?}", other),
    }
}

#[test]
fn test_ordinary_record_decodes_to_canonical_form() {
    let (router, gossip) = setup();
    let record = ordinary(0xaa, 3);
    let payload = envelope("Optract", record.encode().unwrap());

    let Routed::Ordinary(decoded) = router.route(&gossip, &payload, &SenderInfo::new("peer")).unwrap() else {
        panic!("expected an ordinary record");
    };
    assert_eq!(decoded.account, record.account);
    assert_eq!(decoded.nonce.len(), 32);
    assert_eq!(decoded.nonce[31], 3);
}

#[test]
fn test_unsubscribed_topic_is_rejected() {
    let (router, gossip) = setup();
    let payload = envelope("Elsewhere", ordinary(1, 1).encode().unwrap());

    assert_eq!(
        router.route(&gossip, &payload, &SenderInfo::new("peer")),
        Err(Rejection::UnknownTopic("Elsewhere".into()))
    );
}

#[test]
fn test_secondary_topic_is_ignored() {
    let (router, gossip) = setup();
    let payload = envelope("Chatter", b"hi".to_vec());

    assert_eq!(
        router.route(&gossip, &payload, &SenderInfo::new("peer")),
        Ok(Routed::Ignored { topic: "Chatter".into() })
    );
}

#[test]
fn test_malformed_envelopes_are_rejected() {
    let (router, gossip) = setup();
    let sender = SenderInfo::new("peer");

    assert!(matches!(
        router.route(&gossip, &[0xff, 0x01], &sender),
        Err(Rejection::MalformedEnvelope(_))
    ));
    assert!(matches!(
        router.route(&gossip, &envelope("", vec![1, 2, 3]), &sender),
        Err(Rejection::MalformedEnvelope(_))
    ));
}

#[test]
fn test_undecodable_record_is_codec_error() {
    let (router, gossip) = setup();
    let payload = envelope("Optract", vec![3, 1, 2]);

    let err = router.route(&gossip, &payload, &SenderInfo::new("peer")).unwrap_err();
    assert!(matches!(err, Rejection::Codec(_)));
    assert_eq!(err.reason(), "codec");
}

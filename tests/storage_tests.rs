// Content store and persisted gossip identity

use optract::{config, network, ContentStore, MemoryStore};
use tempfile::TempDir;

#[test]
fn test_memory_store_round_trip() {
    let store = MemoryStore::new();
    let blob = b"article body".to_vec();

    let id = store.put(&blob).expect("put succeeds");
    assert_eq!(store.get(&id).unwrap(), Some(blob.clone()));
    assert_eq!(store.put(&blob).unwrap(), id, "identical blobs share an id");
    assert_eq!(store.get(&[0u8; 32]).unwrap(), None);
}

#[test]
fn test_peer_identity_is_persisted() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("keys").join("identity");

    let first = network::peer_id_string(&path).expect("identity created");
    assert!(path.exists(), "identity file written on first run");
    let second = network::peer_id_string(&path).expect("identity reloaded");
    assert_eq!(first, second);
}

#[test]
fn test_listen_port_search_stops_at_u16_max() {
    assert_eq!(network::next_listen_port(45001), Some(45002));
    assert_eq!(network::next_listen_port(u16::MAX), None);
}

#[test]
fn test_corrupt_identity_file_is_an_error() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("identity");
    std::fs::write(&path, b"not a keypair").unwrap();

    assert!(network::load_or_create_peer_identity(&path).is_err());
}

#[test]
fn test_config_defaults_and_overrides() {
    let cfg = config::load_from_str(
        r#"
        [net]
        listen_port = 45001

        [gossip]
        validators = ["12D3KooWvalidator"]

        [node]
        network_id = 4
        "#,
    )
    .expect("config parses");

    assert_eq!(cfg.gossip.primary_topic, "Optract");
    assert_eq!(cfg.gossip.duplicate_window_secs, 10_000);
    assert_eq!(cfg.gossip.eviction_window_secs, 25_000);
    assert_eq!(cfg.gossip.throttle_window_secs, 3);
    assert_eq!(cfg.epoch.base_secs, 30);
    assert_eq!(cfg.epoch.jitter_secs, 10);
    assert_eq!(cfg.epoch.account_cap, 12);
    assert_eq!(cfg.node.network_id, 4);
    assert_eq!(cfg.gossip.validators, vec!["12D3KooWvalidator".to_string()]);
    assert!(!cfg.metrics.enabled);

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[net]\nlisten_port = 1\n").unwrap();
    assert_eq!(config::load(&path).unwrap().net.listen_port, 1);
    assert!(config::load(dir.path().join("missing.toml")).is_err());
}

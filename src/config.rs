use serde::Deserialize;
use std::{fs, path::{Path, PathBuf}};
use anyhow::{Context, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub net: Net,
    #[serde(default)]
    pub gossip: Gossip,
    #[serde(default)]
    pub epoch: Epoch,
    #[serde(default)]
    pub node: Node,
    #[serde(default)]
    pub metrics: Metrics,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Net {
    pub listen_port: u16,
    #[serde(default)]
    pub bootstrap: Vec<String>,          // multiaddrs
    #[serde(default)]
    pub public_ip: Option<String>,
    /// Keypair file holding the node's gossip identity.
    #[serde(default = "default_identity_path")]
    pub identity_path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Gossip {
    #[serde(default = "default_primary_topic")]
    pub primary_topic: String,
    #[serde(default = "default_duplicate_window")]
    pub duplicate_window_secs: u64,
    #[serde(default = "default_eviction_window")]
    pub eviction_window_secs: u64,
    #[serde(default = "default_throttle_window")]
    pub throttle_window_secs: u64,
    /// Peer identities allowed to publish pending records.
    #[serde(default)]
    pub validators: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Epoch {
    #[serde(default = "default_epoch_base")]
    pub base_secs: u64,
    #[serde(default = "default_epoch_jitter")]
    pub jitter_secs: u64,
    #[serde(default = "default_account_cap")]
    pub account_cap: usize,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Node {
    #[serde(default)]
    pub network_id: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Metrics {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for Gossip {
    fn default() -> Self {
        Self {
            primary_topic: default_primary_topic(),
            duplicate_window_secs: default_duplicate_window(),
            eviction_window_secs: default_eviction_window(),
            throttle_window_secs: default_throttle_window(),
            validators: Vec::new(),
        }
    }
}

impl Default for Epoch {
    fn default() -> Self {
        Self {
            base_secs: default_epoch_base(),
            jitter_secs: default_epoch_jitter(),
            account_cap: default_account_cap(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self { Self { enabled: false, bind: default_bind() } }
}

fn default_identity_path() -> String { ".optract_keys".into() }
fn default_primary_topic() -> String { "Optract".into() }
fn default_duplicate_window() -> u64 { 10_000 }
fn default_eviction_window() -> u64 { 25_000 }
fn default_throttle_window() -> u64 { 3 }
fn default_epoch_base() -> u64 { 30 }
fn default_epoch_jitter() -> u64 { 10 }
fn default_account_cap() -> usize { 12 }
fn default_bind() -> String { "0.0.0.0:9100".into() }

impl Net {
    /// Relative identity paths live under the user's home directory.
    pub fn resolved_identity_path(&self) -> PathBuf {
        let p = Path::new(&self.identity_path);
        if p.is_absolute() {
            return p.to_path_buf();
        }
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());
        Path::new(&home).join(p)
    }
}

/// Read the TOML file at `p` and deserialize into `Config`.
/// *Adds context* so user errors print a friendlier message.
///
/// # Errors
/// * Returns an anyhow::Error if the file cannot be read or parsed.
pub fn load<P: AsRef<Path>>(p: P) -> Result<Config> {
    let text = fs::read_to_string(&p)
        .with_context(|| format!("couldn't read config file {}", p.as_ref().display()))?;
    load_from_str(&text)
}

pub fn load_from_str(text: &str) -> Result<Config> {
    toml::from_str(text)
        .with_context(|| "invalid TOML in config file".to_string())
}

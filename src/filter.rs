//! Replay suppression and per-sender throttling, applied to every inbound
//! message before it is interpreted.

use crate::{config, crypto, error::Rejection, transport::{PeerIdentity, SenderInfo}};
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs())
}

/// Keys remembered with the unix second they were last seen.
#[derive(Debug)]
pub struct TimedSet<K> {
    entries: HashMap<K, u64>,
    window: u64,
    eviction: u64,
    last_sweep: u64,
}

impl<K: Hash + Eq> TimedSet<K> {
    pub fn new(window: u64, eviction: u64) -> Self {
        Self { entries: HashMap::new(), window, eviction, last_sweep: 0 }
    }

    /// Records `key` at `now`; false if it was already seen inside the window.
    /// A repeat inside the window still refreshes the timestamp.
    pub fn observe(&mut self, key: K, now: u64) -> bool {
        // At most one sweep per second; stale entries are already outside
        // the window, so a late sweep changes nothing observable.
        if now != self.last_sweep {
            self.sweep(now);
        }
        let fresh = match self.entries.get(&key) {
            Some(&last) => now.saturating_sub(last) >= self.window,
            None => true,
        };
        self.entries.insert(key, now);
        fresh
    }

    pub fn sweep(&mut self, now: u64) {
        let eviction = self.eviction;
        self.last_sweep = now;
        self.entries.retain(|_, last| now.saturating_sub(*last) <= eviction);
    }

    pub fn contains(&self, key: &K) -> bool { self.entries.contains_key(key) }
    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
    pub fn clear(&mut self) { self.entries.clear() }
}

#[derive(Debug)]
pub struct Filter {
    seen: TimedSet<[u8; 32]>,
    throttle: TimedSet<PeerIdentity>,
}

impl Filter {
    pub fn new(cfg: &config::Gossip) -> Self {
        Self {
            seen: TimedSet::new(cfg.duplicate_window_secs, cfg.eviction_window_secs),
            throttle: TimedSet::new(cfg.throttle_window_secs, cfg.eviction_window_secs),
        }
    }

    pub fn filter_seen(&mut self, payload: &[u8], now: u64) -> Result<(), Rejection> {
        if self.seen.observe(crypto::content_hash(payload), now) { Ok(()) } else { Err(Rejection::Duplicate) }
    }

    pub fn throttle_peer(&mut self, sender: &SenderInfo, now: u64) -> Result<(), Rejection> {
        let identity = sender.public.clone().ok_or(Rejection::MissingSender)?;
        if self.throttle.observe(identity, now) { Ok(()) } else { Err(Rejection::Throttled) }
    }

    /// Both predicates, seen-set first.
    pub fn admit(&mut self, payload: &[u8], sender: &SenderInfo, now: u64) -> Result<(), Rejection> {
        self.filter_seen(payload, now)?;
        self.throttle_peer(sender, now)
    }

    pub fn reset(&mut self) {
        self.seen.clear();
        self.throttle.clear();
    }

    pub fn seen_len(&self) -> usize { self.seen.len() }
    pub fn throttled_len(&self) -> usize { self.throttle.len() }
}

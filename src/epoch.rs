//! Epoch rotation timing.
//!
//! Every peer rotates on the same base period plus a random offset so that
//! rotations across the network do not line up.

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationSchedule {
    pub base: Duration,
    pub jitter: Duration,
}

impl RotationSchedule {
    pub fn from_config(cfg: &crate::config::Epoch) -> Self {
        Self {
            base: Duration::from_secs(cfg.base_secs),
            jitter: Duration::from_secs(cfg.jitter_secs),
        }
    }

    /// Base period plus a uniform offset in `[0, jitter]`, millisecond grained.
    pub fn next_period<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let offset = if jitter_ms == 0 { 0 } else { rng.gen_range(0..=jitter_ms) };
        self.base + Duration::from_millis(offset)
    }
}

//! Epoch-bucketed pool of accepted ordinary records.

use crate::{
    crypto::Verifier,
    error::Rejection,
    record::{Account, OrdinaryRecord, Record},
};
use std::collections::HashMap;

/// Unix second at which an epoch opened.
pub type EpochId = u64;

pub type Buckets = HashMap<Account, Vec<OrdinaryRecord>>;

#[derive(Debug, Clone, Default)]
struct Epoch {
    id: EpochId,
    records: Buckets,
}

/// Owned copy of the pool, handed to settlement consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub epoch: Option<EpochId>,
    pub past: Buckets,
    pub current: Buckets,
}

#[derive(Debug)]
pub struct PendingPool {
    past: Buckets,
    current: Option<Epoch>,
    cap: usize,
}

impl PendingPool {
    pub fn new(cap: usize) -> Self {
        Self { past: HashMap::new(), current: None, cap }
    }

    pub fn cap(&self) -> usize { self.cap }

    pub fn epoch(&self) -> Option<EpochId> {
        self.current.as_ref().map(|e| e.id)
    }

    /// Records held for `account` across `past` and the open epoch.
    pub fn held(&self, account: &Account) -> usize {
        let past = self.past.get(account).map_or(0, Vec::len);
        let current = self.current.as_ref().and_then(|e| e.records.get(account)).map_or(0, Vec::len);
        past + current
    }

    pub fn len(&self) -> usize {
        let past: usize = self.past.values().map(Vec::len).sum();
        let current: usize = self.current.as_ref().map_or(0, |e| e.records.values().map(Vec::len).sum());
        past + current
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Files `record` under its account in the open epoch. The cap is checked
    /// before the signature so that flooded accounts cost no verification.
    pub fn admit(&mut self, record: OrdinaryRecord, verifier: &dyn Verifier, network_id: u64) -> Result<Account, Rejection> {
        if !record.signature.is_present() {
            return Err(Rejection::MissingSignature);
        }
        let epoch = self.current.as_mut().ok_or(Rejection::NoActiveEpoch)?;
        let account = record.account();
        let past = self.past.get(&account).map_or(0, Vec::len);
        let bucket = epoch.records.entry(account.clone()).or_default();
        if past + bucket.len() >= self.cap {
            return Err(Rejection::CapacityExceeded { account, cap: self.cap });
        }
        let payload = record.signable(network_id)?;
        if !verifier.verify(&payload) {
            return Err(Rejection::BadSignature { account });
        }
        bucket.push(record);
        Ok(account)
    }

    /// Folds the open epoch into `past` and opens a new one at `now`. Epoch
    /// ids strictly increase even when rotations share a second.
    pub fn rotate(&mut self, now: u64) -> EpochId {
        let previous = self.current.take().map(|epoch| {
            for (account, mut records) in epoch.records {
                if records.is_empty() {
                    continue;
                }
                self.past.entry(account).or_default().append(&mut records);
            }
            epoch.id
        });
        let id = match previous {
            Some(prev) if now <= prev => prev + 1,
            _ => now,
        };
        self.current = Some(Epoch { id, records: HashMap::new() });
        id
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            epoch: self.epoch(),
            past: self.past.clone(),
            current: self.current.as_ref().map(|e| e.records.clone()).unwrap_or_default(),
        }
    }
}

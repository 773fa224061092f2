//! Content-addressed blob storage seam.
//!
//! Record fields such as `content`, `comment` and `cache` are identifiers into
//! this store; the gossip pipeline never resolves them itself.

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::Mutex;

pub type ContentId = [u8; 32];

pub trait ContentStore: Send + Sync {
    fn get(&self, id: &ContentId) -> Result<Option<Vec<u8>>>;
    fn put(&self, bytes: &[u8]) -> Result<ContentId>;
}

/// Process-local store keyed by the BLAKE3 digest of each blob.
#[derive(Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<ContentId, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }
}

impl ContentStore for MemoryStore {
    fn get(&self, id: &ContentId) -> Result<Option<Vec<u8>>> {
        let blobs = self.blobs.lock().map_err(|_| anyhow!("content store lock poisoned"))?;
        Ok(blobs.get(id).cloned())
    }

    fn put(&self, bytes: &[u8]) -> Result<ContentId> {
        let id = crate::crypto::content_hash(bytes);
        let mut blobs = self.blobs.lock().map_err(|_| anyhow!("content store lock poisoned"))?;
        blobs.entry(id).or_insert_with(|| bytes.to_vec());
        Ok(id)
    }
}

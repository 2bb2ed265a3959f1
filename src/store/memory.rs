//! In-process proof store on a sharded concurrent map.

use crate::store::{ProofStore, UsedProof};
use crate::PaywardenError;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Used-proof set held in memory for the life of the process.
///
/// Lookups and inserts only lock the shard holding the id, so unrelated
/// tokens never wait on each other.
#[derive(Debug, Default)]
pub struct MemoryProofStore {
    inner: DashMap<String, UsedProof>,
}

impl MemoryProofStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the record for `tx_id`.
    pub fn get(&self, tx_id: &str) -> Option<UsedProof> {
        self.inner.get(tx_id).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl ProofStore for MemoryProofStore {
    async fn contains(&self, tx_id: &str) -> Result<bool, PaywardenError> {
        Ok(self.inner.contains_key(tx_id))
    }

    async fn insert_if_absent(&self, proof: UsedProof) -> Result<bool, PaywardenError> {
        match self.inner.entry(proof.tx_id.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(proof);
                Ok(true)
            }
        }
    }

    async fn remove(&self, tx_id: &str) -> Result<bool, PaywardenError> {
        Ok(self.inner.remove(tx_id).is_some())
    }

    async fn len(&self) -> Result<usize, PaywardenError> {
        Ok(self.inner.len())
    }
}

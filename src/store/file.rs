//! File-backed proof store with atomic writes.
//!
//! Keeps the used-proof set under `dirs::data_dir()/<namespace>/used-proofs.json`
//! so replay protection survives a restart. The whole set is rewritten on
//! every change using temp file + rename.

use crate::store::{ProofStore, UsedProof};
use crate::PaywardenError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

const STORE_FILE_NAME: &str = "used-proofs.json";
const STORE_FORMAT_VERSION: u32 = 1;

/// On-disk layout.
#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    proofs: Vec<UsedProof>,
}

/// Durable used-proof set for single-host deployments.
///
/// Mutations are serialized by `writer` and build the next set on a copy.
/// The copy is written to disk first and only then published to `proofs`,
/// so a write that fails or is cancelled leaves the visible set unchanged.
/// Lookups only take the read lock and never wait on file I/O.
/// Not suitable for sharing between processes.
pub struct FileProofStore {
    path: PathBuf,
    proofs: RwLock<HashMap<String, UsedProof>>,
    writer: Mutex<()>,
}

impl FileProofStore {
    /// Open (or create) the store for `namespace` under the user data dir.
    pub fn open(namespace: &str) -> Result<Self, PaywardenError> {
        let base_dir = dirs::data_dir()
            .ok_or_else(|| PaywardenError::StoreIO("Could not find data directory".to_string()))?;
        Self::with_path(base_dir.join(namespace).join(STORE_FILE_NAME))
    }

    /// Open (or create) the store at an explicit file path.
    pub fn with_path(path: PathBuf) -> Result<Self, PaywardenError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                PaywardenError::StoreIO(format!("Failed to create store dir: {}", e))
            })?;
        }

        let proofs = load(&path)?;
        info!("Loaded {} used proofs from {}", proofs.len(), path.display());

        Ok(Self {
            path,
            proofs: RwLock::new(proofs),
            writer: Mutex::new(()),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, proofs: &HashMap<String, UsedProof>) -> Result<(), PaywardenError> {
        let mut list: Vec<UsedProof> = proofs.values().cloned().collect();
        list.sort_by(|a, b| a.accepted_at.cmp(&b.accepted_at).then(a.tx_id.cmp(&b.tx_id)));

        let json = serde_json::to_vec_pretty(&StoreFile {
            version: STORE_FORMAT_VERSION,
            proofs: list,
        })
        .map_err(|e| PaywardenError::StoreIO(format!("Failed to serialize store: {}", e)))?;

        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, &json)
            .await
            .map_err(|e| PaywardenError::StoreIO(format!("Failed to write temp file: {}", e)))?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| PaywardenError::StoreIO(format!("Failed to rename store file: {}", e)))?;

        debug!("Persisted {} used proofs", proofs.len());
        Ok(())
    }
}

fn load(path: &Path) -> Result<HashMap<String, UsedProof>, PaywardenError> {
    if !path.exists() {
        return Ok(HashMap::new());
    }

    let json = fs::read_to_string(path)
        .map_err(|e| PaywardenError::StoreIO(format!("Failed to read store file: {}", e)))?;
    let file: StoreFile = serde_json::from_str(&json)
        .map_err(|e| PaywardenError::StoreIO(format!("Failed to parse store file: {}", e)))?;

    if file.version != STORE_FORMAT_VERSION {
        return Err(PaywardenError::StoreIO(format!(
            "Unsupported store version {}",
            file.version
        )));
    }

    Ok(file
        .proofs
        .into_iter()
        .map(|proof| (proof.tx_id.clone(), proof))
        .collect())
}

#[async_trait]
impl ProofStore for FileProofStore {
    async fn contains(&self, tx_id: &str) -> Result<bool, PaywardenError> {
        Ok(self.proofs.read().await.contains_key(tx_id))
    }

    async fn insert_if_absent(&self, proof: UsedProof) -> Result<bool, PaywardenError> {
        let _writer = self.writer.lock().await;

        let mut next = {
            let proofs = self.proofs.read().await;
            if proofs.contains_key(&proof.tx_id) {
                return Ok(false);
            }
            proofs.clone()
        };
        next.insert(proof.tx_id.clone(), proof);

        // Not durable, so not spent.
        self.persist(&next).await?;
        *self.proofs.write().await = next;
        Ok(true)
    }

    async fn remove(&self, tx_id: &str) -> Result<bool, PaywardenError> {
        let _writer = self.writer.lock().await;

        let mut next = self.proofs.read().await.clone();
        if next.remove(tx_id).is_none() {
            return Ok(false);
        }

        self.persist(&next).await?;
        *self.proofs.write().await = next;
        Ok(true)
    }

    async fn len(&self) -> Result<usize, PaywardenError> {
        Ok(self.proofs.read().await.len())
    }
}

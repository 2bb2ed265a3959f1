//! Replay guard: the set of transaction ids already accepted as payment.
//!
//! The verifier owns one [`ProofStore`]. The default is the in-process
//! [`MemoryProofStore`]; [`FileProofStore`] keeps the set across restarts on
//! a single host. Anything shared across processes only has to provide an
//! atomic insert-if-absent.

pub mod file;
pub mod memory;

pub use file::FileProofStore;
pub use memory::MemoryProofStore;

use crate::PaywardenError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A transaction id that has been spent on a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsedProof {
    /// Canonical (lower-case) transaction id.
    pub tx_id: String,
    /// Amount the transaction carried, in the smallest unit.
    pub amount: u64,
    /// Recipient the transaction paid.
    pub recipient: String,
    /// When the proof was accepted.
    pub accepted_at: DateTime<Utc>,
}

/// Storage capability for used proofs.
#[async_trait]
pub trait ProofStore: Send + Sync {
    /// Whether `tx_id` has already been accepted.
    async fn contains(&self, tx_id: &str) -> Result<bool, PaywardenError>;

    /// Record `proof` unless its id is already present.
    ///
    /// Returns `true` if this call inserted it. Must be atomic per id: of two
    /// concurrent calls for the same id, exactly one returns `true`.
    async fn insert_if_absent(&self, proof: UsedProof) -> Result<bool, PaywardenError>;

    /// Drop `tx_id` from the set. Returns `true` if it was present.
    async fn remove(&self, tx_id: &str) -> Result<bool, PaywardenError>;

    /// Number of recorded proofs.
    async fn len(&self) -> Result<usize, PaywardenError>;
}

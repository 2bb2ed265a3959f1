//! Read-only access to the ledger-indexing service.
//!
//! The verifier only ever talks to the ledger through [`LedgerClient`], so
//! tests and alternative indexers plug in behind the same seam.

pub mod http;

use crate::protocol::models::{Balance, TransactionRecord};
use crate::PaywardenError;
use async_trait::async_trait;

/// Queries against a ledger indexer.
///
/// Every call is a single network round-trip with no retry. Failures are
/// returned as errors; implementations never substitute a default value.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Look up one transaction by id. `Ok(None)` means the indexer does not
    /// know the id.
    async fn fetch_transaction(
        &self,
        tx_id: &str,
    ) -> Result<Option<TransactionRecord>, PaywardenError>;

    /// Recent transactions touching `address`, most recent first.
    async fn fetch_account_transactions(
        &self,
        address: &str,
        limit: u32,
    ) -> Result<Vec<TransactionRecord>, PaywardenError>;

    /// Current balance of `address`.
    async fn fetch_balance(&self, address: &str) -> Result<Balance, PaywardenError>;
}

//! The verification engine: fetch, judge, and spend a proof exactly once.
//!
//! `verify` runs a fixed sequence and stops at the first failure:
//!
//! 1. replay guard lookup (cheapest, no network)
//! 2. lexical id check (no network)
//! 3. ledger lookup
//! 4. status / type / recipient / amount checks
//! 5. atomic insert into the replay guard
//!
//! Nothing is written for rejected or pending transactions, so the same id
//! can be presented again once it confirms.

use crate::client::LedgerClient;
use crate::clock::{Clock, SystemClock};
use crate::payment::PaymentDescriptor;
use crate::protocol::models::TransactionRecord;
use crate::store::{ProofStore, UsedProof};
use crate::verify::checks::check_transaction;
use crate::verify::proof::{canonical, ProofToken};
use crate::verify::{Rejection, Verification};
use crate::PaywardenError;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Polling parameters for [`VerificationEngine::wait_for_payment`].
#[derive(Debug, Clone, Copy)]
pub struct PollOptions {
    /// Pause between ledger queries.
    pub interval: Duration,
    /// Give up after this long.
    pub timeout: Duration,
    /// How many recent transactions to inspect per query.
    pub limit: u32,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(300),
            limit: 10,
        }
    }
}

/// Verifies proof tokens against a ledger and spends them in a replay guard.
///
/// Holds no configuration of its own: every call names the payment it
/// expects. Share one instance (behind an `Arc`) across all requests so they
/// see the same replay guard.
pub struct VerificationEngine {
    ledger: Arc<dyn LedgerClient>,
    store: Arc<dyn ProofStore>,
    clock: Arc<dyn Clock>,
}

impl VerificationEngine {
    /// Create an engine using the system clock.
    pub fn new(ledger: Arc<dyn LedgerClient>, store: Arc<dyn ProofStore>) -> Self {
        Self {
            ledger,
            store,
            clock: Arc::new(SystemClock),
        }
    }

    /// Create an engine with a custom clock (for testing).
    #[cfg(any(test, feature = "test-seams"))]
    pub fn new_with_clock(
        ledger: Arc<dyn LedgerClient>,
        store: Arc<dyn ProofStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ledger,
            store,
            clock,
        }
    }

    /// Verify `proof` pays for `expected`, spending it on success.
    ///
    /// # Errors
    /// - `LedgerTransport` / `LedgerStatus` - the ledger could not be queried
    /// - `ProtocolError` - the ledger answered with an inconsistent record
    /// - `StoreIO` - the replay guard could not be read or written
    ///
    /// Every judgement about the payment itself is `Ok`.
    pub async fn verify(
        &self,
        proof: &str,
        expected: &PaymentDescriptor,
    ) -> Result<Verification, PaywardenError> {
        if self.store.contains(&canonical(proof)).await? {
            warn!("Payment rejected: transaction already used: {}", proof);
            return Ok(Verification::Invalid(Rejection::AlreadyUsed));
        }

        let Some(token) = ProofToken::parse(proof) else {
            debug!("Payment rejected: invalid transaction ID format");
            return Ok(Verification::Invalid(Rejection::BadFormat));
        };

        let Some(tx) = self.ledger.fetch_transaction(token.as_str()).await? else {
            debug!("Payment rejected: transaction {} not found", token);
            return Ok(Verification::Invalid(Rejection::NotFound));
        };

        let amount = match check_transaction(&tx, expected)? {
            Ok(amount) => amount,
            Err(rejection) => {
                debug!("Payment rejected for {}: {}", token, rejection);
                return Ok(Verification::Invalid(rejection));
            }
        };

        let used = UsedProof {
            tx_id: token.into_string(),
            amount,
            recipient: expected.recipient.clone(),
            accepted_at: self.clock.now_utc(),
        };

        // A concurrent request may have spent the same id while we were
        // waiting on the ledger; only one insert wins.
        if !self.store.insert_if_absent(used.clone()).await? {
            warn!("Payment rejected: lost race for transaction {}", used.tx_id);
            return Ok(Verification::Invalid(Rejection::AlreadyUsed));
        }

        info!(
            "Payment accepted: {} ({} {} smallest units to {})",
            used.tx_id, used.amount, expected.currency, used.recipient
        );
        Ok(Verification::Valid(used))
    }

    /// Poll the recipient's history until an unspent transfer covering
    /// `expected` shows up, or `options.timeout` passes.
    ///
    /// Returns the transaction id without spending it; present it to
    /// [`verify`](Self::verify) to claim the request. Ledger errors while
    /// polling are logged and polling continues. Drop the future to cancel.
    ///
    /// # Errors
    /// `StoreIO` if the replay guard cannot be read.
    pub async fn wait_for_payment(
        &self,
        expected: &PaymentDescriptor,
        options: PollOptions,
    ) -> Result<Option<ProofToken>, PaywardenError> {
        let deadline = Instant::now() + options.timeout;

        loop {
            match self
                .ledger
                .fetch_account_transactions(&expected.recipient, options.limit)
                .await
            {
                Ok(records) => {
                    for tx in &records {
                        if let Some(token) = self.unspent_payment(tx, expected).await? {
                            info!("Observed payment {} to {}", token, expected.recipient);
                            return Ok(Some(token));
                        }
                    }
                }
                Err(e) => warn!("Polling {} failed: {}", expected.recipient, e),
            }

            let now = Instant::now();
            if now >= deadline {
                debug!("Gave up waiting for payment to {}", expected.recipient);
                return Ok(None);
            }
            tokio::time::sleep(options.interval.min(deadline - now)).await;
        }
    }

    async fn unspent_payment(
        &self,
        tx: &TransactionRecord,
        expected: &PaymentDescriptor,
    ) -> Result<Option<ProofToken>, PaywardenError> {
        let Some(token) = ProofToken::parse(&tx.tx_id) else {
            return Ok(None);
        };
        match check_transaction(tx, expected) {
            Ok(Ok(_)) => {}
            Ok(Err(_)) => return Ok(None),
            Err(e) => {
                debug!("Skipping {}: {}", token, e);
                return Ok(None);
            }
        }
        if self.store.contains(token.as_str()).await? {
            return Ok(None);
        }
        Ok(Some(token))
    }

    /// The ledger this engine queries, for balance and history lookups.
    pub fn ledger(&self) -> &Arc<dyn LedgerClient> {
        &self.ledger
    }

    /// Un-spend a proof so it can be verified again.
    #[cfg(any(test, feature = "test-seams"))]
    pub async fn forget(&self, proof: &str) -> Result<bool, PaywardenError> {
        self.store.remove(&canonical(proof)).await
    }
}

//! Test doubles: an in-memory ledger and plain request/response types.

use crate::client::LedgerClient;
use crate::gate::{GateRequest, GateResponse};
use crate::protocol::models::{Balance, TokenTransfer, TransactionRecord};
use crate::PaywardenError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Scriptable [`LedgerClient`] that counts every call.
#[derive(Debug, Default)]
pub struct StubLedger {
    transactions: Mutex<HashMap<String, TransactionRecord>>,
    history: Mutex<Vec<TransactionRecord>>,
    balance: Mutex<Balance>,
    unreachable: AtomicBool,
    calls: AtomicUsize,
}

impl StubLedger {
    /// Empty ledger that knows no transactions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a `token_transfer` record.
    pub fn transfer(tx_id: &str, status: &str, recipient: &str, amount: &str) -> TransactionRecord {
        TransactionRecord {
            tx_id: tx_id.to_string(),
            tx_status: status.to_string(),
            tx_type: "token_transfer".to_string(),
            token_transfer: Some(TokenTransfer {
                recipient_address: recipient.to_string(),
                amount: amount.to_string(),
                memo: None,
            }),
        }
    }

    /// Make `record` retrievable by its id (replaces any previous version).
    pub fn insert(&self, record: TransactionRecord) {
        self.transactions
            .lock()
            .expect("stub poisoned")
            .insert(record.tx_id.clone(), record);
    }

    /// Set the address history returned by `fetch_account_transactions`.
    pub fn set_history(&self, records: Vec<TransactionRecord>) {
        *self.history.lock().expect("stub poisoned") = records;
    }

    /// Set the balance returned by `fetch_balance`.
    pub fn set_balance(&self, balance: Balance) {
        *self.balance.lock().expect("stub poisoned") = balance;
    }

    /// Make every call fail with a transport error.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Number of calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> Result<(), PaywardenError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Give concurrent callers a chance to interleave.
        tokio::task::yield_now().await;
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(PaywardenError::LedgerTransport("stub ledger unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerClient for StubLedger {
    async fn fetch_transaction(
        &self,
        tx_id: &str,
    ) -> Result<Option<TransactionRecord>, PaywardenError> {
        self.enter().await?;
        Ok(self.transactions.lock().expect("stub poisoned").get(tx_id).cloned())
    }

    async fn fetch_account_transactions(
        &self,
        _address: &str,
        limit: u32,
    ) -> Result<Vec<TransactionRecord>, PaywardenError> {
        self.enter().await?;
        let history = self.history.lock().expect("stub poisoned");
        Ok(history.iter().take(limit as usize).cloned().collect())
    }

    async fn fetch_balance(&self, _address: &str) -> Result<Balance, PaywardenError> {
        self.enter().await?;
        Ok(*self.balance.lock().expect("stub poisoned"))
    }
}

/// Minimal [`GateRequest`].
#[derive(Debug, Clone, Default)]
pub struct TestRequest {
    path: String,
    headers: Vec<(String, String)>,
}

impl TestRequest {
    /// Request for `path` with no headers.
    pub fn get(path: &str) -> Self {
        Self {
            path: path.to_string(),
            headers: Vec::new(),
        }
    }

    /// Add a header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

impl GateRequest for TestRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn path(&self) -> &str {
        &self.path
    }
}

/// [`GateResponse`] that records what was written.
#[derive(Debug, Clone, Default)]
pub struct RecordedResponse {
    /// Status, if set.
    pub status: Option<u16>,
    /// Headers in the order they were set.
    pub headers: Vec<(String, String)>,
    /// Body, if set.
    pub body: Option<Value>,
}

impl RecordedResponse {
    /// Value of header `name`, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl GateResponse for RecordedResponse {
    fn set_status(&mut self, status: u16) {
        self.status = Some(status);
    }

    fn set_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn set_json(&mut self, body: &Value) {
        self.body = Some(body.clone());
    }
}

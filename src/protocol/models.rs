//! Hiro indexer response structs and normalized transaction views.

use crate::PaywardenError;
use serde::{Deserialize, Serialize};

/// Raw transaction as returned by `GET /extended/v1/tx/{id}`.
///
/// Only the fields the verifier reads are modelled; the indexer returns many
/// more and they are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Transaction id, `0x`-prefixed hex.
    pub tx_id: String,
    /// Raw status string (`success`, `pending`, `abort_by_response`, ...).
    pub tx_status: String,
    /// Raw type string (`token_transfer`, `contract_call`, ...).
    pub tx_type: String,
    /// Present on `token_transfer` transactions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_transfer: Option<TokenTransfer>,
}

/// Transfer payload of a `token_transfer` transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenTransfer {
    /// Receiving principal.
    pub recipient_address: String,
    /// Amount in the smallest unit, as a decimal string.
    pub amount: String,
    /// Optional hex-encoded memo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

/// Confirmation state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    /// Anchored and executed successfully.
    Success,
    /// Still in the mempool or microblock; may confirm later.
    Pending,
    /// Aborted, dropped or otherwise terminal without success.
    Failed,
}

/// Kind of transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxKind {
    /// Direct native value transfer.
    TokenTransfer,
    /// Call into a deployed contract.
    ContractCall,
    /// Contract deployment.
    SmartContract,
    /// Block reward and other system transactions.
    Other,
}

impl TxStatus {
    /// Classify a raw indexer status such as `abort_by_response`.
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "success" => TxStatus::Success,
            "pending" => TxStatus::Pending,
            _ => TxStatus::Failed,
        }
    }
}

impl TransactionRecord {
    /// Normalized status.
    pub fn status(&self) -> TxStatus {
        TxStatus::from_raw(&self.tx_status)
    }

    /// Normalized kind.
    pub fn kind(&self) -> TxKind {
        match self.tx_type.as_str() {
            "token_transfer" => TxKind::TokenTransfer,
            "contract_call" => TxKind::ContractCall,
            "smart_contract" => TxKind::SmartContract,
            _ => TxKind::Other,
        }
    }

    /// Transferred amount in the smallest unit.
    ///
    /// # Errors
    /// `ProtocolError` if the transfer payload is missing or its amount is not
    /// an unsigned integer.
    pub fn transfer_amount(&self) -> Result<u64, PaywardenError> {
        let transfer = self.transfer()?;
        transfer.amount.trim().parse::<u64>().map_err(|e| {
            PaywardenError::ProtocolError(format!(
                "transaction {} has unparseable amount {:?}: {}",
                self.tx_id, transfer.amount, e
            ))
        })
    }

    /// The transfer payload, required for `token_transfer` transactions.
    pub fn transfer(&self) -> Result<&TokenTransfer, PaywardenError> {
        self.token_transfer.as_ref().ok_or_else(|| {
            PaywardenError::ProtocolError(format!(
                "transaction {} has no token_transfer payload",
                self.tx_id
            ))
        })
    }
}

/// Page returned by `GET /extended/v1/address/{addr}/transactions`.
#[derive(Debug, Clone, Deserialize)]
pub struct AddressTransactionsPage {
    /// Page size the indexer applied.
    #[serde(default)]
    pub limit: u32,
    /// Offset of this page.
    #[serde(default)]
    pub offset: u32,
    /// Total transactions touching the address.
    #[serde(default)]
    pub total: u64,
    /// Transactions, most recent first.
    #[serde(default)]
    pub results: Vec<TransactionRecord>,
}

/// Raw body of `GET /extended/v1/address/{addr}/balances`.
#[derive(Debug, Clone, Deserialize)]
pub struct BalancesResponse {
    /// Native STX balance.
    pub stx: StxBalance,
}

/// STX portion of a balances response, in micro-STX strings.
#[derive(Debug, Clone, Deserialize)]
pub struct StxBalance {
    /// Total balance.
    pub balance: String,
    /// Amount locked by stacking.
    #[serde(default = "zero")]
    pub locked: String,
}

fn zero() -> String {
    "0".to_string()
}

/// Account balance in the smallest unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Balance {
    /// Spendable amount (total minus locked).
    pub available: u64,
    /// Amount locked by stacking.
    pub locked: u64,
}

impl Balance {
    /// Normalize a raw balances response.
    pub fn from_response(response: &BalancesResponse) -> Result<Self, PaywardenError> {
        let parse = |field: &str, value: &str| {
            value.trim().parse::<u64>().map_err(|e| {
                PaywardenError::ProtocolError(format!("invalid stx.{} {:?}: {}", field, value, e))
            })
        };
        let total = parse("balance", &response.stx.balance)?;
        let locked = parse("locked", &response.stx.locked)?;
        Ok(Self {
            available: total.saturating_sub(locked),
            locked,
        })
    }
}

/// Parse a JSON body, mapping failures to `ProtocolError`.
pub fn parse_json<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, PaywardenError> {
    serde_json::from_slice(body)
        .map_err(|e| PaywardenError::ProtocolError(format!("Failed to parse ledger response: {}", e)))
}

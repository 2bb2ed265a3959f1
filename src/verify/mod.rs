//! Payment verification: decides whether a proof token pays for a request.

pub mod checks;
pub mod engine;
pub mod proof;

pub use engine::{PollOptions, VerificationEngine};
pub use proof::ProofToken;

use crate::payment::Currency;
use crate::protocol::models::TxStatus;
use crate::store::UsedProof;
use std::fmt;

/// Why a proof does not pay. These are answers, not failures: the caller
/// sent something unacceptable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The id has already paid for a request.
    AlreadyUsed,
    /// The id is not `0x` + 64 hex digits.
    BadFormat,
    /// The ledger does not know the id.
    NotFound,
    /// The transaction has not succeeded (yet). Holds the raw status.
    Status(String),
    /// The transaction is not a direct value transfer.
    NotATransfer,
    /// The transfer went to someone else.
    WrongRecipient,
    /// A native STX transfer was presented for a price in another currency.
    WrongCurrency {
        /// Currency the price is quoted in.
        expected: Currency,
    },
    /// The transfer carried less than the price.
    InsufficientAmount {
        /// Required amount, smallest unit.
        expected: u64,
        /// Transferred amount, smallest unit.
        actual: u64,
    },
}

impl Rejection {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::AlreadyUsed => "already_used",
            Rejection::BadFormat => "bad_format",
            Rejection::NotFound => "not_found",
            Rejection::Status(_) => "not_confirmed",
            Rejection::NotATransfer => "not_a_transfer",
            Rejection::WrongRecipient => "wrong_recipient",
            Rejection::WrongCurrency { .. } => "wrong_currency",
            Rejection::InsufficientAmount { .. } => "insufficient_amount",
        }
    }

    /// Whether presenting the same id again later could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Rejection::NotFound => true,
            Rejection::Status(status) => TxStatus::from_raw(status) == TxStatus::Pending,
            _ => false,
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::AlreadyUsed => f.write_str("Transaction already used as payment"),
            Rejection::BadFormat => f.write_str("Invalid transaction ID format"),
            Rejection::NotFound => f.write_str("Transaction not found"),
            Rejection::Status(status) => write!(f, "Transaction status: {}", status),
            Rejection::NotATransfer => f.write_str("Not a token transfer"),
            Rejection::WrongRecipient => f.write_str("Wrong recipient address"),
            Rejection::WrongCurrency { expected } => {
                write!(f, "Wrong currency: expected {}, got STX", expected)
            }
            Rejection::InsufficientAmount { expected, actual } => write!(
                f,
                "Insufficient amount: expected at least {}, got {}",
                expected, actual
            ),
        }
    }
}

/// Outcome of verifying one proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// The proof pays and is now spent.
    Valid(UsedProof),
    /// The proof does not pay.
    Invalid(Rejection),
}

impl Verification {
    /// Whether the proof was accepted.
    pub fn is_valid(&self) -> bool {
        matches!(self, Verification::Valid(_))
    }

    /// The rejection, if any.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Verification::Valid(_) => None,
            Verification::Invalid(reason) => Some(reason),
        }
    }
}

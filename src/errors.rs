//! Paywarden error types.
//!
//! These are the *exceptional* failures: the verifier itself could not do its
//! job. A payment that simply does not satisfy the descriptor is not an error;
//! see [`crate::verify::Rejection`].

use thiserror::Error;

/// Errors that can occur while gating or verifying a payment.
#[derive(Debug, Error)]
pub enum PaywardenError {
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The ledger-indexing service could not be reached.
    #[error("Ledger transport error: {0}")]
    LedgerTransport(String),

    /// The ledger-indexing service answered with a non-success status.
    #[error("Ledger returned HTTP {status} for {path}")]
    LedgerStatus {
        /// HTTP status code returned by the ledger.
        status: u16,
        /// Request path that failed.
        path: String,
    },

    /// The ledger answered with a payload we could not interpret.
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Used-proof store I/O error.
    #[error("Proof store I/O error: {0}")]
    StoreIO(String),
}

impl PaywardenError {
    /// Whether this error originates from the ledger round-trip.
    ///
    /// Callers may retry the whole request later; the payment was not judged.
    pub fn is_ledger_failure(&self) -> bool {
        matches!(
            self,
            PaywardenError::LedgerTransport(_)
                | PaywardenError::LedgerStatus { .. }
                | PaywardenError::ProtocolError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_failures_are_classified() {
        assert!(PaywardenError::LedgerTransport("reset".into()).is_ledger_failure());
        assert!(PaywardenError::LedgerStatus {
            status: 503,
            path: "/extended/v1/tx/0x00".into()
        }
        .is_ledger_failure());
        assert!(!PaywardenError::ConfigError("x".into()).is_ledger_failure());
        assert!(!PaywardenError::StoreIO("disk".into()).is_ledger_failure());
    }

    #[test]
    fn status_error_message_names_path() {
        let err = PaywardenError::LedgerStatus {
            status: 502,
            path: "/extended/v1/tx/0xab".into(),
        };
        assert_eq!(err.to_string(), "Ledger returned HTTP 502 for /extended/v1/tx/0xab");
    }
}

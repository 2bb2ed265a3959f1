//! Transaction checks against a payment descriptor.
//!
//! Pure functions over an already-fetched [`TransactionRecord`]; the engine
//! decides when to fetch and when to record the proof as spent.

use crate::payment::{Currency, PaymentDescriptor};
use crate::protocol::models::{TransactionRecord, TxKind, TxStatus};
use crate::verify::Rejection;
use crate::PaywardenError;

/// Judge `tx` against `expected`.
///
/// Checks, in order: status is success, type is a direct transfer, the price
/// is quoted in STX (the only asset a direct transfer moves), recipient
/// matches exactly, amount covers the price (overpaying is fine).
///
/// # Returns
/// * `Ok(Ok(amount))` - Transaction pays; `amount` is what it carried
/// * `Ok(Err(rejection))` - Transaction does not pay
/// * `Err(ProtocolError)` - The ledger record is internally inconsistent
pub fn check_transaction(
    tx: &TransactionRecord,
    expected: &PaymentDescriptor,
) -> Result<Result<u64, Rejection>, PaywardenError> {
    if tx.status() != TxStatus::Success {
        return Ok(Err(Rejection::Status(tx.tx_status.clone())));
    }

    if tx.kind() != TxKind::TokenTransfer {
        return Ok(Err(Rejection::NotATransfer));
    }

    if expected.currency != Currency::Stx {
        return Ok(Err(Rejection::WrongCurrency {
            expected: expected.currency,
        }));
    }

    let transfer = tx.transfer()?;
    if transfer.recipient_address != expected.recipient {
        return Ok(Err(Rejection::WrongRecipient));
    }

    let actual = tx.transfer_amount()?;
    if actual < expected.amount {
        return Ok(Err(Rejection::InsufficientAmount {
            expected: expected.amount,
            actual,
        }));
    }

    Ok(Ok(actual))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::Network;
    use crate::protocol::models::TokenTransfer;

    const RECIPIENT: &str = "ST2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKQ9H6DPR";

    fn descriptor() -> PaymentDescriptor {
        PaymentDescriptor::new(RECIPIENT, "0.01", Currency::Stx, Network::Testnet).unwrap()
    }

    fn transfer(status: &str, recipient: &str, amount: &str) -> TransactionRecord {
        TransactionRecord {
            tx_id: format!("0x{}", "1".repeat(64)),
            tx_status: status.to_string(),
            tx_type: "token_transfer".to_string(),
            token_transfer: Some(TokenTransfer {
                recipient_address: recipient.to_string(),
                amount: amount.to_string(),
                memo: None,
            }),
        }
    }

    #[test]
    fn exact_amount_pays() {
        let tx = transfer("success", RECIPIENT, "10000");
        assert_eq!(check_transaction(&tx, &descriptor()).unwrap(), Ok(10_000));
    }

    #[test]
    fn overpayment_pays() {
        let tx = transfer("success", RECIPIENT, "25000");
        assert_eq!(check_transaction(&tx, &descriptor()).unwrap(), Ok(25_000));
    }

    #[test]
    fn one_unit_short_is_rejected() {
        let tx = transfer("success", RECIPIENT, "9999");
        assert_eq!(
            check_transaction(&tx, &descriptor()).unwrap(),
            Err(Rejection::InsufficientAmount { expected: 10_000, actual: 9_999 })
        );
    }

    #[test]
    fn wrong_recipient_is_rejected_regardless_of_amount() {
        let tx = transfer("success", "ST000OTHER", "999999999");
        assert_eq!(check_transaction(&tx, &descriptor()).unwrap(), Err(Rejection::WrongRecipient));
    }

    #[test]
    fn status_is_checked_first() {
        let tx = transfer("pending", "ST000OTHER", "1");
        assert_eq!(
            check_transaction(&tx, &descriptor()).unwrap(),
            Err(Rejection::Status("pending".to_string()))
        );
    }

    #[test]
    fn contract_call_is_not_a_transfer() {
        let mut tx = transfer("success", RECIPIENT, "10000");
        tx.tx_type = "contract_call".to_string();
        tx.token_transfer = None;
        assert_eq!(check_transaction(&tx, &descriptor()).unwrap(), Err(Rejection::NotATransfer));
    }

    #[test]
    fn stx_transfer_does_not_pay_sbtc_price() {
        let sbtc = PaymentDescriptor::new(RECIPIENT, "0.0001", Currency::Sbtc, Network::Mainnet).unwrap();
        assert_eq!(sbtc.amount, 10_000);

        let tx = transfer("success", RECIPIENT, "10000");
        assert_eq!(
            check_transaction(&tx, &sbtc).unwrap(),
            Err(Rejection::WrongCurrency { expected: Currency::Sbtc })
        );
    }

    #[test]
    fn stx_transfer_does_not_pay_usdcx_price() {
        let usdcx = PaymentDescriptor::new(RECIPIENT, "1", Currency::Usdcx, Network::Testnet).unwrap();
        let tx = transfer("success", RECIPIENT, "1000000");
        assert!(matches!(
            check_transaction(&tx, &usdcx).unwrap(),
            Err(Rejection::WrongCurrency { .. })
        ));
    }

    #[test]
    fn transfer_without_payload_is_protocol_error() {
        let mut tx = transfer("success", RECIPIENT, "10000");
        tx.token_transfer = None;
        assert!(matches!(check_transaction(&tx, &descriptor()), Err(PaywardenError::ProtocolError(_))));
    }
}

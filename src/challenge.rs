//! The "402 Payment Required" response.

use crate::payment::PaymentDescriptor;
use serde::Serialize;

/// Scheme name used in the `WWW-Authenticate` header and challenge body.
pub const PROTOCOL: &str = "x402-stacks";

/// Body of a payment challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Challenge {
    /// Always 402.
    pub status: u16,
    /// Always `"Payment Required"`.
    pub error: String,
    /// What to pay and where.
    pub payment: PaymentTerms,
    /// Headers the response must carry, mirrored in the body.
    pub headers: ChallengeHeaders,
}

/// Payment instructions embedded in a [`Challenge`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentTerms {
    /// [`PROTOCOL`].
    pub protocol: String,
    /// `mainnet` or `testnet`.
    pub network: String,
    /// Address to pay.
    pub recipient: String,
    /// Price in whole units, as decimal text.
    pub amount: String,
    /// Price in the currency's smallest unit.
    pub amount_in_smallest_unit: u64,
    /// Currency ticker.
    pub currency: String,
    /// Human-readable instruction line.
    pub instructions: String,
}

/// Header block of a [`Challenge`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChallengeHeaders {
    /// Value of the `WWW-Authenticate` header.
    #[serde(rename = "WWW-Authenticate")]
    pub www_authenticate: String,
}

impl Challenge {
    /// Value for the `WWW-Authenticate` response header.
    pub fn www_authenticate(&self) -> &str {
        &self.headers.www_authenticate
    }
}

/// Build the challenge for `expected`.
pub fn build_challenge(expected: &PaymentDescriptor) -> Challenge {
    let amount = expected.amount_decimal();
    let www_authenticate = format!(
        "{} amount={} currency={} address={} network={}",
        PROTOCOL, amount, expected.currency, expected.recipient, expected.network
    );
    let instructions = format!(
        "Send {} {} to {}",
        amount, expected.currency, expected.recipient
    );

    Challenge {
        status: 402,
        error: "Payment Required".to_string(),
        payment: PaymentTerms {
            protocol: PROTOCOL.to_string(),
            network: expected.network.to_string(),
            recipient: expected.recipient.clone(),
            amount,
            amount_in_smallest_unit: expected.amount,
            currency: expected.currency.to_string(),
            instructions,
        },
        headers: ChallengeHeaders { www_authenticate },
    }
}

//! What "paid" means for a protected resource.
//!
//! A [`PaymentDescriptor`] is built once from configuration and handed to
//! every verification. Amounts are held in the currency's smallest unit so
//! the minimum-amount comparison is exact integer arithmetic.

use crate::PaywardenError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stacks network a payment is expected on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Stacks mainnet.
    Mainnet,
    /// Stacks testnet.
    #[default]
    Testnet,
}

impl Network {
    /// Base URL of the public Hiro indexer for this network.
    pub fn default_api_url(&self) -> &'static str {
        match self {
            Network::Mainnet => "https://api.mainnet.hiro.so",
            Network::Testnet => "https://api.testnet.hiro.so",
        }
    }

    /// Lower-case wire name (`mainnet` / `testnet`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Currency a price is quoted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    /// Native STX, 6 decimals (micro-STX).
    #[serde(rename = "STX")]
    Stx,
    /// sBTC, 8 decimals (satoshis).
    #[serde(rename = "sBTC")]
    Sbtc,
    /// USDCx, 6 decimals.
    #[serde(rename = "USDCx")]
    Usdcx,
}

impl Currency {
    /// Number of decimal places in one whole unit.
    pub fn decimals(&self) -> u32 {
        match self {
            Currency::Stx | Currency::Usdcx => 6,
            Currency::Sbtc => 8,
        }
    }

    /// Smallest units per whole unit (10^decimals).
    pub fn scale(&self) -> u64 {
        10u64.pow(self.decimals())
    }

    /// Ticker as written in configuration and challenges.
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Stx => "STX",
            Currency::Sbtc => "sBTC",
            Currency::Usdcx => "USDCx",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The payment a protected resource requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentDescriptor {
    /// Address that must receive the transfer.
    pub recipient: String,
    /// Minimum amount, in the currency's smallest unit.
    pub amount: u64,
    /// Currency the price is quoted in.
    pub currency: Currency,
    /// Network the transfer must land on.
    pub network: Network,
}

impl PaymentDescriptor {
    /// Build a descriptor from a decimal price such as `"0.01"`.
    ///
    /// # Errors
    /// `ConfigError` if the recipient is empty or the price is not a positive
    /// decimal representable in the currency's smallest unit.
    pub fn new(
        recipient: impl Into<String>,
        price: &str,
        currency: Currency,
        network: Network,
    ) -> Result<Self, PaywardenError> {
        let recipient = recipient.into();
        if recipient.trim().is_empty() {
            return Err(PaywardenError::ConfigError(
                "payment address is not configured".to_string(),
            ));
        }

        let amount = parse_decimal(price, currency.decimals())?;
        if amount == 0 {
            return Err(PaywardenError::ConfigError(format!(
                "price must be positive, got {}",
                price
            )));
        }

        Ok(Self {
            recipient,
            amount,
            currency,
            network,
        })
    }

    /// The minimum amount as decimal text in whole units, e.g. `0.01`.
    pub fn amount_decimal(&self) -> String {
        format_units(self.amount, self.currency.decimals())
    }
}

/// Parse decimal text into an integer count of `10^-decimals` units.
///
/// Only plain `123`, `123.45` and `.5` forms are accepted. Digits beyond the
/// smallest unit are rejected rather than rounded.
pub fn parse_decimal(text: &str, decimals: u32) -> Result<u64, PaywardenError> {
    let text = text.trim();
    let invalid = || PaywardenError::ConfigError(format!("invalid decimal amount: {:?}", text));

    let (whole, frac) = match text.split_once('.') {
        Some((w, f)) => (w, f),
        None => (text, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let frac = frac.trim_end_matches('0');
    if frac.len() > decimals as usize {
        return Err(PaywardenError::ConfigError(format!(
            "amount {} has more than {} decimal places",
            text, decimals
        )));
    }

    let overflow =
        || PaywardenError::ConfigError(format!("amount {} is too large", text));
    let scale = 10u64.pow(decimals);
    let whole_units = if whole.is_empty() {
        0
    } else {
        whole.parse::<u64>().map_err(|_| overflow())?
    };
    let frac_units = if frac.is_empty() {
        0
    } else {
        frac.parse::<u64>().map_err(|_| invalid())? * 10u64.pow(decimals - frac.len() as u32)
    };

    whole_units
        .checked_mul(scale)
        .and_then(|w| w.checked_add(frac_units))
        .ok_or_else(overflow)
}

/// Render an integer count of `10^-decimals` units as minimal decimal text.
pub fn format_units(units: u64, decimals: u32) -> String {
    let scale = 10u64.pow(decimals);
    let whole = units / scale;
    let frac = units % scale;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:0width$}", frac, width = decimals as usize);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

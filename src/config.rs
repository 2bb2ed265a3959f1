//! Gate configuration.
//!
//! Field names follow the project file written by the tooling
//! (`stackpay.config.json`), so an existing file loads unchanged.

use crate::payment::{Currency, Network, PaymentDescriptor};
use crate::PaywardenError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Header that carries the proof token unless configured otherwise.
pub const DEFAULT_PROOF_HEADER: &str = "x-payment-proof";

/// Paths that never require payment (exact match).
pub const ALWAYS_EXEMPT_PATHS: &[&str] = &["/", "/health"];

/// Configuration for one gated API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateConfig {
    /// Project name, informational.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,

    /// Price per request in whole units of `currency` (e.g. `0.01`).
    pub price: f64,

    /// Currency the price is quoted in.
    pub currency: Currency,

    /// Address that must receive payments.
    /// An empty value makes every protected request fail closed.
    #[serde(default)]
    pub payment_address: String,

    /// Network payments are verified on.
    #[serde(default)]
    pub network: Network,

    /// Path prefixes that bypass the gate.
    #[serde(default)]
    pub exclude_paths: Vec<String>,

    /// Per-call ledger timeout in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_timeout_ms: Option<u64>,

    /// Header carrying the proof token. Defaults to `X-Payment-Proof`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_header: Option<String>,

    /// Override for the ledger indexer base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl GateConfig {
    /// Minimal configuration for `price` `currency` paid to `payment_address`.
    pub fn new(price: f64, currency: Currency, payment_address: impl Into<String>) -> Self {
        Self {
            project_name: None,
            price,
            currency,
            payment_address: payment_address.into(),
            network: Network::default(),
            exclude_paths: Vec::new(),
            verification_timeout_ms: None,
            proof_header: None,
            api_url: None,
        }
    }

    /// Parse configuration from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, PaywardenError> {
        serde_json::from_str(json)
            .map_err(|e| PaywardenError::ConfigError(format!("Invalid config JSON: {}", e)))
    }

    /// Load configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PaywardenError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            PaywardenError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    /// Validate configuration for obvious errors.
    pub fn validate(&self) -> Result<(), PaywardenError> {
        self.descriptor()?;
        if matches!(self.verification_timeout_ms, Some(0)) {
            return Err(PaywardenError::ConfigError(
                "verificationTimeoutMs must be greater than zero".to_string(),
            ));
        }
        if let Some(header) = &self.proof_header {
            if header.trim().is_empty() {
                return Err(PaywardenError::ConfigError(
                    "proofHeader cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// The payment every protected request must carry.
    ///
    /// The price is converted through its shortest decimal rendering, so
    /// `0.01` becomes exactly 10 000 micro-STX.
    pub fn descriptor(&self) -> Result<PaymentDescriptor, PaywardenError> {
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(PaywardenError::ConfigError(format!(
                "price must be a positive number, got {}",
                self.price
            )));
        }
        PaymentDescriptor::new(
            self.payment_address.clone(),
            &self.price.to_string(),
            self.currency,
            self.network,
        )
    }

    /// Header name carrying the proof, lower-cased.
    pub fn proof_header(&self) -> String {
        self.proof_header
            .as_deref()
            .map(str::trim)
            .unwrap_or(DEFAULT_PROOF_HEADER)
            .to_ascii_lowercase()
    }

    /// Ledger timeout, if configured.
    pub fn verification_timeout(&self) -> Option<Duration> {
        self.verification_timeout_ms.map(Duration::from_millis)
    }

    /// Ledger base URL: the override, or the network's public indexer.
    pub fn api_url(&self) -> &str {
        self.api_url
            .as_deref()
            .unwrap_or_else(|| self.network.default_api_url())
    }

    /// Whether `path` bypasses the gate.
    pub fn is_exempt(&self, path: &str) -> bool {
        ALWAYS_EXEMPT_PATHS.contains(&path)
            || self
                .exclude_paths
                .iter()
                .any(|prefix| !prefix.is_empty() && path.starts_with(prefix.as_str()))
    }
}

//! # Paywarden
//!
//! **Pay-per-request HTTP gating backed by on-chain Stacks micropayments.**
//!
//! A client pays for a request by sending a token transfer on the Stacks
//! ledger and presenting the transaction id in the `X-Payment-Proof` header.
//! Paywarden looks the transaction up through the Hiro indexer, checks that it
//! succeeded, paid the right address and carried at least the price, and then
//! records the id so it can never pay for a second request.
//!
//! ## Features
//!
//! - **Exact amounts**: prices are converted to the smallest unit from their
//!   decimal text, never through float multiplication
//! - **Replay protection**: one transaction id, one request, even under
//!   concurrent presentation
//! - **Fail-closed**: a missing payment address or unreachable ledger never
//!   lets a protected request through
//! - **x402-style challenges**: 402 responses tell the client what to pay
//! - **Pluggable replay guard**: in-memory by default, file-backed for
//!   restart-safe single-host deployments
//!
//! ## Quickstart
//!
//! ```no_run
//! use paywarden::{Currency, Decision, Gate, GateConfig, GateRequest};
//!
//! struct Request { path: String, proof: Option<String> }
//!
//! impl GateRequest for Request {
//!     fn header(&self, name: &str) -> Option<&str> {
//!         (name == "x-payment-proof").then(|| self.proof.as_deref()).flatten()
//!     }
//!     fn path(&self) -> &str {
//!         &self.path
//!     }
//! }
//!
//! # async fn run() -> Result<(), paywarden::PaywardenError> {
//! let mut config = GateConfig::new(0.01, Currency::Stx, "ST2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKQ9H6DPR");
//! config.exclude_paths = vec!["/docs".to_string()];
//!
//! let gate = Gate::new(config)?;
//! let request = Request { path: "/api/weather".into(), proof: None };
//! match gate.decide(&request).await {
//!     Decision::Pass(payment) => println!("serve request (payment: {:?})", payment),
//!     Decision::Block(blocked) => println!("answer with HTTP {}", blocked.status),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! With the `axum` feature, [`integrations::axum::require_payment`] wires a
//! gate into a router as middleware.
//!
//! ## Threat Model
//!
//! Paywarden protects against:
//! - **Replay**: a spent transaction id is rejected on every later request
//! - **Underpayment / misdirected payment**: amount and recipient are checked
//! - **Unconfirmed payment**: pending or failed transactions are rejected
//!   without being spent, so they can be presented again once confirmed
//!
//! The in-memory replay guard is per process. Run a single instance, use
//! [`store::FileProofStore`], or provide a shared [`store::ProofStore`].
//!
//! ## Configuration
//!
//! [`GateConfig`] reads the `stackpay.config.json` project file
//! (`price`, `currency`, `paymentAddress`, `network`, `excludePaths`, ...).

#![deny(missing_docs)]
#![doc(html_root_url = "https://docs.rs/paywarden/0.1.0")]

// Core modules
pub mod clock;
pub mod config;
pub mod errors;
pub mod payment;

// Protocol layer
pub mod protocol;

// Client layer
pub mod client;

// Replay guard
pub mod store;

// Verification
pub mod verify;

// Gate (main public API)
pub mod challenge;
pub mod gate;

// Optional integrations
pub mod integrations;

#[cfg(any(test, feature = "test-seams"))]
pub mod testing;

// Re-exports for public API
pub use challenge::{build_challenge, Challenge};
pub use client::http::HiroClient;
pub use client::LedgerClient;
pub use clock::{Clock, SystemClock};
pub use config::GateConfig;
pub use errors::PaywardenError;
pub use gate::{Blocked, Decision, Gate, GateRequest, GateResponse, PaymentContext, Stage};
pub use payment::{Currency, Network, PaymentDescriptor};
pub use store::{FileProofStore, MemoryProofStore, ProofStore, UsedProof};
pub use verify::{PollOptions, ProofToken, Rejection, Verification, VerificationEngine};

#[cfg(any(test, feature = "test-seams"))]
pub use clock::MockClock;

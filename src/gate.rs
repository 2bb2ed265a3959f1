//! Gate - the main public API for Paywarden.
//!
//! A [`Gate`] decides, per request, whether to let it through, answer with a
//! payment challenge, or reject it:
//! - exempt paths pass untouched
//! - no proof header: 402 with a [`Challenge`](crate::challenge::Challenge)
//! - a proof: verified, then passed with a [`PaymentContext`] or rejected
//!
//! The gate only sees requests through [`GateRequest`] and writes through
//! [`GateResponse`], so any HTTP stack can host it.

use crate::challenge::build_challenge;
use crate::client::http::HiroClient;
use crate::config::GateConfig;
use crate::payment::{Currency, PaymentDescriptor};
use crate::store::{MemoryProofStore, ProofStore};
use crate::verify::{Verification, VerificationEngine};
use crate::PaywardenError;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const VERIFICATION_FAILED: &str = "Payment could not be verified right now, try again later";

/// Read access to an inbound request.
pub trait GateRequest {
    /// Value of header `name`, which is given in lower case.
    /// Implementations must match case-insensitively.
    fn header(&self, name: &str) -> Option<&str>;

    /// Request path, without query string.
    fn path(&self) -> &str;
}

/// Write access to an outbound response.
pub trait GateResponse {
    /// Set the status code.
    fn set_status(&mut self, status: u16);

    /// Set header `name` to `value`.
    fn set_header(&mut self, name: &str, value: &str);

    /// Set a JSON body.
    fn set_json(&mut self, body: &Value);
}

/// Handed to downstream handlers after a proof was accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentContext {
    /// Always `true`: the context only exists for verified payments.
    pub verified: bool,
    /// The transaction that paid, canonical form.
    pub tx_id: String,
    /// Amount it carried, smallest unit.
    pub amount: u64,
}

/// Where a request stands before verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    /// Path bypasses the gate.
    Exempt,
    /// Protected path, no proof header (or a blank one).
    NoProof,
    /// Protected path carrying a proof.
    ProofPresent(String),
}

/// A response the gate sends instead of calling the handler.
#[derive(Debug, Clone, PartialEq)]
pub struct Blocked {
    /// HTTP status.
    pub status: u16,
    /// Extra response headers.
    pub headers: Vec<(String, String)>,
    /// JSON body.
    pub body: Value,
}

impl Blocked {
    fn new(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body,
        }
    }

    /// Write this response through `response`.
    pub fn apply<R: GateResponse + ?Sized>(&self, response: &mut R) {
        response.set_status(self.status);
        for (name, value) in &self.headers {
            response.set_header(name, value);
        }
        response.set_json(&self.body);
    }
}

/// Final outcome for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Call the handler. Carries the payment for protected paths.
    Pass(Option<PaymentContext>),
    /// Send this response instead.
    Block(Blocked),
}

impl Decision {
    /// HTTP status the client will see, `None` when the handler decides.
    pub fn status(&self) -> Option<u16> {
        match self {
            Decision::Pass(_) => None,
            Decision::Block(blocked) => Some(blocked.status),
        }
    }
}

/// Payment gate for one priced API.
///
/// Create one per application and share it (it is cheap to clone the
/// `Arc` it usually lives in). All requests see the same replay guard.
pub struct Gate {
    config: GateConfig,
    proof_header: String,
    payment: Result<PaymentDescriptor, String>,
    engine: Arc<VerificationEngine>,
}

impl Gate {
    /// Create a gate that verifies against the configured indexer and keeps
    /// spent proofs in memory.
    ///
    /// An incomplete payment configuration does not fail here; every
    /// protected request is answered with 500 until it is fixed.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: GateConfig) -> Result<Self, PaywardenError> {
        Self::with_store(config, Arc::new(MemoryProofStore::new()))
    }

    /// Like [`new`](Self::new) with a caller-chosen replay guard, e.g. a
    /// [`FileProofStore`](crate::store::FileProofStore).
    pub fn with_store(
        config: GateConfig,
        store: Arc<dyn ProofStore>,
    ) -> Result<Self, PaywardenError> {
        let mut client = HiroClient::with_base_url(config.api_url())?;
        if let Some(timeout) = config.verification_timeout() {
            client = client.try_with_timeout(timeout)?;
        }
        let engine = VerificationEngine::new(Arc::new(client), store);
        Ok(Self::with_engine(config, Arc::new(engine)))
    }

    /// Create a gate around an existing engine.
    pub fn with_engine(config: GateConfig, engine: Arc<VerificationEngine>) -> Self {
        let payment = config
            .validate()
            .and_then(|_| config.descriptor())
            .map_err(|e| {
                error!("Payment gate misconfigured, protected routes will fail: {}", e);
                e.to_string()
            });
        if let Ok(descriptor) = &payment {
            info!(
                "Payment gate ready: {} {} to {} on {}",
                descriptor.amount_decimal(),
                descriptor.currency,
                descriptor.recipient,
                descriptor.network
            );
            if descriptor.currency != Currency::Stx {
                warn!(
                    "Only native STX transfers are verified; every {} payment will be rejected",
                    descriptor.currency
                );
            }
        }

        Self {
            proof_header: config.proof_header(),
            config,
            payment,
            engine,
        }
    }

    /// Classify `request` without touching the ledger.
    pub fn stage<R: GateRequest + ?Sized>(&self, request: &R) -> Stage {
        if self.config.is_exempt(request.path()) {
            return Stage::Exempt;
        }
        match request.header(&self.proof_header).map(str::trim) {
            Some(proof) if !proof.is_empty() => Stage::ProofPresent(proof.to_string()),
            _ => Stage::NoProof,
        }
    }

    /// Decide what happens to `request`.
    pub async fn decide<R: GateRequest + ?Sized>(&self, request: &R) -> Decision {
        let stage = self.stage(request);
        self.resolve(stage).await
    }

    /// Decide the outcome for an already classified request.
    pub async fn resolve(&self, stage: Stage) -> Decision {
        if stage == Stage::Exempt {
            return Decision::Pass(None);
        }

        let descriptor = match &self.payment {
            Ok(descriptor) => descriptor,
            Err(message) => {
                return Decision::Block(Blocked::new(
                    500,
                    json!({
                        "error": "Server Configuration Error",
                        "message": message,
                    }),
                ));
            }
        };

        let proof = match stage {
            Stage::ProofPresent(proof) => proof,
            _ => {
                debug!("No payment proof, sending challenge");
                let challenge = build_challenge(descriptor);
                let mut blocked = Blocked::new(402, json!(challenge));
                blocked.headers.push((
                    "WWW-Authenticate".to_string(),
                    challenge.www_authenticate().to_string(),
                ));
                return Decision::Block(blocked);
            }
        };

        match self.engine.verify(&proof, descriptor).await {
            Ok(Verification::Valid(used)) => Decision::Pass(Some(PaymentContext {
                verified: true,
                tx_id: used.tx_id,
                amount: used.amount,
            })),
            Ok(Verification::Invalid(rejection)) => Decision::Block(Blocked::new(
                402,
                json!({
                    "status": 402,
                    "error": "Invalid Payment",
                    "message": rejection.to_string(),
                    "txId": proof,
                }),
            )),
            Err(e) => {
                if e.is_ledger_failure() {
                    warn!("Ledger unavailable while verifying {}: {}", proof, e);
                } else {
                    error!("Verification of {} failed: {}", proof, e);
                }
                Decision::Block(Blocked::new(
                    500,
                    json!({
                        "error": "Payment Verification Error",
                        "message": VERIFICATION_FAILED,
                    }),
                ))
            }
        }
    }

    /// The payment protected requests require, if configured correctly.
    pub fn descriptor(&self) -> Option<&PaymentDescriptor> {
        self.payment.as_ref().ok()
    }

    /// The engine, for `wait_for_payment` and balance lookups.
    pub fn engine(&self) -> &Arc<VerificationEngine> {
        &self.engine
    }

    /// Get the current configuration.
    pub fn config(&self) -> &GateConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::testing::{RecordedResponse, StubLedger, TestRequest};

    const PAYEE: &str = "ST2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKQ9H6DPR";

    fn tx(c: char) -> String {
        format!("0x{}", c.to_string().repeat(64))
    }

    fn test_config() -> GateConfig {
        let mut config = GateConfig::new(0.01, Currency::Stx, PAYEE);
        config.exclude_paths = vec!["/public".to_string()];
        config
    }

    fn gate(config: GateConfig) -> (Gate, Arc<StubLedger>) {
        let ledger = Arc::new(StubLedger::new());
        let engine = VerificationEngine::new_with_clock(
            ledger.clone(),
            Arc::new(MemoryProofStore::new()),
            Arc::new(MockClock::from_rfc3339("2025-03-01T10:00:00Z")),
        );
        (Gate::with_engine(config, Arc::new(engine)), ledger)
    }

    fn blocked(decision: Decision) -> Blocked {
        match decision {
            Decision::Block(blocked) => blocked,
            Decision::Pass(ctx) => panic!("expected block, passed with {:?}", ctx),
        }
    }

    #[test]
    fn test_gate_creation() {
        let gate = Gate::new(test_config()).unwrap();
        assert_eq!(gate.descriptor().unwrap().amount, 10_000);
        assert_eq!(gate.config().currency, Currency::Stx);
    }

    #[test]
    fn test_stage_classification() {
        let (gate, _) = gate(test_config());
        assert_eq!(gate.stage(&TestRequest::get("/health")), Stage::Exempt);
        assert_eq!(gate.stage(&TestRequest::get("/public/a.css")), Stage::Exempt);
        assert_eq!(gate.stage(&TestRequest::get("/api/weather")), Stage::NoProof);
        assert_eq!(
            gate.stage(&TestRequest::get("/api/weather").with_header("X-Payment-Proof", "  ")),
            Stage::NoProof
        );
        assert_eq!(
            gate.stage(&TestRequest::get("/api/weather").with_header("X-PAYMENT-PROOF", " 0xab ")),
            Stage::ProofPresent("0xab".to_string())
        );
    }

    #[tokio::test]
    async fn test_excluded_path_never_reaches_engine() {
        let (gate, ledger) = gate(test_config());
        let request = TestRequest::get("/public/index.html").with_header("x-payment-proof", &tx('a'));
        assert_eq!(gate.decide(&request).await, Decision::Pass(None));
        assert_eq!(ledger.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_proof_gets_challenge() {
        let (gate, ledger) = gate(test_config());
        let blocked = blocked(gate.decide(&TestRequest::get("/api/weather")).await);

        assert_eq!(blocked.status, 402);
        assert_eq!(blocked.body["payment"]["recipient"], PAYEE);
        assert_eq!(blocked.body["payment"]["amountInSmallestUnit"], 10_000);
        assert_eq!(blocked.headers[0].0, "WWW-Authenticate");
        assert!(blocked.headers[0].1.starts_with("x402-stacks amount=0.01 currency=STX"));
        assert_eq!(ledger.calls(), 0);
    }

    #[tokio::test]
    async fn test_valid_proof_passes_once() {
        let (gate, ledger) = gate(test_config());
        ledger.insert(StubLedger::transfer(&tx('1'), "success", PAYEE, "10000"));
        let request = TestRequest::get("/api/weather").with_header("x-payment-proof", &tx('1'));

        assert_eq!(
            gate.decide(&request).await,
            Decision::Pass(Some(PaymentContext {
                verified: true,
                tx_id: tx('1'),
                amount: 10_000,
            }))
        );

        let replay = blocked(gate.decide(&request).await);
        assert_eq!(replay.status, 402);
        assert_eq!(replay.body["error"], "Invalid Payment");
        assert_eq!(replay.body["message"], "Transaction already used as payment");
        assert_eq!(replay.body["txId"], tx('1'));
    }

    #[tokio::test]
    async fn test_invalid_proof_names_reason() {
        let (gate, ledger) = gate(test_config());
        ledger.insert(StubLedger::transfer(&tx('2'), "success", PAYEE, "5000"));
        let request = TestRequest::get("/api/weather").with_header("x-payment-proof", &tx('2'));

        let blocked = blocked(gate.decide(&request).await);
        assert_eq!(blocked.status, 402);
        assert_eq!(
            blocked.body["message"],
            "Insufficient amount: expected at least 10000, got 5000"
        );
    }

    #[tokio::test]
    async fn test_stx_transfer_rejected_for_sbtc_price() {
        let mut config = test_config();
        config.price = 0.0001;
        config.currency = Currency::Sbtc;
        let (gate, ledger) = gate(config);
        assert_eq!(gate.descriptor().unwrap().amount, 10_000);
        ledger.insert(StubLedger::transfer(&tx('6'), "success", PAYEE, "10000"));
        let request = TestRequest::get("/api/weather").with_header("x-payment-proof", &tx('6'));

        let blocked = blocked(gate.decide(&request).await);
        assert_eq!(blocked.status, 402);
        assert_eq!(blocked.body["message"], "Wrong currency: expected sBTC, got STX");
    }

    #[tokio::test]
    async fn test_ledger_outage_is_opaque_500() {
        let (gate, ledger) = gate(test_config());
        ledger.set_unreachable(true);
        let request = TestRequest::get("/api/weather").with_header("x-payment-proof", &tx('3'));

        let blocked = blocked(gate.decide(&request).await);
        assert_eq!(blocked.status, 500);
        assert_eq!(blocked.body["error"], "Payment Verification Error");
        assert!(!blocked.body["message"].as_str().unwrap().contains("unreachable"));
    }

    #[tokio::test]
    async fn test_missing_address_fails_closed() {
        let mut config = test_config();
        config.payment_address = String::new();
        let (gate, ledger) = gate(config);
        assert!(gate.descriptor().is_none());

        let request = TestRequest::get("/api/weather").with_header("x-payment-proof", &tx('4'));
        let blocked = blocked(gate.decide(&request).await);
        assert_eq!(blocked.status, 500);
        assert_eq!(blocked.body["error"], "Server Configuration Error");
        assert_eq!(ledger.calls(), 0);

        // Exempt routes keep working.
        assert_eq!(gate.decide(&TestRequest::get("/health")).await, Decision::Pass(None));
    }

    #[tokio::test]
    async fn test_custom_proof_header() {
        let mut config = test_config();
        config.proof_header = Some("X-Stacks-Tx".to_string());
        let (gate, ledger) = gate(config);
        ledger.insert(StubLedger::transfer(&tx('5'), "success", PAYEE, "10000"));

        let old_header = TestRequest::get("/api/weather").with_header("x-payment-proof", &tx('5'));
        assert_eq!(gate.decide(&old_header).await.status(), Some(402));

        let new_header = TestRequest::get("/api/weather").with_header("x-stacks-tx", &tx('5'));
        assert_eq!(gate.decide(&new_header).await.status(), None);
    }

    #[test]
    fn test_blocked_apply_writes_everything() {
        let mut blocked = Blocked::new(402, json!({"error": "Payment Required"}));
        blocked.headers.push(("WWW-Authenticate".to_string(), "x402-stacks".to_string()));

        let mut response = RecordedResponse::default();
        blocked.apply(&mut response);
        assert_eq!(response.status, Some(402));
        assert_eq!(response.header("www-authenticate"), Some("x402-stacks"));
        assert_eq!(response.body, Some(json!({"error": "Payment Required"})));
    }
}

//! axum middleware.
//!
//! ```no_run
//! use axum::{middleware, routing::get, Extension, Router};
//! use paywarden::{integrations::axum::require_payment, Gate, GateConfig, PaymentContext};
//! use std::sync::Arc;
//!
//! async fn premium(Extension(payment): Extension<PaymentContext>) -> String {
//!     format!("paid by {}", payment.tx_id)
//! }
//!
//! # fn build(config: GateConfig) -> Result<Router, paywarden::PaywardenError> {
//! let gate = Arc::new(Gate::new(config)?);
//! let app = Router::new()
//!     .route("/api/premium", get(premium))
//!     .layer(middleware::from_fn_with_state(gate, require_payment));
//! # Ok(app)
//! # }
//! ```

use crate::gate::{Decision, Gate, GateRequest, GateResponse};
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::request::Parts;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

impl GateRequest for Parts {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    fn path(&self) -> &str {
        self.uri.path()
    }
}

/// Response written by the gate when it blocks a request.
#[derive(Debug, Default)]
pub struct BlockedResponse(Response);

impl GateResponse for BlockedResponse {
    fn set_status(&mut self, status: u16) {
        *self.0.status_mut() =
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    }

    fn set_header(&mut self, name: &str, value: &str) {
        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                self.0.headers_mut().insert(name, value);
            }
            _ => warn!("Dropping unrepresentable response header {}", name),
        }
    }

    fn set_json(&mut self, body: &Value) {
        self.0
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        *self.0.body_mut() = Body::from(body.to_string());
    }
}

impl IntoResponse for BlockedResponse {
    fn into_response(self) -> Response {
        self.0
    }
}

/// Middleware for [`axum::middleware::from_fn_with_state`].
///
/// Passed requests carry a [`PaymentContext`](crate::PaymentContext)
/// extension when a payment was verified.
pub async fn require_payment(
    State(gate): State<Arc<Gate>>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();

    match gate.decide(&parts).await {
        Decision::Pass(payment) => {
            let mut request = Request::from_parts(parts, body);
            if let Some(payment) = payment {
                request.extensions_mut().insert(payment);
            }
            next.run(request).await
        }
        Decision::Block(blocked) => {
            let mut response = BlockedResponse::default();
            blocked.apply(&mut response);
            response.into_response()
        }
    }
}

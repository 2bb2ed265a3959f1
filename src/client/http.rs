//! Reqwest-based client for the Hiro Stacks indexer.
//!
//! Raw responses are captured first (status + body + path) and interpreted
//! afterwards, so error messages can always name the request that failed.

use crate::client::LedgerClient;
use crate::payment::Network;
use crate::protocol::models::{
    parse_json, AddressTransactionsPage, Balance, BalancesResponse, TransactionRecord,
};
use crate::PaywardenError;
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tracing::debug;

/// Per-call timeout applied when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP response with the pieces the interpreter needs.
#[derive(Debug)]
pub struct LedgerResponse {
    /// HTTP status code.
    pub status: u16,

    /// Raw response body.
    pub body: Vec<u8>,

    /// Request path, kept for error reporting.
    pub request_path: String,
}

impl LedgerResponse {
    async fn from_response(
        response: Response,
        request_path: String,
    ) -> Result<Self, PaywardenError> {
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| PaywardenError::LedgerTransport(format!("Failed to read body: {}", e)))?
            .to_vec();

        Ok(Self {
            status,
            body,
            request_path,
        })
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx response into `LedgerStatus`.
    pub fn error_for_status(self) -> Result<Self, PaywardenError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(PaywardenError::LedgerStatus {
                status: self.status,
                path: self.request_path,
            })
        }
    }
}

/// Hiro indexer client.
pub struct HiroClient {
    client: Client,
    user_agent: String,
    base_url: String,
    timeout: Duration,
}

impl HiroClient {
    /// Create a client for the public indexer of `network`.
    pub fn new(network: Network) -> Result<Self, PaywardenError> {
        Self::with_base_url(network.default_api_url())
    }

    /// Create a client against a custom indexer (self-hosted or a test stub).
    pub fn with_base_url(base_url: &str) -> Result<Self, PaywardenError> {
        let user_agent = build_user_agent();
        let client = build_http_client(&user_agent, DEFAULT_TIMEOUT)?;

        Ok(Self {
            client,
            user_agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Replace the per-call timeout.
    pub fn try_with_timeout(mut self, timeout: Duration) -> Result<Self, PaywardenError> {
        self.client = build_http_client(&self.user_agent, timeout)?;
        self.timeout = timeout;
        Ok(self)
    }

    /// Configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Configured per-call timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn get(&self, path: String) -> Result<LedgerResponse, PaywardenError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| PaywardenError::LedgerTransport(format!("Request failed: {}", e)))?;

        LedgerResponse::from_response(response, path).await
    }
}

#[async_trait]
impl LedgerClient for HiroClient {
    async fn fetch_transaction(
        &self,
        tx_id: &str,
    ) -> Result<Option<TransactionRecord>, PaywardenError> {
        let response = self.get(tx_path(tx_id)).await?;
        if response.status == StatusCode::NOT_FOUND.as_u16() {
            return Ok(None);
        }
        let response = response.error_for_status()?;
        parse_json(&response.body).map(Some)
    }

    async fn fetch_account_transactions(
        &self,
        address: &str,
        limit: u32,
    ) -> Result<Vec<TransactionRecord>, PaywardenError> {
        let response = self
            .get(address_transactions_path(address, limit))
            .await?
            .error_for_status()?;
        let page: AddressTransactionsPage = parse_json(&response.body)?;
        Ok(page.results)
    }

    async fn fetch_balance(&self, address: &str) -> Result<Balance, PaywardenError> {
        let response = self.get(balances_path(address)).await?.error_for_status()?;
        let raw: BalancesResponse = parse_json(&response.body)?;
        Balance::from_response(&raw)
    }
}

fn build_http_client(user_agent: &str, timeout: Duration) -> Result<Client, PaywardenError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()
        .map_err(|e| PaywardenError::ConfigError(format!("Failed to build HTTP client: {}", e)))
}

fn tx_path(tx_id: &str) -> String {
    format!("/extended/v1/tx/{}", tx_id)
}

fn address_transactions_path(address: &str, limit: u32) -> String {
    format!("/extended/v1/address/{}/transactions?limit={}", address, limit)
}

fn balances_path(address: &str) -> String {
    format!("/extended/v1/address/{}/balances", address)
}

/// User-Agent sent to the indexer: `paywarden/<version>`.
pub fn build_user_agent() -> String {
    format!("paywarden/{}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_user_agent() {
        let ua = build_user_agent();
        assert_eq!(ua, format!("paywarden/{}", env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_paths() {
        assert_eq!(tx_path("0xabc"), "/extended/v1/tx/0xabc");
        assert_eq!(
            address_transactions_path("ST1PQ", 10),
            "/extended/v1/address/ST1PQ/transactions?limit=10"
        );
        assert_eq!(balances_path("ST1PQ"), "/extended/v1/address/ST1PQ/balances");
    }

    #[test]
    fn test_client_per_network() {
        let client = HiroClient::new(Network::Mainnet).unwrap();
        assert_eq!(client.base_url(), "https://api.mainnet.hiro.so");
        assert_eq!(client.timeout(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = HiroClient::with_base_url("http://127.0.0.1:3999/").unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:3999");
    }

    #[test]
    fn test_custom_timeout() {
        let client = HiroClient::new(Network::Testnet)
            .unwrap()
            .try_with_timeout(Duration::from_secs(5))
            .unwrap();
        assert_eq!(client.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_error_for_status() {
        let ok = LedgerResponse {
            status: 200,
            body: b"{}".to_vec(),
            request_path: "/x".to_string(),
        };
        assert!(ok.error_for_status().is_ok());

        let bad = LedgerResponse {
            status: 503,
            body: Vec::new(),
            request_path: "/extended/v1/tx/0x1".to_string(),
        };
        let err = bad.error_for_status().unwrap_err();
        assert!(matches!(err, PaywardenError::LedgerStatus { status: 503, ref path } if path == "/extended/v1/tx/0x1"));
    }

    const TX_ID: &str = "0x00000000000000000000000000000000000000000000000000000000000000aa";

    /// Serve canned `(path, status, body)` answers on a loopback port.
    /// Unknown paths get a 404. Returns the base URL.
    async fn serve(routes: Vec<(String, u16, &'static str)>) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut request = Vec::new();
                let mut chunk = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&chunk[..n]),
                    }
                }
                let request = String::from_utf8_lossy(&request);
                let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                let (status, body) = routes
                    .iter()
                    .find(|(p, _, _)| *p == path)
                    .map(|(_, status, body)| (*status, *body))
                    .unwrap_or((404, r#"{"error":"not found"}"#));
                let response = format!(
                    "HTTP/1.1 {} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_fetch_transaction_success() {
        let body = r#"{
            "tx_id": "0x00000000000000000000000000000000000000000000000000000000000000aa",
            "tx_status": "success",
            "tx_type": "token_transfer",
            "fee_rate": "180",
            "token_transfer": {"recipient_address": "ST3PAYEE", "amount": "10000", "memo": "0x"}
        }"#;
        let base = serve(vec![(tx_path(TX_ID), 200, body)]).await;
        let client = HiroClient::with_base_url(&base).unwrap();

        let record = client.fetch_transaction(TX_ID).await.unwrap().unwrap();
        assert_eq!(record.tx_id, TX_ID);
        assert_eq!(record.transfer_amount().unwrap(), 10_000);
        assert_eq!(record.transfer().unwrap().recipient_address, "ST3PAYEE");
    }

    #[tokio::test]
    async fn test_fetch_transaction_not_found_is_none() {
        let base = serve(Vec::new()).await;
        let client = HiroClient::with_base_url(&base).unwrap();
        assert!(client.fetch_transaction(TX_ID).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetch_transaction_server_error_is_status_error() {
        let base = serve(vec![(tx_path(TX_ID), 503, r#"{"error":"busy"}"#)]).await;
        let client = HiroClient::with_base_url(&base).unwrap();

        let err = client.fetch_transaction(TX_ID).await.unwrap_err();
        assert!(
            matches!(err, PaywardenError::LedgerStatus { status: 503, ref path } if *path == tx_path(TX_ID)),
            "got {:?}",
            err
        );
    }

    #[tokio::test]
    async fn test_fetch_transaction_garbage_is_protocol_error() {
        let base = serve(vec![(tx_path(TX_ID), 200, "<html>maintenance</html>")]).await;
        let client = HiroClient::with_base_url(&base).unwrap();

        let err = client.fetch_transaction(TX_ID).await.unwrap_err();
        assert!(matches!(err, PaywardenError::ProtocolError(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_fetch_account_transactions() {
        let body = r#"{
            "limit": 10, "offset": 0, "total": 2,
            "results": [
                {"tx_id": "0x01", "tx_status": "success", "tx_type": "token_transfer",
                 "token_transfer": {"recipient_address": "ST3PAYEE", "amount": "5"}},
                {"tx_id": "0x02", "tx_status": "success", "tx_type": "contract_call"}
            ]
        }"#;
        let base = serve(vec![(address_transactions_path("ST3PAYEE", 10), 200, body)]).await;
        let client = HiroClient::with_base_url(&base).unwrap();

        let records = client.fetch_account_transactions("ST3PAYEE", 10).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tx_id, "0x01");
        assert!(records[1].token_transfer.is_none());
    }

    #[tokio::test]
    async fn test_fetch_account_transactions_not_found_is_status_error() {
        let base = serve(Vec::new()).await;
        let client = HiroClient::with_base_url(&base).unwrap();

        let err = client.fetch_account_transactions("ST3PAYEE", 10).await.unwrap_err();
        assert!(matches!(err, PaywardenError::LedgerStatus { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_fetch_balance() {
        let body = r#"{"stx": {"balance": "1500000", "locked": "500000", "total_sent": "0"}}"#;
        let base = serve(vec![(balances_path("ST3PAYEE"), 200, body)]).await;
        let client = HiroClient::with_base_url(&base).unwrap();

        let balance = client.fetch_balance("ST3PAYEE").await.unwrap();
        assert_eq!(balance, Balance { available: 1_000_000, locked: 500_000 });
    }

    #[tokio::test]
    async fn test_fetch_balance_server_error() {
        let base = serve(vec![(balances_path("ST3PAYEE"), 502, "")]).await;
        let client = HiroClient::with_base_url(&base).unwrap();

        let err = client.fetch_balance("ST3PAYEE").await.unwrap_err();
        assert!(matches!(err, PaywardenError::LedgerStatus { status: 502, .. }));
    }

    #[tokio::test]
    async fn test_unreachable_indexer_is_transport_error() {
        // Port 9 (discard) on loopback is closed in test sandboxes.
        let client = HiroClient::with_base_url("http://127.0.0.1:9")
            .unwrap()
            .try_with_timeout(Duration::from_secs(2))
            .unwrap();
        let err = client.fetch_transaction("0x00").await.unwrap_err();
        assert!(matches!(err, PaywardenError::LedgerTransport(_)));
    }
}

//! Order transport.
//!
//! Provides a trait-based abstraction for delivering a signed order request to
//! the venue, separating signing from transport so the execution engine can be
//! tested without a network.

use crate::error::{ExecutionError, ExecutionResult};
use serde::Deserialize;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Signed order request ready for transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedOrderRequest {
    /// Path including the API prefix.
    pub path: String,
    /// Canonical body; the exact bytes that were signed.
    pub body: String,
    /// Unix seconds after which the venue rejects the request.
    pub expires: u64,
    pub api_key: String,
    pub signature: String,
}

impl SignedOrderRequest {
    /// Header set sent with the request.
    pub fn headers(&self) -> [(&'static str, String); 4] {
        [
            ("api-expires", self.expires.to_string()),
            ("api-key", self.api_key.clone()),
            ("api-signature", self.signature.clone()),
            ("content-type", "application/json".to_string()),
        ]
    }
}

/// Venue acknowledgement of an accepted order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderAck {
    pub order_id: Option<String>,
    pub ord_status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOrderResponse {
    #[serde(rename = "orderID", default)]
    order_id: Option<String>,
    #[serde(default)]
    ord_status: Option<String>,
}

impl OrderAck {
    /// Parse a success body. Unparseable bodies yield an empty ack.
    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str::<RawOrderResponse>(body) {
            Ok(raw) => Self {
                order_id: raw.order_id,
                ord_status: raw.ord_status,
            },
            Err(e) => {
                debug!(error = %e, "Order response body not understood");
                Self::default()
            }
        }
    }
}

/// Trait for sending signed orders.
pub trait OrderSender: Send + Sync {
    fn send(&self, request: SignedOrderRequest) -> BoxFuture<'_, ExecutionResult<OrderAck>>;
}

/// Arc wrapper for OrderSender trait objects.
pub type DynOrderSender = Arc<dyn OrderSender>;

// ============================================================================
// REST
// ============================================================================

/// Sends orders over HTTPS with `reqwest`.
#[derive(Debug, Clone)]
pub struct RestOrderSender {
    client: reqwest::Client,
    base_url: String,
}

impl RestOrderSender {
    /// `base_url` is the venue origin, e.g. `https://www.bitmex.com`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ExecutionResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExecutionError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl OrderSender for RestOrderSender {
    fn send(&self, request: SignedOrderRequest) -> BoxFuture<'_, ExecutionResult<OrderAck>> {
        Box::pin(async move {
            let url = format!("{}{}", self.base_url, request.path);
            let mut builder = self.client.post(&url);
            for (name, value) in request.headers() {
                builder = builder.header(name, value);
            }

            let response = builder
                .body(request.body)
                .send()
                .await
                .map_err(|e| ExecutionError::Transport(e.to_string()))?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| ExecutionError::Transport(e.to_string()))?;

            if !status.is_success() {
                warn!(status = status.as_u16(), %body, "Order request rejected");
                return Err(ExecutionError::Request {
                    status: status.as_u16(),
                    body,
                });
            }

            Ok(OrderAck::from_body(&body))
        })
    }
}

// ============================================================================
// Mock
// ============================================================================

/// Canned outcome for the mock sender.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Accept(OrderAck),
    Reject { status: u16, body: String },
    TransportError(String),
}

/// Mock order sender for testing.
#[derive(Debug)]
pub struct MockOrderSender {
    sends: parking_lot::Mutex<Vec<SignedOrderRequest>>,
    next_response: parking_lot::Mutex<MockResponse>,
    calls: AtomicUsize,
}

impl Default for MockOrderSender {
    fn default() -> Self {
        Self::new()
    }
}

impl MockOrderSender {
    pub fn new() -> Self {
        Self {
            sends: parking_lot::Mutex::new(Vec::new()),
            next_response: parking_lot::Mutex::new(MockResponse::Accept(OrderAck {
                order_id: Some("mock-order".to_string()),
                ord_status: Some("New".to_string()),
            })),
            calls: AtomicUsize::new(0),
        }
    }

    /// Set the response returned by subsequent sends.
    pub fn set_next_response(&self, response: MockResponse) {
        *self.next_response.lock() = response;
    }

    /// Get recorded sends.
    pub fn get_sends(&self) -> Vec<SignedOrderRequest> {
        self.sends.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OrderSender for MockOrderSender {
    fn send(&self, request: SignedOrderRequest) -> BoxFuture<'_, ExecutionResult<OrderAck>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.sends.lock().push(request);
            match self.next_response.lock().clone() {
                MockResponse::Accept(ack) => Ok(ack),
                MockResponse::Reject { status, body } => {
                    Err(ExecutionError::Request { status, body })
                }
                MockResponse::TransportError(msg) => Err(ExecutionError::Transport(msg)),
            }
        })
    }
}

//! Exposure-adjusting order execution.
//!
//! A request to change exposure by a signed contract quantity is checked
//! against readiness, rounded to the lot size, priced at the opposing touch,
//! signed and sent as a single limit order. Nothing is retried and positions
//! are never updated speculatively; the position feed reports the fill.

use crate::error::{ExecutionError, ExecutionResult};
use crate::order::{LimitOrder, OrderIntent, ORDER_PATH};
use crate::order_sender::{DynOrderSender, OrderAck, SignedOrderRequest};
use crate::price_provider::BboProvider;
use crate::ready::ReadinessGate;
use dealer_core::{Clock, RequestSigner, Side, SystemClock};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Execution configuration.
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Instrument symbol orders are placed on.
    pub symbol: String,
    /// Contracts per lot. Order sizes are multiples of this.
    pub lot_size: u64,
    /// Lifetime of a signed order request.
    pub order_expiry_secs: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            symbol: String::new(),
            lot_size: 100,
            order_expiry_secs: 60,
        }
    }
}

/// Result of an exposure change request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Zero quantity requested; nothing sent.
    NoOp,
    /// Order accepted by the venue.
    Submitted {
        side: Side,
        quantity: u64,
        ack: OrderAck,
    },
}

/// Turns exposure change requests into signed limit orders.
pub struct ExecutionEngine {
    config: ExecutionConfig,
    signer: Option<RequestSigner>,
    gate: Arc<ReadinessGate>,
    prices: Arc<dyn BboProvider>,
    sender: DynOrderSender,
    clock: Arc<dyn Clock>,
}

impl ExecutionEngine {
    pub fn new(
        config: ExecutionConfig,
        signer: Option<RequestSigner>,
        gate: Arc<ReadinessGate>,
        prices: Arc<dyn BboProvider>,
        sender: DynOrderSender,
    ) -> Self {
        Self::with_clock(config, signer, gate, prices, sender, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: ExecutionConfig,
        signer: Option<RequestSigner>,
        gate: Arc<ReadinessGate>,
        prices: Arc<dyn BboProvider>,
        sender: DynOrderSender,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            signer,
            gate,
            prices,
            sender,
            clock,
        }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Change exposure by `quantity` contracts (positive buys, negative sells).
    pub async fn request_exposure_change(&self, quantity: i64) -> ExecutionResult<ExecutionOutcome> {
        if !self.gate.is_ready() {
            warn!(quantity, "Exposure change rejected: not ready");
            return Err(ExecutionError::NotReady);
        }

        let Some(intent) = OrderIntent::from_exposure_change(quantity, self.config.lot_size) else {
            debug!("Zero exposure change, nothing to do");
            return Ok(ExecutionOutcome::NoOp);
        };
        if intent.quantity != quantity.unsigned_abs() {
            debug!(
                requested = quantity,
                rounded = intent.quantity,
                lot_size = self.config.lot_size,
                "Exposure change rounded to lot size"
            );
        }

        // Read the book once; it may move while the request is in flight.
        let bbo = self.prices.bbo();
        let book_side = intent.side.opposing_book_side();
        let price = match bbo.touch_for(intent.side) {
            Some(p) if p.is_positive() => p,
            other => {
                error!(side = %intent.side, price = ?other, "No usable price for order");
                return Err(ExecutionError::PriceUnavailable { side: book_side });
            }
        };

        let order = LimitOrder::new(self.config.symbol.clone(), intent, price);
        let request = self.sign(&order)?;

        info!(
            symbol = %order.symbol,
            side = %order.side,
            qty = order.quantity,
            price = %order.price,
            expires = request.expires,
            "Submitting order"
        );

        match self.sender.send(request).await {
            Ok(ack) => {
                info!(order_id = ?ack.order_id, status = ?ack.ord_status, "Order accepted");
                Ok(ExecutionOutcome::Submitted {
                    side: order.side,
                    quantity: order.quantity,
                    ack,
                })
            }
            Err(e) => {
                error!(error = %e, "Order submission failed");
                Err(e)
            }
        }
    }

    /// Build the signed request for `order`.
    pub fn sign(&self, order: &LimitOrder) -> ExecutionResult<SignedOrderRequest> {
        let signer = self
            .signer
            .as_ref()
            .ok_or(ExecutionError::MissingCredentials)?;
        let body = order.canonical_body()?;
        let expires = self.clock.now_secs() + self.config.order_expiry_secs;
        let signature = signer.sign("POST", ORDER_PATH, expires, &body)?;

        Ok(SignedOrderRequest {
            path: ORDER_PATH.to_string(),
            body,
            expires,
            api_key: signer.api_key().to_string(),
            signature,
        })
    }
}

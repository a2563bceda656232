//! Readiness gating and order execution for the dealer.
//!
//! - `ReadinessGate`: edge-triggered readiness over the required feeds
//! - `OrderIntent` / `LimitOrder`: lot rounding, side selection, canonical body
//! - `OrderSender`: signed request transport (REST and mock)
//! - `ExecutionEngine`: the exposure-change pipeline

pub mod error;
pub mod executor;
pub mod order;
pub mod order_sender;
pub mod price_provider;
pub mod ready;

pub use error::{ExecutionError, ExecutionResult};
pub use executor::{ExecutionConfig, ExecutionEngine, ExecutionOutcome};
pub use order::{canonical_json, LimitOrder, OrderIntent, ORDER_PATH};
pub use order_sender::{
    BoxFuture, DynOrderSender, MockOrderSender, MockResponse, OrderAck, OrderSender,
    RestOrderSender, SignedOrderRequest,
};
pub use price_provider::{BboProvider, StaticBbo};
pub use ready::{ReadinessGate, ReadyCallback, DEFAULT_REQUIRED_FEEDS};

//! Order construction.
//!
//! Converts a signed exposure change into a lot-rounded limit order and renders
//! the canonical request body that is both signed and sent.

use crate::error::{ExecutionError, ExecutionResult};
use dealer_core::{Price, Side};
use serde_json::{Map, Number, Value};

/// REST path for order placement, including the API prefix.
pub const ORDER_PATH: &str = "/api/v1/order";

/// Side and lot-rounded size derived from an exposure change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderIntent {
    pub side: Side,
    pub quantity: u64,
}

impl OrderIntent {
    /// Round `quantity` down to a multiple of `lot_size`, keeping the sign.
    ///
    /// A non-zero change smaller than one lot becomes exactly one lot in the
    /// same direction. Zero has no intent.
    pub fn from_exposure_change(quantity: i64, lot_size: u64) -> Option<Self> {
        let side = Side::from_signed(quantity)?;
        let lot = lot_size.max(1);
        let magnitude = quantity.unsigned_abs();
        let rounded = (magnitude / lot) * lot;
        Some(Self {
            side,
            quantity: if rounded == 0 { lot } else { rounded },
        })
    }
}

/// Limit order ready to be encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitOrder {
    pub symbol: String,
    pub side: Side,
    pub quantity: u64,
    pub price: Price,
}

impl LimitOrder {
    pub fn new(symbol: impl Into<String>, intent: OrderIntent, price: Price) -> Self {
        Self {
            symbol: symbol.into(),
            side: intent.side,
            quantity: intent.quantity,
            price,
        }
    }

    /// Order body as a JSON object.
    pub fn to_value(&self) -> ExecutionResult<Value> {
        let price = self
            .price
            .to_f64()
            .and_then(Number::from_f64)
            .ok_or_else(|| ExecutionError::Encode(format!("price {} not representable", self.price)))?;

        let mut body = Map::new();
        body.insert("symbol".to_string(), Value::from(self.symbol.clone()));
        body.insert("side".to_string(), Value::from(self.side.as_str()));
        body.insert("orderQty".to_string(), Value::from(self.quantity));
        body.insert("price".to_string(), Value::Number(price));
        body.insert("ordType".to_string(), Value::from("Limit"));
        Ok(Value::Object(body))
    }

    /// Canonical body: keys sorted, compact separators.
    pub fn canonical_body(&self) -> ExecutionResult<String> {
        canonical_json(&self.to_value()?)
    }
}

/// Render a JSON value with object keys sorted at every level and no
/// insignificant whitespace.
pub fn canonical_json(value: &Value) -> ExecutionResult<String> {
    serde_json::to_string(&sorted(value)).map_err(|e| ExecutionError::Encode(e.to_string()))
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut out = Map::new();
            for (k, v) in entries {
                out.insert(k.clone(), sorted(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

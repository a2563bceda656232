//! Stream message types.

use crate::error::{WsError, WsResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Outbound
// ============================================================================

/// Operation frame sent to the venue.
#[derive(Debug, Clone, Serialize)]
pub struct OpRequest {
    pub op: String,
    pub args: Vec<Value>,
}

impl OpRequest {
    /// `{"op":"authKey","args":[apiKey, expires, signature]}`
    pub fn auth_key(api_key: &str, expires: u64, signature: &str) -> Self {
        Self {
            op: "authKey".to_string(),
            args: vec![
                Value::from(api_key),
                Value::from(expires),
                Value::from(signature),
            ],
        }
    }

    /// `{"op":"subscribe","args":[topic]}`
    pub fn subscribe(topic: impl Into<String>) -> Self {
        Self {
            op: "subscribe".to_string(),
            args: vec![Value::from(topic.into())],
        }
    }
}

// ============================================================================
// Inbound
// ============================================================================

/// Table a data message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum Table {
    #[serde(rename = "position")]
    Position,
    #[serde(rename = "margin")]
    Margin,
    #[serde(rename = "orderBookL2")]
    OrderBookL2,
    #[serde(rename = "quote")]
    Quote,
    #[serde(rename = "instrument")]
    Instrument,
    /// Any table this client does not consume.
    #[serde(other)]
    Unknown,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Position => "position",
            Self::Margin => "margin",
            Self::OrderBookL2 => "orderBookL2",
            Self::Quote => "quote",
            Self::Instrument => "instrument",
            Self::Unknown => "unknown",
        }
    }
}

/// Table action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Full snapshot.
    Partial,
    Update,
    Insert,
    Delete,
}

impl Action {
    pub fn is_snapshot(&self) -> bool {
        matches!(self, Self::Partial)
    }
}

/// `{table, action, data}` data frame. Rows are parsed by the feed layer.
#[derive(Debug, Clone, Deserialize)]
pub struct TableMessage {
    pub table: Table,
    pub action: Action,
    #[serde(default)]
    pub data: Vec<Value>,
}

/// `{info, ...}` welcome/informational frame.
#[derive(Debug, Clone, Deserialize)]
pub struct InfoMessage {
    pub info: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// `{error, status?, request?}` error frame.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorMessage {
    pub error: String,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub request: Option<Value>,
}

/// `{success, subscribe?, request?}` acknowledgement of auth or subscribe.
#[derive(Debug, Clone, Deserialize)]
pub struct SuccessMessage {
    pub success: bool,
    #[serde(default)]
    pub subscribe: Option<String>,
    #[serde(default)]
    pub request: Option<Value>,
}

/// Decoded inbound frame.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InboundMessage {
    Table(TableMessage),
    Error(ErrorMessage),
    Success(SuccessMessage),
    Info(InfoMessage),
}

impl InboundMessage {
    /// Decode a text frame.
    pub fn decode(text: &str) -> WsResult<Self> {
        serde_json::from_str(text).map_err(|e| WsError::Decode(format!("{e}: {}", truncate(text))))
    }

    /// Table name for logging and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Table(t) => t.table.as_str(),
            Self::Error(_) => "error",
            Self::Success(_) => "success",
            Self::Info(_) => "info",
        }
    }
}

fn truncate(text: &str) -> &str {
    const MAX: usize = 200;
    match text.char_indices().nth(MAX) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_key_frame() {
        let frame = OpRequest::auth_key("key", 1_518_064_241, "abc123");
        assert_eq!(
            serde_json::to_string(&frame).unwrap(),
            r#"{"op":"authKey","args":["key",1518064241,"abc123"]}"#
        );
    }

    #[test]
    fn test_subscribe_frame() {
        let frame = OpRequest::subscribe("orderBookL2:XBTUSD");
        assert_eq!(
            serde_json::to_string(&frame).unwrap(),
            r#"{"op":"subscribe","args":["orderBookL2:XBTUSD"]}"#
        );
    }

    #[test]
    fn test_decode_table_partial() {
        let text = r#"{"table":"orderBookL2","action":"partial","keys":["symbol","id","side"],
            "data":[{"symbol":"XBTUSD","id":1,"side":"Sell","size":10,"price":101.5}]}"#;
        match InboundMessage::decode(text).unwrap() {
            InboundMessage::Table(t) => {
                assert_eq!(t.table, Table::OrderBookL2);
                assert_eq!(t.action, Action::Partial);
                assert!(t.action.is_snapshot());
                assert_eq!(t.data.len(), 1);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_decode_unknown_table() {
        let text = r#"{"table":"trade","action":"insert","data":[]}"#;
        match InboundMessage::decode(text).unwrap() {
            InboundMessage::Table(t) => assert_eq!(t.table, Table::Unknown),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_decode_info_error_success() {
        let info = r#"{"info":"Welcome to the BitMEX Realtime API.","version":"2.0.0","timestamp":"2024-01-01T00:00:00.000Z"}"#;
        assert!(matches!(
            InboundMessage::decode(info).unwrap(),
            InboundMessage::Info(_)
        ));

        let error = r#"{"status":401,"error":"Signature not valid.","meta":{},"request":{"op":"authKey"}}"#;
        match InboundMessage::decode(error).unwrap() {
            InboundMessage::Error(e) => {
                assert_eq!(e.status, Some(401));
                assert_eq!(e.error, "Signature not valid.");
            }
            other => panic!("unexpected: {other:?}"),
        }

        let success = r#"{"success":true,"subscribe":"margin","request":{"op":"subscribe","args":["margin"]}}"#;
        match InboundMessage::decode(success).unwrap() {
            InboundMessage::Success(s) => {
                assert!(s.success);
                assert_eq!(s.subscribe.as_deref(), Some("margin"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_decode_garbage_is_decode_error() {
        let err = InboundMessage::decode("not json").unwrap_err();
        assert!(matches!(err, WsError::Decode(_)));
        assert!(!err.is_fatal());

        let err = InboundMessage::decode(r#"{"foo":1}"#).unwrap_err();
        assert!(matches!(err, WsError::Decode(_)));
    }
}

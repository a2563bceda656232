//! Streaming client for the hedging venue.
//!
//! Provides the connection lifecycle for one adapter:
//! - Connect, authenticate and subscribe in a fixed order
//! - Decode every text frame into a typed `InboundMessage`
//! - Forward decoded messages over an mpsc channel
//! - Terminal `Failed` state on transport loss, no internal reconnect

pub mod connection;
pub mod error;
pub mod message;
pub mod subscription;

pub use connection::{ConnectionLifecycle, ConnectionState, LifecycleConfig};
pub use error::{WsError, WsResult};
pub use message::{
    Action, ErrorMessage, InboundMessage, InfoMessage, OpRequest, SuccessMessage, Table,
    TableMessage,
};
pub use subscription::Topic;

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

//! Stream connection lifecycle.
//!
//! Drives one connection through `Connecting -> Authenticating -> Subscribing
//! -> Streaming`. Any transport loss moves the lifecycle to the terminal
//! `Failed` state and returns the error; restarting is the caller's job.
//! Cancelling the shutdown token stops the stream cleanly and leaves the
//! lifecycle `Disconnected`.

use crate::error::{WsError, WsResult};
use crate::message::{InboundMessage, OpRequest};
use crate::subscription::Topic;
use dealer_core::{Clock, Credentials, RequestSigner, SystemClock};
use futures_util::{Sink, SinkExt, StreamExt};
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async_tls_with_config, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Path signed for the streaming handshake.
const REALTIME_PATH: &str = "/realtime";

/// Lifecycle configuration.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Stream URL.
    pub url: String,
    /// Instrument symbol used for instrument-scoped topics.
    pub instrument: String,
    /// API credentials. Without them authentication is skipped and private
    /// tables never arrive.
    pub credentials: Option<Credentials>,
    /// Lifetime of the `authKey` signature.
    pub auth_expiry_secs: u64,
    /// Topics subscribed after authentication.
    pub topics: Vec<Topic>,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            instrument: String::new(),
            credentials: None,
            auth_expiry_secs: 5,
            topics: Topic::ALL.to_vec(),
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Authenticating,
    Subscribing,
    Streaming,
    /// Terminal.
    Failed,
}

impl ConnectionState {
    /// Numeric code for the state gauge.
    pub fn as_code(&self) -> i64 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::Authenticating => 2,
            Self::Subscribing => 3,
            Self::Streaming => 4,
            Self::Failed => 5,
        }
    }

    /// True once the transport is up, including the handshake phases.
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            Self::Authenticating | Self::Subscribing | Self::Streaming
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "DISCONNECTED",
            Self::Connecting => "CONNECTING",
            Self::Authenticating => "AUTHENTICATING",
            Self::Subscribing => "SUBSCRIBING",
            Self::Streaming => "STREAMING",
            Self::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Stream lifecycle for one adapter.
pub struct ConnectionLifecycle {
    config: LifecycleConfig,
    state: RwLock<ConnectionState>,
    message_tx: mpsc::Sender<InboundMessage>,
    shutdown_token: CancellationToken,
    clock: Arc<dyn Clock>,
    decode_errors: AtomicU64,
}

impl ConnectionLifecycle {
    pub fn new(
        config: LifecycleConfig,
        message_tx: mpsc::Sender<InboundMessage>,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self::with_clock(config, message_tx, shutdown_token, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: LifecycleConfig,
        message_tx: mpsc::Sender<InboundMessage>,
        shutdown_token: CancellationToken,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            state: RwLock::new(ConnectionState::Disconnected),
            message_tx,
            shutdown_token,
            clock,
            decode_errors: AtomicU64::new(0),
        }
    }

    /// Get current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Number of frames dropped because they failed to decode.
    pub fn decode_error_count(&self) -> u64 {
        self.decode_errors.load(Ordering::Relaxed)
    }

    /// Request cooperative shutdown.
    pub fn shutdown(&self) {
        info!("Stream shutdown requested");
        self.shutdown_token.cancel();
    }

    fn set_state(&self, next: ConnectionState) {
        let prev = std::mem::replace(&mut *self.state.write(), next);
        if prev != next {
            debug!(from = %prev, to = %next, "Connection state transition");
        }
    }

    /// Run the lifecycle to completion.
    ///
    /// Returns `Ok(())` only after cooperative shutdown. Every other exit is an
    /// error and leaves the state `Failed`.
    pub async fn run(&self) -> WsResult<()> {
        match self.drive().await {
            Ok(()) => {
                self.set_state(ConnectionState::Disconnected);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Stream failed");
                self.set_state(ConnectionState::Failed);
                Err(e)
            }
        }
    }

    async fn drive(&self) -> WsResult<()> {
        self.set_state(ConnectionState::Connecting);
        info!(url = %self.config.url, "Connecting to venue stream");

        let connect = connect_async_tls_with_config(&self.config.url, None, true, None);
        let ws_stream = tokio::select! {
            biased;

            () = self.shutdown_token.cancelled() => {
                info!("Shutdown requested while connecting");
                return Ok(());
            }
            result = connect => match result {
                Ok((stream, _response)) => stream,
                Err(e) => return Err(WsError::ConnectionFailed(e.to_string())),
            },
        };
        let (mut write, mut read) = ws_stream.split();
        info!("Venue stream connected");

        self.set_state(ConnectionState::Authenticating);
        self.authenticate(&mut write).await?;

        self.set_state(ConnectionState::Subscribing);
        self.subscribe_all(&mut write).await?;

        self.set_state(ConnectionState::Streaming);
        info!(instrument = %self.config.instrument, "Streaming");

        loop {
            tokio::select! {
                biased;

                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received in stream loop");
                    if let Err(e) = write.send(Message::Close(None)).await {
                        warn!(?e, "Failed to send Close frame during shutdown");
                    }
                    return Ok(());
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_text_message(&text).await?;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            debug!("Received ping, sending pong");
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            debug!("Received pong");
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            warn!(code, %reason, "Stream closed by venue");
                            return Err(WsError::ConnectionClosed { code, reason });
                        }
                        Some(Err(e)) => {
                            error!(?e, "Stream read error");
                            return Err(e.into());
                        }
                        None => {
                            warn!("Stream ended");
                            return Err(WsError::ConnectionClosed {
                                code: 1006,
                                reason: "stream ended".to_string(),
                            });
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    async fn authenticate<S>(&self, write: &mut S) -> WsResult<()>
    where
        S: Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
    {
        let Some(credentials) = self.config.credentials.as_ref().filter(|c| !c.is_empty())
        else {
            warn!("No API credentials configured, skipping authentication");
            return Ok(());
        };

        let signer = RequestSigner::new(credentials.clone());
        let expires = self.clock.now_secs() + self.config.auth_expiry_secs;
        let signature = signer.sign("GET", REALTIME_PATH, expires, "")?;
        let frame = OpRequest::auth_key(signer.api_key(), expires, &signature);

        send_json(write, &frame).await?;
        info!(expires, "Authentication sent");
        Ok(())
    }

    async fn subscribe_all<S>(&self, write: &mut S) -> WsResult<()>
    where
        S: Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
    {
        for topic in &self.config.topics {
            let arg = topic.arg(&self.config.instrument);
            send_json(write, &OpRequest::subscribe(arg.clone())).await?;
            info!(topic = %arg, "Subscribed");
        }
        Ok(())
    }

    async fn handle_text_message(&self, text: &str) -> WsResult<()> {
        let msg = match InboundMessage::decode(text) {
            Ok(msg) => msg,
            Err(e) => {
                self.decode_errors.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Dropping undecodable frame");
                return Ok(());
            }
        };

        match &msg {
            InboundMessage::Info(info) => info!(info = %info.info, "Venue info"),
            InboundMessage::Error(err) => {
                error!(error = %err.error, status = ?err.status, "Venue error")
            }
            InboundMessage::Success(ack) => {
                debug!(subscribe = ?ack.subscribe, success = ack.success, "Venue ack")
            }
            InboundMessage::Table(_) => {}
        }

        self.message_tx
            .send(msg)
            .await
            .map_err(|_| WsError::SendFailed("message receiver dropped".to_string()))
    }
}

async fn send_json<S, T>(write: &mut S, value: &T) -> WsResult<()>
where
    S: Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
    T: serde::Serialize,
{
    let text = serde_json::to_string(value)?;
    write.send(Message::Text(text)).await?;
    Ok(())
}

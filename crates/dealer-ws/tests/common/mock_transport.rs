//! Transport-level WebSocket server for lifecycle tests.
//!
//! Records what the client writes (text frames and pong payloads) and lets a
//! test push text, ping and close frames at it.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::{accept_async, tungstenite::Message};

#[derive(Debug)]
enum Frame {
    Text(String),
    Ping(Vec<u8>),
    Close,
}

/// What the client has written so far.
#[derive(Debug, Default)]
struct Received {
    texts: Vec<String>,
    pongs: Vec<Vec<u8>>,
    connections: u32,
}

pub struct MockTransportServer {
    addr: SocketAddr,
    received: Arc<Mutex<Received>>,
    frame_tx: mpsc::UnboundedSender<Frame>,
    stop: tokio::task::JoinHandle<()>,
}

impl MockTransportServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let received = Arc::new(Mutex::new(Received::default()));
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let frame_rx = Arc::new(Mutex::new(frame_rx));

        let accepted = received.clone();
        let stop = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, accepted.clone(), frame_rx.clone()));
            }
        });

        Self {
            addr,
            received,
            frame_tx,
            stop,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub async fn connection_count(&self) -> u32 {
        self.received.lock().await.connections
    }

    /// Wait for at least `count` text frames, returning whatever arrived by the deadline.
    pub async fn wait_for_messages(&self, count: usize, timeout: Duration) -> Vec<String> {
        self.wait_for(timeout, |r| (r.texts.len() >= count).then(|| r.texts.clone()))
            .await
            .unwrap_or_default()
    }

    /// Wait for the first pong payload.
    pub async fn wait_for_pong(&self, timeout: Duration) -> Option<Vec<u8>> {
        self.wait_for(timeout, |r| r.pongs.first().cloned()).await
    }

    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.frame_tx.send(Frame::Text(text.into()));
    }

    pub fn send_ping(&self, payload: &[u8]) {
        let _ = self.frame_tx.send(Frame::Ping(payload.to_vec()));
    }

    pub fn close_client(&self) {
        let _ = self.frame_tx.send(Frame::Close);
    }

    pub async fn shutdown(self) {
        self.stop.abort();
    }

    async fn wait_for<T>(
        &self,
        timeout: Duration,
        mut check: impl FnMut(&Received) -> Option<T>,
    ) -> Option<T> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let last = tokio::time::Instant::now() >= deadline;
            if let Some(found) = check(&*self.received.lock().await) {
                return Some(found);
            }
            if last {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

async fn serve(
    stream: TcpStream,
    received: Arc<Mutex<Received>>,
    frames: Arc<Mutex<mpsc::UnboundedReceiver<Frame>>>,
) {
    received.lock().await.connections += 1;

    let Ok(ws) = accept_async(stream).await else {
        return;
    };
    let (mut write, mut read) = ws.split();
    let mut frames = frames.lock().await;

    loop {
        tokio::select! {
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => received.lock().await.texts.push(text),
                Some(Ok(Message::Pong(payload))) => received.lock().await.pongs.push(payload),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                _ => {}
            },
            frame = frames.recv() => {
                let out = match frame {
                    Some(Frame::Text(text)) => Message::Text(text),
                    Some(Frame::Ping(payload)) => Message::Ping(payload),
                    Some(Frame::Close) | None => {
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                };
                if write.send(out).await.is_err() {
                    break;
                }
            }
        }
    }
}

//! Common test utilities for blockstream integration tests
//!
//! [`MockStreamServer`] accepts websocket connections on `127.0.0.1:0` and
//! hands each one to the test as a [`MockConnection`], which records the
//! JSON frames the client sends and lets the test push frames back.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Notify};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

const LOCALHOST_ANY_PORT: &str = "127.0.0.1:0";

/// What the server should do on a connection
#[derive(Debug)]
pub enum ServerAction {
    Send(String),
    Close,
}

/// Server side of one accepted client connection
pub struct MockConnection {
    frames: mpsc::UnboundedReceiver<Value>,
    actions: mpsc::UnboundedSender<ServerAction>,
}

impl MockConnection {
    /// Next JSON frame sent by the client, `None` on timeout or disconnect
    pub async fn next_frame(&mut self, wait: Duration) -> Option<Value> {
        tokio::time::timeout(wait, self.frames.recv()).await.ok().flatten()
    }

    /// Collect exactly `count` frames or panic
    pub async fn expect_frames(&mut self, count: usize, wait: Duration) -> Vec<Value> {
        let mut frames = Vec::with_capacity(count);
        for i in 0..count {
            match self.next_frame(wait).await {
                Some(frame) => frames.push(frame),
                None => panic!("expected {} frames, got {}: {:?}", count, i, frames),
            }
        }
        frames
    }

    pub fn send_json(&self, value: Value) {
        let _ = self.actions.send(ServerAction::Send(value.to_string()));
    }

    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.actions.send(ServerAction::Send(text.into()));
    }

    /// Close the connection from the server side
    pub fn close(&self) {
        let _ = self.actions.send(ServerAction::Close);
    }
}

/// Scriptable mock of the event stream server
pub struct MockStreamServer {
    pub addr: SocketAddr,
    connections: mpsc::UnboundedReceiver<MockConnection>,
    shutdown: Arc<Notify>,
}

impl MockStreamServer {
    /// Start a server that reads client frames; pings are answered by tungstenite
    pub async fn start() -> Self {
        Self::start_with(LOCALHOST_ANY_PORT, true).await
    }

    /// Start a reading server on a fixed address, e.g. to bring a stopped server back
    pub async fn start_at(addr: SocketAddr) -> Self {
        Self::start_with(addr, true).await
    }

    /// Start a server that accepts connections but never reads from them,
    /// so pings go unanswered
    pub async fn start_silent() -> Self {
        Self::start_with(LOCALHOST_ANY_PORT, false).await
    }

    async fn start_with(addr: impl tokio::net::ToSocketAddrs, reading: bool) -> Self {
        let listener = TcpListener::bind(addr).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let shutdown_clone = shutdown.clone();
        let (conn_tx, connections) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let (frames_tx, frames) = mpsc::unbounded_channel();
                                let (actions, actions_rx) = mpsc::unbounded_channel();
                                if conn_tx.send(MockConnection { frames, actions }).is_err() {
                                    break;
                                }
                                let shutdown = shutdown_clone.clone();
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, frames_tx, actions_rx, reading, shutdown).await;
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown_clone.notified() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            connections,
            shutdown,
        }
    }

    async fn handle_connection(
        stream: TcpStream,
        frames_tx: mpsc::UnboundedSender<Value>,
        mut actions_rx: mpsc::UnboundedReceiver<ServerAction>,
        reading: bool,
        shutdown: Arc<Notify>,
    ) {
        let ws_stream = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next(), if reading => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if let Ok(value) = serde_json::from_str::<Value>(&text) {
                                let _ = frames_tx.send(value);
                            }
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    }
                }
                action = actions_rx.recv() => {
                    match action {
                        Some(ServerAction::Send(text)) => {
                            if write.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        Some(ServerAction::Close) | None => {
                            let _ = write.close().await;
                            break;
                        }
                    }
                }
                _ = shutdown.notified() => {
                    break;
                }
            }
        }
    }

    /// Get the WebSocket URL for this server
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Wait for the next client connection
    pub async fn next_connection(&mut self, wait: Duration) -> Option<MockConnection> {
        tokio::time::timeout(wait, self.connections.recv()).await.ok().flatten()
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockStreamServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Frames and fixtures shared by the integration tests
pub mod fixtures {
    use serde_json::{json, Value};

    pub const ADDRESS: &str = "0x7a250d5630b4cf539739df2c5dacb4c659f2488d";
    pub const HASH: &str = "0xd6f98c52a1cd7a4b39aeae5bd3919f699b7e0323d8fc2a91a9ba9163614cb9d7";

    pub fn address_event(event_code: &str, status: &str) -> Value {
        json!({
            "status": "ok",
            "event": {
                "timeStamp": "2021-11-12T16:52:27.107Z",
                "categoryCode": "activeAddress",
                "eventCode": event_code,
                "dappId": "test-key",
                "blockchain": {"system": "ethereum", "network": "main"},
                "contractCall": {"methodName": "swapExactTokensForTokens"},
                "transaction": {
                    "status": status,
                    "hash": HASH,
                    "watchedAddress": ADDRESS,
                    "blockNumber": 13602467
                }
            }
        })
    }

    /// `categoryCode/eventCode` of an outbound envelope
    pub fn codes(frame: &Value) -> String {
        format!(
            "{}/{}",
            frame["categoryCode"].as_str().unwrap_or("?"),
            frame["eventCode"].as_str().unwrap_or("?")
        )
    }
}

//! Shared test harness: a scripted in-process quote provider.
//!
//! Speaks just enough of the provider protocol for the client to connect,
//! records every control request it receives, and lets tests push scripted
//! frames or force connection loss.

#![allow(dead_code)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use price_stream_mux::{Credentials, MuxConfig, PriceCallback, PriceStreamMux, StreamSettings};
use rust_decimal::Decimal;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;

/// A scripted provider endpoint driven entirely by the test.
pub struct FakeProvider {
    addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    healthy: Arc<AtomicBool>,
    control_rx: mpsc::UnboundedReceiver<serde_json::Value>,
    push_tx: broadcast::Sender<String>,
    kick_tx: broadcast::Sender<()>,
}

impl FakeProvider {
    /// Bind a listener and start accepting connections.
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (push_tx, _) = broadcast::channel::<String>(64);
        let (kick_tx, _) = broadcast::channel::<()>(8);
        let connections = Arc::new(AtomicUsize::new(0));
        let healthy = Arc::new(AtomicBool::new(true));

        let conn_counter = Arc::clone(&connections);
        let healthy_flag = Arc::clone(&healthy);
        let session_push = push_tx.clone();
        let session_kick = kick_tx.clone();

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                conn_counter.fetch_add(1, Ordering::SeqCst);

                // Unhealthy mode: refuse the WebSocket handshake outright.
                if !healthy_flag.load(Ordering::SeqCst) {
                    drop(stream);
                    continue;
                }

                let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                    continue;
                };
                let (mut write, mut read) = ws.split();
                let mut push_rx = session_push.subscribe();
                let mut kick_rx = session_kick.subscribe();
                let control_tx = control_tx.clone();

                tokio::spawn(async move {
                    loop {
                        tokio::select! {
                            frame = push_rx.recv() => match frame {
                                Ok(frame) => {
                                    if write.send(Message::Text(frame.into())).await.is_err() {
                                        break;
                                    }
                                }
                                Err(_) => break,
                            },
                            _ = kick_rx.recv() => {
                                let _ = write.send(Message::Close(None)).await;
                                break;
                            }
                            msg = read.next() => match msg {
                                Some(Ok(Message::Text(text))) => {
                                    if let Ok(value) = serde_json::from_str(text.as_str()) {
                                        let _ = control_tx.send(value);
                                    }
                                }
                                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                                Some(Ok(_)) => {}
                            },
                        }
                    }
                });
            }
        });

        Self {
            addr,
            connections,
            healthy,
            control_rx,
            push_tx,
            kick_tx,
        }
    }

    /// WebSocket URL of this provider.
    pub fn url(&self) -> String {
        format!("ws://{}/", self.addr)
    }

    /// Number of TCP connections accepted so far.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Toggle whether new connections complete the WebSocket handshake.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Push a raw frame to every live session.
    pub fn push(&self, frame: &str) {
        let _ = self.push_tx.send(frame.to_string());
    }

    /// Close every live session from the server side.
    pub fn kick(&self) {
        let _ = self.kick_tx.send(());
    }

    /// Wait for the next control request, or `None` on timeout.
    pub async fn next_control(&mut self, timeout: Duration) -> Option<serde_json::Value> {
        tokio::time::timeout(timeout, self.control_rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Assert that no control request arrives within `window`.
    pub async fn expect_no_control(&mut self, window: Duration) {
        if let Ok(Some(msg)) = tokio::time::timeout(window, self.control_rx.recv()).await {
            panic!("unexpected control message: {msg}");
        }
    }
}

/// Multiplexer configuration pointed at the fake provider, with fast
/// backoff so reconnect tests stay quick.
pub fn test_config(url: String) -> MuxConfig {
    MuxConfig {
        credentials: Credentials::new("test-key"),
        stream: StreamSettings {
            url,
            reconnect_delay_initial: Duration::from_millis(50),
            reconnect_delay_max: Duration::from_secs(1),
            ..StreamSettings::default()
        },
        ..MuxConfig::default()
    }
}

/// Callback that counts invocations.
pub fn counting_callback() -> (PriceCallback, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    let callback: PriceCallback = Arc::new(move |_price, _symbol| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    (callback, count)
}

/// Callback that records every `(price, symbol)` pair it sees.
pub fn recording_callback() -> (PriceCallback, Arc<parking_lot::Mutex<Vec<(Decimal, String)>>>) {
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback: PriceCallback = Arc::new(move |price, symbol| {
        sink.lock().push((price, symbol.to_string()));
    });
    (callback, seen)
}

/// Wait until the multiplexer reports connected.
pub async fn await_connected(mux: &PriceStreamMux) {
    let mut rx = mux.watch_connected();
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|connected| *connected))
        .await
        .expect("timed out waiting for connect")
        .expect("connected watch closed");
}

/// Wait until the multiplexer reports disconnected.
pub async fn await_disconnected(mux: &PriceStreamMux) {
    let mut rx = mux.watch_connected();
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|connected| !*connected))
        .await
        .expect("timed out waiting for disconnect")
        .expect("connected watch closed");
}

/// Poll until `cond` holds, panicking after `timeout`.
pub async fn wait_until(mut cond: impl FnMut() -> bool, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within {timeout:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

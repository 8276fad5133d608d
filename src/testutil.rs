//! In-process stand-ins for the remote peer and the capture device,
//! shared by the session, sampler and pipeline tests.

use crate::camera::{FrameSource, RawFrame};
use crate::gemini::{LiveConfig, ResponseModality};
use futures_util::{SinkExt, StreamExt};
use image::{Rgb, RgbImage};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

pub fn test_config(url: &str) -> LiveConfig {
    LiveConfig {
        url: url.to_string(),
        model: "models/test".to_string(),
        response_modality: ResponseModality::Text,
        system_instruction: Some("test".to_string()),
        temperature: None,
    }
}

enum ServerCmd {
    Send(Value),
    Close,
}

/// A single-connection WebSocket server speaking just enough of the Live
/// protocol for tests: acknowledges setup, records every inbound message,
/// and sends whatever the test pushes.
pub struct LocalLiveServer {
    pub url: String,
    received: Arc<Mutex<Vec<Value>>>,
    cmd_tx: mpsc::UnboundedSender<ServerCmd>,
    _task: JoinHandle<()>,
}

impl LocalLiveServer {
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let received: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
        let inbox = received.clone();

        let task = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let (mut sink, mut stream) = ws.split();
            loop {
                tokio::select! {
                    msg = stream.next() => match msg {
                        Some(Ok(Message::Text(text))) => {
                            let value: Value = serde_json::from_str(&text).unwrap();
                            let is_setup = value.get("setup").is_some();
                            inbox.lock().unwrap().push(value);
                            if is_setup {
                                let ack = json!({"setupComplete": {}}).to_string();
                                sink.send(Message::text(ack)).await.unwrap();
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(_)) => break,
                    },
                    cmd = cmd_rx.recv() => match cmd {
                        Some(ServerCmd::Send(value)) => {
                            sink.send(Message::text(value.to_string())).await.unwrap();
                        }
                        Some(ServerCmd::Close) => {
                            let _ = sink.send(Message::Close(None)).await;
                            break;
                        }
                        None => break,
                    },
                }
            }
        });

        Self {
            url: format!("ws://{}", addr),
            received,
            cmd_tx,
            _task: task,
        }
    }

    /// Push a server-to-client message.
    pub fn push(&self, message: Value) {
        self.cmd_tx.send(ServerCmd::Send(message)).unwrap();
    }

    /// Close the connection from the server side.
    pub fn close_connection(&self) {
        let _ = self.cmd_tx.send(ServerCmd::Close);
    }

    pub fn received_count(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    /// Wait until at least `n` messages have arrived and return them all.
    pub async fn received_after(&self, n: usize) -> Vec<Value> {
        for _ in 0..200 {
            if self.received_count() >= n {
                return self.received.lock().unwrap().clone();
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!(
            "timed out waiting for {} messages (got {})",
            n,
            self.received_count()
        );
    }
}

/// Deterministic frame source for sampler and pipeline tests.
pub struct TestFrames {
    pub grabs: Arc<AtomicUsize>,
    pub released: Arc<AtomicBool>,
}

impl TestFrames {
    pub fn new() -> Self {
        Self {
            grabs: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl FrameSource for TestFrames {
    fn grab(&mut self) -> anyhow::Result<Option<RawFrame>> {
        self.grabs.fetch_add(1, Ordering::SeqCst);
        Ok(Some(RawFrame {
            rgb: RgbImage::from_pixel(8, 8, Rgb([30, 120, 200])),
            timestamp: Instant::now(),
        }))
    }

    fn release(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

//! Live session channel with split WebSocket handling
//!
//! One logical bidirectional session against the control peer: a reader
//! task forwards parsed server events over a channel while the shared
//! writer half accepts media frames and tool results from any pipeline
//! task. Exactly one session is live at a time; it is owned by the
//! pipeline controller and never resurrected after a failure.

use crate::gemini::{
    BidiGenerateContentSetup, ClientMessage, Content, FunctionResponse, GenerationConfig,
    LiveConfig, LiveError, RealtimeInput, RealtimeMedia, Result, ServerMessage, ToolResponse,
    control_tool,
};

use base64::engine::general_purpose;
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use std::sync::Arc;
use std::time::Duration;

/// Type alias for the WebSocket split sink, wrapped in Arc<Mutex<>>
type WsSink = Arc<
    Mutex<
        futures_util::stream::SplitSink<
            tokio_tungstenite::WebSocketStream<
                tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
            >,
            tokio_tungstenite::tungstenite::Message,
        >,
    >,
>;

/// Connection state of the live session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Idle,
    Connecting,
    Open,
    Closed,
}

/// Events surfaced to the pipeline's dispatch loop.
#[derive(Debug)]
pub enum SessionEvent {
    SetupComplete,
    /// An inbound tool-call payload (zero or more invocations).
    ToolCall(serde_json::Value),
    /// The peer withdrew previously issued invocations.
    ToolCallCancellation(serde_json::Value),
    /// The server will disconnect soon.
    GoAway,
}

/// Publishes the outward connection status, collapsing duplicate
/// transitions so observers see a strict alternation.
#[derive(Clone)]
pub(crate) struct StatusPublisher {
    tx: Arc<watch::Sender<bool>>,
}

impl StatusPublisher {
    pub(crate) fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { tx: Arc::new(tx) }, rx)
    }

    pub(crate) fn set(&self, connected: bool) {
        self.tx.send_if_modified(|current| {
            if *current == connected {
                false
            } else {
                *current = connected;
                true
            }
        });
    }
}

/// Clonable outbound handle to the session.
///
/// Both submit operations are gated on the session being open: media
/// submission while not open is a silent no-op (the next tick supersedes
/// the frame), and tool results are dropped, never queued.
#[derive(Clone)]
pub struct SessionSender {
    writer: WsSink,
    open: watch::Receiver<bool>,
}

impl SessionSender {
    pub fn is_open(&self) -> bool {
        *self.open.borrow()
    }

    /// Submit one encoded frame, fire-and-forget.
    pub async fn submit_media(&self, jpeg: &[u8]) -> Result<()> {
        if !self.is_open() {
            debug!("skipping media submission: session not open");
            return Ok(());
        }
        let realtime_input = RealtimeInput {
            video: Some(RealtimeMedia {
                data: general_purpose::STANDARD.encode(jpeg),
                mime_type: "image/jpeg".to_string(),
            }),
        };
        debug!("submitting frame ({} KB encoded)", jpeg.len() / 1024);
        self.send(&ClientMessage::RealtimeInput { realtime_input })
            .await
    }

    /// Submit a correlated tool result.
    pub async fn submit_tool_result(&self, result: FunctionResponse) -> Result<()> {
        if !self.is_open() {
            warn!("dropping tool result {:?}: session not open", result.id);
            return Ok(());
        }
        let tool_response = ToolResponse {
            function_responses: vec![result],
        };
        self.send(&ClientMessage::ToolResponse { tool_response })
            .await
    }

    async fn send(&self, msg: &ClientMessage) -> Result<()> {
        let json = msg.to_wire()?;
        let mut writer = self.writer.lock().await;
        writer
            .send(Message::text(json))
            .await
            .map_err(LiveError::WebSocket)
    }
}

/// One logical connection to the control peer.
pub struct LiveSession {
    config: LiveConfig,
    state: SessionState,
    writer: Option<WsSink>,
    event_rx: Option<mpsc::Receiver<Result<SessionEvent>>>,
    status: StatusPublisher,
    status_rx: watch::Receiver<bool>,
    reader_task: Option<JoinHandle<()>>,
}

impl LiveSession {
    pub fn new(config: LiveConfig) -> Self {
        let (status, status_rx) = StatusPublisher::new();
        Self {
            config,
            state: SessionState::Idle,
            writer: None,
            event_rx: None,
            status,
            status_rx,
            reader_task: None,
        }
    }

    /// Connect to the endpoint and complete the setup handshake.
    pub async fn connect_and_setup(&mut self) -> Result<()> {
        self.connect().await?;
        self.setup().await
    }

    /// Connect to the endpoint and start the reader task.
    pub async fn connect(&mut self) -> Result<()> {
        if self.state != SessionState::Idle {
            return Ok(());
        }

        self.state = SessionState::Connecting;
        info!("Connecting to Live API");

        let (ws_stream, _resp) = connect_async(&self.config.url)
            .await
            .map_err(LiveError::WebSocket)?;

        let (sink, stream) = ws_stream.split();
        let sink: WsSink = Arc::new(Mutex::new(sink));
        self.writer = Some(sink);

        let (event_tx, event_rx) = mpsc::channel::<Result<SessionEvent>>(100);
        let status = self.status.clone();

        let reader_task = tokio::spawn(async move {
            let mut stream = stream;
            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        if !forward_server_message(&text, &event_tx).await {
                            break;
                        }
                    }
                    Ok(Message::Binary(bytes)) => {
                        // The Live API delivers some frames as binary JSON.
                        match String::from_utf8(bytes.to_vec()) {
                            Ok(text) => {
                                if !forward_server_message(&text, &event_tx).await {
                                    break;
                                }
                            }
                            Err(_) => {
                                debug!("ignoring non-UTF-8 binary message");
                            }
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        info!("WebSocket closed: {:?}", frame);
                        status.set(false);
                        let _ = event_tx.send(Err(LiveError::ConnectionClosed)).await;
                        break;
                    }
                    Ok(_) => {
                        // ping/pong
                    }
                    Err(e) => {
                        error!("WebSocket error: {:?}", e);
                        status.set(false);
                        let _ = event_tx.send(Err(LiveError::WebSocket(e))).await;
                        break;
                    }
                }
            }
            status.set(false);
            debug!("session reader task terminated");
        });

        self.event_rx = Some(event_rx);
        self.reader_task = Some(reader_task);
        info!("Connected to Live API");

        Ok(())
    }

    /// Send the setup message (model, instruction, declared control tool)
    /// and wait for the peer's acknowledgement. The session counts as open
    /// only after this completes.
    pub async fn setup(&mut self) -> Result<()> {
        match self.state {
            SessionState::Idle | SessionState::Closed => {
                return Err(LiveError::ConnectionClosed);
            }
            SessionState::Open => return Ok(()),
            SessionState::Connecting => {}
        }

        info!("Setting up live session with model {}", self.config.model);

        let setup = BidiGenerateContentSetup {
            model: self.config.model.clone(),
            generation_config: Some(GenerationConfig {
                response_modalities: vec![self.config.response_modality.as_str().to_string()],
                temperature: self.config.temperature,
            }),
            system_instruction: self
                .config
                .system_instruction
                .as_deref()
                .map(Content::system),
            tools: vec![control_tool()],
        };

        self.send(&ClientMessage::Setup { setup }).await?;

        let completed = tokio::time::timeout(
            Duration::from_secs(10),
            self.wait_for_setup_complete(),
        )
        .await
        .map_err(|_| LiveError::Timeout)??;

        if completed {
            self.state = SessionState::Open;
            self.status.set(true);
            info!("Live session open");
            Ok(())
        } else {
            error!("Live session setup did not complete");
            Err(LiveError::SetupNotComplete)
        }
    }

    /// Wait for the setup complete message.
    async fn wait_for_setup_complete(&mut self) -> Result<bool> {
        let rx = self.event_rx.as_mut().ok_or(LiveError::ChannelClosed)?;
        let mut attempts = 0;
        while attempts < 10 {
            match rx.recv().await {
                Some(Ok(SessionEvent::SetupComplete)) => return Ok(true),
                Some(Ok(_)) => {
                    attempts += 1;
                    continue;
                }
                Some(Err(e)) => return Err(e),
                None => return Err(LiveError::ChannelClosed),
            }
        }
        Ok(false)
    }

    /// Outbound handle for the sampler and the dispatcher.
    pub fn sender(&self) -> Result<SessionSender> {
        let writer = self.writer.clone().ok_or(LiveError::ConnectionClosed)?;
        Ok(SessionSender {
            writer,
            open: self.status_rx.clone(),
        })
    }

    /// Current connection status, updated on every lifecycle transition.
    pub fn status(&self) -> watch::Receiver<bool> {
        self.status_rx.clone()
    }

    /// Move the inbound event stream out for a dedicated dispatch task.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<Result<SessionEvent>>> {
        self.event_rx.take()
    }

    async fn send(&self, msg: &ClientMessage) -> Result<()> {
        let json = msg.to_wire()?;
        if let Some(writer) = &self.writer {
            let mut guard = writer.lock().await;
            guard
                .send(Message::text(json))
                .await
                .map_err(LiveError::WebSocket)
        } else {
            Err(LiveError::ConnectionClosed)
        }
    }

    /// Close the session, best-effort. Gates all senders first so nothing
    /// is submitted on a closing connection.
    pub async fn close(&mut self) {
        self.status.set(false);
        if let Some(writer) = self.writer.take() {
            let mut guard = writer.lock().await;
            if let Err(e) = guard.send(Message::Close(None)).await {
                debug!("close frame not delivered: {}", e);
            }
        }
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        self.state = SessionState::Closed;
        info!("Live session closed");
    }

    pub fn state_name(&self) -> &'static str {
        match self.state {
            SessionState::Idle => "Idle",
            SessionState::Connecting => "Connecting",
            SessionState::Open => "Open",
            SessionState::Closed => "Closed",
        }
    }
}

/// Parse one inbound text frame and forward the matching event.
/// Returns false when the event channel is gone and the reader should stop.
async fn forward_server_message(
    text: &str,
    event_tx: &mpsc::Sender<Result<SessionEvent>>,
) -> bool {
    let message = match serde_json::from_str::<ServerMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            warn!("unparseable server message: {} ({})", text, e);
            return true;
        }
    };

    let event = match message {
        ServerMessage::SetupComplete { .. } => SessionEvent::SetupComplete,
        ServerMessage::ToolCall { tool_call } => SessionEvent::ToolCall(tool_call),
        ServerMessage::ToolCallCancellation {
            tool_call_cancellation,
        } => SessionEvent::ToolCallCancellation(tool_call_cancellation),
        ServerMessage::GoAway { .. } => SessionEvent::GoAway,
        ServerMessage::ServerContent { .. } => {
            // Model turns (audio/text) are not part of the control channel.
            debug!("ignoring server content");
            return true;
        }
    };

    event_tx.send(Ok(event)).await.is_ok()
}

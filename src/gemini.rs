//! Gemini Live API module
//!
//! Wire types and configuration for the Live API WebSocket protocol as this
//! pipeline uses it: session setup with a declared control tool, realtime
//! video input, tool responses, and the inbound server-message envelope.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio_tungstenite::tungstenite::Error as WsError;


/// Name of the single function declared to the model; the control channel.
pub const CONTROL_TOOL: &str = "updateParticleState";

/// The one required argument of [`CONTROL_TOOL`]: gesture openness in [0, 1].
pub const CONTROL_ARG: &str = "expansion";

pub const LIVE_WS_URL: &str =
    "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Instruction that turns the model into a silent gesture interpreter.
pub const VISION_CONTROLLER_INSTRUCTION: &str = "\
You are a Vision Controller for a 3D Particle Art installation. \
Your task is to analyze the video stream of the user.
1. Look for the user's hands.
2. If the user's hands are CLOSE TOGETHER or CLOSED, the 'expansion' value is near 0.1.
3. If the user's hands are FAR APART or OPEN, the 'expansion' value is near 1.0.
4. If you see no hands, default to 0.5.
5. Continuously call the 'updateParticleState' function with the calculated 'expansion' value.
6. Do not speak. Only use the tool.";

/// Generation configuration for setup.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub response_modalities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Session setup message.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BidiGenerateContentSetup {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn system(text: &str) -> Self {
        Self {
            role: Some("SYSTEM".to_string()),
            parts: vec![Part {
                text: Some(text.to_string()),
            }],
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// A set of function declarations offered to the model at setup time.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Schema,
}

/// Subset of the schema object the Live API accepts for tool parameters.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct Schema {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Schema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

/// The declared control tool: one function, one required numeric argument.
pub fn control_tool() -> Tool {
    let mut properties = BTreeMap::new();
    properties.insert(
        CONTROL_ARG.to_string(),
        Schema {
            kind: "NUMBER".to_string(),
            description: Some(
                "0.0 represents closed hands or small scale. \
                 1.0 represents open arms or large scale."
                    .to_string(),
            ),
            ..Default::default()
        },
    );
    Tool {
        function_declarations: vec![FunctionDeclaration {
            name: CONTROL_TOOL.to_string(),
            description: "Update the particle system expansion based on user hand gestures."
                .to_string(),
            parameters: Schema {
                kind: "OBJECT".to_string(),
                properties,
                required: vec![CONTROL_ARG.to_string()],
                ..Default::default()
            },
        }],
    }
}

/// A chunk of realtime media input. This pipeline only ever sends video.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<RealtimeMedia>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeMedia {
    pub data: String,
    pub mime_type: String,
}

/// Reply to one tool invocation, correlated by `id`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FunctionResponse {
    pub id: String,
    pub name: String,
    pub response: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub function_responses: Vec<FunctionResponse>,
}

/// Message sent from client to server.
#[derive(Debug, Clone)]
pub enum ClientMessage {
    Setup { setup: BidiGenerateContentSetup },
    RealtimeInput { realtime_input: RealtimeInput },
    ToolResponse { tool_response: ToolResponse },
}

impl ClientMessage {
    /// Wrap the payload in its single top-level protocol key.
    pub fn to_wire(&self) -> Result<String> {
        let json = match self {
            ClientMessage::Setup { setup } => {
                format!("{{\"setup\":{}}}", serde_json::to_string(setup)?)
            }
            ClientMessage::RealtimeInput { realtime_input } => {
                format!(
                    "{{\"realtimeInput\":{}}}",
                    serde_json::to_string(realtime_input)?
                )
            }
            ClientMessage::ToolResponse { tool_response } => {
                format!(
                    "{{\"toolResponse\":{}}}",
                    serde_json::to_string(tool_response)?
                )
            }
        };
        Ok(json)
    }
}

/// Server -> client messages
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    SetupComplete {
        #[serde(rename = "setupComplete")]
        setup_complete: serde_json::Value,
    },
    ToolCall {
        #[serde(rename = "toolCall")]
        tool_call: serde_json::Value,
    },
    ToolCallCancellation {
        #[serde(rename = "toolCallCancellation")]
        tool_call_cancellation: serde_json::Value,
    },
    GoAway {
        #[serde(rename = "goAway")]
        go_away: serde_json::Value,
    },
    ServerContent {
        #[serde(rename = "serverContent")]
        server_content: serde_json::Value,
    },
}

/// Error type for Live API operations
#[derive(Debug, thiserror::Error)]
pub enum LiveError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Setup not complete")]
    SetupNotComplete,

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Timeout")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, LiveError>;

/// Response modality options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseModality {
    Text,
    Audio,
}

impl ResponseModality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Audio => "AUDIO",
        }
    }
}

/// Configuration for the live session
#[derive(Debug, Clone)]
pub struct LiveConfig {
    pub url: String,
    pub model: String,
    pub response_modality: ResponseModality,
    pub system_instruction: Option<String>,
    pub temperature: Option<f32>,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            model: "models/gemini-2.5-flash-native-audio-preview-09-2025".to_string(),
            // The API requires a response modality even though this pipeline
            // only consumes the tool channel.
            response_modality: ResponseModality::Audio,
            system_instruction: Some(VISION_CONTROLLER_INSTRUCTION.to_string()),
            temperature: None,
        }
    }
}

impl LiveConfig {
    /// Build a default configuration pointed at the Live API endpoint.
    pub fn for_api_key(api_key: &str) -> Self {
        Self {
            url: format!("{}?key={}", LIVE_WS_URL, api_key),
            ..Default::default()
        }
    }
}

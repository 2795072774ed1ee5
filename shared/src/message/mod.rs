//! Detection stream protocol
//!
//! The backend pushes JSON text frames on `/ws/detection/{floor_id}`:
//!
//! | frame | meaning |
//! |-------|---------|
//! | `{"type":"ping"}` | heartbeat, must be answered with `{"type":"pong"}` |
//! | `{"type":"pong"}` / `pong` | reply to our keepalive |
//! | `{"type":"connected", ...}` | greeting |
//! | `{..., "table_status": [...]}` | detection frame |
//! | `{"error": "..."}` | server side failure, informational |
//!
//! The server also answers a raw text `ping` with a raw text `pong`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::DetectionFrame;

/// Raw keepalive text the backend echoes as `pong`
pub const KEEPALIVE_PING: &str = "ping";

/// Frame decoding failure. The frame is dropped, the connection stays up.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("Invalid detection frame: {0}")]
    InvalidDetection(#[source] serde_json::Error),
}

/// Classified server frame
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    Ping,
    Pong,
    Connected { message: Option<String> },
    Detection(DetectionFrame),
    Error(String),
    /// Any other JSON object; carries its `status`/`message` text if present
    Info(Option<String>),
}

impl ServerFrame {
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        match text.trim() {
            "ping" => return Ok(ServerFrame::Ping),
            "pong" => return Ok(ServerFrame::Pong),
            _ => {}
        }

        let value: serde_json::Value = serde_json::from_str(text).map_err(FrameError::Malformed)?;
        let kind = value.get("type").and_then(|t| t.as_str());

        if kind == Some("ping") {
            return Ok(ServerFrame::Ping);
        }
        if value.get("table_status").is_some_and(|t| t.is_array()) {
            let frame = serde_json::from_value(value).map_err(FrameError::InvalidDetection)?;
            return Ok(ServerFrame::Detection(frame));
        }

        let text_field = |key: &str| value.get(key).and_then(|v| v.as_str()).map(str::to_string);
        match kind {
            Some("pong") => Ok(ServerFrame::Pong),
            Some("connected") => Ok(ServerFrame::Connected {
                message: text_field("message"),
            }),
            _ => match text_field("error") {
                Some(err) => Ok(ServerFrame::Error(err)),
                None => Ok(ServerFrame::Info(
                    text_field("status").or_else(|| text_field("message")),
                )),
            },
        }
    }

    /// Short status text for informational frames
    pub fn status_text(&self) -> Option<String> {
        match self {
            ServerFrame::Connected { message } => {
                Some(message.clone().unwrap_or_else(|| "connected".to_string()))
            }
            ServerFrame::Error(err) => Some(format!("error: {err}")),
            ServerFrame::Info(text) => text.clone(),
            _ => None,
        }
    }
}

/// Frames the client sends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientFrame {
    Ping,
    Pong,
}

impl ClientFrame {
    pub fn to_json(self) -> String {
        match self {
            ClientFrame::Ping => r#"{"type":"ping"}"#.to_string(),
            ClientFrame::Pong => r#"{"type":"pong"}"#.to_string(),
        }
    }
}

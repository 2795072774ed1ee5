//! Detection socket transports

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use shared::FloorId;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::{ClientConfig, ClientError, ClientResult};

/// Close code reported when the transport drops without a close frame
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Inbound event of a detection socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Text(String),
    /// Session over; no further events follow
    Closed { code: Option<u16>, reason: String },
}

impl SocketEvent {
    pub fn abnormal(reason: impl Into<String>) -> Self {
        SocketEvent::Closed {
            code: Some(ABNORMAL_CLOSURE),
            reason: reason.into(),
        }
    }
}

/// An open detection stream
#[async_trait]
pub trait DetectionSocket: Send {
    /// Next text frame, or `Closed` once the session ended
    ///
    /// Must be cancel-safe: the manager races it against timers.
    async fn next_event(&mut self) -> SocketEvent;

    async fn send_text(&mut self, text: &str) -> ClientResult<()>;

    /// Close the session; errors are swallowed
    async fn close(&mut self);
}

/// Opens detection sockets
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, floor_id: FloorId) -> ClientResult<Box<dyn DetectionSocket>>;
}

// ========== WebSocket ==========

/// Connects to `<ws-base>/ws/detection/{floor_id}` with tokio-tungstenite
#[derive(Debug, Clone)]
pub struct WsConnector {
    config: ClientConfig,
}

impl WsConnector {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, floor_id: FloorId) -> ClientResult<Box<dyn DetectionSocket>> {
        let url = self.config.detection_ws_url(floor_id);
        tracing::debug!(floor_id, %url, "Opening detection socket");
        let (stream, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| ClientError::WebSocket(e.to_string()))?;
        Ok(Box::new(WsSocket { stream }))
    }
}

struct WsSocket {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl DetectionSocket for WsSocket {
    async fn next_event(&mut self) -> SocketEvent {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return SocketEvent::Text(text.as_str().to_string()),
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => return SocketEvent::Text(text),
                    Err(_) => tracing::debug!("Ignoring non UTF-8 binary frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    return match frame {
                        Some(frame) => SocketEvent::Closed {
                            code: Some(u16::from(frame.code)),
                            reason: frame.reason.as_str().to_string(),
                        },
                        None => SocketEvent::Closed {
                            code: None,
                            reason: String::new(),
                        },
                    };
                }
                // tungstenite answers protocol pings itself
                Some(Ok(_)) => continue,
                Some(Err(e)) => return SocketEvent::abnormal(e.to_string()),
                None => return SocketEvent::abnormal("stream ended"),
            }
        }
    }

    async fn send_text(&mut self, text: &str) -> ClientResult<()> {
        self.stream
            .send(Message::Text(text.to_string().into()))
            .await
            .map_err(|e| ClientError::WebSocket(e.to_string()))
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!("WebSocket close failed: {e}");
        }
    }
}

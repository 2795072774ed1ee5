//! Realtime detection streams
//!
//! One WebSocket per floor (`/ws/detection/{floor_id}`), kept alive by
//! [`RealtimeManager`]:
//!
//! ```text
//! idle → connecting → open → reconnecting → connecting → ... → open
//!                                          └→ failed (attempts exhausted)
//! ```
//!
//! Transports plug in through [`Connector`]: [`WsConnector`] talks to the real
//! backend, [`MemoryConnector`] keeps everything in-process.

mod lifecycle;
mod manager;
mod memory;
mod transport;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::{DetectionFrame, FloorId};

pub use lifecycle::{Backoff, CloseOutcome, ConnectionState, FloorLifecycle};
pub use manager::RealtimeManager;
pub use memory::{MemoryConnector, MemoryPeer};
pub use transport::{Connector, DetectionSocket, SocketEvent, WsConnector};

/// Realtime manager configuration
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Delay before the first reconnect, doubled per failed attempt
    pub initial_delay: Duration,
    /// Upper bound of the reconnect delay
    pub max_delay: Duration,
    /// Consecutive failed attempts before a floor is marked failed
    pub max_attempts: u32,
    /// Gap between initial connects when many floors appear at once
    pub stagger: Duration,
    /// Text `ping` keepalive while open (0 disables)
    pub keepalive_interval: Duration,
    /// Broadcast buffer for [`RealtimeEvent`]s
    pub event_capacity: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(3),
            max_delay: Duration::from_secs(60),
            max_attempts: 5,
            stagger: Duration::from_millis(100),
            keepalive_interval: Duration::from_secs(30),
            event_capacity: 256,
        }
    }
}

impl RealtimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 局域网配置：快速重连
    pub fn lan() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            keepalive_interval: Duration::from_secs(10),
            ..Self::default()
        }
    }

    /// 广域网配置 (默认值)
    pub fn wan() -> Self {
        Self::default()
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_stagger(mut self, stagger: Duration) -> Self {
        self.stagger = stagger;
        self
    }

    /// 设置心跳间隔 (0 表示禁用)
    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.initial_delay, self.max_delay)
    }
}

/// Events published by the manager
#[derive(Debug, Clone)]
pub enum RealtimeEvent {
    /// A frame carrying `table_status`, tagged with its floor
    Detection {
        floor_id: FloorId,
        frame: DetectionFrame,
    },
    /// Connection state of a floor changed
    State {
        floor_id: FloorId,
        state: ConnectionState,
        attempts: u32,
    },
}

/// Read-only view of one floor's connection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FloorStatus {
    pub floor_id: FloorId,
    pub state: ConnectionState,
    /// Consecutive failed attempts
    pub attempts: u32,
    /// Last informational text from the server (`connected`, `error: ...`)
    pub message: Option<String>,
    pub last_frame_at: Option<DateTime<Utc>>,
}

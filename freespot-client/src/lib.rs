//! FreeSpot Client - backend access for the table occupancy dashboard
//!
//! - **REST** (`http`): floors, tables, CCTV streams, detection control
//! - **Connection monitor** (`monitor`): backend health polling with backoff
//! - **Realtime** (`realtime`): one detection WebSocket per floor, reconnecting
//! - **Canvas** (`canvas`): pointer gestures that edit table regions

pub mod canvas;
pub mod config;
pub mod error;
pub mod http;
pub mod monitor;
pub mod realtime;

pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use http::ApiClient;
pub use monitor::{ConnectSubscription, ConnectionMonitor, HealthProbe, MonitorConfig};
pub use realtime::{
    ConnectionState, Connector, DetectionSocket, FloorStatus, MemoryConnector, MemoryPeer,
    RealtimeConfig, RealtimeEvent, RealtimeManager, SocketEvent, WsConnector,
};

// Re-export shared types for convenience
pub use shared::{FloorId, TableId};

//! Shared types for FreeSpot
//!
//! Data models exchanged with the detection backend over REST, plus the
//! frame protocol pushed on the per-floor detection WebSocket.

pub mod error;
pub mod message;
pub mod models;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use error::{ApiErrorBody, ParseStatusError};
pub use message::{ServerFrame, FrameError};
pub use models::*;

/// Floor identifier (server assigned)
pub type FloorId = i64;

/// Table identifier (server assigned)
pub type TableId = i64;

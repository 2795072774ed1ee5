//! Data models
//!
//! Mirrors the backend's REST payloads. All IDs are `i64`
//! (PostgreSQL SERIAL primary keys on the backend).

pub mod cctv;
pub mod detection;
pub mod floor;
pub mod geometry;
pub mod health;
pub mod table;

// Re-exports
pub use cctv::*;
pub use detection::*;
pub use floor::*;
pub use geometry::*;
pub use health::*;
pub use table::*;

use serde::{Deserialize, Serialize};

/// Plain `{"message": "..."}` acknowledgement (delete / stop endpoints)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiMessage {
    #[serde(default)]
    pub message: String,
}

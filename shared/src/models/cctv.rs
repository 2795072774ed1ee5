//! CCTV Stream Model

use serde::{Deserialize, Serialize};

use crate::FloorId;

/// CCTV stream entity (one camera feed per floor)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CctvStream {
    pub id: i64,
    pub floor_id: FloorId,
    pub name: String,
    /// RTSP or HTTP stream URL
    pub url: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

fn default_active() -> bool {
    true
}

/// Create CCTV stream payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CctvStreamCreate {
    pub name: String,
    pub url: String,
    pub floor_id: FloorId,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

/// Update CCTV stream payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CctvStreamUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

/// Response of `POST /cctv-streams/{id}/toggle`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamToggle {
    pub message: String,
    pub stream_id: i64,
    pub is_active: bool,
    pub detection_running: bool,
}

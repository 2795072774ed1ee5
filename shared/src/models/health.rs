//! Health Model

use serde::{Deserialize, Serialize};

/// Response of `GET /health`
///
/// Only the HTTP status decides health; the body is informational.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Whether the detection model finished loading
    #[serde(default)]
    pub detection_service: Option<bool>,
    #[serde(default)]
    pub device: Option<String>,
}

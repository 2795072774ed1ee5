//! Detection Models
//!
//! Frames pushed by the person-detection service plus the REST payloads of
//! the `/detection` endpoints.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::table::TableStatus;
use crate::{FloorId, TableId};

/// Default logical canvas (16:9) the table regions are drawn on
pub const DEFAULT_CANVAS_WIDTH: u32 = 1280;
pub const DEFAULT_CANVAS_HEIGHT: u32 = 720;

/// Body of `POST /detection/start/{floor_id}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionStart {
    pub canvas_width: u32,
    pub canvas_height: u32,
}

impl Default for DetectionStart {
    fn default() -> Self {
        Self {
            canvas_width: DEFAULT_CANVAS_WIDTH,
            canvas_height: DEFAULT_CANVAS_HEIGHT,
        }
    }
}

/// Response of `POST /detection/start/{floor_id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionStarted {
    pub message: String,
    pub floor_id: FloorId,
    #[serde(default)]
    pub stream_url: Option<String>,
    #[serde(default)]
    pub tables_count: usize,
    #[serde(default)]
    pub detection_interval: Option<f64>,
    #[serde(default)]
    pub canvas_size: Option<String>,
}

/// Occupancy of a single table in a detection frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDetection {
    pub id: TableId,
    #[serde(default)]
    pub name: String,
    pub occupied: bool,
    #[serde(default = "default_method")]
    pub method: String,
    /// Distance of the closest person center to the table center
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub person_count: u32,
}

impl TableDetection {
    pub fn status(&self) -> TableStatus {
        TableStatus::from_occupied(self.occupied)
    }
}

fn default_method() -> String {
    "center_point".to_string()
}

/// One detection frame (WebSocket push, or `GET /detection/result/{floor_id}`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionFrame {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor_id: Option<FloorId>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub persons_detected: u32,
    pub table_status: Vec<TableDetection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<f64>,
}

impl DetectionFrame {
    pub fn occupied_count(&self) -> usize {
        self.table_status.iter().filter(|t| t.occupied).count()
    }
}

/// One running detection stream in `GET /detection/status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveStreamInfo {
    pub url: String,
    #[serde(default)]
    pub tables_count: usize,
    #[serde(default)]
    pub started_at: Option<serde_json::Value>,
}

/// Response of `GET /detection/status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionStatus {
    pub is_running: bool,
    /// Keyed by floor id (JSON object keys are strings)
    #[serde(default)]
    pub streams: HashMap<String, ActiveStreamInfo>,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub initialized: Option<bool>,
}

/// CCTV stream summary inside a floor detection status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSummary {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub is_active: bool,
}

/// Response of `GET /detection/status/{floor_id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloorDetectionStatus {
    pub floor_id: FloorId,
    pub floor_name: String,
    pub floor_number: i32,
    #[serde(default)]
    pub cctv_streams: Vec<StreamSummary>,
    #[serde(default)]
    pub active_streams_count: usize,
    pub detection_running: bool,
    #[serde(default)]
    pub detection_info: Option<serde_json::Value>,
    #[serde(default)]
    pub last_detection: Option<String>,
    #[serde(default)]
    pub tables_monitored: Vec<TableDetection>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_minimal() {
        let frame: DetectionFrame = serde_json::from_str(
            r#"{"timestamp":"2025-01-01T10:00:00","persons_detected":2,
                "table_status":[{"id":1,"name":"T1","occupied":true,"method":"center_point","distance":12.5}]}"#,
        )
        .unwrap();
        assert_eq!(frame.persons_detected, 2);
        assert_eq!(frame.occupied_count(), 1);
        assert_eq!(frame.table_status[0].status(), TableStatus::Occupied);
        assert_eq!(frame.table_status[0].person_count, 0);
    }

    #[test]
    fn test_frame_full_server_shape() {
        let frame: DetectionFrame = serde_json::from_value(serde_json::json!({
            "floor_id": 3,
            "timestamp": "2025-01-01T10:00:00",
            "persons_detected": 0,
            "table_status": [{"id": 9, "occupied": false, "distance": null, "person_count": 0}],
            "frame_width": 1920,
            "frame_height": 1080,
            "processing_time_ms": 41.7
        }))
        .unwrap();
        assert_eq!(frame.floor_id, Some(3));
        assert_eq!(frame.table_status[0].method, "center_point");
        assert_eq!(frame.frame_width, Some(1920));
    }

    #[test]
    fn test_detection_start_default() {
        let body = serde_json::to_value(DetectionStart::default()).unwrap();
        assert_eq!(body, serde_json::json!({"canvas_width": 1280, "canvas_height": 720}));
    }
}

//! Floor Model

use serde::{Deserialize, Serialize};

use crate::FloorId;

/// Floor entity (楼层：一楼、二楼、露台等)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Floor {
    pub id: FloorId,
    pub number: i32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Floor {
    /// Display label, e.g. "Floor 2 (Rooftop)"
    pub fn label(&self) -> String {
        format!("Floor {} ({})", self.number, self.name)
    }
}

/// Create floor payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloorCreate {
    pub name: String,
    pub number: i32,
}

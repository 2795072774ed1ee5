//! Table Model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::geometry::TableRect;
use crate::error::ParseStatusError;
use crate::{FloorId, TableId};

/// Size used when a table carries no width/height at all
pub const DEFAULT_TABLE_SIZE: f64 = 100.0;

/// Table occupancy status (桌台状态)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TableStatus {
    #[default]
    Available,
    Occupied,
    Reserved,
}

impl TableStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableStatus::Available => "available",
            TableStatus::Occupied => "occupied",
            TableStatus::Reserved => "reserved",
        }
    }

    /// Status derived from a detection result
    pub fn from_occupied(occupied: bool) -> Self {
        if occupied {
            TableStatus::Occupied
        } else {
            TableStatus::Available
        }
    }
}

impl fmt::Display for TableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableStatus {
    type Err = ParseStatusError;

    /// Accepts the canonical names plus the localized aliases older
    /// dashboards wrote into the database.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "available" | "tersedia" | "kosong" | "free" | "empty" => Ok(TableStatus::Available),
            "occupied" | "terisi" | "penuh" | "busy" => Ok(TableStatus::Occupied),
            "reserved" | "dipesan" | "reservasi" | "booked" => Ok(TableStatus::Reserved),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

impl Serialize for TableStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TableStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        let Some(raw) = raw else {
            return Ok(TableStatus::default());
        };
        // Unknown values must not break a whole table listing
        Ok(raw.parse().unwrap_or_else(|e: ParseStatusError| {
            tracing::warn!("{e}, treating as available");
            TableStatus::Available
        }))
    }
}

/// Stored table coordinates
///
/// `[x1, y1, x2, y2]` is the legacy layout; `[x, y]` plus the table's
/// `width`/`height` is the current one. Some rows hold an object instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Coords {
    List(Vec<f64>),
    Object {
        x: f64,
        y: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        width: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        height: Option<f64>,
    },
}

/// Table entity (桌台)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub id: TableId,
    pub name: String,
    pub floor_id: FloorId,
    #[serde(default = "default_capacity")]
    pub capacity: i32,
    #[serde(default)]
    pub status: TableStatus,
    #[serde(default)]
    pub coords: Option<Coords>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub rotation: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Table {
    /// Normalized region on the logical canvas
    pub fn rect(&self) -> TableRect {
        resolve_rect(self.coords.as_ref(), self.width, self.height, self.rotation)
    }
}

/// Resolve any stored coordinate layout into a [`TableRect`]
pub fn resolve_rect(
    coords: Option<&Coords>,
    width: Option<f64>,
    height: Option<f64>,
    rotation: f64,
) -> TableRect {
    let w = width.unwrap_or(DEFAULT_TABLE_SIZE);
    let h = height.unwrap_or(DEFAULT_TABLE_SIZE);
    match coords {
        // legacy corners may come in either order
        Some(Coords::List(c)) if c.len() >= 4 => TableRect::new(
            c[0].min(c[2]),
            c[1].min(c[3]),
            (c[2] - c[0]).abs(),
            (c[3] - c[1]).abs(),
            rotation,
        ),
        Some(Coords::List(c)) if c.len() >= 2 => TableRect::new(c[0], c[1], w, h, rotation),
        Some(Coords::List(c)) if c.len() == 1 => TableRect::new(c[0], 0.0, w, h, rotation),
        Some(Coords::Object {
            x,
            y,
            width: ow,
            height: oh,
        }) => TableRect::new(*x, *y, ow.unwrap_or(w), oh.unwrap_or(h), rotation),
        _ => TableRect::new(0.0, 0.0, w, h, rotation),
    }
}

fn default_capacity() -> i32 {
    4
}

fn null_as_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

/// Create table payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableCreate {
    pub name: String,
    pub floor_id: FloorId,
    pub capacity: i32,
    pub status: TableStatus,
    pub coords: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    pub rotation: f64,
}

impl TableCreate {
    /// New table drawn on the canvas, stored in the current `[x, y]` layout
    pub fn from_rect(name: impl Into<String>, floor_id: FloorId, rect: TableRect) -> Self {
        Self {
            name: name.into(),
            floor_id,
            capacity: default_capacity(),
            status: TableStatus::Available,
            coords: vec![rect.x, rect.y],
            width: Some(rect.width),
            height: Some(rect.height),
            rotation: rect.rotation,
        }
    }
}

/// Update table payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TableStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coords: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
}

impl TableUpdate {
    /// Position/size/rotation change after a canvas edit
    pub fn layout(rect: TableRect) -> Self {
        Self {
            coords: Some(vec![rect.x, rect.y]),
            width: Some(rect.width),
            height: Some(rect.height),
            rotation: Some(rect.rotation),
            ..Default::default()
        }
    }

    pub fn status(status: TableStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

/// Table as returned by `/tables/with-frames/{floor_id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameTable {
    pub id: TableId,
    pub name: String,
    #[serde(default)]
    pub status: TableStatus,
    #[serde(default)]
    pub coords: Option<Coords>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub rotation: f64,
    #[serde(default = "default_capacity")]
    pub capacity: i32,
}

impl FrameTable {
    pub fn rect(&self) -> TableRect {
        resolve_rect(self.coords.as_ref(), self.width, self.height, self.rotation)
    }
}

/// Tables of one floor together with the canvas they were drawn on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableFrames {
    pub floor_id: FloorId,
    pub floor_number: i32,
    pub canvas_width: u32,
    pub canvas_height: u32,
    #[serde(default)]
    pub tables: Vec<FrameTable>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::geometry::Point;

    #[test]
    fn test_status_aliases() {
        assert_eq!("Tersedia".parse::<TableStatus>().unwrap(), TableStatus::Available);
        assert_eq!("terisi".parse::<TableStatus>().unwrap(), TableStatus::Occupied);
        assert_eq!(" DIPESAN ".parse::<TableStatus>().unwrap(), TableStatus::Reserved);
        assert!("broken".parse::<TableStatus>().is_err());
    }

    #[test]
    fn test_status_serializes_canonical() {
        let json = serde_json::to_string(&TableStatus::Occupied).unwrap();
        assert_eq!(json, r#""occupied""#);
        let parsed: TableStatus = serde_json::from_str(r#""kosong""#).unwrap();
        assert_eq!(parsed, TableStatus::Available);
    }

    #[test]
    fn test_status_unknown_and_null_fall_back() {
        let parsed: TableStatus = serde_json::from_str(r#""maintenance""#).unwrap();
        assert_eq!(parsed, TableStatus::Available);
        let parsed: TableStatus = serde_json::from_str("null").unwrap();
        assert_eq!(parsed, TableStatus::Available);
    }

    #[test]
    fn test_legacy_coords_rect() {
        let table: Table = serde_json::from_value(serde_json::json!({
            "id": 1, "name": "T1", "floor_id": 2,
            "coords": [10.0, 10.0, 110.0, 60.0], "rotation": null
        }))
        .unwrap();
        assert_eq!(table.rect(), TableRect::new(10.0, 10.0, 100.0, 50.0, 0.0));
        assert_eq!(table.capacity, 4);
    }

    #[test]
    fn test_reversed_legacy_corners_rect() {
        let rect = resolve_rect(Some(&Coords::List(vec![110.0, 60.0, 10.0, 10.0])), None, None, 0.0);
        assert_eq!(rect, TableRect::new(10.0, 10.0, 100.0, 50.0, 0.0));
        assert!(rect.contains(Point::new(60.0, 35.0)));
    }

    #[test]
    fn test_current_coords_rect() {
        let table: Table = serde_json::from_value(serde_json::json!({
            "id": 1, "name": "T1", "floor_id": 2, "status": "occupied",
            "coords": [40, 20], "width": 80, "height": 30, "rotation": 0.5
        }))
        .unwrap();
        assert_eq!(table.rect(), TableRect::new(40.0, 20.0, 80.0, 30.0, 0.5));
        assert_eq!(table.status, TableStatus::Occupied);
    }

    #[test]
    fn test_object_and_missing_coords() {
        let rect = resolve_rect(
            Some(&Coords::Object { x: 5.0, y: 6.0, width: Some(7.0), height: None }),
            None,
            Some(9.0),
            0.0,
        );
        assert_eq!(rect, TableRect::new(5.0, 6.0, 7.0, 9.0, 0.0));
        assert_eq!(resolve_rect(None, None, None, 0.0).width, DEFAULT_TABLE_SIZE);
    }

    #[test]
    fn test_layout_update_skips_untouched_fields() {
        let update = TableUpdate::layout(TableRect::new(1.0, 2.0, 3.0, 4.0, 0.0));
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value["coords"], serde_json::json!([1.0, 2.0]));
        assert!(value.get("name").is_none());
        assert!(value.get("status").is_none());
    }
}

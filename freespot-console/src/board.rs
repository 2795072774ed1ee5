//! Occupancy board
//!
//! Client-side copy of floors and tables, kept current by detection frames.
//! REST loads replace the copy wholesale; detection frames overwrite table
//! statuses one table at a time (last write wins per table id).

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::{DetectionFrame, Floor, FloorId, Table, TableId, TableStatus};

/// Status transition caused by a detection frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub table_id: TableId,
    pub floor_id: FloorId,
    pub from: TableStatus,
    pub to: TableStatus,
}

/// Latest detection snapshot of one floor
#[derive(Debug, Clone, Serialize)]
pub struct FloorSnapshot {
    pub persons_detected: u32,
    pub occupied: usize,
    pub timestamp: Option<String>,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct OccupancyBoard {
    floors: BTreeMap<FloorId, Floor>,
    tables: BTreeMap<TableId, Table>,
    snapshots: BTreeMap<FloorId, FloorSnapshot>,
}

impl OccupancyBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the floor list; tables and snapshots of vanished floors go too
    pub fn load_floors(&mut self, floors: Vec<Floor>) -> Vec<FloorId> {
        self.floors = floors.into_iter().map(|f| (f.id, f)).collect();
        let floors = &self.floors;
        self.tables.retain(|_, t| floors.contains_key(&t.floor_id));
        self.snapshots.retain(|id, _| floors.contains_key(id));
        self.floor_ids()
    }

    /// Replace the table list (the backend is authoritative after a reload)
    pub fn load_tables(&mut self, tables: Vec<Table>) {
        let before = self.tables.len();
        self.tables = tables.into_iter().map(|t| (t.id, t)).collect();
        let orphans = self
            .tables
            .values()
            .filter(|t| !self.floors.contains_key(&t.floor_id))
            .count();
        if orphans > 0 {
            tracing::debug!(orphans, "Tables reference unknown floors");
        }
        tracing::debug!(before, after = self.tables.len(), "Tables reloaded");
    }

    /// Apply one detection frame, returning the statuses that actually changed
    ///
    /// Entries for tables that are unknown or belong to another floor are
    /// skipped.
    pub fn apply_detection(&mut self, floor_id: FloorId, frame: &DetectionFrame) -> Vec<StatusChange> {
        let mut changes = Vec::new();
        for detection in &frame.table_status {
            let Some(table) = self.tables.get_mut(&detection.id) else {
                tracing::debug!(floor_id, table_id = detection.id, "Detection for unknown table");
                continue;
            };
            if table.floor_id != floor_id {
                tracing::debug!(
                    floor_id,
                    table_id = detection.id,
                    table_floor = table.floor_id,
                    "Detection for table on another floor"
                );
                continue;
            }
            let to = detection.status();
            if table.status != to {
                changes.push(StatusChange {
                    table_id: table.id,
                    floor_id,
                    from: table.status,
                    to,
                });
                table.status = to;
            }
        }

        self.snapshots.insert(
            floor_id,
            FloorSnapshot {
                persons_detected: frame.persons_detected,
                occupied: frame.occupied_count(),
                timestamp: frame.timestamp.clone(),
                received_at: Utc::now(),
            },
        );
        changes
    }

    pub fn floor_ids(&self) -> Vec<FloorId> {
        self.floors.keys().copied().collect()
    }

    pub fn floor(&self, floor_id: FloorId) -> Option<&Floor> {
        self.floors.get(&floor_id)
    }

    /// "Floor 2 (Rooftop)", or the bare id when the floor is not loaded
    pub fn floor_label(&self, floor_id: FloorId) -> String {
        match self.floors.get(&floor_id) {
            Some(floor) => floor.label(),
            None => format!("Floor #{floor_id}"),
        }
    }

    pub fn table(&self, table_id: TableId) -> Option<&Table> {
        self.tables.get(&table_id)
    }

    pub fn tables_on(&self, floor_id: FloorId) -> impl Iterator<Item = &Table> {
        self.tables.values().filter(move |t| t.floor_id == floor_id)
    }

    pub fn snapshot(&self, floor_id: FloorId) -> Option<&FloorSnapshot> {
        self.snapshots.get(&floor_id)
    }

    pub fn summary(&self) -> BoardSummary {
        let mut summary = BoardSummary {
            floors: self.floors.len(),
            tables: self.tables.len(),
            ..BoardSummary::default()
        };
        for table in self.tables.values() {
            match table.status {
                TableStatus::Available => summary.available += 1,
                TableStatus::Occupied => summary.occupied += 1,
                TableStatus::Reserved => summary.reserved += 1,
            }
        }
        summary
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BoardSummary {
    pub floors: usize,
    pub tables: usize,
    pub available: usize,
    pub occupied: usize,
    pub reserved: usize,
}

impl fmt::Display for BoardSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} floors, {} tables ({} occupied, {} available, {} reserved)",
            self.floors, self.tables, self.occupied, self.available, self.reserved
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn floor(id: FloorId, number: i32, name: &str) -> Floor {
        Floor {
            id,
            number,
            name: name.to_string(),
            created_at: None,
        }
    }

    fn table(id: TableId, floor_id: FloorId, status: &str) -> Table {
        serde_json::from_value(json!({
            "id": id, "name": format!("T{id}"), "floor_id": floor_id,
            "status": status, "coords": [0, 0], "width": 50, "height": 50
        }))
        .unwrap()
    }

    fn frame(entries: &[(TableId, bool)]) -> DetectionFrame {
        let table_status: Vec<_> = entries
            .iter()
            .map(|(id, occupied)| json!({ "id": id, "name": "", "occupied": occupied }))
            .collect();
        serde_json::from_value(json!({
            "timestamp": "2025-01-01T10:00:00",
            "persons_detected": 3,
            "table_status": table_status,
        }))
        .unwrap()
    }

    fn board() -> OccupancyBoard {
        let mut board = OccupancyBoard::new();
        board.load_floors(vec![floor(1, 1, "Ground"), floor(2, 2, "Rooftop")]);
        board.load_tables(vec![
            table(10, 1, "available"),
            table(11, 1, "terisi"),
            table(20, 2, "reserved"),
        ]);
        board
    }

    #[test]
    fn test_only_changes_reported() {
        let mut board = board();
        let changes = board.apply_detection(1, &frame(&[(10, true), (11, true)]));
        assert_eq!(
            changes,
            vec![StatusChange {
                table_id: 10,
                floor_id: 1,
                from: TableStatus::Available,
                to: TableStatus::Occupied,
            }]
        );

        // same frame again: nothing new
        assert!(board.apply_detection(1, &frame(&[(10, true), (11, true)])).is_empty());
        let snap = board.snapshot(1).unwrap();
        assert_eq!((snap.persons_detected, snap.occupied), (3, 2));
    }

    #[test]
    fn test_last_write_wins() {
        let mut board = board();
        board.apply_detection(1, &frame(&[(10, true)]));
        board.apply_detection(1, &frame(&[(10, false)]));
        assert_eq!(board.table(10).unwrap().status, TableStatus::Available);

        // detection overrides a reservation, the backend does the same
        board.apply_detection(2, &frame(&[(20, true)]));
        assert_eq!(board.table(20).unwrap().status, TableStatus::Occupied);
    }

    #[test]
    fn test_foreign_and_unknown_tables_skipped() {
        let mut board = board();
        let changes = board.apply_detection(2, &frame(&[(10, true), (99, true)]));
        assert!(changes.is_empty());
        assert_eq!(board.table(10).unwrap().status, TableStatus::Available);
        assert!(board.table(99).is_none());
    }

    #[test]
    fn test_floor_reload_drops_vanished_floor() {
        let mut board = board();
        board.apply_detection(2, &frame(&[(20, true)]));

        let ids = board.load_floors(vec![floor(1, 1, "Ground")]);
        assert_eq!(ids, vec![1]);
        assert!(board.table(20).is_none());
        assert!(board.snapshot(2).is_none());
        assert_eq!(board.tables_on(1).count(), 2);
    }

    #[test]
    fn test_labels_and_summary() {
        let board = board();
        assert_eq!(board.floor_label(2), "Floor 2 (Rooftop)");
        assert_eq!(board.floor_label(7), "Floor #7");
        assert_eq!(
            board.summary().to_string(),
            "2 floors, 3 tables (1 occupied, 1 available, 1 reserved)"
        );
    }
}

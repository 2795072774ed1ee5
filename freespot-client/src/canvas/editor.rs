//! Pointer gestures on table regions
//!
//! Gestures run in logical canvas space. Hit tests and resize deltas are done
//! in the table's local (unrotated) frame and mapped back to world space, so
//! a rotated table behaves the same as an upright one.

use std::f64::consts::FRAC_PI_2;

use shared::{FloorId, Point, Table, TableId, TableRect, normalize_angle};

use super::viewport::Viewport;

/// Smallest width/height a resize can produce
pub const MIN_TABLE_SIZE: f64 = 20.0;
/// A drawn rectangle must exceed this in both dimensions to become a table
pub const MIN_DRAW_SIZE: f64 = 20.0;
/// Grab radius around handle centers
pub const HANDLE_RADIUS: f64 = 8.0;
/// Distance of the rotate handle above the top edge
pub const ROTATE_HANDLE_OFFSET: f64 = 25.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomRight,
        Corner::BottomLeft,
    ];

    /// Local-frame direction of this corner
    fn signs(self) -> (f64, f64) {
        match self {
            Corner::TopLeft => (-1.0, -1.0),
            Corner::TopRight => (1.0, -1.0),
            Corner::BottomRight => (1.0, 1.0),
            Corner::BottomLeft => (-1.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handle {
    Corner(Corner),
    Rotate,
}

/// What a pointer landed on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTarget {
    Handle(Handle),
    Body,
}

/// Handle center in world coordinates
pub fn handle_position(rect: &TableRect, handle: Handle) -> Point {
    rect.to_world(handle_local(rect, handle))
}

fn handle_local(rect: &TableRect, handle: Handle) -> Point {
    let hw = rect.width / 2.0;
    let hh = rect.height / 2.0;
    match handle {
        Handle::Corner(corner) => {
            let (sx, sy) = corner.signs();
            Point::new(sx * hw, sy * hh)
        }
        Handle::Rotate => Point::new(0.0, -hh - ROTATE_HANDLE_OFFSET),
    }
}

/// Hit test in the rectangle's local frame: rotate handle, corners, body
pub fn hit_test(rect: &TableRect, p: Point) -> Option<HitTarget> {
    let local = rect.to_local(p);
    if local.distance(handle_local(rect, Handle::Rotate)) <= HANDLE_RADIUS {
        return Some(HitTarget::Handle(Handle::Rotate));
    }
    for corner in Corner::ALL {
        if local.distance(handle_local(rect, Handle::Corner(corner))) <= HANDLE_RADIUS {
            return Some(HitTarget::Handle(Handle::Corner(corner)));
        }
    }
    rect.contains(p).then_some(HitTarget::Body)
}

/// Resize by dragging `corner` to `p`, keeping the opposite corner fixed
pub fn resize_from_anchor(original: &TableRect, corner: Corner, anchor: Point, p: Point) -> TableRect {
    let (sx, sy) = corner.signs();
    let theta = original.rotation;
    let d = (p - anchor).rotate(-theta);
    let width = (sx * d.x).max(MIN_TABLE_SIZE);
    let height = (sy * d.y).max(MIN_TABLE_SIZE);
    let center = anchor + Point::new(sx * width / 2.0, sy * height / 2.0).rotate(theta);
    TableRect {
        width,
        height,
        ..*original
    }
    .with_center(center)
}

/// Rotation that points the rotate handle at `p`
pub fn rotation_towards(rect: &TableRect, p: Point) -> f64 {
    let c = rect.center();
    normalize_angle((p.y - c.y).atan2(p.x - c.x) + FRAC_PI_2)
}

/// A table as the editor sees it
#[derive(Debug, Clone, PartialEq)]
pub struct EditableTable {
    pub id: TableId,
    pub name: String,
    pub rect: TableRect,
}

impl From<&Table> for EditableTable {
    fn from(table: &Table) -> Self {
        Self {
            id: table.id,
            name: table.name.clone(),
            rect: table.rect(),
        }
    }
}

/// Result of a finished gesture, to be persisted once
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutCommit {
    Update {
        table_id: TableId,
        rect: TableRect,
    },
    Create {
        floor_id: FloorId,
        name: String,
        rect: TableRect,
    },
}

#[derive(Debug, Clone, Copy)]
enum Gesture {
    Idle,
    Move {
        id: TableId,
        grab: Point,
        original: TableRect,
    },
    Resize {
        id: TableId,
        corner: Corner,
        anchor: Point,
        original: TableRect,
    },
    Rotate {
        id: TableId,
        original: TableRect,
    },
    Draw {
        start: Point,
        current: Point,
    },
}

/// Gesture state machine of the layout canvas
#[derive(Debug, Clone)]
pub struct LayoutEditor {
    floor_id: FloorId,
    viewport: Viewport,
    tables: Vec<EditableTable>,
    selected: Option<TableId>,
    gesture: Gesture,
}

impl LayoutEditor {
    pub fn new(floor_id: FloorId, viewport: Viewport) -> Self {
        Self {
            floor_id,
            viewport,
            tables: Vec::new(),
            selected: None,
            gesture: Gesture::Idle,
        }
    }

    pub fn with_tables<'a>(mut self, tables: impl IntoIterator<Item = &'a Table>) -> Self {
        self.tables = tables.into_iter().map(EditableTable::from).collect();
        self
    }

    pub fn floor_id(&self) -> FloorId {
        self.floor_id
    }

    pub fn tables(&self) -> &[EditableTable] {
        &self.tables
    }

    pub fn table(&self, id: TableId) -> Option<&EditableTable> {
        self.tables.iter().find(|t| t.id == id)
    }

    pub fn selected(&self) -> Option<TableId> {
        self.selected
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// Rectangle being drawn, for preview
    pub fn draft(&self) -> Option<TableRect> {
        match self.gesture {
            Gesture::Draw { start, current } => Some(TableRect::from_corners(start, current)),
            _ => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.gesture, Gesture::Idle)
    }

    /// Insert or replace a table after the backend confirmed it
    pub fn upsert(&mut self, table: &Table) {
        let editable = EditableTable::from(table);
        match self.tables.iter_mut().find(|t| t.id == table.id) {
            Some(existing) => *existing = editable,
            None => self.tables.push(editable),
        }
    }

    pub fn remove(&mut self, id: TableId) {
        self.tables.retain(|t| t.id != id);
        if self.selected == Some(id) {
            self.selected = None;
        }
    }

    fn rect_mut(&mut self, id: TableId) -> Option<&mut TableRect> {
        self.tables.iter_mut().find(|t| t.id == id).map(|t| &mut t.rect)
    }

    /// Start a gesture at a screen position
    pub fn pointer_down(&mut self, screen: Point) -> Option<HitTarget> {
        let p = self.viewport.to_canvas(screen);

        // handles only exist on the selected table
        if let Some(id) = self.selected {
            if let Some(rect) = self.table(id).map(|t| t.rect) {
                if let Some(HitTarget::Handle(handle)) = hit_test(&rect, p) {
                    self.gesture = match handle {
                        Handle::Corner(corner) => {
                            let (sx, sy) = corner.signs();
                            let anchor = rect.to_world(Point::new(
                                -sx * rect.width / 2.0,
                                -sy * rect.height / 2.0,
                            ));
                            Gesture::Resize {
                                id,
                                corner,
                                anchor,
                                original: rect,
                            }
                        }
                        Handle::Rotate => Gesture::Rotate { id, original: rect },
                    };
                    return Some(HitTarget::Handle(handle));
                }
            }
        }

        // topmost (last drawn) table wins
        if let Some(table) = self.tables.iter().rev().find(|t| t.rect.contains(p)) {
            let id = table.id;
            let original = table.rect;
            self.selected = Some(id);
            self.gesture = Gesture::Move {
                id,
                grab: p - original.center(),
                original,
            };
            return Some(HitTarget::Body);
        }

        self.selected = None;
        let start = self.viewport.clamp(p);
        self.gesture = Gesture::Draw {
            start,
            current: start,
        };
        None
    }

    /// Live update while the pointer moves; nothing is persisted here
    pub fn pointer_move(&mut self, screen: Point) {
        let p = self.viewport.to_canvas(screen);
        match self.gesture {
            Gesture::Idle => {}
            Gesture::Move { id, grab, original } => {
                if let Some(rect) = self.rect_mut(id) {
                    *rect = original.with_center(p - grab);
                }
            }
            Gesture::Resize {
                id,
                corner,
                anchor,
                original,
            } => {
                if let Some(rect) = self.rect_mut(id) {
                    *rect = resize_from_anchor(&original, corner, anchor, p);
                }
            }
            Gesture::Rotate { id, original } => {
                if let Some(rect) = self.rect_mut(id) {
                    rect.rotation = rotation_towards(&original, p);
                }
            }
            Gesture::Draw { start, .. } => {
                self.gesture = Gesture::Draw {
                    start,
                    current: self.viewport.clamp(p),
                };
            }
        }
    }

    /// Finish the gesture; `Some` when something needs persisting
    pub fn pointer_up(&mut self, screen: Point) -> Option<LayoutCommit> {
        self.pointer_move(screen);
        let gesture = std::mem::replace(&mut self.gesture, Gesture::Idle);
        match gesture {
            Gesture::Idle => None,
            Gesture::Move { id, original, .. }
            | Gesture::Resize { id, original, .. }
            | Gesture::Rotate { id, original } => {
                let rect = self.table(id)?.rect;
                (rect != original).then_some(LayoutCommit::Update { table_id: id, rect })
            }
            Gesture::Draw { start, current } => {
                let rect = TableRect::from_corners(start, current);
                if rect.width > MIN_DRAW_SIZE && rect.height > MIN_DRAW_SIZE {
                    Some(LayoutCommit::Create {
                        floor_id: self.floor_id,
                        name: format!("Table {}", self.tables.len() + 1),
                        rect,
                    })
                } else {
                    tracing::debug!(
                        width = rect.width,
                        height = rect.height,
                        "Drawn rectangle too small, ignored"
                    );
                    None
                }
            }
        }
    }

    /// Abort the gesture and restore the table
    pub fn pointer_cancel(&mut self) {
        let gesture = std::mem::replace(&mut self.gesture, Gesture::Idle);
        match gesture {
            Gesture::Move { id, original, .. }
            | Gesture::Resize { id, original, .. }
            | Gesture::Rotate { id, original } => {
                if let Some(rect) = self.rect_mut(id) {
                    *rect = original;
                }
            }
            Gesture::Idle | Gesture::Draw { .. } => {}
        }
    }
}

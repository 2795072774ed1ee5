//! Canvas interaction engine
//!
//! [`LayoutEditor`] turns pointer events into table edits; [`persist_commit`]
//! writes the outcome of a finished gesture through a [`LayoutStore`] with a
//! single request.

mod editor;
mod viewport;

use async_trait::async_trait;
use shared::{Table, TableCreate, TableId, TableUpdate};

pub use editor::{
    Corner, EditableTable, HANDLE_RADIUS, Handle, HitTarget, LayoutCommit, LayoutEditor,
    MIN_DRAW_SIZE, MIN_TABLE_SIZE, ROTATE_HANDLE_OFFSET, handle_position, hit_test,
    resize_from_anchor, rotation_towards,
};
pub use shared::{Point, TableRect};
pub use viewport::Viewport;

use crate::{ApiClient, ClientResult};

/// Where table layouts are saved
#[async_trait]
pub trait LayoutStore: Send + Sync {
    async fn create_table(&self, table: &TableCreate) -> ClientResult<Table>;
    async fn update_table(&self, table_id: TableId, update: &TableUpdate) -> ClientResult<Table>;
}

#[async_trait]
impl LayoutStore for ApiClient {
    async fn create_table(&self, table: &TableCreate) -> ClientResult<Table> {
        ApiClient::create_table(self, table).await
    }

    async fn update_table(&self, table_id: TableId, update: &TableUpdate) -> ClientResult<Table> {
        ApiClient::update_table(self, table_id, update).await
    }
}

/// Persist a finished gesture and sync the editor with the stored table
pub async fn persist_commit(
    store: &dyn LayoutStore,
    editor: &mut LayoutEditor,
    commit: LayoutCommit,
) -> ClientResult<Table> {
    let saved = match commit {
        LayoutCommit::Update { table_id, rect } => {
            tracing::debug!(table_id, ?rect, "Saving table layout");
            store
                .update_table(table_id, &TableUpdate::layout(rect))
                .await?
        }
        LayoutCommit::Create {
            floor_id,
            name,
            rect,
        } => {
            tracing::debug!(floor_id, %name, ?rect, "Creating table");
            store
                .create_table(&TableCreate::from_rect(name, floor_id, rect))
                .await?
        }
    };
    editor.upsert(&saved);
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use shared::TableStatus;

    #[derive(Default)]
    struct RecordingStore {
        calls: Mutex<Vec<String>>,
    }

    fn table_from(id: TableId, floor_id: i64, name: &str, coords: Vec<f64>, w: f64, h: f64, r: f64) -> Table {
        Table {
            id,
            name: name.to_string(),
            floor_id,
            capacity: 4,
            status: TableStatus::Available,
            coords: Some(shared::Coords::List(coords)),
            width: Some(w),
            height: Some(h),
            rotation: r,
            created_at: None,
        }
    }

    #[async_trait]
    impl LayoutStore for RecordingStore {
        async fn create_table(&self, table: &TableCreate) -> ClientResult<Table> {
            self.calls.lock().push(format!("create {}", table.name));
            Ok(table_from(
                99,
                table.floor_id,
                &table.name,
                table.coords.clone(),
                table.width.unwrap_or_default(),
                table.height.unwrap_or_default(),
                table.rotation,
            ))
        }

        async fn update_table(&self, table_id: TableId, update: &TableUpdate) -> ClientResult<Table> {
            self.calls.lock().push(format!("update {table_id}"));
            Ok(table_from(
                table_id,
                1,
                "T",
                update.coords.clone().unwrap_or_default(),
                update.width.unwrap_or_default(),
                update.height.unwrap_or_default(),
                update.rotation.unwrap_or_default(),
            ))
        }
    }

    #[tokio::test]
    async fn test_drag_persists_exactly_once() {
        let store = RecordingStore::default();
        let start = table_from(5, 1, "T", vec![100.0, 100.0], 100.0, 50.0, 0.0);
        let mut editor = LayoutEditor::new(1, Viewport::default()).with_tables([&start]);

        editor.pointer_down(Point::new(150.0, 125.0));
        for step in 0..25 {
            editor.pointer_move(Point::new(150.0 + f64::from(step), 125.0));
        }
        let commit = editor.pointer_up(Point::new(180.0, 125.0)).unwrap();
        let saved = persist_commit(&store, &mut editor, commit).await.unwrap();

        assert_eq!(*store.calls.lock(), vec!["update 5".to_string()]);
        assert_eq!(saved.rect(), TableRect::new(130.0, 100.0, 100.0, 50.0, 0.0));
        assert_eq!(editor.table(5).map(|t| t.rect), Some(saved.rect()));
    }

    #[tokio::test]
    async fn test_drawn_table_gets_server_id() {
        let store = RecordingStore::default();
        let mut editor = LayoutEditor::new(2, Viewport::default());

        editor.pointer_down(Point::new(300.0, 300.0));
        let commit = editor.pointer_up(Point::new(380.0, 360.0)).unwrap();
        persist_commit(&store, &mut editor, commit).await.unwrap();

        assert_eq!(*store.calls.lock(), vec!["create Table 1".to_string()]);
        let created = editor.table(99).unwrap();
        assert_eq!(created.rect, TableRect::new(300.0, 300.0, 80.0, 60.0, 0.0));
    }
}

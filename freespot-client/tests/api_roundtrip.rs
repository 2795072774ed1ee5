// freespot-client/tests/api_roundtrip.rs
// REST 客户端集成测试 (axum 假后端)

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use freespot_client::{ApiClient, ClientConfig, ClientError, HealthProbe};
use parking_lot::Mutex;
use serde_json::{Value, json};
use shared::{
    CctvStreamCreate, DetectionStart, FloorCreate, TableCreate, TableRect, TableStatus,
};

type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

#[derive(Clone, Default)]
struct Backend {
    tables: Arc<Mutex<Vec<Value>>>,
    streams: Arc<Mutex<Vec<Value>>>,
    next_id: Arc<AtomicI64>,
}

impl Backend {
    fn id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

fn not_found(what: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "detail": format!("{what} not found") })),
    )
}

fn floor_filter(query: &HashMap<String, String>) -> Option<i64> {
    query.get("floor_id").and_then(|v| v.parse().ok())
}

fn merge(target: &mut Value, patch: Value) {
    if let (Some(target), Value::Object(patch)) = (target.as_object_mut(), patch) {
        for (key, value) in patch {
            target.insert(key, value);
        }
    }
}

fn list_rows(rows: &Mutex<Vec<Value>>, query: HashMap<String, String>) -> Json<Value> {
    let rows = rows.lock();
    let filtered: Vec<Value> = rows
        .iter()
        .filter(|r| floor_filter(&query).is_none_or(|f| r["floor_id"] == json!(f)))
        .cloned()
        .collect();
    Json(Value::Array(filtered))
}

async fn list_tables(State(b): State<Backend>, Query(q): Query<HashMap<String, String>>) -> Json<Value> {
    list_rows(&b.tables, q)
}

async fn create_table(State(b): State<Backend>, Json(mut body): Json<Value>) -> Json<Value> {
    merge(&mut body, json!({ "id": b.id(), "created_at": "2025-01-01T10:00:00" }));
    b.tables.lock().push(body.clone());
    Json(body)
}

async fn update_table(State(b): State<Backend>, Path(id): Path<i64>, Json(patch): Json<Value>) -> ApiResult {
    let mut tables = b.tables.lock();
    let row = tables
        .iter_mut()
        .find(|r| r["id"] == json!(id))
        .ok_or_else(|| not_found("Table"))?;
    merge(row, patch);
    Ok(Json(row.clone()))
}

async fn delete_table(State(b): State<Backend>, Path(id): Path<i64>) -> ApiResult {
    let mut tables = b.tables.lock();
    let before = tables.len();
    tables.retain(|r| r["id"] != json!(id));
    if tables.len() == before {
        return Err(not_found("Table"));
    }
    Ok(Json(json!({ "message": "Table deleted successfully" })))
}

async fn list_streams(State(b): State<Backend>, Query(q): Query<HashMap<String, String>>) -> Json<Value> {
    list_rows(&b.streams, q)
}

async fn create_stream(State(b): State<Backend>, Json(mut body): Json<Value>) -> Json<Value> {
    merge(&mut body, json!({ "id": b.id() }));
    b.streams.lock().push(body.clone());
    Json(body)
}

async fn update_stream(State(b): State<Backend>, Path(id): Path<i64>, Json(patch): Json<Value>) -> ApiResult {
    let mut streams = b.streams.lock();
    let row = streams
        .iter_mut()
        .find(|r| r["id"] == json!(id))
        .ok_or_else(|| not_found("CCTV stream"))?;
    merge(row, patch);
    Ok(Json(row.clone()))
}

async fn delete_stream(State(b): State<Backend>, Path(id): Path<i64>) -> Json<Value> {
    b.streams.lock().retain(|r| r["id"] != json!(id));
    Json(json!({ "message": "CCTV stream deleted successfully" }))
}

async fn toggle_stream(State(b): State<Backend>, Path(id): Path<i64>) -> ApiResult {
    let mut streams = b.streams.lock();
    let row = streams
        .iter_mut()
        .find(|r| r["id"] == json!(id))
        .ok_or_else(|| not_found("CCTV stream"))?;
    let active = !row["is_active"].as_bool().unwrap_or(false);
    row["is_active"] = json!(active);
    Ok(Json(json!({
        "message": format!("CCTV stream '{}' turned {}", row["name"].as_str().unwrap_or_default(), if active { "ON" } else { "OFF" }),
        "stream_id": id,
        "is_active": active,
        "detection_running": active,
    })))
}

async fn tables_with_frames(State(b): State<Backend>, Path(floor_id): Path<i64>) -> Json<Value> {
    let tables: Vec<Value> = b
        .tables
        .lock()
        .iter()
        .filter(|t| t["floor_id"] == json!(floor_id))
        .map(|t| {
            json!({
                "id": t["id"], "name": t["name"], "status": t["status"],
                "coords": t["coords"], "width": t["width"], "height": t["height"],
                "rotation": t["rotation"], "capacity": t["capacity"],
            })
        })
        .collect();
    Json(json!({
        "floor_id": floor_id,
        "floor_number": 2,
        "canvas_width": 1280,
        "canvas_height": 720,
        "tables": tables,
    }))
}

fn latest_result() -> Value {
    json!({
        "timestamp": "2025-01-01T10:00:00",
        "persons_detected": 2,
        "table_status": [
            { "id": 5, "name": "A1", "occupied": true, "method": "center_point", "distance": 12.5 },
            { "id": 6, "name": "A2", "occupied": false, "method": "overlap", "distance": null }
        ]
    })
}

async fn detection_result(Path(floor_id): Path<i64>) -> ApiResult {
    if floor_id != 1 {
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": "No detection result available" })),
        ));
    }
    Ok(Json(latest_result()))
}

async fn spawn_backend() -> (SocketAddr, Backend) {
    let backend = Backend::default();
    let app = Router::new()
        .route("/health", get(|| async { Json(json!({ "status": "healthy" })) }))
        .route(
            "/floors",
            get(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "detail": "Database unavailable" })),
                )
            })
            .post(|| async {
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(json!({ "detail": [{ "loc": ["body", "name"], "msg": "field required" }] })),
                )
            }),
        )
        .route("/tables", get(list_tables).post(create_table))
        .route("/tables/{id}", put(update_table).delete(delete_table))
        .route("/cctv-streams", get(list_streams).post(create_stream))
        .route("/cctv-streams/{id}", put(update_stream).delete(delete_stream))
        .route(
            "/detection/start/{floor_id}",
            post(|Path(floor_id): Path<i64>, Json(body): Json<Value>| async move {
                Json(json!({
                    "message": "Detection started",
                    "floor_id": floor_id,
                    "canvas_size": format!("{}x{}", body["canvas_width"], body["canvas_height"]),
                }))
            }),
        )
        .route(
            "/detection/stop/{floor_id}",
            post(|| async { (StatusCode::BAD_REQUEST, "not running") }),
        )
        .route("/tables/with-frames/{floor_id}", get(tables_with_frames))
        .route("/cctv-streams/{id}/toggle", post(toggle_stream))
        .route(
            "/detection/status",
            get(|| async {
                Json(json!({
                    "is_running": true,
                    "streams": {
                        "1": { "url": "rtsp://cam-a", "tables_count": 2, "started_at": 1735725600.5 }
                    },
                    "device": "cuda:0",
                    "model": "yolov8n.pt",
                    "initialized": true,
                }))
            }),
        )
        .route(
            "/detection/status/{floor_id}",
            get(|Path(floor_id): Path<i64>| async move {
                Json(json!({
                    "floor_id": floor_id,
                    "floor_name": "Ground",
                    "floor_number": 1,
                    "cctv_streams": [
                        { "id": 3, "name": "Main", "url": "rtsp://cam-a", "is_active": true },
                        { "id": 4, "name": "Side", "url": "rtsp://cam-b", "is_active": false }
                    ],
                    "active_streams_count": 1,
                    "detection_running": true,
                    "detection_info": 1735725600.5,
                    "last_detection": "2025-01-01T10:00:00",
                    "tables_monitored": latest_result()["table_status"],
                }))
            }),
        )
        .route("/detection/result/{floor_id}", get(detection_result))
        .route(
            "/detection/system-info",
            get(|| async { Json(json!({ "device": "cpu", "cuda_available": false })) }),
        )
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, backend)
}

fn client(addr: SocketAddr) -> ApiClient {
    ApiClient::new(ClientConfig::new(format!("http://{addr}/")).with_timeout(5)).unwrap()
}

#[tokio::test]
async fn test_table_coords_round_trip() {
    let (addr, _backend) = spawn_backend().await;
    let api = client(addr);

    let create = TableCreate {
        name: "T1".into(),
        floor_id: 1,
        capacity: 4,
        status: TableStatus::Available,
        coords: vec![10.0, 10.0, 110.0, 60.0],
        width: None,
        height: None,
        rotation: 0.0,
    };
    let created = api.create_table(&create).await.unwrap();

    let listed = api.list_tables(Some(1)).await.unwrap();
    assert_eq!(listed.len(), 1);
    let fetched = &listed[0];
    assert_eq!(fetched.id, created.id);
    assert_eq!(fetched.coords, Some(shared::Coords::List(vec![10.0, 10.0, 110.0, 60.0])));
    assert_eq!(fetched.rotation, 0.0);
    assert_eq!(fetched.rect(), TableRect::new(10.0, 10.0, 100.0, 50.0, 0.0));

    assert!(api.list_tables(Some(2)).await.unwrap().is_empty());
    assert_eq!(api.list_tables(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_table_status_update_and_delete() {
    let (addr, _backend) = spawn_backend().await;
    let api = client(addr);

    let created = api
        .create_table(&TableCreate::from_rect(
            "Window",
            3,
            TableRect::new(40.0, 20.0, 80.0, 30.0, 0.25),
        ))
        .await
        .unwrap();
    assert_eq!(created.rect(), TableRect::new(40.0, 20.0, 80.0, 30.0, 0.25));

    let updated = api
        .update_table_status(created.id, TableStatus::Occupied)
        .await
        .unwrap();
    assert_eq!(updated.status, TableStatus::Occupied);
    assert_eq!(updated.rect(), created.rect());

    let msg = api.delete_table(created.id).await.unwrap();
    assert_eq!(msg.message, "Table deleted successfully");
    let err = api.delete_table(created.id).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "Table not found");
}

#[tokio::test]
async fn test_error_messages() {
    let (addr, _backend) = spawn_backend().await;
    let api = client(addr);

    match api.list_floors().await {
        Err(ClientError::Api { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "Database unavailable");
        }
        other => panic!("unexpected {other:?}"),
    }

    let err = api
        .create_floor(&FloorCreate {
            name: String::new(),
            number: 1,
        })
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(422));
    assert_eq!(err.to_string(), "field required");

    let err = api.stop_detection(1).await.unwrap_err();
    assert_eq!(err.to_string(), "Request failed with status 400");
}

#[tokio::test]
async fn test_start_detection_sends_canvas() {
    let (addr, _backend) = spawn_backend().await;
    let api = client(addr);

    let started = api
        .start_detection(4, DetectionStart::default())
        .await
        .unwrap();
    assert_eq!(started.floor_id, 4);
    assert_eq!(started.canvas_size.as_deref(), Some("1280x720"));
}

#[tokio::test]
async fn test_single_stream_per_floor() {
    let (addr, _backend) = spawn_backend().await;
    let api = client(addr);

    for url in ["rtsp://cam-a", "rtsp://cam-b"] {
        api.create_cctv_stream(&CctvStreamCreate {
            name: "Old".into(),
            url: url.into(),
            floor_id: 1,
            is_active: false,
        })
        .await
        .unwrap();
    }
    let first_id = api.list_cctv_streams(Some(1)).await.unwrap()[0].id;

    let stream = api
        .set_floor_stream(1, "Main", "rtsp://cam-new")
        .await
        .unwrap();
    assert_eq!(stream.id, first_id);
    assert_eq!(stream.url, "rtsp://cam-new");
    assert!(stream.is_active);

    let floor1 = api.list_cctv_streams(Some(1)).await.unwrap();
    assert_eq!(floor1.len(), 1);
    assert_eq!(floor1[0].name, "Main");

    // empty floor: created
    let created = api.set_floor_stream(2, "Terrace", "rtsp://cam-2").await.unwrap();
    assert_eq!(created.floor_id, 2);
    assert_eq!(api.list_cctv_streams(None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_health_probe() {
    let (addr, _backend) = spawn_backend().await;
    let api = client(addr);
    assert_eq!(api.health().await.unwrap().status, "healthy");
    assert!(api.probe().await);

    // nothing listens on a freed port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = listener.local_addr().unwrap();
    drop(listener);
    assert!(!client(dead).probe().await);
}

#[tokio::test]
async fn test_tables_with_frames() {
    let (addr, _backend) = spawn_backend().await;
    let api = client(addr);

    api.create_table(&TableCreate::from_rect(
        "Booth",
        2,
        TableRect::new(200.0, 150.0, 120.0, 60.0, 0.5),
    ))
    .await
    .unwrap();
    api.create_table(&TableCreate::from_rect("Elsewhere", 3, TableRect::new(0.0, 0.0, 50.0, 50.0, 0.0)))
        .await
        .unwrap();

    let frames = api.tables_with_frames(2).await.unwrap();
    assert_eq!(frames.floor_id, 2);
    assert_eq!(frames.floor_number, 2);
    assert_eq!((frames.canvas_width, frames.canvas_height), (1280, 720));
    assert_eq!(frames.tables.len(), 1);
    assert_eq!(frames.tables[0].name, "Booth");
    assert_eq!(frames.tables[0].rect(), TableRect::new(200.0, 150.0, 120.0, 60.0, 0.5));
}

#[tokio::test]
async fn test_toggle_stream() {
    let (addr, _backend) = spawn_backend().await;
    let api = client(addr);

    let stream = api
        .create_cctv_stream(&CctvStreamCreate {
            name: "Main".into(),
            url: "rtsp://cam-a".into(),
            floor_id: 1,
            is_active: true,
        })
        .await
        .unwrap();

    let toggled = api.toggle_cctv_stream(stream.id).await.unwrap();
    assert_eq!(toggled.stream_id, stream.id);
    assert!(!toggled.is_active);
    assert!(!toggled.detection_running);
    assert_eq!(toggled.message, "CCTV stream 'Main' turned OFF");

    assert!(api.toggle_cctv_stream(stream.id).await.unwrap().is_active);
    assert!(api.toggle_cctv_stream(999).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_detection_status_payloads() {
    let (addr, _backend) = spawn_backend().await;
    let api = client(addr);

    let status = api.detection_status().await.unwrap();
    assert!(status.is_running);
    assert_eq!(status.streams.len(), 1);
    let stream = &status.streams["1"];
    assert_eq!(stream.url, "rtsp://cam-a");
    assert_eq!(stream.tables_count, 2);
    assert_eq!(status.device.as_deref(), Some("cuda:0"));
    assert_eq!(status.initialized, Some(true));

    let floor = api.floor_detection_status(1).await.unwrap();
    assert_eq!(floor.floor_name, "Ground");
    assert_eq!(floor.cctv_streams.len(), 2);
    assert_eq!(floor.active_streams_count, 1);
    assert!(floor.detection_running);
    assert_eq!(floor.last_detection.as_deref(), Some("2025-01-01T10:00:00"));
    assert_eq!(floor.tables_monitored.len(), 2);
    assert!(floor.tables_monitored[0].occupied);
    assert_eq!(floor.tables_monitored[1].distance, None);

    let info = api.system_info().await.unwrap();
    assert_eq!(info["device"], "cpu");
}

#[tokio::test]
async fn test_detection_result_before_first_frame() {
    let (addr, _backend) = spawn_backend().await;
    let api = client(addr);

    let frame = api.detection_result(1).await.unwrap().unwrap();
    assert_eq!(frame.persons_detected, 2);
    assert_eq!(frame.occupied_count(), 1);
    assert_eq!(frame.table_status[0].id, 5);

    // 404 "No detection result available" means nothing yet, not a failure
    assert!(api.detection_result(2).await.unwrap().is_none());
}

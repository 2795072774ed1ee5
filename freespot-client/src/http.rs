// freespot-client/src/http.rs
// REST 客户端 - 后端 HTTP 接口

use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::{
    ApiErrorBody, ApiMessage, CctvStream, CctvStreamCreate, CctvStreamUpdate, DetectionFrame,
    DetectionStart, DetectionStarted, DetectionStatus, Floor, FloorCreate, FloorDetectionStatus,
    FloorId, HealthStatus, StreamToggle, Table, TableCreate, TableFrames, TableId, TableStatus,
    TableUpdate,
};

use crate::{ClientConfig, ClientError, ClientResult};

/// Typed client for the FreeSpot backend REST API
///
/// Every method issues exactly one request. Non-2xx responses become
/// [`ClientError::Api`] carrying the server's `detail`, or
/// `"Request failed with status <code>"` when the body has none.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    config: ClientConfig,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()?;
        Ok(Self { client, config })
    }

    /// 获取基础 URL
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // ========== Transport ==========

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: Option<&[(&str, String)]>,
        body: Option<serde_json::Value>,
    ) -> ClientResult<T> {
        let url = self.config.api_url(path);
        tracing::debug!(%method, %url, "API request");

        let mut req = self.client.request(method, &url);
        if let Some(query) = query {
            req = req.query(query);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await?;
        handle_response(response).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.send(Method::GET, path, None, None).await
    }

    async fn get_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ClientResult<T> {
        self.send(Method::GET, path, Some(query), None).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let body = serde_json::to_value(body)?;
        self.send(Method::POST, path, None, Some(body)).await
    }

    async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.send(Method::POST, path, None, None).await
    }

    async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let body = serde_json::to_value(body)?;
        self.send(Method::PUT, path, None, Some(body)).await
    }

    async fn delete<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.send(Method::DELETE, path, None, None).await
    }

    // ========== Health ==========

    /// `GET /health`; any 2xx counts as healthy even with an odd body
    pub async fn health(&self) -> ClientResult<HealthStatus> {
        let response = self.client.get(self.config.api_url("/health")).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(api_error(status, &response.text().await.unwrap_or_default()));
        }
        let text = response.text().await?;
        Ok(serde_json::from_str(&text).unwrap_or_default())
    }

    // ========== Floors ==========

    pub async fn list_floors(&self) -> ClientResult<Vec<Floor>> {
        self.get("/floors").await
    }

    pub async fn create_floor(&self, floor: &FloorCreate) -> ClientResult<Floor> {
        self.post("/floors", floor).await
    }

    pub async fn delete_floor(&self, floor_id: FloorId) -> ClientResult<ApiMessage> {
        self.delete(&format!("/floors/{floor_id}")).await
    }

    // ========== Tables ==========

    pub async fn list_tables(&self, floor_id: Option<FloorId>) -> ClientResult<Vec<Table>> {
        match floor_id {
            Some(id) => self.get_query("/tables", &[("floor_id", id.to_string())]).await,
            None => self.get("/tables").await,
        }
    }

    /// Tables of a floor with the canvas size they were drawn on
    pub async fn tables_with_frames(&self, floor_id: FloorId) -> ClientResult<TableFrames> {
        self.get(&format!("/tables/with-frames/{floor_id}")).await
    }

    pub async fn create_table(&self, table: &TableCreate) -> ClientResult<Table> {
        self.post("/tables", table).await
    }

    pub async fn update_table(&self, table_id: TableId, update: &TableUpdate) -> ClientResult<Table> {
        self.put(&format!("/tables/{table_id}"), update).await
    }

    pub async fn update_table_status(
        &self,
        table_id: TableId,
        status: TableStatus,
    ) -> ClientResult<Table> {
        self.update_table(table_id, &TableUpdate::status(status)).await
    }

    pub async fn delete_table(&self, table_id: TableId) -> ClientResult<ApiMessage> {
        self.delete(&format!("/tables/{table_id}")).await
    }

    // ========== CCTV Streams ==========

    pub async fn list_cctv_streams(&self, floor_id: Option<FloorId>) -> ClientResult<Vec<CctvStream>> {
        match floor_id {
            Some(id) => {
                self.get_query("/cctv-streams", &[("floor_id", id.to_string())])
                    .await
            }
            None => self.get("/cctv-streams").await,
        }
    }

    pub async fn create_cctv_stream(&self, stream: &CctvStreamCreate) -> ClientResult<CctvStream> {
        self.post("/cctv-streams", stream).await
    }

    pub async fn update_cctv_stream(
        &self,
        stream_id: i64,
        update: &CctvStreamUpdate,
    ) -> ClientResult<CctvStream> {
        self.put(&format!("/cctv-streams/{stream_id}"), update).await
    }

    pub async fn delete_cctv_stream(&self, stream_id: i64) -> ClientResult<ApiMessage> {
        self.delete(&format!("/cctv-streams/{stream_id}")).await
    }

    pub async fn toggle_cctv_stream(&self, stream_id: i64) -> ClientResult<StreamToggle> {
        self.post_empty(&format!("/cctv-streams/{stream_id}/toggle")).await
    }

    /// Point a floor at `url`, keeping a single stream per floor
    ///
    /// Updates the floor's first stream if it has one and deletes any others,
    /// otherwise creates a new active stream.
    pub async fn set_floor_stream(
        &self,
        floor_id: FloorId,
        name: &str,
        url: &str,
    ) -> ClientResult<CctvStream> {
        let mut existing = self.list_cctv_streams(Some(floor_id)).await?;
        existing.sort_by_key(|s| s.id);

        let mut streams = existing.into_iter();
        let Some(first) = streams.next() else {
            let create = CctvStreamCreate {
                name: name.to_string(),
                url: url.to_string(),
                floor_id,
                is_active: true,
            };
            return self.create_cctv_stream(&create).await;
        };

        for extra in streams {
            tracing::info!(floor_id, stream_id = extra.id, "Removing extra CCTV stream");
            self.delete_cctv_stream(extra.id).await?;
        }

        let update = CctvStreamUpdate {
            name: Some(name.to_string()),
            url: Some(url.to_string()),
            is_active: Some(true),
        };
        self.update_cctv_stream(first.id, &update).await
    }

    // ========== Detection ==========

    pub async fn start_detection(
        &self,
        floor_id: FloorId,
        canvas: DetectionStart,
    ) -> ClientResult<DetectionStarted> {
        self.post(&format!("/detection/start/{floor_id}"), &canvas).await
    }

    pub async fn stop_detection(&self, floor_id: FloorId) -> ClientResult<ApiMessage> {
        self.post_empty(&format!("/detection/stop/{floor_id}")).await
    }

    pub async fn detection_status(&self) -> ClientResult<DetectionStatus> {
        self.get("/detection/status").await
    }

    pub async fn floor_detection_status(&self, floor_id: FloorId) -> ClientResult<FloorDetectionStatus> {
        self.get(&format!("/detection/status/{floor_id}")).await
    }

    /// Latest detection snapshot; `None` while nothing has been detected yet
    ///
    /// The backend answers 404 until the first frame of a floor is processed.
    pub async fn detection_result(&self, floor_id: FloorId) -> ClientResult<Option<DetectionFrame>> {
        let value: serde_json::Value = match self.get(&format!("/detection/result/{floor_id}")).await {
            Ok(value) => value,
            Err(e) if e.is_not_found() => {
                tracing::debug!(floor_id, "No detection result yet: {e}");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        if value.get("table_status").is_some_and(|t| t.is_array()) {
            Ok(Some(serde_json::from_value(value)?))
        } else {
            Ok(None)
        }
    }

    /// Device / model details of the detection service (shape varies by host)
    pub async fn system_info(&self) -> ClientResult<serde_json::Value> {
        self.get("/detection/system-info").await
    }
}

async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(api_error(status, &text));
    }
    serde_json::from_str(&text).map_err(|e| {
        ClientError::InvalidResponse(format!("{e} (status {}, body: {})", status.as_u16(), preview(&text)))
    })
}

/// Error for a non-2xx response, preferring the server's `detail`
fn api_error(status: StatusCode, body: &str) -> ClientError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.message())
        .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16()));
    ClientError::Api {
        status: status.as_u16(),
        message,
    }
}

fn preview(text: &str) -> &str {
    match text.char_indices().nth(200) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_uses_detail() {
        let err = api_error(StatusCode::NOT_FOUND, r#"{"detail":"Table not found"}"#);
        match err {
            ClientError::Api { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Table not found");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_api_error_generic_message() {
        let err = api_error(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert_eq!(err.to_string(), "Request failed with status 502");
    }

    #[test]
    fn test_preview_truncates() {
        let long = "x".repeat(500);
        assert_eq!(preview(&long).len(), 200);
        assert_eq!(preview("short"), "short");
    }
}

//! Error types for the shared crate

use serde::Deserialize;
use thiserror::Error;

/// Unknown table status string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown table status: {0}")]
pub struct ParseStatusError(pub String);

/// Error body returned by the backend on non-2xx responses
///
/// The backend reports `{"detail": "..."}` for business errors and
/// `{"detail": [{"loc": [...], "msg": "..."}]}` for request validation errors.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ApiErrorBody {
    /// Human readable message, if the server supplied one
    pub fn message(&self) -> Option<String> {
        match self.detail.as_ref()? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            serde_json::Value::Array(items) => {
                let msgs: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                    .collect();
                if msgs.is_empty() {
                    None
                } else {
                    Some(msgs.join("; "))
                }
            }
            _ => None,
        }
    }
}

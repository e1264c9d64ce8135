//! HTTP message types for the MediAssist backend. Client ↔ server JSON.

use serde::{Deserialize, Serialize};

use crate::conversation::{Citation, Confidence, Turn};

/// Client → server: `POST /chat` body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub question: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_memory: Option<bool>,
}

impl<'a> ChatRequest<'a> {
    pub fn new(question: &'a str, top_k: u32, use_memory: bool) -> Self {
        Self {
            question,
            top_k: Some(top_k),
            use_memory: Some(use_memory),
        }
    }
}

/// Server → client: `POST /chat` reply.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatReply {
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<Citation>,
    #[serde(default)]
    pub confidence: Option<Confidence>,
    #[serde(default)]
    pub memory_length: Option<usize>,
}

impl ChatReply {
    /// Parse a reply body. A body without `answer` is malformed even on 2xx;
    /// the backend reports its own failures as `{"error": "..."}`.
    pub fn from_json(value: serde_json::Value) -> Result<Self, String> {
        if value.get("answer").is_none() {
            return Err(match value.get("error").and_then(|e| e.as_str()) {
                Some(err) => format!("backend error: {}", err),
                None => "missing answer".into(),
            });
        }
        serde_json::from_value(value).map_err(|e| e.to_string())
    }
}

/// Server → client: `POST /clear` reply. Only the status string is kept.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClearReply {
    #[serde(default)]
    pub status: Option<String>,
}

/// Parse a `GET /history` body. A missing or non-array `history` is empty;
/// entries that do not parse as turns are skipped.
pub fn parse_history(value: &serde_json::Value) -> Vec<Turn> {
    let Some(entries) = value.get("history").and_then(|h| h.as_array()) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| match serde_json::from_value::<Turn>(entry.clone()) {
            Ok(turn) => Some(turn),
            Err(e) => {
                tracing::debug!(error = %e, "skipping unreadable history entry");
                None
            }
        })
        .collect()
}

/// Extract FastAPI's `detail` from an error body. `detail` is a string for
/// `HTTPException` and a list of objects for validation errors.
pub fn error_detail(value: &serde_json::Value) -> Option<String> {
    match value.get("detail")? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

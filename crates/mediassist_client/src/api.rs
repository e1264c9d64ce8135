//! HTTP wrapper around the MediAssist backend: ask, history, clear.
//! Holds no conversation state; [`crate::ChatSession`] builds on it.

use std::time::Duration;

use reqwest::{Response, Url};
use tracing::debug;

use crate::config::{QueryOptions, Settings};
use crate::conversation::Turn;
use crate::messages::{error_detail, parse_history, ChatReply, ChatRequest, ClearReply};

/// Failure of one backend call.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid backend URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("cannot reach backend: {0}")]
    Network(#[from] reqwest::Error),

    #[error("backend returned HTTP {status}{}", suffix(.detail))]
    Status { status: u16, detail: Option<String> },

    #[error("malformed backend response: {0}")]
    Malformed(String),

    #[error("no response from backend within {0:?}")]
    Timeout(Duration),

    #[error("request cancelled")]
    Cancelled,
}

fn suffix(detail: &Option<String>) -> String {
    detail.as_deref().map(|d| format!(": {}", d)).unwrap_or_default()
}

/// Resolved endpoint URLs.
#[derive(Debug, Clone)]
struct Endpoints {
    chat: Url,
    history: Url,
    clear: Url,
}

fn endpoint(base_url: &str, path: &str) -> Result<Url, ClientError> {
    let joined = format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|e| ClientError::InvalidUrl {
        url: joined,
        reason: e.to_string(),
    })
}

/// HTTP client for one backend. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    endpoints: Endpoints,
}

impl ApiClient {
    pub fn new(settings: &Settings) -> Result<Self, ClientError> {
        let endpoints = Endpoints {
            chat: endpoint(&settings.base_url, &settings.chat_path)?,
            history: endpoint(&settings.base_url, &settings.history_path)?,
            clear: endpoint(&settings.base_url, &settings.clear_path)?,
        };
        let http = reqwest::Client::builder()
            .connect_timeout(settings.timeout)
            .build()?;
        Ok(Self { http, endpoints })
    }

    /// `POST /chat`. Non-2xx, a body without `answer`, or an invalid
    /// citation is an error.
    pub async fn ask(
        &self,
        question: &str,
        options: QueryOptions,
    ) -> Result<ChatReply, ClientError> {
        let payload = ChatRequest::new(question, options.top_k, options.use_memory);
        debug!(url = %self.endpoints.chat, ?payload, "sending chat request");
        let response = self
            .http
            .post(self.endpoints.chat.clone())
            .json(&payload)
            .send()
            .await?;
        let value = json_body(check_status(response).await?).await?;
        debug!(response = %value, "chat response received");
        ChatReply::from_json(value).map_err(ClientError::Malformed)
    }

    /// `GET /history`. JSON of an unexpected shape yields no turns rather
    /// than an error.
    pub async fn history(&self) -> Result<Vec<Turn>, ClientError> {
        let response = self.http.get(self.endpoints.history.clone()).send().await?;
        let value = json_body(check_status(response).await?).await?;
        Ok(parse_history(&value))
    }

    /// `POST /clear` with `{}`. Any 2xx is success, whatever the body says.
    pub async fn clear_memory(&self) -> Result<ClearReply, ClientError> {
        let response = self
            .http
            .post(self.endpoints.clear.clone())
            .json(&serde_json::json!({}))
            .send()
            .await?;
        let response = check_status(response).await?;
        // A 2xx with an unreadable body still counts as cleared.
        Ok(response.json::<ClearReply>().await.unwrap_or_default())
    }
}

async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let detail = response
        .json::<serde_json::Value>()
        .await
        .ok()
        .and_then(|body| error_detail(&body));
    Err(ClientError::Status {
        status: status.as_u16(),
        detail,
    })
}

async fn json_body(response: Response) -> Result<serde_json::Value, ClientError> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| ClientError::Malformed(e.to_string()))
}

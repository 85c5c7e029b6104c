//! OpenAIAssistantsBackend - Direct REST implementation of the OpenAI Assistants API.
//!
//! Every agent in a room gets its own assistant profile and thread; turns are
//! runs on that thread. API key can be provided directly or loaded from
//! environment variables.
//!
//! # Example
//!
//! ```rust,no_run
//! use llm_chatroom::backend::OpenAIAssistantsBackend;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // From environment variable (OPENAI_API_KEY)
//! let backend = OpenAIAssistantsBackend::try_from_env()?;
//!
//! // Direct API key
//! let backend = OpenAIAssistantsBackend::new("your-api-key").with_max_retries(3);
//! # Ok(())
//! # }
//! ```

use super::retry::retry_execution;
use super::{
    AssistantBackend, AssistantId, AssistantSpec, ContentPart, MessageRole, RunId, RunSnapshot,
    RunStatus, ThreadId, ThreadMessage,
};
use crate::error::BackendError;
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode, header::HeaderValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const BETA_HEADER: &str = "assistants=v2";
const PAGE_LIMIT: u32 = 100;

/// Backend implementation that talks to the OpenAI Assistants HTTP API.
#[derive(Clone)]
pub struct OpenAIAssistantsBackend {
    client: Client,
    api_key: String,
    base_url: String,
    max_retries: u32,
}

impl OpenAIAssistantsBackend {
    /// Creates a new backend with the provided API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_retries: 2,
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// Environment variables:
    /// - `OPENAI_API_KEY` (required)
    /// - `OPENAI_BASE_URL` (optional, defaults to the public API)
    pub fn try_from_env() -> Result<Self, BackendError> {
        let api_key = env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                BackendError::MissingCredential(
                    "OPENAI_API_KEY environment variable not set".to_string(),
                )
            })?;

        let backend = Self::new(api_key);
        Ok(match env::var("OPENAI_BASE_URL") {
            Ok(url) if !url.trim().is_empty() => backend.with_base_url(url),
            _ => backend,
        })
    }

    /// Points the backend at a different API root (proxies, compatible servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets how many times a retryable failure is repeated per call.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Sends one request.
    ///
    /// Failures are flagged retryable only when resending cannot duplicate a
    /// side effect: any GET, or a POST the server provably never accepted
    /// (connect failure, 429).
    async fn send_once<B, R>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<R, BackendError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let idempotent = method == Method::GET;
        let mut request = self
            .client
            .request(method, self.url(path))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("OpenAI-Beta", BETA_HEADER);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|err| BackendError::Http {
            status_code: None,
            message: format!("OpenAI API request failed: {err}"),
            is_retryable: err.is_connect() || (idempotent && err.is_timeout()),
            retry_after: None,
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let retry_after = parse_retry_after(response.headers().get("retry-after"));
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read OpenAI error body".to_string());
            return Err(map_http_error(status, body_text, retry_after, idempotent));
        }

        let text = response
            .text()
            .await
            .map_err(|err| BackendError::Decode(format!("OpenAI response: {err}")))?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn send<B, R>(
        &self,
        operation: &str,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<R, BackendError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned + Send,
    {
        retry_execution(self.max_retries, operation, || {
            self.send_once(method.clone(), path, body)
        })
        .await
    }
}

#[async_trait]
impl AssistantBackend for OpenAIAssistantsBackend {
    async fn create_assistant(&self, spec: &AssistantSpec) -> Result<AssistantId, BackendError> {
        let created: ObjectRef = self
            .send("create_assistant", Method::POST, "assistants", Some(spec))
            .await?;
        Ok(AssistantId::new(created.id))
    }

    async fn create_thread(&self) -> Result<ThreadId, BackendError> {
        let empty = serde_json::json!({});
        let created: ObjectRef = self
            .send("create_thread", Method::POST, "threads", Some(&empty))
            .await?;
        Ok(ThreadId::new(created.id))
    }

    async fn append_message(
        &self,
        thread: &ThreadId,
        role: MessageRole,
        content: &str,
    ) -> Result<(), BackendError> {
        let body = CreateMessageRequest { role, content };
        let _: ObjectRef = self
            .send(
                "append_message",
                Method::POST,
                &format!("threads/{thread}/messages"),
                Some(&body),
            )
            .await?;
        Ok(())
    }

    async fn create_run(
        &self,
        thread: &ThreadId,
        assistant: &AssistantId,
    ) -> Result<RunId, BackendError> {
        let body = CreateRunRequest {
            assistant_id: assistant.as_str(),
        };
        let created: ObjectRef = self
            .send(
                "create_run",
                Method::POST,
                &format!("threads/{thread}/runs"),
                Some(&body),
            )
            .await?;
        Ok(RunId::new(created.id))
    }

    async fn run_status(
        &self,
        thread: &ThreadId,
        run: &RunId,
    ) -> Result<RunSnapshot, BackendError> {
        let object: RunObject = self
            .send::<(), _>(
                "run_status",
                Method::GET,
                &format!("threads/{thread}/runs/{run}"),
                None,
            )
            .await?;
        Ok(object.into_snapshot())
    }

    async fn list_messages(&self, thread: &ThreadId) -> Result<Vec<ThreadMessage>, BackendError> {
        let mut messages = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let mut path = format!("threads/{thread}/messages?order=asc&limit={PAGE_LIMIT}");
            if let Some(cursor) = &after {
                path.push_str("&after=");
                path.push_str(cursor);
            }

            let page: MessageList = self
                .send::<(), _>("list_messages", Method::GET, &path, None)
                .await?;
            let next_cursor = page.last_id.clone();
            messages.extend(page.data.into_iter().map(MessageObject::into_thread_message));

            match (page.has_more, next_cursor) {
                (true, Some(cursor)) => after = Some(cursor),
                _ => break,
            }
        }

        Ok(messages)
    }
}

#[derive(Serialize)]
struct CreateMessageRequest<'a> {
    role: MessageRole,
    content: &'a str,
}

#[derive(Serialize)]
struct CreateRunRequest<'a> {
    assistant_id: &'a str,
}

#[derive(Deserialize)]
struct ObjectRef {
    id: String,
}

#[derive(Deserialize)]
struct RunObject {
    status: RunStatus,
    #[serde(default)]
    last_error: Option<RunError>,
}

#[derive(Deserialize)]
struct RunError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl RunObject {
    fn into_snapshot(self) -> RunSnapshot {
        let last_error = self.last_error.map(|err| match (err.code, err.message) {
            (Some(code), Some(message)) if !message.is_empty() => format!("{code}: {message}"),
            (Some(code), _) => code,
            (None, Some(message)) => message,
            (None, None) => "unknown error".to_string(),
        });
        RunSnapshot {
            status: self.status,
            last_error,
        }
    }
}

#[derive(Deserialize)]
struct MessageList {
    data: Vec<MessageObject>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    last_id: Option<String>,
}

#[derive(Deserialize)]
struct MessageObject {
    #[serde(default)]
    run_id: Option<String>,
    role: MessageRole,
    #[serde(default)]
    content: Vec<serde_json::Value>,
}

impl MessageObject {
    fn into_thread_message(self) -> ThreadMessage {
        ThreadMessage {
            run_id: self.run_id.map(RunId::new),
            role: self.role,
            content: self.content.into_iter().map(parse_content_part).collect(),
        }
    }
}

/// Text parts look like `{"type": "text", "text": {"value": "...", "annotations": []}}`.
fn parse_content_part(raw: serde_json::Value) -> ContentPart {
    let kind = raw
        .get("type")
        .and_then(|t| t.as_str())
        .unwrap_or("unknown")
        .to_string();

    if kind == "text" {
        if let Some(value) = raw.pointer("/text/value").and_then(|v| v.as_str()) {
            return ContentPart::Text(value.to_string());
        }
    }

    ContentPart::Other { kind, raw }
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
    #[allow(dead_code)]
    r#type: Option<String>,
    #[allow(dead_code)]
    code: Option<String>,
}

/// 429 is always safe to retry; 5xx only for requests without side effects,
/// since the server may have applied the request before failing.
fn map_http_error(
    status: StatusCode,
    body: String,
    retry_after: Option<Duration>,
    idempotent: bool,
) -> BackendError {
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or(body);

    let is_retryable = status == StatusCode::TOO_MANY_REQUESTS
        || (idempotent
            && matches!(
                status,
                StatusCode::INTERNAL_SERVER_ERROR
                    | StatusCode::BAD_GATEWAY
                    | StatusCode::SERVICE_UNAVAILABLE
                    | StatusCode::GATEWAY_TIMEOUT
            ));

    if let Some(delay) = retry_after {
        BackendError::http_with_retry_after(status.as_u16(), message, is_retryable, delay)
    } else {
        BackendError::Http {
            status_code: Some(status.as_u16()),
            message,
            is_retryable,
            retry_after: None,
        }
    }
}

fn parse_retry_after(header: Option<&HeaderValue>) -> Option<Duration> {
    let value = header?.to_str().ok()?;
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

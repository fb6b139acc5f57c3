//! HTTP request runner for the backend and storage APIs.
//!
//! Every call returns a normalized [`Outcome`] regardless of status code;
//! deciding whether a status is acceptable is the evaluator's job. Only
//! transport failures (timeouts, refused connections, unreadable bodies)
//! surface as [`ClientError`]. There are no retries.

use common::secret::{ExposeSecret, SecretString};
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Maximum length for response text quoted in messages.
const MAX_ERROR_BODY_LEN: usize = 256;

/// Regex pattern for JWT tokens (header.payload.signature).
static JWT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"eyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+(?:\.[A-Za-z0-9_-]*)?").unwrap()
});

/// Regex pattern for Bearer tokens in text.
static BEARER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)bearer\s+[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+(?:\.[A-Za-z0-9_-]*)?").unwrap()
});

/// Redact credentials from response text and cap its length.
///
/// Bearer patterns are replaced before bare JWTs so "Bearer <JWT>" is
/// redacted as a whole. Truncation respects UTF-8 boundaries.
pub fn sanitize_body(body: &str) -> String {
    let sanitized = BEARER_PATTERN.replace_all(body, "[BEARER_REDACTED]");
    let sanitized = JWT_PATTERN.replace_all(&sanitized, "[JWT_REDACTED]");

    match sanitized.char_indices().nth(MAX_ERROR_BODY_LEN) {
        Some((cut, _)) => format!("{}...[truncated]", &sanitized[..cut]),
        None => sanitized.into_owned(),
    }
}

/// Request runner errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// Response body, parsed as JSON when possible.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    Json(Value),
    Text(String),
}

impl Body {
    fn from_text(text: String) -> Self {
        if text.trim().is_empty() {
            return Body::Empty;
        }
        match serde_json::from_str(&text) {
            Ok(value) => Body::Json(value),
            Err(_) => Body::Text(text),
        }
    }
}

/// Normalized result of one HTTP exchange.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub status: u16,
    pub body: Body,
    pub headers: HeaderMap,
}

impl Outcome {
    /// Build an outcome from parts (used by tests and probes).
    pub fn new(status: u16, body: Body) -> Self {
        Self {
            status,
            body,
            headers: HeaderMap::new(),
        }
    }

    /// JSON body, if the response carried one.
    pub fn json(&self) -> Option<&Value> {
        match &self.body {
            Body::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Field addressed by a JSON pointer (`/users/name`).
    pub fn field(&self, pointer: &str) -> Option<&Value> {
        self.json().and_then(|value| value.pointer(pointer))
    }

    /// Field rendered as text; strings are unquoted and numbers stringified.
    pub fn field_text(&self, pointer: &str) -> Option<String> {
        match self.field(pointer)? {
            Value::String(text) => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            Value::Bool(flag) => Some(flag.to_string()),
            _ => None,
        }
    }

    /// Number of elements when the body is a JSON array.
    pub fn array_len(&self) -> Option<usize> {
        self.json().and_then(Value::as_array).map(Vec::len)
    }

    /// Deserialize the body into a typed record.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match &self.body {
            Body::Json(value) => T::deserialize(value),
            Body::Text(text) => serde_json::from_str(text),
            Body::Empty => serde_json::from_str(""),
        }
    }

    /// Whether the response carries `name` (case-insensitive).
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains_key(name)
    }

    /// Sanitized response text for failure messages.
    pub fn body_text(&self) -> String {
        match &self.body {
            Body::Empty => String::new(),
            Body::Json(value) => sanitize_body(&value.to_string()),
            Body::Text(text) => sanitize_body(text),
        }
    }

    /// "HTTP <status>: <body>" summary used when a status is unexpected.
    pub fn describe(&self) -> String {
        format!("HTTP {}: {}", self.status, self.body_text())
    }

    /// Response snapshot stored with failing results.
    pub fn snapshot(&self) -> Option<Value> {
        match &self.body {
            Body::Empty => None,
            Body::Json(value) => Some(value.clone()),
            Body::Text(text) => Some(Value::String(sanitize_body(text))),
        }
    }
}

/// Client for the backend API or the storage API.
pub struct ApiClient {
    base_url: String,
    http_client: Client,
    bearer: Option<SecretString>,
}

impl ApiClient {
    /// Create a client rooted at `base_url` with the given request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http_client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
            bearer: None,
        })
    }

    /// Authenticate every request with `Authorization: Bearer <token>`.
    #[must_use]
    pub fn with_bearer(mut self, token: SecretString) -> Self {
        self.bearer = Some(token);
        self
    }

    /// Absolute URL for a path under the base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `GET <base><path>`
    pub async fn get(&self, path: &str) -> Result<Outcome, ClientError> {
        self.execute(self.request(Method::GET, &self.url(path))).await
    }

    /// `GET <base><path>?<query>`
    pub async fn get_with_query(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<Outcome, ClientError> {
        self.execute(self.request(Method::GET, &self.url(path)).query(query))
            .await
    }

    /// `POST <base><path>` with a JSON body.
    pub async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<Outcome, ClientError> {
        self.execute(self.request(Method::POST, &self.url(path)).json(body))
            .await
    }

    /// `POST <base><path>` with a raw body, as a browser file upload would.
    pub async fn post_bytes(
        &self,
        path: &str,
        content_type: &'static str,
        bytes: Vec<u8>,
    ) -> Result<Outcome, ClientError> {
        let request = self
            .request(Method::POST, &self.url(path))
            .header(CONTENT_TYPE, content_type)
            .body(bytes);
        self.execute(request).await
    }

    /// `PUT <base><path>` with a JSON body.
    pub async fn put<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<Outcome, ClientError> {
        self.execute(self.request(Method::PUT, &self.url(path)).json(body))
            .await
    }

    /// `OPTIONS <base><path>` (CORS preflight).
    pub async fn options(&self, path: &str) -> Result<Outcome, ClientError> {
        self.execute(self.request(Method::OPTIONS, &self.url(path))).await
    }

    /// `HEAD <url>` against an absolute URL, without credentials.
    ///
    /// Public object URLs are fetched the way a browser would, so the bearer
    /// token is deliberately not attached.
    pub async fn head_public(&self, url: &str) -> Result<Outcome, ClientError> {
        self.execute(self.http_client.request(Method::HEAD, url)).await
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let request = self.http_client.request(method, url);
        match &self.bearer {
            Some(token) => request.header(
                AUTHORIZATION,
                format!("Bearer {}", token.expose_secret()),
            ),
            None => request,
        }
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Outcome, ClientError> {
        let response = request.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let url = response.url().to_string();
        let body = Body::from_text(response.text().await?);

        debug!(%url, status, "Received response");

        Ok(Outcome {
            status,
            body,
            headers,
        })
    }
}

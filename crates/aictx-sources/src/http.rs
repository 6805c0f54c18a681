//! Shared HTTP client.
//!
//! Uses async reqwest on a shared tokio runtime, but presents blocking calls
//! so collaborators can run on plain worker threads.

use std::sync::{LazyLock, OnceLock};
use std::time::Duration;

use aictx_core::CollaboratorError;
use futures_util::StreamExt;
use serde_json::Value;

/// Connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Whole-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Largest response body accepted (32 MiB)
pub const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Sent with every request; several hosts reject unknown agents
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/74.0.3729.157 Safari/537.36";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

static HTTP_CONFIG: OnceLock<HttpConfig> = OnceLock::new();

/// Install process-wide HTTP settings. Must run before the first request;
/// returns false if settings were already fixed.
pub fn set_http_config(config: HttpConfig) -> bool {
    HTTP_CONFIG.set(config).is_ok()
}

pub fn http_config() -> &'static HttpConfig {
    HTTP_CONFIG.get_or_init(HttpConfig::default)
}

/// Error types for HTTP operations
#[derive(Debug)]
pub enum HttpError {
    /// HTTP error with optional status code
    Http {
        status: Option<u16>,
        message: String,
    },
    /// Body exceeded the size cap
    TooLarge { limit: usize },
    /// Body is not the expected JSON
    Decode(String),
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http {
                status: Some(s),
                message,
            } => write!(f, "HTTP {s}: {message}"),
            Self::Http {
                status: None,
                message,
            } => write!(f, "HTTP error: {message}"),
            Self::TooLarge { limit } => write!(f, "response larger than {limit} bytes"),
            Self::Decode(msg) => write!(f, "invalid JSON response: {msg}"),
        }
    }
}

impl std::error::Error for HttpError {}

impl HttpError {
    /// Create HTTP error from reqwest error
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        Self::Http {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

impl From<HttpError> for CollaboratorError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Http { status, message } => Self::Http { status, message },
            HttpError::TooLarge { .. } => Self::Http {
                status: None,
                message: e.to_string(),
            },
            HttpError::Decode(msg) => Self::Parse(msg),
        }
    }
}

/// Shared async HTTP client with connection pooling.
static SHARED_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    let config = http_config();
    reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .user_agent(USER_AGENT)
        .pool_max_idle_per_host(8)
        .build()
        .expect("failed to build HTTP client")
});

/// Get shared HTTP client.
pub fn http_client() -> &'static reqwest::Client {
    &SHARED_CLIENT
}

/// Shared tokio runtime for HTTP operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("aictx-http")
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

async fn read_capped(response: reqwest::Response, limit: usize) -> Result<Vec<u8>, HttpError> {
    if response
        .content_length()
        .is_some_and(|len| len > limit as u64)
    {
        return Err(HttpError::TooLarge { limit });
    }
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| HttpError::from_reqwest(&e))?;
        if body.len() + chunk.len() > limit {
            return Err(HttpError::TooLarge { limit });
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// GET `url`, failing on non-2xx status or a body over `limit` bytes.
pub fn get_bytes(url: &str, limit: usize) -> Result<Vec<u8>, HttpError> {
    SHARED_RUNTIME.handle().block_on(async {
        let response = SHARED_CLIENT
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| HttpError::from_reqwest(&e))?;
        read_capped(response, limit).await
    })
}

/// GET `url` as text (invalid UTF-8 replaced).
pub fn get_text(url: &str) -> Result<String, HttpError> {
    let body = get_bytes(url, MAX_BODY_BYTES)?;
    Ok(String::from_utf8_lossy(&body).into_owned())
}

/// POST a JSON body and decode a JSON response.
pub fn post_json(url: &str, body: &Value) -> Result<Value, HttpError> {
    let bytes = SHARED_RUNTIME.handle().block_on(async {
        let response = SHARED_CLIENT
            .post(url)
            .json(body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| HttpError::from_reqwest(&e))?;
        read_capped(response, MAX_BODY_BYTES).await
    })?;
    serde_json::from_slice(&bytes).map_err(|e| HttpError::Decode(e.to_string()))
}

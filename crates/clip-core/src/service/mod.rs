mod http;

pub use http::HttpRenderService;

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error {status} from {url}: {message}")]
    Http {
        url: String,
        status: u16,
        message: String,
        is_last_retry: bool,
    },
    #[error("Network error calling {url}: {reason}")]
    Network {
        url: String,
        reason: String,
        is_last_retry: bool,
    },
    #[error("Timeout calling {url}")]
    Timeout { url: String, is_last_retry: bool },
    #[error("Unexpected response from {url}: {message}")]
    Parse { url: String, message: String },
    #[error("Request to {url} rejected: {message}")]
    Rejected { url: String, message: String },
    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP client setup failed: {0}")]
    Setup(String),
}

impl ApiError {
    pub fn is_last_retry(&self) -> bool {
        match self {
            Self::Http { is_last_retry, .. } => *is_last_retry,
            Self::Network { is_last_retry, .. } => *is_last_retry,
            Self::Timeout { is_last_retry, .. } => *is_last_retry,
            Self::Parse { .. } | Self::Rejected { .. } | Self::Io { .. } | Self::Setup(_) => true,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Signed upload slot handed out by the ingest API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    /// Source id to poll once the bytes are in.
    pub id: String,
    /// Pre-signed URL accepting a single PUT.
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStatus {
    Ready { url: String },
    Failed,
    /// Still being processed; carries the raw status.
    Pending(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderState {
    Queued,
    Fetching,
    Rendering,
    Saving,
    Done,
    Failed,
    #[serde(other)]
    Unknown,
}

impl RenderState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Fetching => "fetching",
            Self::Rendering => "rendering",
            Self::Saving => "saving",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RenderStatus {
    pub id: String,
    pub status: RenderState,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
}

/// Operations the assembly workflow needs from the render service.
///
/// The trait is object-safe and Send + Sync so the workflow can hold it
/// behind an `Arc<dyn RenderService>` and tests can script responses.
#[async_trait]
pub trait RenderService: Send + Sync {
    async fn request_upload(&self) -> Result<UploadTarget, ApiError>;

    async fn put_file(&self, target: &UploadTarget, path: &Path) -> Result<(), ApiError>;

    async fn source_status(&self, id: &str) -> Result<SourceStatus, ApiError>;

    /// Queue a render of `edit` (timeline, output and optional merge).
    /// Returns the render id.
    async fn submit_render(&self, edit: &Value) -> Result<String, ApiError>;

    async fn render_status(&self, id: &str) -> Result<RenderStatus, ApiError>;

    /// Fetch `url` into `dest`, creating parent directories. Returns the
    /// number of bytes written.
    async fn download(&self, url: &str, dest: &Path) -> Result<u64, ApiError>;
}

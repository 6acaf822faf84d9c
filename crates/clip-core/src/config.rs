use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for one validation run.
///
/// Built once at the entry point and handed to the [`Checker`](crate::Checker)
/// by reference; nothing inside the engine mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Treat WARNING findings as failing the run.
    pub strict_mode: bool,
    /// Skip media file existence checks entirely (no filesystem access).
    pub skip_file_validation: bool,
    /// Only check JSON syntax, then pass.
    pub skip_validate: bool,
    /// Upper bound on concurrent file probes.
    pub max_workers: usize,
    /// Minimum number of distinct media paths before probing in parallel.
    pub parallel_threshold: usize,
    /// Probe each resolved media path at most once per run.
    pub enable_cache: bool,
    pub verbose: bool,
    /// Explicit media root; overrides the document's `resourcesDir`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources_dir: Option<PathBuf>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            strict_mode: false,
            skip_file_validation: false,
            skip_validate: false,
            max_workers: default_max_workers(),
            parallel_threshold: 5,
            enable_cache: true,
            verbose: false,
            resources_dir: None,
        }
    }
}

fn default_max_workers() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    (cpus * 2).min(8)
}

impl ValidationConfig {
    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    pub fn with_skip_file_validation(mut self, skip: bool) -> Self {
        self.skip_file_validation = skip;
        self
    }

    pub fn with_skip_validate(mut self, skip: bool) -> Self {
        self.skip_validate = skip;
        self
    }

    pub fn with_max_workers(mut self, max: usize) -> Self {
        self.max_workers = max.max(1);
        self
    }

    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.enable_cache = enabled;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_resources_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.resources_dir = Some(dir.into());
        self
    }
}

pub const DEFAULT_INGEST_URL: &str = "https://api.shotstack.io/ingest/stage";
pub const DEFAULT_EDIT_URL: &str = "https://api.shotstack.io/edit/stage";

/// Connection and polling settings for the remote render service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub api_key: String,
    /// Base URL of the Ingest API (uploads and sources).
    pub ingest_url: String,
    /// Base URL of the Edit API (render jobs).
    pub edit_url: String,
    /// HTTP request timeout.
    pub request_timeout: Duration,
    /// Retries for idempotent GET requests.
    pub max_retries: u32,
    /// Base backoff between retries (doubled each attempt).
    pub retry_backoff: Duration,
    /// Fixed interval between render / source status polls.
    pub poll_interval: Duration,
    pub render_timeout: Duration,
    pub source_timeout: Duration,
}

impl ServiceConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ingest_url: DEFAULT_INGEST_URL.to_string(),
            edit_url: DEFAULT_EDIT_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_backoff: Duration::from_millis(250),
            poll_interval: Duration::from_secs(5),
            render_timeout: Duration::from_secs(300),
            source_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_ingest_url(mut self, url: impl Into<String>) -> Self {
        self.ingest_url = trim_base(url.into());
        self
    }

    pub fn with_edit_url(mut self, url: impl Into<String>) -> Self {
        self.edit_url = trim_base(url.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff = backoff;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_render_timeout(mut self, timeout: Duration) -> Self {
        self.render_timeout = timeout;
        self
    }

    pub fn with_source_timeout(mut self, timeout: Duration) -> Self {
        self.source_timeout = timeout;
        self
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

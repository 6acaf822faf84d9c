//! TOML configuration file schema and parsing.
//!
//! Example config file:
//!
//! ```toml
//! [validation]
//! strict_mode = true
//! max_workers = 4
//! parallel_threshold = 10
//! resources_dir = "media"
//!
//! [shotstack]
//! api_key = "..."
//! edit_url = "https://api.shotstack.io/edit/v1"
//! poll_interval_secs = 3
//!
//! [logging]
//! format = "json"
//! ```
//!
//! Without `--config`, the first `.validation.toml` or `validation.toml`
//! found walking up from the script's directory is used.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use clip_core::{ServiceConfig, ValidationConfig};

pub const CONFIG_FILE_NAMES: &[&str] = &[".validation.toml", "validation.toml"];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub validation: ValidationSection,

    #[serde(default)]
    pub shotstack: ShotstackSection,

    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValidationSection {
    pub strict_mode: Option<bool>,
    pub skip_file_validation: Option<bool>,
    pub max_workers: Option<usize>,
    pub parallel_threshold: Option<usize>,
    pub enable_cache: Option<bool>,
    pub verbose: Option<bool>,
    pub resources_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShotstackSection {
    pub api_key: Option<String>,
    pub ingest_url: Option<String>,
    pub edit_url: Option<String>,
    pub poll_interval_secs: Option<u64>,
    pub render_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            format: default_log_format(),
        }
    }
}

fn default_log_format() -> String {
    "pretty".into()
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;

        let mut config: AppConfig = toml::from_str(&content)
            .map_err(|e| format!("Failed to parse config file {}: {}", path.display(), e))?;

        // relative media roots are relative to the config file
        if let Some(dir) = config.validation.resources_dir.take() {
            let base = path.parent().unwrap_or_else(|| Path::new(""));
            let joined = base.join(dir);
            config.validation.resources_dir =
                Some(std::path::absolute(&joined).unwrap_or(joined));
        }

        config.validate()?;
        Ok(config)
    }

    /// Walk up from `start` looking for a config file.
    pub fn discover(start: &Path) -> Option<PathBuf> {
        start.ancestors().find_map(|dir| {
            CONFIG_FILE_NAMES
                .iter()
                .map(|name| dir.join(name))
                .find(|p| p.is_file())
        })
    }

    /// Explicit path, else a discovered file, else defaults. Environment
    /// variables are applied on top in every case.
    pub fn resolve(explicit: Option<&Path>, script_dir: &Path) -> Result<Self, String> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => match Self::discover(script_dir) {
                Some(path) => {
                    tracing::debug!(path = %path.display(), "Discovered config file");
                    Self::load(&path)?
                }
                None => Self::default(),
            },
        };
        config.apply_env(std::env::vars())?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay `VALIDATION_*` and `SHOTSTACK_*` variables.
    pub fn apply_env<I>(&mut self, vars: I) -> Result<(), String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let v = &mut self.validation;
            match key.as_str() {
                "VALIDATION_STRICT_MODE" => v.strict_mode = Some(parse_bool(&key, &value)?),
                "VALIDATION_SKIP_FILE_VALIDATION" => {
                    v.skip_file_validation = Some(parse_bool(&key, &value)?)
                }
                "VALIDATION_ENABLE_CACHE" => v.enable_cache = Some(parse_bool(&key, &value)?),
                "VALIDATION_VERBOSE" => v.verbose = Some(parse_bool(&key, &value)?),
                "VALIDATION_MAX_WORKERS" => v.max_workers = Some(parse_usize(&key, &value)?),
                "VALIDATION_PARALLEL_THRESHOLD" => {
                    v.parallel_threshold = Some(parse_usize(&key, &value)?)
                }
                "SHOTSTACK_API_KEY" => self.shotstack.api_key = Some(value),
                "SHOTSTACK_INGEST_URL" => self.shotstack.ingest_url = Some(value),
                "SHOTSTACK_EDIT_URL" => self.shotstack.edit_url = Some(value),
                _ => {}
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.validation.max_workers == Some(0) {
            return Err("max_workers must be at least 1".into());
        }

        for (name, value) in [
            ("ingest_url", &self.shotstack.ingest_url),
            ("edit_url", &self.shotstack.edit_url),
        ] {
            let Some(value) = value else { continue };
            let parsed = url::Url::parse(value)
                .map_err(|e| format!("Invalid {} '{}' ({})", name, value, e))?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(format!("{} must use http or https: {}", name, value));
            }
        }

        for (name, value) in [
            ("poll_interval_secs", self.shotstack.poll_interval_secs),
            ("render_timeout_secs", self.shotstack.render_timeout_secs),
            ("request_timeout_secs", self.shotstack.request_timeout_secs),
        ] {
            if value == Some(0) {
                return Err(format!("{} must be greater than zero", name));
            }
        }

        match self.logging.format.as_str() {
            "pretty" | "json" => {}
            other => {
                return Err(format!(
                    "Invalid log format '{}': must be 'pretty' or 'json'",
                    other
                ));
            }
        }

        Ok(())
    }

    pub fn to_validation_config(&self) -> ValidationConfig {
        let v = &self.validation;
        let mut c = ValidationConfig::default();
        if let Some(strict) = v.strict_mode {
            c = c.with_strict_mode(strict);
        }
        if let Some(skip) = v.skip_file_validation {
            c = c.with_skip_file_validation(skip);
        }
        if let Some(n) = v.max_workers {
            c = c.with_max_workers(n);
        }
        if let Some(n) = v.parallel_threshold {
            c = c.with_parallel_threshold(n);
        }
        if let Some(cache) = v.enable_cache {
            c = c.with_cache(cache);
        }
        if let Some(verbose) = v.verbose {
            c = c.with_verbose(verbose);
        }
        if let Some(ref dir) = v.resources_dir {
            c = c.with_resources_dir(dir.clone());
        }
        c
    }

    /// `None` when no API key is configured.
    pub fn to_service_config(&self) -> Option<ServiceConfig> {
        let s = &self.shotstack;
        let key = s.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())?;
        let mut c = ServiceConfig::new(key);
        if let Some(ref url) = s.ingest_url {
            c = c.with_ingest_url(url.clone());
        }
        if let Some(ref url) = s.edit_url {
            c = c.with_edit_url(url.clone());
        }
        if let Some(secs) = s.poll_interval_secs {
            c = c.with_poll_interval(Duration::from_secs(secs));
        }
        if let Some(secs) = s.render_timeout_secs {
            c = c.with_render_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = s.request_timeout_secs {
            c = c.with_request_timeout(Duration::from_secs(secs));
        }
        Some(c)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(format!("{} must be a boolean, got '{}'", key, value)),
    }
}

fn parse_usize(key: &str, value: &str) -> Result<usize, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("{} must be a non-negative integer, got '{}'", key, value))
}

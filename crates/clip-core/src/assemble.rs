//! Upload, render and download workflow for a validated script.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::checker::{script_dir, CheckError, Checker};
use crate::config::{ServiceConfig, ValidationConfig};
use crate::document::{Document, Shape};
use crate::service::{ApiError, RenderService, RenderState, SourceStatus};
use crate::validation::files::{collect_media_refs, FileChecker, MediaRef};
use crate::validation::report::ValidationReport;

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("cannot read script {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid script: {0}")]
    InvalidScript(String),
    #[error(transparent)]
    Check(#[from] CheckError),
    #[error("validation failed with {errors} error(s) and {warnings} warning(s)")]
    ValidationFailed {
        errors: usize,
        warnings: usize,
        report: Box<ValidationReport>,
    },
    #[error("media file not found: '{raw}' (looked in {})", looked.display())]
    MissingMedia { raw: String, looked: PathBuf },
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("processing failed for uploaded source {id} ({})", path.display())]
    SourceFailed { id: String, path: PathBuf },
    #[error("source {id} not ready after {}s", waited.as_secs())]
    SourceTimeout { id: String, waited: Duration },
    #[error("render {id} failed: {message}")]
    RenderFailed { id: String, message: String },
    #[error("render {id} not finished after {}s", waited.as_secs())]
    RenderTimeout { id: String, waited: Duration },
    #[error("render {id} finished without an output URL")]
    MissingOutputUrl { id: String },
}

/// Progress published while a script is assembled.
#[derive(Debug, Clone, PartialEq)]
pub enum AssemblyEvent {
    Validated { warnings: usize },
    ValidationSkipped,
    Uploading { index: usize, total: usize, path: PathBuf },
    Uploaded { path: PathBuf, url: String },
    Submitted { render_id: String },
    Status { render_id: String, state: RenderState },
    Downloading { url: String },
    Finished { path: PathBuf, bytes: u64 },
}

impl fmt::Display for AssemblyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validated { warnings: 0 } => write!(f, "script validated"),
            Self::Validated { warnings } => {
                write!(f, "script validated with {warnings} warning(s)")
            }
            Self::ValidationSkipped => write!(f, "validation skipped"),
            Self::Uploading { index, total, path } => {
                write!(f, "[{index}/{total}] uploading {}", path.display())
            }
            Self::Uploaded { path, .. } => write!(f, "uploaded {}", path.display()),
            Self::Submitted { render_id } => write!(f, "render {render_id} queued"),
            Self::Status { render_id, state } => write!(f, "render {render_id}: {state}"),
            Self::Downloading { url } => write!(f, "downloading {url}"),
            Self::Finished { path, bytes } => {
                write!(f, "saved {} ({bytes} bytes)", path.display())
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AssembleOptions {
    /// Output file, or a directory to place `<name>.<format>` in.
    pub output: Option<PathBuf>,
    pub skip_validate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedMedia {
    /// Reference as written in the script (after merge resolution).
    pub raw: String,
    pub path: PathBuf,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct AssemblyOutcome {
    pub render_id: String,
    pub output_path: PathBuf,
    pub url: String,
    pub bytes: u64,
    pub uploads: Vec<UploadedMedia>,
    pub report: Option<ValidationReport>,
    pub finished_at: DateTime<Utc>,
}

pub struct Assembler {
    service: Arc<dyn RenderService>,
    validation: ValidationConfig,
    config: ServiceConfig,
    events: Option<UnboundedSender<AssemblyEvent>>,
}

impl Assembler {
    pub fn new(
        service: Arc<dyn RenderService>,
        validation: ValidationConfig,
        config: ServiceConfig,
    ) -> Self {
        Self {
            service,
            validation,
            config,
            events: None,
        }
    }

    pub fn with_events(mut self, tx: UnboundedSender<AssemblyEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    fn emit(&self, event: AssemblyEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    pub async fn assemble(
        &self,
        script: &Path,
        options: &AssembleOptions,
    ) -> Result<AssemblyOutcome, AssembleError> {
        let text = tokio::fs::read_to_string(script)
            .await
            .map_err(|source| AssembleError::Read {
                path: script.to_path_buf(),
                source,
            })?;
        let base_dir = script_dir(script);

        let report = if options.skip_validate || self.validation.skip_validate {
            self.emit(AssemblyEvent::ValidationSkipped);
            None
        } else {
            let report = Checker::new(&self.validation)
                .check_str(&text, &base_dir)
                .await?;
            if !report.passed {
                return Err(AssembleError::ValidationFailed {
                    errors: report.errors().count(),
                    warnings: report.warnings().count(),
                    report: Box::new(report),
                });
            }
            self.emit(AssemblyEvent::Validated {
                warnings: report.warnings().count(),
            });
            Some(report)
        };

        let value: Value = serde_json::from_str(&text)
            .map_err(|e| AssembleError::InvalidScript(e.to_string()))?;
        let root = value
            .as_object()
            .ok_or_else(|| AssembleError::InvalidScript("root must be an object".to_string()))?;
        let doc = Document::new(root);

        let refs = collect_media_refs(&doc);
        let uploads = self.upload_all(&doc, &refs, &base_dir).await?;
        let edit = build_edit(&doc, &refs, &uploads)?;

        let render_id = self.service.submit_render(&edit).await?;
        info!(%render_id, "Render submitted");
        self.emit(AssemblyEvent::Submitted {
            render_id: render_id.clone(),
        });

        let url = self.wait_for_render(&render_id).await?;
        let output_path = output_path(&doc, script, &base_dir, options.output.as_deref());

        self.emit(AssemblyEvent::Downloading { url: url.clone() });
        let bytes = self.service.download(&url, &output_path).await?;
        info!(path = %output_path.display(), bytes, "Render downloaded");
        self.emit(AssemblyEvent::Finished {
            path: output_path.clone(),
            bytes,
        });

        Ok(AssemblyOutcome {
            render_id,
            output_path,
            url,
            bytes,
            uploads,
            report,
            finished_at: Utc::now(),
        })
    }

    async fn upload_all(
        &self,
        doc: &Document<'_>,
        refs: &[MediaRef],
        base_dir: &Path,
    ) -> Result<Vec<UploadedMedia>, AssembleError> {
        let resolver = FileChecker::new(&self.validation, base_dir)
            .with_document_resources(doc.resources_dir());

        let mut distinct: Vec<&str> = Vec::new();
        for r in refs {
            if !distinct.contains(&r.raw.as_str()) {
                distinct.push(&r.raw);
            }
        }

        let mut uploads = Vec::new();
        let total = distinct.len();
        for (i, raw) in distinct.into_iter().enumerate() {
            let path = resolver
                .resolve(raw)
                .ok_or_else(|| AssembleError::MissingMedia {
                    raw: raw.to_string(),
                    looked: resolver.candidates(raw).into_iter().next().unwrap_or_default(),
                })?;
            self.emit(AssemblyEvent::Uploading {
                index: i + 1,
                total,
                path: path.clone(),
            });

            let target = self.service.request_upload().await?;
            self.service.put_file(&target, &path).await?;
            let url = self.wait_for_source(&target.id, &path).await?;
            debug!(raw, %url, "Source ready");
            self.emit(AssemblyEvent::Uploaded {
                path: path.clone(),
                url: url.clone(),
            });
            uploads.push(UploadedMedia {
                raw: raw.to_string(),
                path,
                url,
            });
        }
        Ok(uploads)
    }

    async fn wait_for_source(&self, id: &str, path: &Path) -> Result<String, AssembleError> {
        let started = Instant::now();
        loop {
            match self.service.source_status(id).await? {
                SourceStatus::Ready { url } => return Ok(url),
                SourceStatus::Failed => {
                    return Err(AssembleError::SourceFailed {
                        id: id.to_string(),
                        path: path.to_path_buf(),
                    })
                }
                SourceStatus::Pending(status) => {
                    debug!(id, %status, "Source not ready yet");
                }
            }
            if started.elapsed() >= self.config.source_timeout {
                return Err(AssembleError::SourceTimeout {
                    id: id.to_string(),
                    waited: self.config.source_timeout,
                });
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    async fn wait_for_render(&self, id: &str) -> Result<String, AssembleError> {
        let started = Instant::now();
        let mut last = None;
        loop {
            let status = self.service.render_status(id).await?;
            if last != Some(status.status) {
                debug!(id, state = %status.status, "Render status changed");
                self.emit(AssemblyEvent::Status {
                    render_id: id.to_string(),
                    state: status.status,
                });
                last = Some(status.status);
            }
            match status.status {
                RenderState::Done => {
                    return status
                        .url
                        .filter(|u| !u.is_empty())
                        .ok_or_else(|| AssembleError::MissingOutputUrl { id: id.to_string() })
                }
                RenderState::Failed => {
                    return Err(AssembleError::RenderFailed {
                        id: id.to_string(),
                        message: status
                            .error
                            .filter(|e| !e.is_empty())
                            .unwrap_or_else(|| "unknown error".to_string()),
                    })
                }
                _ => {}
            }
            if started.elapsed() >= self.config.render_timeout {
                return Err(AssembleError::RenderTimeout {
                    id: id.to_string(),
                    waited: self.config.render_timeout,
                });
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

/// Edit payload for the render API with uploaded URLs substituted.
///
/// Template scripts bind placeholder sources through `merge`; every other
/// local `src` is rewritten in place.
fn build_edit(
    doc: &Document<'_>,
    refs: &[MediaRef],
    uploads: &[UploadedMedia],
) -> Result<Value, AssembleError> {
    let mut root = Value::Object(doc.root().clone());
    let mut bindings: Vec<(&str, &str)> = Vec::new();

    for r in refs {
        let Some(upload) = uploads.iter().find(|u| u.raw == r.raw) else {
            continue;
        };
        match (r.token.as_deref(), doc.shape()) {
            (Some(token), Shape::Template) => {
                if !bindings.iter().any(|(t, _)| *t == token) {
                    bindings.push((token, upload.url.as_str()));
                }
            }
            _ => {
                if let Some(slot) = root.pointer_mut(&r.location.to_pointer()) {
                    *slot = json!(upload.url);
                }
            }
        }
    }

    let missing = |what: &str| AssembleError::InvalidScript(format!("missing {what}"));
    let mut edit = Map::new();
    match doc.shape() {
        Shape::Template => {
            let timeline = root
                .pointer("/template/timeline")
                .cloned()
                .ok_or_else(|| missing("template.timeline"))?;
            edit.insert("timeline".into(), timeline);
            let output = root
                .get("output")
                .or_else(|| root.pointer("/template/output"))
                .cloned()
                .ok_or_else(|| missing("output"))?;
            edit.insert("output".into(), output);
            edit.insert("merge".into(), bind_merge(doc, &bindings));
        }
        Shape::Legacy => {
            let timeline = root.get("timeline").cloned().ok_or_else(|| missing("timeline"))?;
            edit.insert("timeline".into(), timeline);
            let output = root.get("output").cloned().ok_or_else(|| missing("output"))?;
            edit.insert("output".into(), output);
        }
    }
    Ok(Value::Object(edit))
}

/// The document's merge entries with `replace` set for uploaded tokens;
/// tokens without an entry get one appended.
fn bind_merge(doc: &Document<'_>, bindings: &[(&str, &str)]) -> Value {
    let mut entries: Vec<Value> = match doc.merge() {
        Some((Value::Array(entries), _)) => entries.clone(),
        _ => Vec::new(),
    };
    for (token, url) in bindings {
        let mut bound = false;
        for entry in entries.iter_mut() {
            let matches = entry
                .get("find")
                .and_then(Value::as_str)
                .is_some_and(|f| f.trim() == *token);
            if matches {
                entry["replace"] = json!(url);
                bound = true;
            }
        }
        if !bound {
            entries.push(json!({ "find": token, "replace": url }));
        }
    }
    Value::Array(entries)
}

fn output_path(
    doc: &Document<'_>,
    script: &Path,
    base_dir: &Path,
    requested: Option<&Path>,
) -> PathBuf {
    let stem = doc
        .name()
        .map(str::to_string)
        .or_else(|| script.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "output".to_string());
    let stem: String = stem
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect();
    let format = doc
        .output()
        .and_then(|(o, _)| o.get("format"))
        .and_then(Value::as_str)
        .unwrap_or("mp4");
    let file_name = format!("{stem}.{format}");

    match requested {
        Some(path) if path.is_dir() => path.join(file_name),
        Some(path) => path.to_path_buf(),
        None => base_dir.join("output").join(file_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{RenderStatus, UploadTarget};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    /// In-memory render service replaying scripted status sequences.
    #[derive(Default)]
    struct ScriptedService {
        uploads: Mutex<Vec<PathBuf>>,
        submitted: Mutex<Vec<Value>>,
        source_states: Mutex<Vec<SourceStatus>>,
        render_states: Mutex<Vec<RenderState>>,
        downloads: Mutex<Vec<(String, PathBuf)>>,
    }

    impl ScriptedService {
        fn with_render_states(states: &[RenderState]) -> Self {
            let svc = Self::default();
            *svc.render_states.lock().unwrap() = states.iter().rev().copied().collect();
            svc
        }
    }

    #[async_trait]
    impl RenderService for ScriptedService {
        async fn request_upload(&self) -> Result<UploadTarget, ApiError> {
            let n = self.uploads.lock().unwrap().len();
            Ok(UploadTarget {
                id: format!("src-{n}"),
                url: format!("https://signed/{n}"),
            })
        }

        async fn put_file(&self, _target: &UploadTarget, path: &Path) -> Result<(), ApiError> {
            self.uploads.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }

        async fn source_status(&self, id: &str) -> Result<SourceStatus, ApiError> {
            let next = self.source_states.lock().unwrap().pop();
            Ok(next.unwrap_or_else(|| SourceStatus::Ready {
                url: format!("https://cdn/{id}"),
            }))
        }

        async fn submit_render(&self, edit: &Value) -> Result<String, ApiError> {
            self.submitted.lock().unwrap().push(edit.clone());
            Ok("render-1".to_string())
        }

        async fn render_status(&self, id: &str) -> Result<RenderStatus, ApiError> {
            let state = self
                .render_states
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(RenderState::Rendering);
            Ok(RenderStatus {
                id: id.to_string(),
                status: state,
                url: (state == RenderState::Done).then(|| "https://cdn/final.mp4".to_string()),
                error: (state == RenderState::Failed).then(|| "bad asset".to_string()),
                created: None,
                updated: None,
            })
        }

        async fn download(&self, url: &str, dest: &Path) -> Result<u64, ApiError> {
            self.downloads
                .lock()
                .unwrap()
                .push((url.to_string(), dest.to_path_buf()));
            Ok(42)
        }
    }

    fn fast_config() -> ServiceConfig {
        ServiceConfig::new("key")
            .with_poll_interval(Duration::from_millis(1))
            .with_render_timeout(Duration::from_millis(200))
            .with_source_timeout(Duration::from_millis(200))
    }

    fn write_script(dir: &Path, doc: &Value) -> PathBuf {
        let path = dir.join("script.json");
        std::fs::write(&path, serde_json::to_vec_pretty(doc).unwrap()).unwrap();
        path
    }

    fn template_script() -> Value {
        json!({
            "name": "demo",
            "template": {"timeline": {"tracks": [{"clips": [
                {"asset": {"type": "video", "src": "{{media/a.mp4}}"}, "start": 0, "length": 3},
                {"asset": {"type": "text", "text": "{{TITLE}}"}, "start": 3, "length": 2},
                {"asset": {"type": "video", "src": "{{media/a.mp4}}"}, "start": 5, "length": 3}
            ]}]}},
            "output": {"format": "mp4"},
            "merge": [
                {"find": "media/a.mp4", "replace": ""},
                {"find": "TITLE", "replace": "Hello"}
            ]
        })
    }

    #[tokio::test]
    async fn template_upload_binds_merge_and_downloads() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("media")).unwrap();
        std::fs::write(dir.path().join("media/a.mp4"), b"x").unwrap();
        let script = write_script(dir.path(), &template_script());

        let svc = Arc::new(ScriptedService::with_render_states(&[
            RenderState::Queued,
            RenderState::Rendering,
            RenderState::Done,
        ]));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let assembler = Assembler::new(svc.clone(), ValidationConfig::default(), fast_config())
            .with_events(tx);

        let outcome = assembler
            .assemble(&script, &AssembleOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.render_id, "render-1");
        assert_eq!(outcome.uploads.len(), 1);
        assert_eq!(outcome.url, "https://cdn/final.mp4");
        assert_eq!(outcome.output_path, script_dir(&script).join("output").join("demo.mp4"));
        assert_eq!(svc.uploads.lock().unwrap().len(), 1);

        let edit = svc.submitted.lock().unwrap()[0].clone();
        assert!(edit.get("template").is_none());
        assert_eq!(edit["output"]["format"], "mp4");
        assert_eq!(
            edit["merge"],
            json!([
                {"find": "media/a.mp4", "replace": "https://cdn/src-0"},
                {"find": "TITLE", "replace": "Hello"}
            ])
        );
        assert_eq!(
            edit["timeline"]["tracks"][0]["clips"][0]["asset"]["src"],
            "{{media/a.mp4}}"
        );

        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        assert!(matches!(events.first(), Some(AssemblyEvent::Validated { .. })));
        let states: Vec<RenderState> = events
            .iter()
            .filter_map(|e| match e {
                AssemblyEvent::Status { state, .. } => Some(*state),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![RenderState::Queued, RenderState::Rendering, RenderState::Done]
        );
        assert!(matches!(events.last(), Some(AssemblyEvent::Finished { bytes: 42, .. })));
    }

    #[tokio::test]
    async fn legacy_sources_rewritten_in_place() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), b"x").unwrap();
        let doc = json!({
            "timeline": {"tracks": [{"clips": [
                {"asset": {"type": "image", "src": "a.png"}, "start": 0, "length": 2},
                {"asset": {"type": "image", "src": "https://cdn/b.png"}, "start": 2, "length": 2}
            ]}]},
            "output": {"format": "gif"}
        });
        let script = write_script(dir.path(), &doc);
        let out_dir = dir.path().join("renders");
        std::fs::create_dir(&out_dir).unwrap();

        let svc = Arc::new(ScriptedService::with_render_states(&[RenderState::Done]));
        let assembler = Assembler::new(svc.clone(), ValidationConfig::default(), fast_config());
        let outcome = assembler
            .assemble(
                &script,
                &AssembleOptions {
                    output: Some(out_dir.clone()),
                    skip_validate: false,
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.output_path, out_dir.join("script.gif"));
        let edit = svc.submitted.lock().unwrap()[0].clone();
        let clips = &edit["timeline"]["tracks"][0]["clips"];
        assert_eq!(clips[0]["asset"]["src"], "https://cdn/src-0");
        assert_eq!(clips[1]["asset"]["src"], "https://cdn/b.png");
        assert!(edit.get("merge").is_none());
    }

    #[tokio::test]
    async fn failed_validation_stops_before_network() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = template_script();
        doc.as_object_mut().unwrap().remove("merge");
        let script = write_script(dir.path(), &doc);

        let svc = Arc::new(ScriptedService::default());
        let assembler = Assembler::new(
            svc.clone(),
            ValidationConfig::default().with_skip_file_validation(true),
            fast_config(),
        );
        let err = assembler
            .assemble(&script, &AssembleOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AssembleError::ValidationFailed { errors: 1, .. }));
        assert!(svc.uploads.lock().unwrap().is_empty());
        assert!(svc.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn render_failure_surfaces_message() {
        let dir = tempfile::tempdir().unwrap();
        let doc = json!({
            "timeline": {"tracks": [{"clips": [
                {"asset": {"type": "text", "text": "hi"}, "start": 0, "length": 2}
            ]}]},
            "output": {"format": "mp4"}
        });
        let script = write_script(dir.path(), &doc);
        let svc = Arc::new(ScriptedService::with_render_states(&[
            RenderState::Queued,
            RenderState::Failed,
        ]));
        let err = Assembler::new(svc, ValidationConfig::default(), fast_config())
            .assemble(&script, &AssembleOptions::default())
            .await
            .unwrap_err();
        match err {
            AssembleError::RenderFailed { message, .. } => assert_eq!(message, "bad asset"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn render_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let doc = json!({
            "timeline": {"tracks": [{"clips": [
                {"asset": {"type": "text", "text": "hi"}, "start": 0, "length": 2}
            ]}]},
            "output": {"format": "mp4"}
        });
        let script = write_script(dir.path(), &doc);
        let svc = Arc::new(ScriptedService::default());
        let config = fast_config().with_render_timeout(Duration::from_millis(5));
        let err = Assembler::new(svc, ValidationConfig::default(), config)
            .assemble(&script, &AssembleOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AssembleError::RenderTimeout { .. }));
    }

    #[tokio::test]
    async fn failed_source_processing_stops() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), b"x").unwrap();
        let doc = json!({
            "timeline": {"tracks": [{"clips": [
                {"asset": {"type": "image", "src": "a.png"}, "start": 0, "length": 2}
            ]}]},
            "output": {"format": "mp4"}
        });
        let script = write_script(dir.path(), &doc);
        let svc = ScriptedService::default();
        *svc.source_states.lock().unwrap() =
            vec![SourceStatus::Failed, SourceStatus::Pending("importing".into())];
        let svc = Arc::new(svc);
        let err = Assembler::new(svc.clone(), ValidationConfig::default(), fast_config())
            .assemble(&script, &AssembleOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AssembleError::SourceFailed { .. }));
        assert!(svc.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn skip_validate_still_needs_local_media() {
        let dir = tempfile::tempdir().unwrap();
        let doc = json!({
            "timeline": {"tracks": [{"clips": [
                {"asset": {"type": "image", "src": "gone.png"}, "start": 0, "length": 2}
            ]}]},
            "output": {"format": "mp4"}
        });
        let script = write_script(dir.path(), &doc);
        let svc = Arc::new(ScriptedService::default());
        let err = Assembler::new(svc, ValidationConfig::default(), fast_config())
            .assemble(
                &script,
                &AssembleOptions {
                    output: None,
                    skip_validate: true,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AssembleError::MissingMedia { ref raw, .. } if raw == "gone.png"));
    }
}

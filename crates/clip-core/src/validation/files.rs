//! Media file existence checks.
//!
//! References are collected from the document, resolved against the
//! script's directory (falling back to a resources directory), and probed
//! on the filesystem. Above `parallel_threshold` distinct paths the probes
//! run as blocking tasks with at most `max_workers` in flight; the results
//! are put back in input order before any finding is built, so both modes
//! report the same thing.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use tracing::debug;

use crate::checker::CheckError;
use crate::config::ValidationConfig;
use crate::document::{walk, Document, JsonPath};
use crate::placeholder::whole_token;
use crate::validation::finding::{Category, Finding};

/// A local media path referenced from the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    /// Path as it will be resolved (merge replacement applied).
    pub raw: String,
    /// Where the `src` lives in the document.
    pub location: JsonPath,
    /// Placeholder token when the `src` was a single `{{token}}`.
    pub token: Option<String>,
}

/// True for strings that start with `scheme://` (`https://`, `s3://`...).
///
/// Single-letter schemes are rejected so `C://media/a.mp4` stays a path, and
/// a bare colon (`clip:1.mp4`) is a file name, not a scheme.
pub fn is_url(s: &str) -> bool {
    let Some((scheme, _)) = s.split_once("://") else {
        return false;
    };
    scheme.len() >= 2
        && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Strip a `file://` scheme; any other URL is not a local reference.
fn local_path(s: &str) -> Option<&str> {
    if let Some(path) = s.strip_prefix("file://") {
        return Some(path);
    }
    (!is_url(s)).then_some(s)
}

/// Collect every local media reference in the timeline, in document order.
pub fn collect_media_refs(doc: &Document<'_>) -> Vec<MediaRef> {
    let mut refs = Vec::new();
    let Some(timeline) = doc.timeline() else {
        return refs;
    };
    let bindings = doc.merge_bindings();
    let mut path = doc.timeline_path();

    walk(timeline, &mut path, &mut |path: &JsonPath, s: &str| {
        if path.last_key() != Some("src") {
            return;
        }
        let s = s.trim();
        if s.is_empty() {
            return;
        }

        let (raw, token) = match whole_token(s) {
            Some(token) => {
                let replace = bindings
                    .iter()
                    .find(|(find, _)| find.trim() == token)
                    .map(|(_, replace)| replace.trim())
                    .filter(|r| !r.is_empty());
                match replace {
                    Some(r) => match local_path(r) {
                        Some(p) => (p, Some(token)),
                        None => return,
                    },
                    None => match local_path(token) {
                        Some(p) => (p, Some(token)),
                        None => return,
                    },
                }
            }
            None if s.contains("{{") => return,
            None => match local_path(s) {
                Some(p) => (p, None),
                None => return,
            },
        };

        refs.push(MediaRef {
            raw: raw.to_string(),
            location: path.clone(),
            token: token.map(str::to_string),
        });
    });

    refs
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Probe {
    Found(PathBuf),
    Missing(PathBuf),
    Denied(PathBuf),
    NotAFile(PathBuf),
}

/// Findings plus how many filesystem probes were made.
#[derive(Debug, Default)]
pub(crate) struct FileCheckOutcome {
    pub findings: Vec<Finding>,
    pub probes: usize,
}

pub struct FileChecker<'a> {
    config: &'a ValidationConfig,
    base_dir: PathBuf,
    resources_dir: Option<PathBuf>,
}

impl<'a> FileChecker<'a> {
    /// `base_dir` is the directory of the script; relative media paths
    /// resolve against it, never against the working directory.
    pub fn new(config: &'a ValidationConfig, base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        let resources_dir = config.resources_dir.as_ref().map(|d| base_dir.join(d));
        Self {
            config,
            base_dir,
            resources_dir,
        }
    }

    /// Use the document's own resources directory unless the config sets one.
    pub fn with_document_resources(mut self, dir: Option<&str>) -> Self {
        if self.resources_dir.is_none() {
            self.resources_dir = dir.map(|d| self.base_dir.join(d));
        }
        self
    }

    /// Candidate locations for a reference, in lookup order.
    pub fn candidates(&self, raw: &str) -> Vec<PathBuf> {
        let path = Path::new(raw);
        if path.is_absolute() {
            return vec![path.to_path_buf()];
        }
        let mut out = vec![self.base_dir.join(path)];
        if let Some(dir) = &self.resources_dir {
            let alt = dir.join(path);
            if alt != out[0] {
                out.push(alt);
            }
        }
        out
    }

    /// First existing candidate for `raw`, if any.
    pub fn resolve(&self, raw: &str) -> Option<PathBuf> {
        self.candidates(raw).into_iter().find(|p| p.is_file())
    }

    pub async fn check(&self, refs: &[MediaRef]) -> Result<Vec<Finding>, CheckError> {
        let outcome = self.run(refs).await?;
        debug!(
            refs = refs.len(),
            probes = outcome.probes,
            findings = outcome.findings.len(),
            "Media files checked"
        );
        Ok(outcome.findings)
    }

    pub(crate) async fn run(&self, refs: &[MediaRef]) -> Result<FileCheckOutcome, CheckError> {
        if self.config.skip_file_validation || refs.is_empty() {
            return Ok(FileCheckOutcome::default());
        }

        // distinct raw paths with every location that references them
        let mut groups: Vec<(&str, Vec<&JsonPath>)> = Vec::new();
        for r in refs {
            match groups.iter_mut().find(|(raw, _)| *raw == r.raw) {
                Some((_, locations)) => locations.push(&r.location),
                None => groups.push((&r.raw, vec![&r.location])),
            }
        }

        let jobs: Vec<Vec<PathBuf>> = if self.config.enable_cache {
            groups.iter().map(|(raw, _)| self.candidates(raw)).collect()
        } else {
            refs.iter().map(|r| self.candidates(&r.raw)).collect()
        };
        let probes = jobs.len();

        let results = if groups.len() >= self.config.parallel_threshold {
            debug!(
                paths = groups.len(),
                workers = self.config.max_workers,
                "Probing media files in parallel"
            );
            probe_parallel(jobs, self.config.max_workers).await?
        } else {
            debug!(paths = groups.len(), "Probing media files sequentially");
            probe_sequential(jobs).await?
        };

        // One probe result per group, whichever way they were computed.
        let per_group: Vec<&Probe> = if self.config.enable_cache {
            results.iter().collect()
        } else {
            let mut by_raw: HashMap<&str, &Probe> = HashMap::new();
            for (r, result) in refs.iter().zip(&results) {
                by_raw.entry(r.raw.as_str()).or_insert(result);
            }
            groups.iter().filter_map(|(raw, _)| by_raw.get(raw).copied()).collect()
        };

        let findings = groups
            .iter()
            .zip(per_group)
            .filter_map(|((raw, locations), result)| finding_for(raw, locations, result))
            .collect();

        Ok(FileCheckOutcome { findings, probes })
    }
}

fn finding_for(raw: &str, locations: &[&JsonPath], result: &Probe) -> Option<Finding> {
    let (message, path) = match result {
        Probe::Found(_) => return None,
        Probe::Missing(p) => (format!("media file not found: '{raw}'"), p),
        Probe::Denied(p) => (format!("media file not accessible: '{raw}'"), p),
        Probe::NotAFile(p) => (format!("media path is not a file: '{raw}'"), p),
    };
    let field = locations.first().map(|p| p.to_string()).unwrap_or_default();
    let mut finding = Finding::error(Category::File, field, message)
        .with_suggestion(format!("resolved to {}", path.display()));
    if locations.len() > 1 {
        finding = finding.with_locations(locations.iter().map(|p| p.to_string()));
    }
    Some(finding)
}

/// All probes in order on a single blocking task.
async fn probe_sequential(jobs: Vec<Vec<PathBuf>>) -> Result<Vec<Probe>, CheckError> {
    tokio::task::spawn_blocking(move || {
        jobs.iter()
            .map(|c| probe(c))
            .collect::<Result<Vec<_>, _>>()
    })
    .await
    .map_err(CheckError::Join)?
}

async fn probe_parallel(
    jobs: Vec<Vec<PathBuf>>,
    workers: usize,
) -> Result<Vec<Probe>, CheckError> {
    let futs: Vec<_> = jobs
        .into_iter()
        .enumerate()
        .map(|(i, candidates)| async move {
            let result = tokio::task::spawn_blocking(move || probe(&candidates)).await;
            (i, result)
        })
        .collect();

    let mut results: Vec<(usize, Result<Result<Probe, CheckError>, tokio::task::JoinError>)> =
        stream::iter(futs)
            .buffer_unordered(workers.max(1))
            .collect()
            .await;
    results.sort_by_key(|(i, _)| *i);

    results
        .into_iter()
        .map(|(_, r)| match r {
            Ok(probe) => probe,
            Err(e) => Err(CheckError::Join(e)),
        })
        .collect()
}

/// Look at each candidate in turn; the first one that exists decides.
fn probe(candidates: &[PathBuf]) -> Result<Probe, CheckError> {
    for path in candidates {
        debug!(path = %path.display(), "Probing media file");
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() => {
                return match std::fs::File::open(path) {
                    Ok(_) => Ok(Probe::Found(path.clone())),
                    Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                        Ok(Probe::Denied(path.clone()))
                    }
                    Err(source) => Err(CheckError::Io {
                        path: path.clone(),
                        source,
                    }),
                };
            }
            Ok(_) => return Ok(Probe::NotAFile(path.clone())),
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                return Ok(Probe::Denied(path.clone()))
            }
            Err(source) => {
                return Err(CheckError::Io {
                    path: path.clone(),
                    source,
                })
            }
        }
    }
    let first = candidates.first().cloned().unwrap_or_default();
    Ok(Probe::Missing(first))
}

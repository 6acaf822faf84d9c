//! Markdown script to render-request conversion.
//!
//! A script is a handful of `## key: value` headers followed by a table:
//!
//! ```text
//! ## name: Demo
//! ## resources_dir: media
//!
//! | # | Resource | Trim | Duration | Trans In | Effect | Filter | Trans Out | Volume | Description |
//! |---|----------|------|----------|----------|--------|--------|-----------|--------|-------------|
//! | 1 | a.mp4    | 0:05 | 3s       | fade     | zoomIn |        | fade      | 1.0    | intro       |
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::validation::vocabulary::FieldKind;

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^##[ \t]*([A-Za-z_]+)[ \t]*:[ \t]*(.*?)[ \t]*$").expect("header regex compiles")
});

static SEPARATOR_CELL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^:?-+:?$").expect("separator regex compiles"));

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv"];
const MIN_CELLS: usize = 9;

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("Missing required headers: {}", .0.join(", "))]
    MissingHeaders(Vec<&'static str>),
    #[error("invalid header '{key}: {value}': {reason}")]
    InvalidHeader {
        key: String,
        value: String,
        reason: String,
    },
    #[error("Only .md files supported, got {}", .0.display())]
    NotMarkdown(PathBuf),
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot serialize document: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Emit the template shape with `{{path}}` sources and a merge array.
    pub template: bool,
}

/// A table row that could not be turned into a clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    /// 1-based line number in the Markdown source.
    pub line: usize,
    pub reason: String,
}

/// A cell value outside the vocabulary, left out of the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedValue {
    pub line: usize,
    pub kind: FieldKind,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct Conversion {
    pub document: Value,
    pub name: String,
    pub resources_dir: String,
    pub clips: usize,
    pub skipped: Vec<SkippedRow>,
    pub dropped: Vec<DroppedValue>,
}

/// Parse a duration cell: `3s`, `500ms` or plain seconds.
pub fn parse_duration(s: &str) -> Result<f64, String> {
    let s = s.trim().to_ascii_lowercase();
    let seconds = if let Some(ms) = s.strip_suffix("ms") {
        ms.trim().parse::<f64>().map(|v| v / 1000.0)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse::<f64>()
    } else {
        s.parse::<f64>()
    };
    seconds.map_err(|_| format!("invalid duration '{s}'"))
}

/// Parse a trim cell: `MM:SS` or `HH:MM:SS`.
pub fn parse_time(s: &str) -> Result<f64, String> {
    let invalid = || format!("Invalid time format: {s}. Use MM:SS or HH:MM:SS");
    let parts: Vec<&str> = s.trim().split(':').collect();
    let (h, m, sec) = match parts.as_slice() {
        [m, sec] => ("0", *m, *sec),
        [h, m, sec] => (*h, *m, *sec),
        _ => return Err(invalid()),
    };
    let h: u64 = h.trim().parse().map_err(|_| invalid())?;
    let m: u64 = m.trim().parse().map_err(|_| invalid())?;
    let sec: f64 = sec.trim().parse().map_err(|_| invalid())?;
    if sec < 0.0 {
        return Err(invalid());
    }
    Ok((h * 3600 + m * 60) as f64 + sec)
}

fn is_video(resource: &str) -> bool {
    Path::new(resource)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| VIDEO_EXTENSIONS.iter().any(|v| e.eq_ignore_ascii_case(v)))
}

fn number(v: f64) -> Value {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        json!(v as i64)
    } else {
        json!(v)
    }
}

struct Builder<'a> {
    resources_dir: &'a str,
    template: bool,
    /// Distinct media paths in first-use order.
    media: Vec<String>,
    dropped: Vec<DroppedValue>,
}

impl Builder<'_> {
    fn src(&mut self, resource: &str) -> String {
        let path = if self.resources_dir.is_empty() {
            resource.to_string()
        } else {
            format!("{}/{}", self.resources_dir.trim_end_matches('/'), resource)
        };
        if !self.media.contains(&path) {
            self.media.push(path.clone());
        }
        if self.template {
            format!("{{{{{path}}}}}")
        } else {
            path
        }
    }

    fn vocab(&mut self, cell: &str, kind: FieldKind, line: usize) -> Option<&'static str> {
        if cell.is_empty() {
            return None;
        }
        let canonical = kind.canonical(cell);
        if canonical.is_none() {
            warn!(line, %kind, value = cell, "Dropping unknown value");
            self.dropped.push(DroppedValue {
                line,
                kind,
                value: cell.to_string(),
            });
        }
        canonical
    }

    fn clip(&mut self, cells: &[&str], line: usize) -> Result<Value, String> {
        let resource = cells[1];
        if resource.is_empty() {
            return Err("empty resource".to_string());
        }
        let length = parse_duration(cells[3])?;
        if length <= 0.0 {
            return Err(format!("duration must be positive, got '{}'", cells[3]));
        }
        let video = is_video(resource);
        let trim = match cells[2] {
            "" => None,
            _ if !video => None,
            t => Some(parse_time(t)?),
        };
        let volume = match cells[8] {
            "" => None,
            v => Some(
                v.parse::<f64>()
                    .map_err(|_| format!("invalid volume '{v}'"))?,
            ),
        };

        let mut asset = Map::new();
        asset.insert("type".into(), json!(if video { "video" } else { "image" }));
        asset.insert("src".into(), json!(self.src(resource)));
        if let Some(trim) = trim {
            asset.insert("trim".into(), number(trim));
        }
        if let Some(volume) = volume {
            asset.insert("volume".into(), number(volume));
        }

        let mut clip = Map::new();
        clip.insert("asset".into(), Value::Object(asset));
        clip.insert("start".into(), json!("auto"));
        clip.insert("length".into(), number(length));

        let mut transition = Map::new();
        if let Some(t) = self.vocab(cells[4], FieldKind::Transition, line) {
            transition.insert("in".into(), json!(t));
        }
        if let Some(t) = self.vocab(cells[7], FieldKind::Transition, line) {
            transition.insert("out".into(), json!(t));
        }
        if !transition.is_empty() {
            clip.insert("transition".into(), Value::Object(transition));
        }
        if let Some(effect) = self.vocab(cells[5], FieldKind::Effect, line) {
            clip.insert("effect".into(), json!(effect));
        }
        if let Some(filter) = self.vocab(cells[6], FieldKind::Filter, line) {
            clip.insert("filter".into(), json!(filter));
        }

        Ok(Value::Object(clip))
    }
}

fn header_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConvertError> {
    value.parse().map_err(|_| ConvertError::InvalidHeader {
        key: key.to_string(),
        value: value.to_string(),
        reason: "expected a number".to_string(),
    })
}

fn split_row(line: &str) -> Vec<&str> {
    let inner = line.trim().trim_start_matches('|');
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').map(str::trim).collect()
}

/// Convert Markdown script text into a render-request document.
pub fn markdown_to_document(
    text: &str,
    options: ConvertOptions,
) -> Result<Conversion, ConvertError> {
    // header key -> (value, line); first occurrence wins
    let mut headers: HashMap<String, (String, usize)> = HashMap::new();
    for (i, line) in text.lines().enumerate() {
        if let Some(caps) = HEADER_RE.captures(line.trim()) {
            headers
                .entry(caps[1].to_ascii_lowercase())
                .or_insert_with(|| (caps[2].to_string(), i + 1));
        }
    }
    let header = |key: &str| {
        headers
            .get(key)
            .map(|(v, _)| v.as_str())
            .filter(|v| !v.is_empty())
    };

    let missing: Vec<&'static str> = ["name", "resources_dir"]
        .into_iter()
        .filter(|k| header(*k).is_none())
        .collect();
    let (Some(name), Some(resources_dir)) = (header("name"), header("resources_dir")) else {
        return Err(ConvertError::MissingHeaders(missing));
    };

    let mut builder = Builder {
        resources_dir,
        template: options.template,
        media: Vec::new(),
        dropped: Vec::new(),
    };

    let mut clips = Vec::new();
    let mut skipped = Vec::new();
    let mut in_table = false;
    for (i, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.starts_with("| #") || line.starts_with("|#") {
            in_table = true;
            continue;
        }
        if !in_table || !line.starts_with('|') {
            continue;
        }
        let cells = split_row(line);
        if cells.iter().all(|c| SEPARATOR_CELL_RE.is_match(c)) {
            continue;
        }
        if cells.len() < MIN_CELLS {
            debug!(line = i + 1, cells = cells.len(), "Skipping short table row");
            skipped.push(SkippedRow {
                line: i + 1,
                reason: format!("expected at least {MIN_CELLS} cells, found {}", cells.len()),
            });
            continue;
        }
        match builder.clip(&cells, i + 1) {
            Ok(clip) => clips.push(clip),
            Err(reason) => {
                warn!(line = i + 1, %reason, "Skipping invalid row");
                skipped.push(SkippedRow { line: i + 1, reason });
            }
        }
    }

    let mut timeline = Map::new();
    if let Some(soundtrack) = header("soundtrack") {
        let mut track = Map::new();
        track.insert("src".into(), json!(builder.src(soundtrack)));
        track.insert("effect".into(), json!("fadeIn"));
        if let Some(volume) = header("soundtrack_volume") {
            track.insert(
                "volume".into(),
                number(header_number::<f64>("soundtrack_volume", volume)?),
            );
        }
        timeline.insert("soundtrack".into(), Value::Object(track));
    }
    if let Some(background) = header("background") {
        timeline.insert("background".into(), json!(background));
    }
    let clip_count = clips.len();
    timeline.insert("tracks".into(), json!([{ "clips": clips }]));

    let mut output = Map::new();
    output.insert("format".into(), json!(header("output_format").unwrap_or("mp4")));
    if let Some(resolution) = header("resolution") {
        output.insert("resolution".into(), json!(resolution));
    }
    if let Some(aspect) = header("aspect_ratio") {
        if FieldKind::AspectRatio.accepts(aspect) {
            output.insert("aspectRatio".into(), json!(aspect));
        } else {
            let line = headers.get("aspect_ratio").map(|(_, l)| *l).unwrap_or(0);
            builder.dropped.push(DroppedValue {
                line,
                kind: FieldKind::AspectRatio,
                value: aspect.to_string(),
            });
        }
    }
    if let Some(fps) = header("fps") {
        output.insert("fps".into(), json!(header_number::<u32>("fps", fps)?));
    }
    if let Some(capture) = header("thumbnail_capture") {
        output.insert(
            "thumbnail".into(),
            json!({ "capture": header_number::<u32>("thumbnail_capture", capture)? }),
        );
    }

    let document = if options.template {
        let merge: Vec<Value> = builder
            .media
            .iter()
            .map(|path| json!({ "find": path, "replace": "" }))
            .collect();
        json!({
            "name": name,
            "resourcesDir": resources_dir,
            "template": { "timeline": timeline },
            "output": output,
            "merge": merge,
        })
    } else {
        json!({
            "name": name,
            "resourcesDir": resources_dir,
            "timeline": timeline,
            "output": output,
        })
    };

    Ok(Conversion {
        document,
        name: name.to_string(),
        resources_dir: resources_dir.to_string(),
        clips: clip_count,
        skipped,
        dropped: builder.dropped,
    })
}

/// Convert `input` (a `.md` file) and write pretty JSON next to it, or to
/// `output` when given. Returns the written path with the conversion.
pub fn convert_file(
    input: &Path,
    output: Option<&Path>,
    options: ConvertOptions,
) -> Result<(PathBuf, Conversion), ConvertError> {
    let is_md = input
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("md"));
    if !is_md {
        return Err(ConvertError::NotMarkdown(input.to_path_buf()));
    }

    let text = std::fs::read_to_string(input).map_err(|source| ConvertError::Read {
        path: input.to_path_buf(),
        source,
    })?;
    let conversion = markdown_to_document(&text, options)?;

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input.with_extension("json"));
    let mut body = serde_json::to_string_pretty(&conversion.document)?;
    body.push('\n');
    std::fs::write(&output, body).map_err(|source| ConvertError::Write {
        path: output.clone(),
        source,
    })?;

    debug!(
        input = %input.display(),
        output = %output.display(),
        clips = conversion.clips,
        "Converted script"
    );
    Ok((output, conversion))
}

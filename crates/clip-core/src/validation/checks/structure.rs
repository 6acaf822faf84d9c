use serde_json::{Map, Value};

use crate::document::{Document, JsonPath, Shape};
use crate::placeholder::contains_placeholder;
use crate::validation::finding::{Category, Finding};
use crate::validation::{Check, CheckContext};

/// Required top-level shape, timeline layout, and per-clip fields.
pub struct StructureCheck;

impl Check for StructureCheck {
    fn name(&self) -> &'static str {
        "Structure"
    }

    fn check(&self, doc: &Document<'_>, _ctx: &CheckContext<'_>) -> Vec<Finding> {
        let mut findings = Vec::new();

        // a non-object template has no timeline to descend into
        if doc.shape() == Shape::Template && doc.template().is_none() {
            findings.push(error(&JsonPath::root().key("template"), "template must be an object"));
        } else {
            let timeline_path = doc.timeline_path();
            match doc.timeline() {
                Some(timeline) => check_timeline(timeline, &timeline_path, &mut findings),
                None => findings.push(missing(&timeline_path, "timeline")),
            }
        }

        match doc.output() {
            Some((output, path)) => check_output(output, &path, &mut findings),
            None => findings.push(missing(&JsonPath::root().key("output"), "output")),
        }

        findings
    }
}

fn error(path: &JsonPath, message: impl Into<String>) -> Finding {
    Finding::error(Category::Structure, path.to_string(), message)
}

fn missing(path: &JsonPath, name: &str) -> Finding {
    error(path, format!("Missing required field: '{name}'"))
}

/// Strings carrying a placeholder are resolved at render time.
fn deferred(value: &Value) -> bool {
    value.as_str().is_some_and(contains_placeholder)
}

fn check_timeline(timeline: &Value, path: &JsonPath, findings: &mut Vec<Finding>) {
    let Some(timeline) = timeline.as_object() else {
        findings.push(error(path, "timeline must be an object"));
        return;
    };

    let tracks_path = path.key("tracks");
    let tracks = match timeline.get("tracks") {
        None => return findings.push(missing(&tracks_path, "tracks")),
        Some(Value::Array(tracks)) => tracks,
        Some(_) => return findings.push(error(&tracks_path, "tracks must be an array")),
    };
    if tracks.is_empty() {
        findings.push(error(&tracks_path, "tracks must contain at least one track"));
    }

    for (i, track) in tracks.iter().enumerate() {
        let track_path = tracks_path.index(i);
        let Some(track) = track.as_object() else {
            findings.push(error(&track_path, "track must be an object"));
            continue;
        };
        let clips_path = track_path.key("clips");
        let clips = match track.get("clips") {
            None => {
                findings.push(missing(&clips_path, "clips"));
                continue;
            }
            Some(Value::Array(clips)) => clips,
            Some(_) => {
                findings.push(error(&clips_path, "clips must be an array"));
                continue;
            }
        };
        for (j, clip) in clips.iter().enumerate() {
            let clip_path = clips_path.index(j);
            match clip.as_object() {
                Some(clip) => check_clip(clip, &clip_path, findings),
                None => findings.push(error(&clip_path, "clip must be an object")),
            }
        }
    }
}

fn check_clip(clip: &Map<String, Value>, path: &JsonPath, findings: &mut Vec<Finding>) {
    let asset_path = path.key("asset");
    match clip.get("asset") {
        None => findings.push(missing(&asset_path, "asset")),
        Some(Value::Object(asset)) => check_asset(asset, &asset_path, findings),
        Some(_) => findings.push(error(&asset_path, "asset must be an object")),
    }

    let start_path = path.key("start");
    match clip.get("start") {
        None => findings.push(missing(&start_path, "start")),
        Some(Value::String(s)) if s == "auto" => {}
        Some(v) if deferred(v) => {}
        Some(v) if v.as_f64().is_some_and(|n| n >= 0.0) => {}
        Some(_) => findings.push(error(
            &start_path,
            "start must be a non-negative number or \"auto\"",
        )),
    }

    let length_path = path.key("length");
    match clip.get("length") {
        None => findings.push(missing(&length_path, "length")),
        Some(Value::String(s)) if s == "auto" => findings.push(
            error(&length_path, "length must be a number, \"auto\" is not supported")
                .with_suggestion("give the clip length in seconds"),
        ),
        Some(v) if deferred(v) => {}
        Some(Value::Number(n)) => {
            if !n.as_f64().is_some_and(|n| n > 0.0) {
                findings.push(error(&length_path, "length must be positive"));
            }
        }
        Some(_) => findings.push(error(&length_path, "length must be a number")),
    }
}

fn check_asset(asset: &Map<String, Value>, path: &JsonPath, findings: &mut Vec<Finding>) {
    let type_path = path.key("type");
    let kind = match asset.get("type") {
        None => {
            findings.push(missing(&type_path, "type"));
            None
        }
        Some(Value::String(kind)) => Some(kind.as_str()),
        Some(_) => {
            findings.push(error(&type_path, "asset type must be a string"));
            None
        }
    };

    match kind {
        Some("video" | "image" | "audio") => require_text(asset, "src", path, findings),
        Some("text" | "title") => require_text(asset, "text", path, findings),
        _ => {}
    }

    if let Some(volume) = asset.get("volume").filter(|v| !deferred(v)) {
        match volume.as_f64() {
            Some(v) if (0.0..=1.0).contains(&v) => {}
            Some(_) => findings.push(error(&path.key("volume"), "volume must be between 0 and 1")),
            None => findings.push(error(&path.key("volume"), "volume must be a number")),
        }
    }

    if let Some(trim) = asset.get("trim").filter(|v| !deferred(v)) {
        match trim.as_f64() {
            Some(t) if t >= 0.0 => {}
            Some(_) => findings.push(error(&path.key("trim"), "trim must not be negative")),
            None => findings.push(error(&path.key("trim"), "trim must be a number")),
        }
    }
}

fn require_text(
    asset: &Map<String, Value>,
    key: &str,
    path: &JsonPath,
    findings: &mut Vec<Finding>,
) {
    let field = path.key(key);
    match asset.get(key) {
        None => findings.push(missing(&field, key)),
        Some(Value::String(s)) if s.trim().is_empty() => {
            findings.push(error(&field, format!("{key} must not be empty")))
        }
        Some(Value::String(_)) => {}
        Some(_) => findings.push(error(&field, format!("{key} must be a string"))),
    }
}

fn check_output(output: &Value, path: &JsonPath, findings: &mut Vec<Finding>) {
    let Some(output) = output.as_object() else {
        findings.push(error(path, "output must be an object"));
        return;
    };

    let format_path = path.key("format");
    match output.get("format") {
        None => findings.push(missing(&format_path, "format")),
        Some(Value::String(_)) => {}
        Some(_) => findings.push(error(&format_path, "output format must be a string")),
    }

    if let Some(fps) = output.get("fps").filter(|v| !deferred(v)) {
        if !fps.as_f64().is_some_and(|f| f > 0.0) {
            findings.push(error(&path.key("fps"), "Output fps must be a positive number"));
        }
    }
}

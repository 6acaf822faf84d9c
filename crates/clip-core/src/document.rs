//! Read-only views over a parsed script document.
//!
//! A document comes in two shapes: template-wrapped (`template.timeline`,
//! sibling `output` and `merge`) or legacy flat (`timeline` at the root).
//! [`Document`] hides the difference for the validators, and [`walk`] gives
//! them a single recursive traversal with JSON-path bookkeeping.

use std::fmt;

use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Location of a value inside the document, rendered as
/// `template.timeline.tracks[0].clips[2].asset.src`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JsonPath(Vec<PathSegment>);

impl JsonPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn key(&self, key: &str) -> Self {
        let mut next = self.clone();
        next.0.push(PathSegment::Key(key.to_string()));
        next
    }

    pub fn index(&self, index: usize) -> Self {
        let mut next = self.clone();
        next.0.push(PathSegment::Index(index));
        next
    }

    pub fn push(&mut self, segment: PathSegment) {
        self.0.push(segment);
    }

    pub fn pop(&mut self) {
        self.0.pop();
    }

    /// Last key segment, if the path ends in one.
    pub fn last_key(&self) -> Option<&str> {
        match self.0.last() {
            Some(PathSegment::Key(k)) => Some(k),
            _ => None,
        }
    }

    /// RFC 6901 pointer for use with [`Value::pointer_mut`].
    pub fn to_pointer(&self) -> String {
        let mut out = String::new();
        for seg in &self.0 {
            out.push('/');
            match seg {
                PathSegment::Key(k) => out.push_str(&k.replace('~', "~0").replace('/', "~1")),
                PathSegment::Index(i) => out.push_str(&i.to_string()),
            }
        }
        out
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "$");
        }
        for (i, seg) in self.0.iter().enumerate() {
            match seg {
                PathSegment::Key(k) if i == 0 => write!(f, "{k}")?,
                PathSegment::Key(k) => write!(f, ".{k}")?,
                PathSegment::Index(idx) => write!(f, "[{idx}]")?,
            }
        }
        Ok(())
    }
}

/// The closed set of node kinds a JSON value can take.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Object(&'a Map<String, Value>),
    Array(&'a [Value]),
    String(&'a str),
    Scalar,
}

impl<'a> From<&'a Value> for Node<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Object(map) => Node::Object(map),
            Value::Array(items) => Node::Array(items),
            Value::String(s) => Node::String(s),
            Value::Null | Value::Bool(_) | Value::Number(_) => Node::Scalar,
        }
    }
}

/// Depth-first traversal calling `visit` for every string leaf.
///
/// `path` is used as a scratch stack and is restored before returning.
pub fn walk<F>(value: &Value, path: &mut JsonPath, visit: &mut F)
where
    F: FnMut(&JsonPath, &str),
{
    match Node::from(value) {
        Node::Object(map) => {
            for (key, child) in map {
                path.push(PathSegment::Key(key.clone()));
                walk(child, path, visit);
                path.pop();
            }
        }
        Node::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                path.push(PathSegment::Index(i));
                walk(child, path, visit);
                path.pop();
            }
        }
        Node::String(s) => visit(path, s),
        Node::Scalar => {}
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// `template.timeline` with sibling `output` and `merge`.
    Template,
    /// `timeline` directly at the root; no merge step.
    Legacy,
}

/// A clip object together with its location.
#[derive(Debug, Clone)]
pub struct ClipRef<'a> {
    pub path: JsonPath,
    pub clip: &'a Map<String, Value>,
}

#[derive(Debug, Clone, Copy)]
pub struct Document<'a> {
    root: &'a Map<String, Value>,
    shape: Shape,
}

impl<'a> Document<'a> {
    pub fn new(root: &'a Map<String, Value>) -> Self {
        let shape = if root.contains_key("template") {
            Shape::Template
        } else {
            Shape::Legacy
        };
        Self { root, shape }
    }

    pub fn root(&self) -> &'a Map<String, Value> {
        self.root
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// The `template` object, when present and actually an object.
    pub fn template(&self) -> Option<&'a Map<String, Value>> {
        self.root.get("template").and_then(Value::as_object)
    }

    pub fn timeline_path(&self) -> JsonPath {
        match self.shape {
            Shape::Template => JsonPath::root().key("template").key("timeline"),
            Shape::Legacy => JsonPath::root().key("timeline"),
        }
    }

    pub fn timeline(&self) -> Option<&'a Value> {
        match self.shape {
            Shape::Template => self.template()?.get("timeline"),
            Shape::Legacy => self.root.get("timeline"),
        }
    }

    /// Root `output`, falling back to `template.output`.
    pub fn output(&self) -> Option<(&'a Value, JsonPath)> {
        if let Some(output) = self.root.get("output") {
            return Some((output, JsonPath::root().key("output")));
        }
        let output = self.template()?.get("output")?;
        Some((output, JsonPath::root().key("template").key("output")))
    }

    /// Root `merge`, falling back to `template.merge`.
    pub fn merge(&self) -> Option<(&'a Value, JsonPath)> {
        if let Some(merge) = self.root.get("merge") {
            return Some((merge, JsonPath::root().key("merge")));
        }
        let merge = self.template()?.get("merge")?;
        Some((merge, JsonPath::root().key("template").key("merge")))
    }

    /// `find -> replace` for well-formed merge entries; first entry wins.
    pub fn merge_bindings(&self) -> Vec<(&'a str, &'a str)> {
        let mut out: Vec<(&str, &str)> = Vec::new();
        let Some((Value::Array(entries), _)) = self.merge() else {
            return out;
        };
        for entry in entries {
            let find = entry.get("find").and_then(Value::as_str);
            let replace = entry.get("replace").and_then(Value::as_str);
            if let (Some(find), Some(replace)) = (find, replace) {
                if !find.is_empty() && !out.iter().any(|(f, _)| *f == find) {
                    out.push((find, replace));
                }
            }
        }
        out
    }

    /// Media root declared by the document itself.
    pub fn resources_dir(&self) -> Option<&'a str> {
        self.root
            .get("resourcesDir")
            .or_else(|| self.root.get("resources_dir"))
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    pub fn name(&self) -> Option<&'a str> {
        self.root
            .get("name")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// Every clip object reachable through well-formed tracks; malformed
    /// containers are skipped (the structure check reports them).
    pub fn clips(&self) -> Vec<ClipRef<'a>> {
        let mut out = Vec::new();
        let Some(tracks) = self
            .timeline()
            .and_then(|t| t.get("tracks"))
            .and_then(Value::as_array)
        else {
            return out;
        };
        let tracks_path = self.timeline_path().key("tracks");
        for (i, track) in tracks.iter().enumerate() {
            let Some(clips) = track.get("clips").and_then(Value::as_array) else {
                continue;
            };
            let clips_path = tracks_path.index(i).key("clips");
            for (j, clip) in clips.iter().enumerate() {
                if let Some(clip) = clip.as_object() {
                    out.push(ClipRef {
                        path: clips_path.index(j),
                        clip,
                    });
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn path_display_mixes_keys_and_indices() {
        let p = JsonPath::root()
            .key("template")
            .key("timeline")
            .key("tracks")
            .index(0)
            .key("clips")
            .index(2);
        assert_eq!(p.to_string(), "template.timeline.tracks[0].clips[2]");
        assert_eq!(p.to_pointer(), "/template/timeline/tracks/0/clips/2");
        assert_eq!(JsonPath::root().to_string(), "$");
    }

    #[test]
    fn pointer_escapes_special_keys() {
        let p = JsonPath::root().key("a/b").key("c~d");
        assert_eq!(p.to_pointer(), "/a~1b/c~0d");
    }

    #[test]
    fn walk_visits_strings_only_with_paths() {
        let v = json!({"a": [1, "x", {"b": "y"}], "c": true, "d": null});
        let mut seen = Vec::new();
        walk(&v, &mut JsonPath::root(), &mut |p: &JsonPath, s: &str| {
            seen.push((p.to_string(), s.to_string()))
        });
        assert_eq!(
            seen,
            vec![
                ("a[1]".to_string(), "x".to_string()),
                ("a[2].b".to_string(), "y".to_string()),
            ]
        );
    }

    #[test]
    fn shape_detection_and_lookups() {
        let v = json!({
            "template": {"timeline": {"tracks": [{"clips": [{"asset": {}}, 3]}]}},
            "output": {"format": "mp4"},
            "merge": [{"find": "a", "replace": "b"}, {"find": "a", "replace": "c"}]
        });
        let doc = Document::new(v.as_object().unwrap());
        assert_eq!(doc.shape(), Shape::Template);
        assert!(doc.timeline().is_some());
        assert_eq!(doc.output().unwrap().1.to_string(), "output");
        assert_eq!(doc.merge_bindings(), vec![("a", "b")]);
        let clips = doc.clips();
        assert_eq!(clips.len(), 1);
        assert_eq!(clips[0].path.to_string(), "template.timeline.tracks[0].clips[0]");
    }

    #[test]
    fn legacy_shape_uses_root_timeline() {
        let v = json!({"resourcesDir": "media", "timeline": {"tracks": []}});
        let doc = Document::new(v.as_object().unwrap());
        assert_eq!(doc.shape(), Shape::Legacy);
        assert_eq!(doc.timeline_path().to_string(), "timeline");
        assert_eq!(doc.resources_dir(), Some("media"));
        assert!(doc.merge().is_none());
    }

    #[test]
    fn output_falls_back_to_template() {
        let v = json!({"template": {"timeline": {}, "output": {"format": "gif"}}});
        let doc = Document::new(v.as_object().unwrap());
        assert_eq!(doc.output().unwrap().1.to_string(), "template.output");
    }
}

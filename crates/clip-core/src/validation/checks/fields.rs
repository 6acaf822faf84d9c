use serde_json::Value;

use crate::document::{Document, JsonPath};
use crate::placeholder::contains_placeholder;
use crate::validation::finding::{Category, Finding};
use crate::validation::vocabulary::FieldKind;
use crate::validation::{Check, CheckContext};

/// Enumerated values checked against the known vocabulary.
pub struct FieldCheck;

impl Check for FieldCheck {
    fn name(&self) -> &'static str {
        "Fields"
    }

    fn check(&self, doc: &Document<'_>, _ctx: &CheckContext<'_>) -> Vec<Finding> {
        let mut findings = Vec::new();

        for clip in doc.clips() {
            if let Some(asset) = clip.clip.get("asset").and_then(Value::as_object) {
                // non-string types are a structural error, reported elsewhere
                if let Some(kind @ Value::String(_)) = asset.get("type") {
                    let path = clip.path.key("asset").key("type");
                    findings.extend(validate(kind, FieldKind::AssetType, &path));
                }
            }

            match clip.clip.get("transition") {
                None => {}
                Some(Value::Object(transition)) => {
                    let path = clip.path.key("transition");
                    for side in ["in", "out"] {
                        if let Some(value) = transition.get(side) {
                            let side_path = path.key(side);
                            findings.extend(validate(value, FieldKind::Transition, &side_path));
                        }
                    }
                }
                Some(_) => findings.push(Finding::error(
                    Category::Field,
                    clip.path.key("transition").to_string(),
                    "transition must be an object with 'in' and/or 'out'",
                )),
            }

            if let Some(effect) = clip.clip.get("effect") {
                findings.extend(validate(effect, FieldKind::Effect, &clip.path.key("effect")));
            }
            if let Some(filter) = clip.clip.get("filter") {
                findings.extend(validate(filter, FieldKind::Filter, &clip.path.key("filter")));
            }
        }

        if let Some((Value::Object(output), path)) = doc.output() {
            for key in ["aspectRatio", "aspect_ratio"] {
                if let Some(value) = output.get(key) {
                    findings.extend(validate(value, FieldKind::AspectRatio, &path.key(key)));
                }
            }
            if let Some(format @ Value::String(_)) = output.get("format") {
                findings.extend(validate(format, FieldKind::OutputFormat, &path.key("format")));
            }
        }

        findings
    }
}

/// Check one value against the vocabulary for `kind`.
pub fn validate(value: &Value, kind: FieldKind, path: &JsonPath) -> Option<Finding> {
    let Some(value) = value.as_str() else {
        return Some(Finding::error(
            Category::Field,
            path.to_string(),
            format!("{kind} must be a string"),
        ));
    };
    if kind.accepts(value) || contains_placeholder(value) {
        return None;
    }

    let valid = kind.sorted_values().join(", ");
    let suggestion = match kind.canonical(value) {
        Some(canonical) => format!("did you mean '{canonical}'? valid {kind} values: {valid}"),
        None => format!("valid {kind} values: {valid}"),
    };
    Some(
        Finding::warning(
            Category::Field,
            path.to_string(),
            format!("Unknown {kind} '{value}'"),
        )
        .with_suggestion(suggestion),
    )
}

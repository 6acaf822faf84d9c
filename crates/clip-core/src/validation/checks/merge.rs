use std::collections::HashMap;

use serde_json::Value;

use crate::document::Document;
use crate::validation::finding::{Category, Finding};
use crate::validation::{Check, CheckContext};

/// Merge array shape and placeholder coverage.
pub struct MergeCheck;

impl Check for MergeCheck {
    fn name(&self) -> &'static str {
        "Merge"
    }

    fn check(&self, doc: &Document<'_>, ctx: &CheckContext<'_>) -> Vec<Finding> {
        let mut findings = Vec::new();
        let tokens = ctx.scan.grouped();

        let Some((merge, merge_path)) = doc.merge() else {
            if !tokens.is_empty() {
                findings.push(
                    Finding::error(
                        Category::Merge,
                        "merge",
                        "merge array required when placeholders are present",
                    )
                    .with_suggestion(format!(
                        "add a merge array with entries for: {}",
                        token_list(&tokens)
                    )),
                );
            }
            return findings;
        };

        let Value::Array(entries) = merge else {
            findings.push(Finding::error(
                Category::Merge,
                merge_path.to_string(),
                "merge must be an array",
            ));
            return findings;
        };

        if entries.is_empty() {
            if !tokens.is_empty() {
                findings.push(
                    Finding::error(
                        Category::Merge,
                        merge_path.to_string(),
                        format!(
                            "merge array is empty but {} placeholders require substitution",
                            tokens.len()
                        ),
                    )
                    .with_suggestion(format!("add entries for: {}", token_list(&tokens))),
                );
            }
            return findings;
        }

        // find value -> index of the first entry defining it
        let mut finds: HashMap<&str, usize> = HashMap::new();
        let mut ordered: Vec<(&str, usize)> = Vec::new();

        for (i, entry) in entries.iter().enumerate() {
            let entry_path = merge_path.index(i);
            let Some(entry) = entry.as_object() else {
                findings.push(Finding::error(
                    Category::Merge,
                    entry_path.to_string(),
                    "merge entry must be an object",
                ));
                continue;
            };

            let find = match entry.get("find") {
                None => {
                    findings.push(Finding::error(
                        Category::Merge,
                        entry_path.to_string(),
                        "Missing required field: 'find'",
                    ));
                    None
                }
                Some(Value::String(find)) => Some(find.as_str()),
                Some(_) => {
                    findings.push(Finding::error(
                        Category::Merge,
                        entry_path.key("find").to_string(),
                        "find must be a string",
                    ));
                    None
                }
            };

            match entry.get("replace") {
                None => findings.push(Finding::error(
                    Category::Merge,
                    entry_path.to_string(),
                    "Missing required field: 'replace'",
                )),
                Some(Value::String(_)) => {}
                Some(_) => findings.push(Finding::error(
                    Category::Merge,
                    entry_path.key("replace").to_string(),
                    "replace must be a string",
                )),
            }

            let Some(find) = find else { continue };
            let find = find.trim();
            if find.is_empty() {
                findings.push(
                    Finding::warning(
                        Category::Merge,
                        entry_path.key("find").to_string(),
                        "empty find value",
                    )
                    .with_suggestion("set find to the placeholder name it replaces"),
                );
                continue;
            }
            match finds.get(find) {
                Some(first) => findings.push(Finding::warning(
                    Category::Merge,
                    entry_path.key("find").to_string(),
                    format!("duplicate find value '{find}' (first defined at merge[{first}])"),
                )),
                None => {
                    finds.insert(find, i);
                    ordered.push((find, i));
                }
            }
        }

        for (token, paths) in &tokens {
            if finds.contains_key(token) {
                continue;
            }
            let first = paths.first().map(|p| p.to_string()).unwrap_or_default();
            findings.push(
                Finding::error(
                    Category::Merge,
                    first,
                    format!("No merge entry found for placeholder: '{token}'"),
                )
                .with_suggestion(format!(
                    "add {{\"find\": \"{token}\", \"replace\": \"...\"}} to merge"
                ))
                .with_locations(paths.iter().map(|p| p.to_string())),
            );
        }

        for (find, i) in ordered {
            if !tokens.iter().any(|(token, _)| *token == find) {
                findings.push(Finding::info(
                    Category::Merge,
                    merge_path.index(i).key("find").to_string(),
                    format!("unused merge entry '{find}'"),
                ));
            }
        }

        findings
    }
}

fn token_list(tokens: &[(&str, Vec<&crate::document::JsonPath>)]) -> String {
    tokens
        .iter()
        .map(|(t, _)| *t)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::checks::test_support::{messages, run};
    use crate::validation::finding::Severity;
    use serde_json::json;

    fn doc_with(merge: Option<Value>) -> Value {
        let mut doc = json!({
            "template": {"timeline": {"tracks": [{"clips": [
                {"asset": {"type": "video", "src": "{{a.mp4}}"}, "start": 0, "length": 3},
                {"asset": {"type": "text", "text": "{{TITLE}}"}, "start": 3, "length": 2},
                {"asset": {"type": "video", "src": "{{a.mp4}}"}, "start": 5, "length": 3}
            ]}]}},
            "output": {"format": "mp4"}
        });
        if let Some(merge) = merge {
            doc["merge"] = merge;
        }
        doc
    }

    #[test]
    fn missing_merge_is_one_error() {
        let findings = run(&MergeCheck, &doc_with(None));
        assert_eq!(messages(&findings), vec!["merge array required when placeholders are present"]);
        assert!(findings[0].is_error());
    }

    #[test]
    fn no_placeholders_means_no_merge_findings() {
        let doc = json!({"timeline": {"tracks": [{"clips": [
            {"asset": {"type": "video", "src": "a.mp4"}, "start": 0, "length": 1}
        ]}]}, "output": {"format": "mp4"}});
        assert!(run(&MergeCheck, &doc).is_empty());
    }

    #[test]
    fn empty_merge_counts_placeholders() {
        let findings = run(&MergeCheck, &doc_with(Some(json!([]))));
        assert_eq!(
            messages(&findings),
            vec!["merge array is empty but 2 placeholders require substitution"]
        );
    }

    #[test]
    fn unmatched_token_lists_every_location() {
        let findings = run(
            &MergeCheck,
            &doc_with(Some(json!([{"find": "TITLE", "replace": "Hi"}]))),
        );
        assert_eq!(findings.len(), 1);
        let f = &findings[0];
        assert_eq!(f.message, "No merge entry found for placeholder: 'a.mp4'");
        assert_eq!(f.field, "template.timeline.tracks[0].clips[0].asset.src");
        assert_eq!(
            f.locations,
            vec![
                "template.timeline.tracks[0].clips[0].asset.src",
                "template.timeline.tracks[0].clips[2].asset.src",
            ]
        );
    }

    #[test]
    fn entry_shape_errors() {
        let findings = run(
            &MergeCheck,
            &doc_with(Some(json!([
                "a.mp4",
                {"replace": "x"},
                {"find": "a.mp4"},
                {"find": 3, "replace": "x"},
                {"find": "TITLE", "replace": ""}
            ]))),
        );
        assert_eq!(
            messages(&findings),
            vec![
                "merge entry must be an object",
                "Missing required field: 'find'",
                "Missing required field: 'replace'",
                "find must be a string",
            ]
        );
    }

    #[test]
    fn merge_must_be_array() {
        let findings = run(&MergeCheck, &doc_with(Some(json!({"find": "a"}))));
        assert_eq!(messages(&findings), vec!["merge must be an array"]);
    }

    #[test]
    fn empty_find_duplicate_and_unused() {
        let findings = run(
            &MergeCheck,
            &doc_with(Some(json!([
                {"find": "a.mp4", "replace": "x"},
                {"find": "TITLE", "replace": "t"},
                {"find": "", "replace": "x"},
                {"find": "a.mp4", "replace": "y"},
                {"find": "LOGO", "replace": "z"}
            ]))),
        );
        let summary: Vec<(Severity, &str)> =
            findings.iter().map(|f| (f.severity, f.message.as_str())).collect();
        assert_eq!(
            summary,
            vec![
                (Severity::Warning, "empty find value"),
                (Severity::Warning, "duplicate find value 'a.mp4' (first defined at merge[0])"),
                (Severity::Info, "unused merge entry 'LOGO'"),
            ]
        );
    }

    #[test]
    fn merge_inside_template_is_honored() {
        let mut doc = doc_with(None);
        doc["template"]["merge"] = json!([
            {"find": "a.mp4", "replace": "x"},
            {"find": "TITLE", "replace": "y"}
        ]);
        assert!(run(&MergeCheck, &doc).is_empty());
    }
}

use std::path::Path;

use clip_core::{
    convert::{markdown_to_document, ConvertOptions},
    Category, Checker, Finding, Severity, ValidationConfig, ValidationReport,
};
use serde_json::{json, Value};

const URL_BOUND_TEMPLATE: &str = r#"{
  "template": {"timeline": {"tracks": [{"clips": [
    {"asset": {"type": "video", "src": "{{a.mp4}}"}, "start": 0, "length": 3}
  ]}]}},
  "output": {"format": "mp4"},
  "merge": [{"find": "a.mp4", "replace": "http://x/a.mp4"}]
}"#;

fn url_bound_template() -> Value {
    serde_json::from_str(URL_BOUND_TEMPLATE).unwrap()
}

fn with_clip_field(key: &str, value: Value) -> Value {
    let mut doc = url_bound_template();
    doc["template"]["timeline"]["tracks"][0]["clips"][0][key] = value;
    doc
}

async fn check(doc: &Value, config: &ValidationConfig) -> ValidationReport {
    Checker::new(config)
        .check_value(doc, Path::new("."))
        .await
        .unwrap()
}

fn no_files() -> ValidationConfig {
    ValidationConfig::default().with_skip_file_validation(true)
}

fn summary(findings: &[Finding]) -> Vec<(Severity, String)> {
    findings
        .iter()
        .map(|f| (f.severity, f.message.clone()))
        .collect()
}

#[tokio::test]
async fn complete_template_passes_cleanly() {
    let report = check(&url_bound_template(), &ValidationConfig::default()).await;
    assert!(report.passed);
    assert!(report.findings.is_empty(), "{:?}", report.findings);
}

#[tokio::test]
async fn missing_merge_fails() {
    let mut doc = url_bound_template();
    doc.as_object_mut().unwrap().remove("merge");
    let report = check(&doc, &no_files()).await;
    assert!(!report.passed);
    assert_eq!(
        summary(&report.findings),
        vec![(
            Severity::Error,
            "merge array required when placeholders are present".to_string()
        )]
    );
}

#[tokio::test]
async fn unknown_transition_warns_and_strict_fails() {
    let doc = with_clip_field("transition", json!({"in": "glitchZoom"}));

    let report = check(&doc, &no_files()).await;
    assert!(report.passed);
    assert_eq!(report.findings.len(), 1);
    let f = &report.findings[0];
    assert_eq!(f.severity, Severity::Warning);
    assert_eq!(f.category, Category::Field);
    assert!(f.message.contains("glitchZoom"));
    let suggestion = f.suggestion.as_deref().unwrap();
    for t in ["fade", "slideLeft", "zoom", "wipeRight"] {
        assert!(suggestion.contains(t), "{suggestion}");
    }

    let strict = check(&doc, &no_files().with_strict_mode(true)).await;
    assert!(!strict.passed);
    assert_eq!(strict.findings, report.findings);
}

#[tokio::test]
async fn zero_length_fails() {
    let doc = with_clip_field("length", json!(0));
    let report = check(&doc, &no_files()).await;
    assert!(!report.passed);
    assert_eq!(
        summary(&report.findings),
        vec![(Severity::Error, "length must be positive".to_string())]
    );
}

#[tokio::test]
async fn empty_find_only_warns() {
    let mut doc = url_bound_template();
    doc["merge"]
        .as_array_mut()
        .unwrap()
        .push(json!({"find": "", "replace": "x"}));
    let report = check(&doc, &no_files()).await;
    assert!(report.passed);
    assert_eq!(
        summary(&report.findings),
        vec![(Severity::Warning, "empty find value".to_string())]
    );
}

#[tokio::test]
async fn zero_placeholders_need_no_merge() {
    let doc = json!({
        "template": {"timeline": {"tracks": [{"clips": [
            {"asset": {"type": "text", "text": "plain"}, "start": 0, "length": 3}
        ]}]}},
        "output": {"format": "mp4"}
    });
    let report = check(&doc, &no_files()).await;
    assert!(report.passed);
    assert!(report.findings.iter().all(|f| f.category != Category::Merge));
}

#[tokio::test]
async fn unmatched_token_reports_every_location_once() {
    let doc = json!({
        "template": {"timeline": {"tracks": [
            {"clips": [{"asset": {"type": "text", "text": "{{NAME}}"}, "start": 0, "length": 1}]},
            {"clips": [{"asset": {"type": "text", "text": "Hi {{NAME}}"}, "start": 0, "length": 1}]}
        ]}},
        "output": {"format": "mp4"},
        "merge": [{"find": "OTHER", "replace": "x"}]
    });
    let report = check(&doc, &no_files()).await;
    let errors: Vec<&Finding> = report.errors().collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].locations,
        vec![
            "template.timeline.tracks[0].clips[0].asset.text",
            "template.timeline.tracks[1].clips[0].asset.text",
        ]
    );
}

#[tokio::test]
async fn empty_braces_never_become_tokens() {
    let doc = json!({
        "template": {"timeline": {"tracks": [{"clips": [
            {"asset": {"type": "text", "text": "x {{}} y"}, "start": 0, "length": 1}
        ]}]}},
        "output": {"format": "mp4"}
    });
    let report = check(&doc, &no_files()).await;
    assert_eq!(report.findings.len(), 1);
    assert_eq!(report.findings[0].category, Category::Placeholder);
    assert_eq!(report.findings[0].severity, Severity::Warning);
}

#[tokio::test]
async fn same_input_same_report() {
    let doc = with_clip_field("effect", json!("zoomin"));
    let config = no_files();
    let first = check(&doc, &config).await.into_parts();
    let second = check(&doc, &config).await.into_parts();
    assert_eq!(first, second);
}

#[tokio::test]
async fn sequential_and_parallel_file_checks_agree() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["a.mp4", "c.mp4"] {
        std::fs::write(dir.path().join(name), b"x").unwrap();
    }
    let clips: Vec<Value> = ["a", "b", "c", "d", "e", "b"]
        .iter()
        .map(|n| {
            json!({"asset": {"type": "video", "src": format!("{n}.mp4")}, "start": 0, "length": 1})
        })
        .collect();
    let doc = json!({"timeline": {"tracks": [{"clips": clips}]}, "output": {"format": "mp4"}});

    let sequential = ValidationConfig::default().with_parallel_threshold(1000);
    let parallel = ValidationConfig::default()
        .with_parallel_threshold(0)
        .with_max_workers(2);
    let a = Checker::new(&sequential)
        .check_value(&doc, dir.path())
        .await
        .unwrap();
    let b = Checker::new(&parallel)
        .check_value(&doc, dir.path())
        .await
        .unwrap();
    assert_eq!(a.into_parts(), b.into_parts());
}

#[tokio::test]
async fn converted_template_validates_against_its_media() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("media")).unwrap();
    std::fs::write(dir.path().join("media/intro.mp4"), b"x").unwrap();
    std::fs::write(dir.path().join("media/logo.png"), b"x").unwrap();

    let script = "\
## name: Round Trip
## resources_dir: media

| # | Resource | Trim | Duration | Trans In | Effect | Filter | Trans Out | Volume | Description |
|---|----------|------|----------|----------|--------|--------|-----------|--------|-------------|
| 1 | intro.mp4 | 00:02 | 3s | fade | zoomIn | | fadeFast | 1 | open |
| 2 | logo.png | | 2s | | | greyscale | fade | | close |
";
    for template in [false, true] {
        let conversion = markdown_to_document(script, ConvertOptions { template }).unwrap();
        let report = Checker::new(&ValidationConfig::default().with_strict_mode(true))
            .check_value(&conversion.document, dir.path())
            .await
            .unwrap();
        assert!(report.passed, "template={template}: {:?}", report.findings);
        assert!(report.findings.is_empty());
    }
}

#[tokio::test]
async fn missing_media_reported_with_resolved_path() {
    let dir = tempfile::tempdir().unwrap();
    let report = Checker::new(&ValidationConfig::default())
        .check_value(&local_bound_template(), dir.path())
        .await
        .unwrap();
    assert!(!report.passed);
    let f = &report.findings[0];
    assert_eq!(f.category, Category::File);
    assert!(f.message.starts_with("media file not found"));
    assert!(f
        .suggestion
        .as_deref()
        .unwrap()
        .contains(&dir.path().join("a.mp4").display().to_string()));
}

fn local_bound_template() -> Value {
    let mut doc = url_bound_template();
    doc["merge"][0]["replace"] = json!("");
    doc
}

//! Single entry point for validating a script.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::config::ValidationConfig;
use crate::document::Document;
use crate::placeholder::scan_document;
use crate::validation::files::{collect_media_refs, FileChecker};
use crate::validation::finding::{Category, Finding};
use crate::validation::report::{CheckStage, ValidationReport};
use crate::validation::{default_checks, Check, CheckContext};

/// Failures that are not findings: the script could not be read, or the
/// filesystem misbehaved while probing media.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error probing {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("file probe task failed: {0}")]
    Join(#[source] tokio::task::JoinError),
}

pub struct Checker<'a> {
    config: &'a ValidationConfig,
    checks: Vec<Box<dyn Check>>,
}

impl<'a> Checker<'a> {
    pub fn new(config: &'a ValidationConfig) -> Self {
        Self {
            config,
            checks: default_checks(),
        }
    }

    /// Read and validate a script file. Media paths resolve against the
    /// file's directory.
    pub async fn check_path(&self, path: &Path) -> Result<ValidationReport, CheckError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| CheckError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let base_dir = script_dir(path);
        debug!(path = %path.display(), stage = ?CheckStage::Loaded, "Script loaded");
        self.check_str(&text, &base_dir).await
    }

    pub async fn check_str(
        &self,
        text: &str,
        base_dir: &Path,
    ) -> Result<ValidationReport, CheckError> {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => self.check_value(&value, base_dir).await,
            Err(e) => {
                let finding = Finding::error(
                    Category::Syntax,
                    "$",
                    format!(
                        "invalid JSON at line {}, column {}: {e}",
                        e.line(),
                        e.column()
                    ),
                );
                Ok(ValidationReport::from_findings(vec![finding], self.config.strict_mode))
            }
        }
    }

    pub async fn check_value(
        &self,
        value: &Value,
        base_dir: &Path,
    ) -> Result<ValidationReport, CheckError> {
        let strict = self.config.strict_mode;

        if self.config.skip_validate {
            let finding = Finding::info(Category::Syntax, "$", "validation skipped");
            return Ok(ValidationReport::from_findings(vec![finding], strict));
        }

        let Some(root) = value.as_object() else {
            let finding = Finding::error(
                Category::Structure,
                "$",
                "document root must be a JSON object",
            );
            return Ok(ValidationReport::from_findings(vec![finding], strict));
        };

        let doc = Document::new(root);
        let scan = scan_document(&doc);
        debug!(
            stage = ?CheckStage::StructurallyValid,
            shape = ?doc.shape(),
            placeholders = scan.placeholders.len(),
            "Document parsed"
        );

        let ctx = CheckContext {
            config: self.config,
            scan: &scan,
        };
        let mut findings = Vec::new();
        for check in &self.checks {
            let found = check.check(&doc, &ctx);
            debug!(check = check.name(), findings = found.len(), "Check finished");
            findings.extend(found);
        }

        let refs = collect_media_refs(&doc);
        let files = FileChecker::new(self.config, base_dir)
            .with_document_resources(doc.resources_dir())
            .check(&refs)
            .await?;
        findings.extend(files);
        debug!(
            stage = ?CheckStage::FullyValidated,
            findings = findings.len(),
            "Validation finished"
        );

        Ok(ValidationReport::from_findings(findings, strict))
    }
}

/// Directory a script's relative media paths resolve against.
pub fn script_dir(path: &Path) -> PathBuf {
    let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    path.parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

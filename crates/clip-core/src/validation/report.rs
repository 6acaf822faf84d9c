use serde::Serialize;

use super::finding::{Finding, Severity};

/// How far a validation pass got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStage {
    /// Bytes read, not yet parsed.
    Loaded,
    /// Parsed into an object; checks have not all run.
    StructurallyValid,
    FullyValidated,
    Passed,
    Failed,
}

/// Ordered findings of one run plus the verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub passed: bool,
    pub strict: bool,
    pub stage: CheckStage,
    pub findings: Vec<Finding>,
}

impl ValidationReport {
    /// FAIL on any ERROR, or on any WARNING when `strict`.
    pub fn from_findings(findings: Vec<Finding>, strict: bool) -> Self {
        let passed = !findings
            .iter()
            .any(|f| f.is_error() || (strict && f.is_warning()));
        Self {
            passed,
            strict,
            stage: if passed {
                CheckStage::Passed
            } else {
                CheckStage::Failed
            },
            findings,
        }
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == severity)
            .count()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.is_warning())
    }

    pub fn into_parts(self) -> (bool, Vec<Finding>) {
        (self.passed, self.findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::finding::Category;

    #[test]
    fn warnings_only_fail_when_strict() {
        let findings = vec![Finding::warning(Category::Field, "effect", "Unknown effect 'x'")];
        assert!(ValidationReport::from_findings(findings.clone(), false).passed);
        let strict = ValidationReport::from_findings(findings, true);
        assert!(!strict.passed);
        assert_eq!(strict.stage, CheckStage::Failed);
    }

    #[test]
    fn info_never_fails() {
        let findings = vec![Finding::info(
            Category::Merge,
            "merge[0].find",
            "unused merge entry 'a'",
        )];
        let report = ValidationReport::from_findings(findings, true);
        assert!(report.passed);
        assert_eq!(report.count(Severity::Info), 1);
        assert_eq!(report.errors().count(), 0);
    }
}

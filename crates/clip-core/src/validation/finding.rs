use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "ERROR"),
            Self::Warning => write!(f, "WARNING"),
            Self::Info => write!(f, "INFO"),
        }
    }
}

/// What kind of problem a finding describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// The document is not parsable JSON.
    Syntax,
    /// A required field is absent or has the wrong type.
    Structure,
    /// Malformed or empty `{{placeholder}}` markup.
    Placeholder,
    /// Missing or malformed merge array, entry, or unmatched placeholder.
    Merge,
    /// An enumerated value outside the known vocabulary.
    Field,
    /// A media file that is missing or unreadable.
    File,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax => write!(f, "Syntax"),
            Self::Structure => write!(f, "Structure"),
            Self::Placeholder => write!(f, "Placeholder"),
            Self::Merge => write!(f, "Merge"),
            Self::Field => write!(f, "Field"),
            Self::File => write!(f, "File"),
        }
    }
}

/// One validation result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub category: Category,
    /// Dotted JSON path of the checked value.
    pub field: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Every path the finding concerns when there is more than one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<String>,
}

impl Finding {
    pub fn new(
        severity: Severity,
        category: Category,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            field: field.into(),
            message: message.into(),
            suggestion: None,
            locations: Vec::new(),
        }
    }

    pub fn error(category: Category, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, category, field, message)
    }

    pub fn warning(
        category: Category,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(Severity::Warning, category, field, message)
    }

    pub fn info(category: Category, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, category, field, message)
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_locations<I, S>(mut self, locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.locations = locations.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.severity, self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_optional_parts() {
        let f = Finding::error(Category::Merge, "merge", "missing")
            .with_suggestion("add it")
            .with_locations(["a", "b"]);
        assert!(f.is_error());
        assert_eq!(f.suggestion.as_deref(), Some("add it"));
        assert_eq!(f.locations, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(f.to_string(), "ERROR merge: missing");
    }

    #[test]
    fn serializes_without_empty_optionals() {
        let f = Finding::warning(Category::Field, "output.format", "Unknown output format 'avi'");
        let v = serde_json::to_value(&f).unwrap();
        assert_eq!(v["severity"], "warning");
        assert_eq!(v["category"], "field");
        assert!(v.get("suggestion").is_none());
        assert!(v.get("locations").is_none());
    }
}

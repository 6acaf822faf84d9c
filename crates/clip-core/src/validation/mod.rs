pub mod checks;
pub mod files;
pub mod finding;
pub mod report;
pub mod vocabulary;

use crate::config::ValidationConfig;
use crate::document::Document;
use crate::placeholder::Scan;

use finding::Finding;

/// Shared inputs for one validation pass over a document.
pub struct CheckContext<'a> {
    pub config: &'a ValidationConfig,
    /// Placeholder occurrences and brace problems found in the document.
    pub scan: &'a Scan,
}

/// Trait for a composable document check.
///
/// Checks never fail: bad input becomes findings. They run in the order
/// returned by [`default_checks`] and their findings keep that order.
pub trait Check: Send + Sync {
    /// Human-readable name of this check.
    fn name(&self) -> &'static str;

    fn check(&self, doc: &Document<'_>, ctx: &CheckContext<'_>) -> Vec<Finding>;
}

/// The document checks, structure first. File probing is separate because
/// it touches the filesystem; see [`files::FileChecker`].
pub fn default_checks() -> Vec<Box<dyn Check>> {
    vec![
        Box::new(checks::structure::StructureCheck),
        Box::new(checks::placeholder::PlaceholderSyntaxCheck),
        Box::new(checks::merge::MergeCheck),
        Box::new(checks::fields::FieldCheck),
    ]
}

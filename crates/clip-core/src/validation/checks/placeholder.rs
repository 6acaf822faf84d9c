use crate::document::Document;
use crate::placeholder::BraceProblem;
use crate::validation::finding::{Category, Finding};
use crate::validation::{Check, CheckContext};

/// Reports brace markup that is not a well-formed `{{token}}`.
pub struct PlaceholderSyntaxCheck;

impl Check for PlaceholderSyntaxCheck {
    fn name(&self) -> &'static str {
        "PlaceholderSyntax"
    }

    fn check(&self, _doc: &Document<'_>, ctx: &CheckContext<'_>) -> Vec<Finding> {
        ctx.scan
            .issues
            .iter()
            .map(|issue| {
                let field = issue.path.to_string();
                match issue.problem {
                    BraceProblem::Empty => Finding::warning(
                        Category::Placeholder,
                        field,
                        format!("empty placeholder '{}'", issue.text),
                    )
                    .with_suggestion("put a field name between the braces or remove them"),
                    _ => Finding::warning(
                        Category::Placeholder,
                        field,
                        format!("Invalid placeholder syntax: '{}'", issue.text),
                    )
                    .with_suggestion("use the format {{field}}"),
                }
            })
            .collect()
    }
}

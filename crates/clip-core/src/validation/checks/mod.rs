pub mod fields;
pub mod merge;
pub mod placeholder;
pub mod structure;

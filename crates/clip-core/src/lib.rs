#![forbid(unsafe_code)]

pub mod assemble;
pub mod checker;
pub mod config;
pub mod convert;
pub mod document;
pub mod placeholder;
pub mod service;
pub mod validation;

pub use assemble::{
    AssembleError, AssembleOptions, Assembler, AssemblyEvent, AssemblyOutcome, UploadedMedia,
};
pub use checker::{CheckError, Checker};
pub use config::{ServiceConfig, ValidationConfig};
pub use convert::{convert_file, markdown_to_document, ConvertError, ConvertOptions, Conversion};
pub use document::{Document, JsonPath, Shape};
pub use placeholder::{locate, scan, Placeholder};
pub use service::{
    ApiError, HttpRenderService, RenderService, RenderState, RenderStatus, SourceStatus,
    UploadTarget,
};
pub use validation::finding::{Category, Finding, Severity};
pub use validation::report::{CheckStage, ValidationReport};
pub use validation::vocabulary::FieldKind;

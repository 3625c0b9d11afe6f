pub mod diagnostic;

pub use diagnostic::{Category, Diagnostic, ExtractStats, Severity, Source, WorkflowContext};

//! Diagnostic data model
//!
//! The output unit of the log-parsing engine: a typed, deduplicated record
//! carrying location, rule identity, severity, category and source tool,
//! plus the raw line it was extracted from.

use serde::{Deserialize, Serialize};

/// Severity of an emitted diagnostic. Inference guarantees every emitted
/// diagnostic carries one of these two values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Semantic bucket for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Compile,
    TypeCheck,
    Lint,
    Test,
    Runtime,
    Metadata,
    Unknown,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Compile => "compile",
            Category::TypeCheck => "type-check",
            Category::Lint => "lint",
            Category::Test => "test",
            Category::Runtime => "runtime",
            Category::Metadata => "metadata",
            Category::Unknown => "unknown",
        }
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::Unknown
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tool family that produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    Go,
    Typescript,
    Eslint,
    Rust,
    Python,
    Nodejs,
    Docker,
    GoTest,
    Metadata,
    Generic,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Go => "go",
            Source::Typescript => "typescript",
            Source::Eslint => "eslint",
            Source::Rust => "rust",
            Source::Python => "python",
            Source::Nodejs => "nodejs",
            Source::Docker => "docker",
            Source::GoTest => "go-test",
            Source::Metadata => "metadata",
            Source::Generic => "generic",
        }
    }
}

impl Default for Source {
    fn default() -> Self {
        Source::Generic
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Runner-provided `{job, step}` pair. Attached to diagnostics by deep copy
/// so downstream mutation of one record cannot leak into another.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowContext {
    pub job: String,
    pub step: String,
}

impl WorkflowContext {
    pub fn new(job: impl Into<String>, step: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            step: step.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.job.is_empty() && self.step.is_empty()
    }
}

/// A single parsed diagnostic. Immutable once emitted by the extractor.
///
/// `line` and `column` are 1-based; 0 means unknown. When `file` is empty
/// both are 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub message: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
    /// Tool rule identifier (`TS2322`, `no-var`, `E0308/clippy::unwrap_used`).
    /// Always present on the wire; `null` when the tool has none.
    pub rule_id: Option<String>,
    /// Empty only between parsing and the severity-inference pass.
    pub severity: Option<Severity>,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub source: Source,
    /// Original line before runner-prefix cleaning and ANSI stripping.
    pub raw: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_context: Option<WorkflowContext>,
    /// True only for generic-fallback emissions: a line that looked like a
    /// real error but matched no known tool grammar.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unknown_pattern: bool,
}

impl Diagnostic {
    /// Deduplication identity: two diagnostics with the same key are exact
    /// repeats for the purposes of a single extraction.
    pub fn dedup_key(&self) -> (String, String, u32) {
        (self.message.clone(), self.file.clone(), self.line)
    }
}

/// Summary counts returned beside the diagnostic list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractStats {
    pub total: usize,
    pub errors: usize,
    pub warnings: usize,
}

impl ExtractStats {
    pub fn from_diagnostics(diagnostics: &[Diagnostic]) -> Self {
        let mut stats = Self {
            total: diagnostics.len(),
            ..Self::default()
        };
        for diag in diagnostics {
            match diag.severity {
                Some(Severity::Error) => stats.errors += 1,
                Some(Severity::Warning) => stats.warnings += 1,
                None => {}
            }
        }
        stats
    }
}

//! Detent CI log-parsing engine.
//!
//! Ingests raw, interleaved, ANSI-colored text from CI runners (local
//! `act`, GitHub Actions) and emits a structured, deduplicated stream of
//! typed diagnostics: compile errors, lint warnings, test failures,
//! runtime panics and metadata signals, each carrying location, rule
//! identity, severity, category and source tool.
//!
//! The engine layers leaf-first: bounded line scanning, runner-prefix
//! cleaning, a confidence-voting tool registry, per-tool parsers with
//! multi-line state, and an extractor that owns cross-parser stack traces,
//! deduplication and post-processing. The `http` module is a thin
//! stateless façade over the extractor.

pub mod http;
pub mod models;
pub mod services;
pub mod utils;

pub use models::{Category, Diagnostic, ExtractStats, Severity, Source, WorkflowContext};
pub use services::{ActParser, CiContextParser, ExtractResult, Extractor, PassthroughParser};

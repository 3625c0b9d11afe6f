//! Tool parser capability set (L4).
//!
//! One parser per tool family. Every parser implements the same uniform
//! interface; the registry routes each cleaned line to exactly one of them
//! by confidence vote. Parsers carry per-request multi-line state and are
//! never shared across extractions.

pub mod docker;
pub mod eslint;
pub mod generic;
pub mod go;
pub mod go_linters;
pub mod node;
pub mod python;
pub mod rust;
pub mod typescript;

pub use docker::DockerParser;
pub use eslint::EslintParser;
pub use generic::GenericParser;
pub use go::GoParser;
pub use node::NodeParser;
pub use python::PythonParser;
pub use rust::RustParser;
pub use typescript::TypescriptParser;

use crate::models::{Diagnostic, WorkflowContext};

/// Per-request state shared between the extractor and the active parser.
///
/// `last_file` lets parsers whose grammar splits the file path from the
/// error lines (ESLint stylish) locate later errors. Parsers may read and
/// write it; they must not retain it across requests.
#[derive(Debug, Default)]
pub struct ParseContext {
    pub last_file: String,
    pub workflow_context: Option<WorkflowContext>,
    /// Original (uncleaned) form of the line currently being dispatched,
    /// kept for the `raw` attribution field. Set by the extractor before
    /// each dispatch.
    pub raw_line: String,
}

impl ParseContext {
    /// The raw line for attribution, falling back to the cleaned line when
    /// no raw form was recorded (direct parser use in tests).
    pub fn raw_for(&self, cleaned: &str) -> String {
        if self.raw_line.is_empty() {
            cleaned.to_string()
        } else {
            self.raw_line.clone()
        }
    }
}

/// Uniform capability set for a tool family.
///
/// `can_parse` must be pure with respect to the line; it may consult
/// `ctx.last_file` and the parser's own multi-line state. `parse` may
/// return `None` when a line is consumed but only advances state (a file
/// header in ESLint stylish, a location arrow in Rust).
pub trait ToolParser: Send {
    /// Stable tool-family identifier.
    fn id(&self) -> &'static str;

    /// Tie-break weight; higher fires first on equal confidence.
    fn priority(&self) -> i32;

    /// Confidence in [0, 1] that this line belongs to this tool. Zero means
    /// "not mine".
    fn can_parse(&self, line: &str, ctx: &ParseContext) -> f32;

    /// Consume a claimed line, possibly emitting a diagnostic.
    fn parse(&mut self, line: &str, ctx: &mut ParseContext) -> Option<Diagnostic>;

    /// Tool-specific non-diagnostic output (summaries, progress, banners).
    fn is_noise(&self, line: &str) -> bool;

    /// Capability probe for multi-line accumulation.
    fn supports_multi_line(&self) -> bool {
        false
    }

    /// True while this parser holds an open multi-line block.
    fn in_multi_line(&self) -> bool {
        false
    }

    /// Decide whether `line` extends the open block. Returning false means
    /// the block ended before this line; the caller re-offers the line to
    /// normal dispatch.
    fn continue_multi_line(&mut self, _line: &str, _ctx: &mut ParseContext) -> bool {
        false
    }

    /// Close any open block, emitting its finalized diagnostic if one is
    /// pending. Called at EOF or when block ownership ends.
    fn finish_multi_line(&mut self, _ctx: &mut ParseContext) -> Option<Diagnostic> {
        None
    }

    /// Cheap substring/prefix sentinels the registry screens before the
    /// confidence vote.
    fn noise_prefixes(&self) -> &'static [&'static str] {
        &[]
    }

    /// Clear all per-instance multi-line state.
    fn reset(&mut self);
}

/// Reserved registry priorities. These are the only ordering knob; dispatch
/// logic never names a specific tool.
pub mod priority {
    pub const SPECIFIC: i32 = 90;
    pub const STRUCTURED: i32 = 85;
    pub const RUNTIME: i32 = 80;
    pub const INFRA: i32 = 70;
    pub const FALLBACK: i32 = 10;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MinimalParser;

    impl ToolParser for MinimalParser {
        fn id(&self) -> &'static str {
            "minimal"
        }
        fn priority(&self) -> i32 {
            priority::FALLBACK
        }
        fn can_parse(&self, _line: &str, _ctx: &ParseContext) -> f32 {
            0.0
        }
        fn parse(&mut self, _line: &str, _ctx: &mut ParseContext) -> Option<Diagnostic> {
            None
        }
        fn is_noise(&self, _line: &str) -> bool {
            false
        }
        fn reset(&mut self) {}
    }

    #[test]
    fn test_default_capability_probes() {
        let mut parser = MinimalParser;
        let mut ctx = ParseContext::default();
        assert!(!parser.supports_multi_line());
        assert!(!parser.in_multi_line());
        assert!(!parser.continue_multi_line("anything", &mut ctx));
        assert!(parser.finish_multi_line(&mut ctx).is_none());
        assert!(parser.noise_prefixes().is_empty());
    }
}

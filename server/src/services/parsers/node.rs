//! Node.js stack frames.
//!
//! `at fn (file:L:C)` lines are stack frames. The first frame opens a
//! runtime diagnostic located at that frame; subsequent frames extend its
//! stack trace (accumulated at the extractor level); the first non-frame
//! line closes the trace.

use lazy_static::lazy_static;
use regex::Regex;

use super::{priority, ParseContext, ToolParser};
use crate::models::{Category, Diagnostic, Severity, Source};
use crate::utils::helpers::parse_loc;

lazy_static! {
    static ref FRAME: Regex = Regex::new(
        r"^\s{1,16}at (?:async )?(?P<func>.{1,512}?) \((?P<file>[^()]{1,512}):(?P<line>\d{1,9}):(?P<col>\d{1,9})\)\s*$"
    )
    .unwrap();
    // Frames without a function name: `    at /app/index.js:1:13`.
    static ref BARE_FRAME: Regex = Regex::new(
        r"^\s{1,16}at (?:async )?(?P<file>[^()\s]{1,512}):(?P<line>\d{1,9}):(?P<col>\d{1,9})\s*$"
    )
    .unwrap();
}

/// True when `line` is a stack frame in either shape.
pub fn is_frame(line: &str) -> bool {
    FRAME.is_match(line) || BARE_FRAME.is_match(line)
}

#[derive(Debug, Default)]
pub struct NodeParser;

impl NodeParser {
    pub fn new() -> Self {
        Self
    }
}

impl ToolParser for NodeParser {
    fn id(&self) -> &'static str {
        "nodejs"
    }

    fn priority(&self) -> i32 {
        priority::RUNTIME
    }

    fn can_parse(&self, line: &str, _ctx: &ParseContext) -> f32 {
        if is_frame(line) {
            0.85
        } else {
            0.0
        }
    }

    fn parse(&mut self, line: &str, ctx: &mut ParseContext) -> Option<Diagnostic> {
        let (file, line_no, column) = if let Some(caps) = FRAME.captures(line) {
            (
                caps.name("file").map_or("", |m| m.as_str()).to_string(),
                parse_loc(caps.name("line").map_or("", |m| m.as_str())),
                parse_loc(caps.name("col").map_or("", |m| m.as_str())),
            )
        } else if let Some(caps) = BARE_FRAME.captures(line) {
            (
                caps.name("file").map_or("", |m| m.as_str()).to_string(),
                parse_loc(caps.name("line").map_or("", |m| m.as_str())),
                parse_loc(caps.name("col").map_or("", |m| m.as_str())),
            )
        } else {
            return None;
        };

        Some(Diagnostic {
            message: line.trim().to_string(),
            file,
            line: line_no,
            column,
            severity: Some(Severity::Error),
            category: Category::Runtime,
            source: Source::Nodejs,
            raw: ctx.raw_for(line),
            ..Diagnostic::default()
        })
    }

    fn is_noise(&self, line: &str) -> bool {
        let trimmed = line.trim_start();
        trimmed.starts_with("npm notice") || trimmed.starts_with("npm WARN deprecated")
    }

    fn noise_prefixes(&self) -> &'static [&'static str] {
        &["npm http ", "npm timing "]
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(line: &str) -> Option<Diagnostic> {
        let mut ctx = ParseContext::default();
        NodeParser::new().parse(line, &mut ctx)
    }

    #[test]
    fn test_named_frame() {
        let diag = parse("    at Object.<anonymous> (/app/index.js:3:11)").unwrap();
        assert_eq!(diag.file, "/app/index.js");
        assert_eq!(diag.line, 3);
        assert_eq!(diag.column, 11);
        assert_eq!(diag.category, Category::Runtime);
        assert_eq!(diag.source, Source::Nodejs);
        assert_eq!(diag.message, "at Object.<anonymous> (/app/index.js:3:11)");
    }

    #[test]
    fn test_bare_frame() {
        let diag = parse("    at /app/server.js:10:5").unwrap();
        assert_eq!(diag.file, "/app/server.js");
        assert_eq!(diag.line, 10);
    }

    #[test]
    fn test_async_frame() {
        let diag = parse("    at async run (/app/task.js:7:3)").unwrap();
        assert_eq!(diag.file, "/app/task.js");
    }

    #[test]
    fn test_unindented_line_not_claimed() {
        let parser = NodeParser::new();
        let ctx = ParseContext::default();
        assert_eq!(parser.can_parse("at large in the wild", &ctx), 0.0);
        assert_eq!(
            parser.can_parse("looking at file.js:1:2 for clues", &ctx),
            0.0
        );
    }

    #[test]
    fn test_is_frame_shapes() {
        assert!(is_frame("    at main (/app/a.js:1:1)"));
        assert!(is_frame("    at /app/a.js:1:1"));
        assert!(!is_frame("  1:1  error  Missing semicolon  semi"));
    }
}

//! Go tool family: compiler, `go vet`, golangci-lint, panics, test output.

use lazy_static::lazy_static;
use regex::Regex;

use super::{go_linters, priority, ParseContext, ToolParser};
use crate::models::{Category, Diagnostic, Severity, Source};
use crate::utils::helpers::parse_loc;

lazy_static! {
    // `path.go:L:C: message` and `path.go:L: message` (no column on import
    // cycles). Only the Go parser accepts a `.go` suffix; that is the
    // tie-break against ESLint unix.
    static ref GO_LINE: Regex = Regex::new(
        r"^(?P<file>[^\s:]{1,512}\.go):(?P<line>\d{1,6})(?::(?P<col>\d{1,6}))?:\s?(?P<msg>.+)$"
    )
    .unwrap();
    // golangci-lint appends the producing linter: `message (ineffassign)`.
    static ref TRAILING_LINTER: Regex =
        Regex::new(r"^(?P<msg>.+?)\s\((?P<rule>[a-z][a-z0-9_-]{1,64})\)$").unwrap();
    // staticcheck-style codes: `SA4006: message`.
    static ref LEADING_CODE: Regex =
        Regex::new(r"^(?P<code>[A-Z]{1,8}\d{1,5}):\s(?P<msg>.+)$").unwrap();
    static ref TEST_FAIL: Regex =
        Regex::new(r"^--- FAIL: (?P<name>\S{1,256})(?:\s\([0-9.]{1,16}s\))?$").unwrap();
    static ref PANIC: Regex = Regex::new(r"^panic: (?P<msg>.+)$").unwrap();
    static ref TEST_SUMMARY: Regex =
        Regex::new(r"^(?:ok|FAIL)\s+\S{1,512}\s+[0-9.]{1,16}s(?:\s.*)?$").unwrap();
}

/// Map a `[A-Z]+\d+` code prefix to its linter family's severity.
fn severity_for_code(code: &str) -> Severity {
    let letters: String = code.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    match letters.as_str() {
        "SA" | "G" => Severity::Error,
        "S" | "ST" | "QF" => Severity::Warning,
        _ => go_linters::UNKNOWN_LINTER_SEVERITY,
    }
}

#[derive(Debug, Default)]
pub struct GoParser;

impl GoParser {
    pub fn new() -> Self {
        Self
    }

    fn parse_located_line(&self, line: &str, raw: String) -> Option<Diagnostic> {
        let caps = GO_LINE.captures(line)?;
        let file = caps.name("file")?.as_str().to_string();
        let line_no = parse_loc(caps.name("line").map_or("", |m| m.as_str()));
        let column = caps.name("col").map_or(0, |m| parse_loc(m.as_str()));
        let mut message = caps.name("msg").map_or("", |m| m.as_str()).trim().to_string();

        let mut rule_id = None;
        let mut severity = Severity::Error;
        let mut category = Category::Compile;

        if let Some(linter_caps) = TRAILING_LINTER.captures(&message) {
            let rule = linter_caps.name("rule").map_or("", |m| m.as_str()).to_string();
            message = linter_caps.name("msg").map_or("", |m| m.as_str()).to_string();
            severity = go_linters::severity_for(&rule)
                .unwrap_or(go_linters::UNKNOWN_LINTER_SEVERITY);
            rule_id = Some(rule);
            category = Category::Lint;
        }

        if let Some(code_caps) = LEADING_CODE.captures(&message) {
            let code = code_caps.name("code").map_or("", |m| m.as_str()).to_string();
            message = code_caps.name("msg").map_or("", |m| m.as_str()).to_string();
            severity = severity_for_code(&code);
            rule_id = Some(code);
            category = Category::Lint;
        }

        Some(Diagnostic {
            message,
            file,
            line: line_no,
            column,
            rule_id,
            severity: Some(severity),
            category,
            source: Source::Go,
            raw,
            ..Diagnostic::default()
        })
    }
}

impl ToolParser for GoParser {
    fn id(&self) -> &'static str {
        "go"
    }

    fn priority(&self) -> i32 {
        priority::SPECIFIC
    }

    fn can_parse(&self, line: &str, _ctx: &ParseContext) -> f32 {
        let trimmed = line.trim_end();
        if GO_LINE.is_match(trimmed) {
            0.95
        } else if PANIC.is_match(trimmed) || TEST_FAIL.is_match(trimmed) {
            0.90
        } else {
            0.0
        }
    }

    fn parse(&mut self, line: &str, ctx: &mut ParseContext) -> Option<Diagnostic> {
        let trimmed = line.trim_end();
        let raw = ctx.raw_for(line);

        if let Some(caps) = PANIC.captures(trimmed) {
            return Some(Diagnostic {
                message: format!("panic: {}", caps.name("msg").map_or("", |m| m.as_str())),
                severity: Some(Severity::Error),
                category: Category::Runtime,
                source: Source::Go,
                raw,
                ..Diagnostic::default()
            });
        }

        if let Some(caps) = TEST_FAIL.captures(trimmed) {
            let name = caps.name("name").map_or("", |m| m.as_str());
            return Some(Diagnostic {
                message: format!("Test failed: {name}"),
                severity: Some(Severity::Error),
                category: Category::Test,
                source: Source::GoTest,
                raw,
                ..Diagnostic::default()
            });
        }

        self.parse_located_line(trimmed, raw)
    }

    fn is_noise(&self, line: &str) -> bool {
        let trimmed = line.trim();
        trimmed == "PASS"
            || trimmed == "FAIL"
            || TEST_SUMMARY.is_match(trimmed)
            || trimmed.starts_with("=== RUN ")
            || trimmed.starts_with("=== PAUSE ")
            || trimmed.starts_with("=== CONT ")
            || trimmed.starts_with("--- PASS: ")
            || trimmed.starts_with("--- SKIP: ")
    }

    fn noise_prefixes(&self) -> &'static [&'static str] {
        &["go: downloading ", "go: finding ", "go: extracting "]
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(line: &str) -> Option<Diagnostic> {
        let mut ctx = ParseContext::default();
        GoParser::new().parse(line, &mut ctx)
    }

    #[test]
    fn test_compile_error_with_column() {
        let diag = parse("main.go:10:5: undefined: foo").unwrap();
        assert_eq!(diag.file, "main.go");
        assert_eq!(diag.line, 10);
        assert_eq!(diag.column, 5);
        assert_eq!(diag.message, "undefined: foo");
        assert_eq!(diag.category, Category::Compile);
        assert_eq!(diag.severity, Some(Severity::Error));
        assert_eq!(diag.source, Source::Go);
        assert_eq!(diag.rule_id, None);
    }

    #[test]
    fn test_import_cycle_without_column() {
        let diag = parse("pkg/a/a.go:3: import cycle not allowed").unwrap();
        assert_eq!(diag.line, 3);
        assert_eq!(diag.column, 0);
    }

    #[test]
    fn test_golangci_trailing_linter_rule() {
        let diag = parse("cmd/run.go:22:9: ineffectual assignment to err (ineffassign)").unwrap();
        assert_eq!(diag.rule_id.as_deref(), Some("ineffassign"));
        assert_eq!(diag.message, "ineffectual assignment to err");
        assert_eq!(diag.category, Category::Lint);
        assert_eq!(diag.severity, Some(Severity::Error));
    }

    #[test]
    fn test_golangci_style_linter_is_warning() {
        let diag = parse("cmd/run.go:5:1: comment should end in a period (godot)").unwrap();
        assert_eq!(diag.severity, Some(Severity::Warning));
    }

    #[test]
    fn test_unknown_linter_defaults_to_warning() {
        let diag = parse("x.go:1:1: some finding (somefuturelinter)").unwrap();
        assert_eq!(diag.severity, Some(Severity::Warning));
        assert_eq!(diag.rule_id.as_deref(), Some("somefuturelinter"));
    }

    #[test]
    fn test_staticcheck_code_prefix() {
        let diag = parse("store.go:14:2: SA4006: this value of err is never used").unwrap();
        assert_eq!(diag.rule_id.as_deref(), Some("SA4006"));
        assert_eq!(diag.message, "this value of err is never used");
        assert_eq!(diag.severity, Some(Severity::Error));
        assert_eq!(diag.category, Category::Lint);
    }

    #[test]
    fn test_gosec_code_is_error() {
        let diag = parse("auth.go:8:2: G101: Potential hardcoded credentials").unwrap();
        assert_eq!(diag.rule_id.as_deref(), Some("G101"));
        assert_eq!(diag.severity, Some(Severity::Error));
    }

    #[test]
    fn test_stylecheck_code_is_warning() {
        let diag = parse("api.go:4:1: ST1000: at least one file in a package should have a package comment").unwrap();
        assert_eq!(diag.rule_id.as_deref(), Some("ST1000"));
        assert_eq!(diag.severity, Some(Severity::Warning));
    }

    #[test]
    fn test_code_prefix_inside_linter_suffix() {
        let diag = parse("db.go:30:6: SA1019: grpc.Dial is deprecated (staticcheck)").unwrap();
        assert_eq!(diag.rule_id.as_deref(), Some("SA1019"));
        assert_eq!(diag.message, "grpc.Dial is deprecated");
        assert_eq!(diag.severity, Some(Severity::Error));
    }

    #[test]
    fn test_test_failure() {
        let diag = parse("--- FAIL: TestParse (0.03s)").unwrap();
        assert_eq!(diag.message, "Test failed: TestParse");
        assert_eq!(diag.source, Source::GoTest);
        assert_eq!(diag.category, Category::Test);
        assert_eq!(diag.file, "");
        assert_eq!(diag.line, 0);
    }

    #[test]
    fn test_panic() {
        let diag = parse("panic: runtime error: index out of range [5] with length 3").unwrap();
        assert_eq!(
            diag.message,
            "panic: runtime error: index out of range [5] with length 3"
        );
        assert_eq!(diag.category, Category::Runtime);
        assert_eq!(diag.source, Source::Go);
    }

    #[test]
    fn test_confidence_requires_go_suffix() {
        let parser = GoParser::new();
        let ctx = ParseContext::default();
        assert_eq!(parser.can_parse("src/file.js:10:5: something", &ctx), 0.0);
        assert!(parser.can_parse("main.go:10:5: undefined: foo", &ctx) > 0.9);
    }

    #[test]
    fn test_noise_lines() {
        let parser = GoParser::new();
        assert!(parser.is_noise("=== RUN TestParse"));
        assert!(parser.is_noise("--- PASS: TestParse (0.00s)"));
        assert!(parser.is_noise("PASS"));
        assert!(parser.is_noise("ok  \tgithub.com/acme/pkg\t0.123s"));
        assert!(parser.is_noise("FAIL\tgithub.com/acme/pkg\t0.456s"));
        assert!(!parser.is_noise("main.go:10:5: undefined: foo"));
    }

    #[test]
    fn test_goroutine_frame_not_claimed() {
        let parser = GoParser::new();
        let ctx = ParseContext::default();
        assert_eq!(parser.can_parse("\t/app/main.go:10 +0x1b", &ctx), 0.0);
    }
}

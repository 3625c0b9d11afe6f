//! TypeScript compiler (`tsc`) output.

use lazy_static::lazy_static;
use regex::Regex;

use super::{priority, ParseContext, ToolParser};
use crate::models::{Category, Diagnostic, Severity, Source};
use crate::utils::helpers::parse_loc;

lazy_static! {
    // `path.ts(L,C): [error TSxxxx:] message`. The extension list covers
    // declaration and module-flavored variants.
    static ref TS_LINE: Regex = Regex::new(
        r"^(?P<file>\S{1,512}\.(?:d\.)?[mc]?tsx?)\((?P<line>\d{1,6}),(?P<col>\d{1,6})\):\s(?:(?P<sev>error|warning)\s(?P<code>TS\d{3,5}):\s)?(?P<msg>.+)$"
    )
    .unwrap();
    // Pretty-output code frames: `  12 |  const x = y;` and `     ~~~~`.
    static ref CODE_FRAME: Regex = Regex::new(r"^\s{1,8}\d{0,6}\s?\|").unwrap();
    static ref CARET_FRAME: Regex = Regex::new(r"^\s{1,64}~+\s*$").unwrap();
    // Build/watch summaries.
    static ref SUMMARY: Regex =
        Regex::new(r"^Found \d{1,6} errors? in ").unwrap();
}

/// Semantic bucket from the leading digit(s) of a `TSxxxx` code.
fn category_for_code(code: &str) -> Category {
    match code.as_bytes().get(2) {
        Some(b'1') => Category::Compile,    // syntax
        Some(b'2') => Category::TypeCheck,  // type
        Some(b'5') => Category::Compile,    // config
        Some(b'6') => Category::Compile,    // build
        Some(b'7') => Category::TypeCheck,  // strict
        Some(b'8') => Category::Compile,    // jsx
        _ => Category::TypeCheck,
    }
}

#[derive(Debug, Default)]
pub struct TypescriptParser;

impl TypescriptParser {
    pub fn new() -> Self {
        Self
    }
}

impl ToolParser for TypescriptParser {
    fn id(&self) -> &'static str {
        "typescript"
    }

    fn priority(&self) -> i32 {
        priority::SPECIFIC
    }

    fn can_parse(&self, line: &str, _ctx: &ParseContext) -> f32 {
        if TS_LINE.is_match(line.trim_end()) {
            0.95
        } else {
            0.0
        }
    }

    fn parse(&mut self, line: &str, ctx: &mut ParseContext) -> Option<Diagnostic> {
        let caps = TS_LINE.captures(line.trim_end())?;
        let code = caps.name("code").map(|m| m.as_str().to_string());
        let severity = match caps.name("sev").map(|m| m.as_str()) {
            Some("warning") => Severity::Warning,
            _ => Severity::Error,
        };
        let category = code
            .as_deref()
            .map_or(Category::TypeCheck, category_for_code);

        Some(Diagnostic {
            message: caps.name("msg").map_or("", |m| m.as_str()).trim().to_string(),
            file: caps.name("file").map_or("", |m| m.as_str()).to_string(),
            line: parse_loc(caps.name("line").map_or("", |m| m.as_str())),
            column: parse_loc(caps.name("col").map_or("", |m| m.as_str())),
            rule_id: code,
            severity: Some(severity),
            category,
            source: Source::Typescript,
            raw: ctx.raw_for(line),
            ..Diagnostic::default()
        })
    }

    fn is_noise(&self, line: &str) -> bool {
        let trimmed = line.trim();
        trimmed.contains("Starting compilation in watch mode")
            || trimmed.contains("Watching for file changes")
            || trimmed.contains("File change detected")
            || SUMMARY.is_match(trimmed)
            || CODE_FRAME.is_match(line)
            || CARET_FRAME.is_match(line)
    }

    fn noise_prefixes(&self) -> &'static [&'static str] {
        &["Projects in this build:", "A non-dry build would build project"]
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(line: &str) -> Option<Diagnostic> {
        let mut ctx = ParseContext::default();
        TypescriptParser::new().parse(line, &mut ctx)
    }

    #[test]
    fn test_full_error_line() {
        let diag =
            parse("src/index.ts(5,10): error TS2304: Cannot find name 'foo'.").unwrap();
        assert_eq!(diag.file, "src/index.ts");
        assert_eq!(diag.line, 5);
        assert_eq!(diag.column, 10);
        assert_eq!(diag.rule_id.as_deref(), Some("TS2304"));
        assert_eq!(diag.message, "Cannot find name 'foo'.");
        assert_eq!(diag.category, Category::TypeCheck);
        assert_eq!(diag.severity, Some(Severity::Error));
        assert_eq!(diag.source, Source::Typescript);
    }

    #[test]
    fn test_line_without_code_prefix() {
        let diag = parse("src/app.tsx(1,1): Some bare message").unwrap();
        assert_eq!(diag.rule_id, None);
        assert_eq!(diag.message, "Some bare message");
        assert_eq!(diag.severity, Some(Severity::Error));
    }

    #[test]
    fn test_declaration_and_module_extensions() {
        for file in [
            "types.d.ts(1,1): error TS1005: ';' expected.",
            "mod.mts(2,3): error TS2322: Type 'string' is not assignable to type 'number'.",
            "legacy.cts(4,5): error TS2304: Cannot find name 'x'.",
            "comp.tsx(6,7): error TS8006: 'import' declarations can only be used in TypeScript files.",
        ] {
            assert!(parse(file).is_some(), "should parse {file}");
        }
    }

    #[test]
    fn test_syntax_bucket() {
        let diag = parse("a.ts(1,1): error TS1005: ';' expected.").unwrap();
        assert_eq!(diag.category, Category::Compile);
    }

    #[test]
    fn test_strict_bucket() {
        let diag =
            parse("a.ts(1,1): error TS7006: Parameter 'x' implicitly has an 'any' type.").unwrap();
        assert_eq!(diag.category, Category::TypeCheck);
    }

    #[test]
    fn test_warning_severity() {
        let diag = parse("a.ts(1,1): warning TS6133: 'x' is declared but never read.").unwrap();
        assert_eq!(diag.severity, Some(Severity::Warning));
    }

    #[test]
    fn test_js_file_not_claimed() {
        let parser = TypescriptParser::new();
        let ctx = ParseContext::default();
        assert_eq!(
            parser.can_parse("src/index.js(5,10): error TS2304: nope", &ctx),
            0.0
        );
    }

    #[test]
    fn test_watch_banner_is_noise() {
        let parser = TypescriptParser::new();
        assert!(parser.is_noise("[12:00:00] Starting compilation in watch mode..."));
        assert!(parser.is_noise("Found 2 errors in the same file."));
        assert!(parser.is_noise("  12 |   const x: number = 'y';"));
        assert!(parser.is_noise("        ~~~~"));
        assert!(!parser.is_noise("src/index.ts(5,10): error TS2304: Cannot find name 'foo'."));
    }
}

//! ESLint output in its three wire dialects: unix, compact and stylish.
//!
//! Stylish is the multi-line one: a bare file-path line gates subsequent
//! indented `L:C  severity  message  rule` lines. The path line is consumed
//! without emission and recorded in the parse context so later detail lines
//! can locate their file.

use lazy_static::lazy_static;
use regex::Regex;

use super::{priority, ParseContext, ToolParser};
use crate::models::{Category, Diagnostic, Severity, Source};
use crate::utils::helpers::parse_loc;

lazy_static! {
    // unix: `path:L:C: message [severity/rule]`. The bracket suffix is the
    // disambiguating signal against the Go compiler grammar.
    static ref UNIX_LINE: Regex = Regex::new(
        r"^(?P<file>[^\s:]{1,512}):(?P<line>\d{1,6}):(?P<col>\d{1,6}):\s(?P<msg>.{1,4096}?)\s\[(?P<sev>error|warning)/(?P<rule>[^\]\s]{1,128})\]$"
    )
    .unwrap();
    // compact: `path: line L, col C, Severity - message (rule)`.
    static ref COMPACT_LINE: Regex = Regex::new(
        r"^(?P<file>[^:]{1,512}): line (?P<line>\d{1,6}), col (?P<col>\d{1,6}), (?P<sev>Error|Warning) - (?P<msg>.{1,4096}?)(?: \((?P<rule>[^)]{1,128})\))?$"
    )
    .unwrap();
    // stylish: a bare lintable file path on its own line.
    static ref STYLISH_FILE: Regex = Regex::new(
        r"^[^\s]{1,512}\.(?:js|jsx|mjs|cjs|ts|tsx|mts|cts|vue|svelte)$"
    )
    .unwrap();
    // stylish detail: `  L:C  severity  body`.
    static ref STYLISH_DETAIL: Regex = Regex::new(
        r"^\s{2,8}(?P<line>\d{1,6}):(?P<col>\d{1,6})\s{2,}(?P<sev>error|warning)\s{2,}(?P<body>.{1,4096})$"
    )
    .unwrap();
    // `(@scope/)?name(/sub)*` — the shape of an ESLint rule id.
    static ref RULE_TOKEN: Regex =
        Regex::new(r"^(?:@[a-z0-9][a-z0-9._-]{0,64}/)?[a-z0-9][a-z0-9._-]{0,64}(?:/[a-z0-9][a-z0-9._-]{0,64}){0,4}$").unwrap();
    static ref SUMMARY: Regex = Regex::new(r"^[✖x] \d{1,6} problems?").unwrap();
}

fn severity_from(label: &str) -> Severity {
    if label.eq_ignore_ascii_case("warning") {
        Severity::Warning
    } else {
        Severity::Error
    }
}

/// Split a stylish detail body into `(message, rule)`. The rule is the last
/// run-of-spaces-separated token matching the rule-id shape.
fn split_message_rule(body: &str) -> (String, Option<String>) {
    if let Some(pos) = body.trim_end().rfind("  ") {
        let candidate = body[pos..].trim();
        if RULE_TOKEN.is_match(candidate) {
            return (body[..pos].trim().to_string(), Some(candidate.to_string()));
        }
    }
    (body.trim().to_string(), None)
}

#[derive(Debug, Default)]
pub struct EslintParser {
    /// File path of the open stylish block, if any.
    stylish_file: Option<String>,
}

impl EslintParser {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_unix(&self, line: &str) -> Option<Diagnostic> {
        let caps = UNIX_LINE.captures(line)?;
        Some(Diagnostic {
            message: caps.name("msg").map_or("", |m| m.as_str()).to_string(),
            file: caps.name("file").map_or("", |m| m.as_str()).to_string(),
            line: parse_loc(caps.name("line").map_or("", |m| m.as_str())),
            column: parse_loc(caps.name("col").map_or("", |m| m.as_str())),
            rule_id: caps.name("rule").map(|m| m.as_str().to_string()),
            severity: Some(severity_from(caps.name("sev").map_or("", |m| m.as_str()))),
            category: Category::Lint,
            source: Source::Eslint,
            raw: line.to_string(),
            ..Diagnostic::default()
        })
    }

    fn parse_compact(&self, line: &str) -> Option<Diagnostic> {
        let caps = COMPACT_LINE.captures(line)?;
        Some(Diagnostic {
            message: caps.name("msg").map_or("", |m| m.as_str()).to_string(),
            file: caps.name("file").map_or("", |m| m.as_str()).to_string(),
            line: parse_loc(caps.name("line").map_or("", |m| m.as_str())),
            column: parse_loc(caps.name("col").map_or("", |m| m.as_str())),
            rule_id: caps.name("rule").map(|m| m.as_str().to_string()),
            severity: Some(severity_from(caps.name("sev").map_or("", |m| m.as_str()))),
            category: Category::Lint,
            source: Source::Eslint,
            raw: line.to_string(),
            ..Diagnostic::default()
        })
    }

    fn parse_stylish_detail(&self, line: &str, ctx: &ParseContext) -> Option<Diagnostic> {
        let caps = STYLISH_DETAIL.captures(line)?;
        let file = self
            .stylish_file
            .clone()
            .unwrap_or_else(|| ctx.last_file.clone());
        let (message, rule_id) = split_message_rule(caps.name("body").map_or("", |m| m.as_str()));
        Some(Diagnostic {
            message,
            file,
            line: parse_loc(caps.name("line").map_or("", |m| m.as_str())),
            column: parse_loc(caps.name("col").map_or("", |m| m.as_str())),
            rule_id,
            severity: Some(severity_from(caps.name("sev").map_or("", |m| m.as_str()))),
            category: Category::Lint,
            source: Source::Eslint,
            raw: line.to_string(),
            ..Diagnostic::default()
        })
    }
}

impl ToolParser for EslintParser {
    fn id(&self) -> &'static str {
        "eslint"
    }

    fn priority(&self) -> i32 {
        priority::STRUCTURED
    }

    fn can_parse(&self, line: &str, ctx: &ParseContext) -> f32 {
        let trimmed = line.trim_end();
        if UNIX_LINE.is_match(trimmed) {
            0.92
        } else if COMPACT_LINE.is_match(trimmed) {
            0.90
        } else if STYLISH_DETAIL.is_match(trimmed)
            && (self.stylish_file.is_some() || !ctx.last_file.is_empty())
        {
            0.80
        } else if STYLISH_FILE.is_match(trimmed) {
            0.50
        } else {
            0.0
        }
    }

    fn parse(&mut self, line: &str, ctx: &mut ParseContext) -> Option<Diagnostic> {
        let trimmed = line.trim_end();

        let mut emitted = self
            .parse_unix(trimmed)
            .or_else(|| self.parse_compact(trimmed))
            .or_else(|| {
                STYLISH_DETAIL
                    .is_match(trimmed)
                    .then(|| self.parse_stylish_detail(line, ctx))
                    .flatten()
            });

        if let Some(diag) = emitted.as_mut() {
            diag.raw = ctx.raw_for(line);
            return emitted;
        }

        if STYLISH_FILE.is_match(trimmed) {
            // File header: consumed without emission, gates the block.
            self.stylish_file = Some(trimmed.to_string());
            ctx.last_file = trimmed.to_string();
        }
        None
    }

    fn is_noise(&self, line: &str) -> bool {
        let trimmed = line.trim();
        SUMMARY.is_match(trimmed)
            || trimmed.contains("potentially fixable with the `--fix` option")
    }

    fn supports_multi_line(&self) -> bool {
        true
    }

    fn in_multi_line(&self) -> bool {
        self.stylish_file.is_some()
    }

    fn continue_multi_line(&mut self, line: &str, _ctx: &mut ParseContext) -> bool {
        // Detail lines extend the block; a blank line, a summary or the
        // next file path ends it before this line.
        STYLISH_DETAIL.is_match(line.trim_end())
    }

    fn finish_multi_line(&mut self, _ctx: &mut ParseContext) -> Option<Diagnostic> {
        self.stylish_file = None;
        None
    }

    fn reset(&mut self) {
        self.stylish_file = None;
    }
}

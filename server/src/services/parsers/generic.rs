//! Generic fallback for lines no tool parser claims.
//!
//! Emits only for a strict whitelist of "looks like a real error" shapes,
//! and only when the line survives a large noise screen: success markers,
//! cache hits, workflow commands, decoration, trace continuations, code
//! that merely mentions "error", and URLs. Every emission is flagged
//! `unknown_pattern` for upstream corpus expansion.

use lazy_static::lazy_static;
use regex::RegexSet;

use super::{priority, ParseContext, ToolParser};
use crate::models::{Category, Diagnostic, Source};

lazy_static! {
    static ref ERROR_WHITELIST: RegexSet = RegexSet::new([
        r"^(?i:error): \S",
        r"^(?i:fatal): \S",
        r"^(?i:fatal error): \S",
        r"^(?i:exit (?:code|status)) [1-9]\d{0,4}\b",
        r"^(?i:permission denied)",
        r"^(?i:segmentation fault)",
        r"^\[(?:ERROR|FATAL)\]\s+\S",
        r"^(?i:command failed with exit code) [1-9]\d{0,4}\b",
    ])
    .unwrap();

    static ref NOISE_PATTERNS: RegexSet = RegexSet::new([
        // Success and completion markers
        r"^\s*(?:✓|✔|✅|√)",
        r"(?i)\bsuccessfully\b",
        r"(?i)^\s*(?:done|success|complete[d]?)\s*[.!]?\s*$",
        r"(?i)^done in [0-9.]+m?s",
        r"(?i)compiled successfully",
        r"^\s*\d+ passing\b",
        // Cache traffic
        r"(?i)cache (?:hit|restored|saved)",
        r"(?i)restored from cache",
        r"(?i)\[cached\]",
        r"(?i)using cache",
        // GitHub Actions workflow commands and group markers
        r"^::[a-z-]+(?:\s|::)",
        r"^##\[[a-z]+\]",
        // Box drawing and banner decoration
        r"[│┌┐└┘├┤─━═║╔╗╚╝╭╮╰╯]",
        r"^\s*[*=~-]{4,}\s*$",
        // Stack-trace continuations owned elsewhere
        r"^\s+at ",
        r#"^\s+File ""#,
        r"^\s+\S+\.go:\d",
        // Identifiers and code that merely mention "error"
        r"(?i)\b(?:error_[a-z0-9_]|[a-z0-9_]_error|errors?\.[A-Za-z]|error\s*[:=]=|if err\b|Error\()",
        // URLs with "error" somewhere in them
        r"(?i)https?://\S*error",
        // Progress bars, spinners, watch banners
        r"\d{1,3}%(?:\s|$|\|)",
        r"\[[=\->.#]{3,}\]",
        r"[⠁⠂⠄⠆⠇⠋⠙⠸⠴⠦⠧⠏]",
        r"(?i)watching for (?:file )?changes",
        // ESLint/test-runner summaries that escape their own parser
        r"^[✖x] \d{1,6} problems?",
    ])
    .unwrap();
}

#[derive(Debug, Default)]
pub struct GenericParser;

impl GenericParser {
    pub fn new() -> Self {
        Self
    }

    fn matches_whitelist(&self, line: &str) -> bool {
        ERROR_WHITELIST.is_match(line) && !NOISE_PATTERNS.is_match(line)
    }
}

impl ToolParser for GenericParser {
    fn id(&self) -> &'static str {
        "generic"
    }

    fn priority(&self) -> i32 {
        priority::FALLBACK
    }

    fn can_parse(&self, line: &str, _ctx: &ParseContext) -> f32 {
        if self.matches_whitelist(line.trim_end()) {
            0.10
        } else {
            0.0
        }
    }

    fn parse(&mut self, line: &str, ctx: &mut ParseContext) -> Option<Diagnostic> {
        let trimmed = line.trim_end();
        if !self.matches_whitelist(trimmed) {
            return None;
        }
        Some(Diagnostic {
            message: trimmed.to_string(),
            // Severity is left to the inference pass.
            severity: None,
            category: Category::Unknown,
            source: Source::Generic,
            raw: ctx.raw_for(line),
            unknown_pattern: true,
            ..Diagnostic::default()
        })
    }

    fn is_noise(&self, line: &str) -> bool {
        NOISE_PATTERNS.is_match(line.trim_end())
    }

    fn reset(&mut self) {}
}

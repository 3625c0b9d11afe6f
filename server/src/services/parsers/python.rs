//! Python tracebacks.
//!
//! `Traceback (most recent call last):` opens a block; `File "...", line N`
//! frames set the provisional location (the innermost frame wins); the
//! closing `ExceptionClass: detail` line finalizes the diagnostic and
//! carries the accumulated trace. An incomplete traceback at EOF emits
//! nothing.

use lazy_static::lazy_static;
use regex::Regex;

use super::{priority, ParseContext, ToolParser};
use crate::models::{Category, Diagnostic, Severity, Source};
use crate::utils::helpers::parse_loc;

lazy_static! {
    static ref START: Regex = Regex::new(r"^Traceback \(most recent call last\):\s*$").unwrap();
    static ref FILE_LINE: Regex = Regex::new(
        r#"^\s{1,16}File "(?P<file>[^"]{1,512})", line (?P<line>\d{1,9})(?:, in (?P<sym>.{1,256}))?$"#
    )
    .unwrap();
    static ref EXCEPTION: Regex = Regex::new(
        r"^(?P<class>[A-Za-z_][A-Za-z0-9_]{0,64}(?:\.[A-Za-z_][A-Za-z0-9_]{0,64}){0,4}):\s(?P<detail>.{1,4096})$"
    )
    .unwrap();
    static ref CHAIN: Regex = Regex::new(
        r"^(?:During handling of the above exception, another exception occurred:|The above exception was the direct cause of the following exception:)\s*$"
    )
    .unwrap();
}

const MAX_TRACE_LINES: usize = 5_000;
const MAX_TRACE_BYTES: usize = 256 * 1024;
const TRUNCATION_MARKER: &str = "[stack trace truncated]";

#[derive(Debug, Default)]
struct Traceback {
    file: String,
    line: u32,
    trace: Vec<String>,
    trace_bytes: usize,
    truncated: bool,
}

impl Traceback {
    fn push(&mut self, line: &str) {
        if self.trace.len() >= MAX_TRACE_LINES || self.trace_bytes >= MAX_TRACE_BYTES {
            if !self.truncated {
                self.trace.push(TRUNCATION_MARKER.to_string());
                self.truncated = true;
            }
            return;
        }
        self.trace_bytes += line.len();
        self.trace.push(line.to_string());
    }
}

#[derive(Debug, Default)]
pub struct PythonParser {
    open: Option<Traceback>,
}

impl PythonParser {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ToolParser for PythonParser {
    fn id(&self) -> &'static str {
        "python"
    }

    fn priority(&self) -> i32 {
        priority::RUNTIME
    }

    fn can_parse(&self, line: &str, _ctx: &ParseContext) -> f32 {
        if START.is_match(line.trim_end()) {
            0.95
        } else {
            0.0
        }
    }

    fn parse(&mut self, line: &str, ctx: &mut ParseContext) -> Option<Diagnostic> {
        let trimmed = line.trim_end();

        if self.open.is_none() {
            if START.is_match(trimmed) {
                let mut traceback = Traceback::default();
                traceback.push(trimmed);
                self.open = Some(traceback);
            }
            return None;
        }

        let traceback = self.open.as_mut()?;

        if let Some(caps) = FILE_LINE.captures(trimmed) {
            // Innermost frame: the last File line before the exception.
            traceback.file = caps.name("file").map_or("", |m| m.as_str()).to_string();
            traceback.line = parse_loc(caps.name("line").map_or("", |m| m.as_str()));
            traceback.push(trimmed);
            return None;
        }

        if let Some(caps) = EXCEPTION.captures(trimmed) {
            let class = caps.name("class").map_or("", |m| m.as_str());
            let detail = caps.name("detail").map_or("", |m| m.as_str());
            traceback.push(trimmed);
            let finished = self.open.take()?;
            return Some(Diagnostic {
                message: format!("{class}: {detail}"),
                file: finished.file,
                line: finished.line,
                column: 0,
                severity: Some(Severity::Error),
                category: Category::Runtime,
                source: Source::Python,
                raw: ctx.raw_for(line),
                stack_trace: Some(finished.trace.join("\n")),
                ..Diagnostic::default()
            });
        }

        // Source echoes, carets and chain separators.
        traceback.push(trimmed);
        None
    }

    fn is_noise(&self, _line: &str) -> bool {
        false
    }

    fn supports_multi_line(&self) -> bool {
        true
    }

    fn in_multi_line(&self) -> bool {
        self.open.is_some()
    }

    fn continue_multi_line(&mut self, line: &str, _ctx: &mut ParseContext) -> bool {
        if self.open.is_none() {
            return false;
        }
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            return false;
        }
        FILE_LINE.is_match(trimmed)
            || trimmed.starts_with(char::is_whitespace)
            || EXCEPTION.is_match(trimmed)
            || CHAIN.is_match(trimmed)
            || START.is_match(trimmed)
    }

    fn finish_multi_line(&mut self, _ctx: &mut ParseContext) -> Option<Diagnostic> {
        // Never saw the closing exception line: nothing finalized.
        self.open = None;
        None
    }

    fn reset(&mut self) {
        self.open = None;
    }
}

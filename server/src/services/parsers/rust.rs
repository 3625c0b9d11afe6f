//! Rust toolchain output: `rustc`, `cargo`, Clippy, libtest.
//!
//! Diagnostics arrive as multi-line blocks: a `level[code]: message` header,
//! a `--> file:L:C` location arrow, framed code lines and `= note:` trailers.
//! The block closes on a new header, a blank line once the location is set,
//! or a known noise line; EOF closes any open block.

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;

use super::{priority, ParseContext, ToolParser};
use crate::models::{Category, Diagnostic, Severity, Source};
use crate::utils::helpers::parse_loc;

lazy_static! {
    static ref HEADER: Regex =
        Regex::new(r"^(?P<level>error|warning)(?:\[(?P<code>E\d{4})\])?: (?P<msg>.+)$").unwrap();
    static ref LOCATION: Regex =
        Regex::new(r"^\s{0,16}--> (?P<file>[^:\s]{1,512}):(?P<line>\d{1,6}):(?P<col>\d{1,6})\s*$")
            .unwrap();
    // Framed source: `15 |     foo.unwrap();`, bare gutters and caret lines.
    static ref FRAME: Regex = Regex::new(r"^\s{0,16}\d{0,6}\s{0,16}\|").unwrap();
    static ref NOTE: Regex = Regex::new(r"^\s{0,16}=?\s{0,4}(?:note|help): (?P<text>.+)$").unwrap();
    static ref SPAN_REF: Regex = Regex::new(r"^\s{0,16}::: ").unwrap();
    static ref CLIPPY_NOTE: Regex =
        Regex::new(r"#\[(?:warn|deny|allow)\(clippy::(?P<lint>[a-z_]{1,64})\)\]").unwrap();
    static ref TEST_FAILED: Regex = Regex::new(r"^test (?P<name>\S{1,512}) \.\.\. FAILED$").unwrap();
    static ref NOISE: Regex = Regex::new(
        r"^(?:error: aborting due to \d|error: could not compile|warning: \d{1,6} warnings? emitted|warning: `[^`]{1,256}` \(.{1,64}\) generated \d)"
    )
    .unwrap();
}

/// Clippy lints elevated to error severity regardless of the compiler's own
/// warning label.
pub const DEFAULT_CRITICAL_LINTS: &[&str] = &[
    "unwrap_used",
    "expect_used",
    "panic",
    "todo",
    "unimplemented",
    "unreachable",
    "indexing_slicing",
    "unwrap_in_result",
    "manual_assert",
    "arithmetic_side_effects",
    "missing_panics_doc",
];

/// Per-block context caps; further lines are dropped without breaking the
/// block.
const MAX_BLOCK_LINES: usize = 200;
const MAX_BLOCK_BYTES: usize = 256 * 1024;

#[derive(Debug)]
struct Block {
    severity: Severity,
    code: Option<String>,
    message: String,
    file: String,
    line: u32,
    column: u32,
    clippy_lint: Option<String>,
    context: Vec<String>,
    context_bytes: usize,
    location_set: bool,
    raw: String,
}

pub struct RustParser {
    block: Option<Block>,
    critical_lints: HashSet<&'static str>,
}

impl Default for RustParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RustParser {
    pub fn new() -> Self {
        Self {
            block: None,
            critical_lints: DEFAULT_CRITICAL_LINTS.iter().copied().collect(),
        }
    }

    /// Override the elevation table; policy, not grammar.
    pub fn with_critical_lints(lints: &[&'static str]) -> Self {
        Self {
            block: None,
            critical_lints: lints.iter().copied().collect(),
        }
    }

    fn open_block(&mut self, caps: &regex::Captures<'_>, raw: &str) {
        self.block = Some(Block {
            severity: if caps.name("level").map_or("", |m| m.as_str()) == "warning" {
                Severity::Warning
            } else {
                Severity::Error
            },
            code: caps.name("code").map(|m| m.as_str().to_string()),
            message: caps.name("msg").map_or("", |m| m.as_str()).to_string(),
            file: String::new(),
            line: 0,
            column: 0,
            clippy_lint: None,
            context: Vec::new(),
            context_bytes: 0,
            location_set: false,
            raw: raw.to_string(),
        });
    }

    /// Fold a continuation line into the open block. Caller has already
    /// established membership.
    fn absorb(&mut self, line: &str) {
        let Some(block) = self.block.as_mut() else {
            return;
        };

        if !block.location_set {
            if let Some(caps) = LOCATION.captures(line) {
                block.file = caps.name("file").map_or("", |m| m.as_str()).to_string();
                block.line = parse_loc(caps.name("line").map_or("", |m| m.as_str()));
                block.column = parse_loc(caps.name("col").map_or("", |m| m.as_str()));
                block.location_set = true;
                return;
            }
        }

        if let Some(caps) = NOTE.captures(line) {
            let text = caps.name("text").map_or("", |m| m.as_str());
            if let Some(clippy) = CLIPPY_NOTE.captures(text) {
                block.clippy_lint = clippy.name("lint").map(|m| m.as_str().to_string());
            }
        }

        if block.context.len() < MAX_BLOCK_LINES && block.context_bytes < MAX_BLOCK_BYTES {
            block.context_bytes += line.len();
            block.context.push(line.to_string());
        }
    }

    fn close_block(&mut self) -> Option<Diagnostic> {
        let block = self.block.take()?;

        let mut severity = block.severity;
        if let Some(lint) = block.clippy_lint.as_deref() {
            if self.critical_lints.contains(lint) {
                severity = Severity::Error;
            }
        }

        let rule_id = match (&block.code, &block.clippy_lint) {
            (Some(code), Some(lint)) => Some(format!("{code}/clippy::{lint}")),
            (Some(code), None) => Some(code.clone()),
            (None, Some(lint)) => Some(format!("clippy::{lint}")),
            (None, None) => None,
        };
        let category = if block.clippy_lint.is_some() {
            Category::Lint
        } else {
            Category::Compile
        };

        Some(Diagnostic {
            message: block.message,
            file: block.file,
            line: block.line,
            column: block.column,
            rule_id,
            severity: Some(severity),
            category,
            source: Source::Rust,
            raw: block.raw,
            ..Diagnostic::default()
        })
    }
}

impl ToolParser for RustParser {
    fn id(&self) -> &'static str {
        "rust"
    }

    fn priority(&self) -> i32 {
        priority::STRUCTURED
    }

    fn can_parse(&self, line: &str, _ctx: &ParseContext) -> f32 {
        let trimmed = line.trim_end();
        if NOISE.is_match(trimmed) {
            // Claim cargo's trailer headers so they die in is_noise rather
            // than opening a phantom block.
            0.90
        } else if HEADER.is_match(trimmed) || TEST_FAILED.is_match(trimmed) {
            0.90
        } else {
            0.0
        }
    }

    fn parse(&mut self, line: &str, ctx: &mut ParseContext) -> Option<Diagnostic> {
        let trimmed = line.trim_end();

        if self.block.is_some() {
            self.absorb(trimmed);
            return None;
        }

        if let Some(caps) = TEST_FAILED.captures(trimmed) {
            let name = caps.name("name").map_or("", |m| m.as_str());
            return Some(Diagnostic {
                message: format!("Test failed: {name}"),
                severity: Some(Severity::Error),
                category: Category::Test,
                source: Source::Rust,
                raw: ctx.raw_for(line),
                ..Diagnostic::default()
            });
        }

        if let Some(caps) = HEADER.captures(trimmed) {
            let raw = ctx.raw_for(line);
            self.open_block(&caps, &raw);
            return None;
        }

        None
    }

    fn is_noise(&self, line: &str) -> bool {
        NOISE.is_match(line.trim_end())
    }

    fn supports_multi_line(&self) -> bool {
        true
    }

    fn in_multi_line(&self) -> bool {
        self.block.is_some()
    }

    fn continue_multi_line(&mut self, line: &str, _ctx: &mut ParseContext) -> bool {
        let Some(block) = self.block.as_ref() else {
            return false;
        };
        let trimmed = line.trim_end();

        // Closers: next header, blank once located, known noise.
        if HEADER.is_match(trimmed) || NOISE.is_match(trimmed) || TEST_FAILED.is_match(trimmed) {
            return false;
        }
        if trimmed.is_empty() {
            return !block.location_set;
        }

        LOCATION.is_match(trimmed)
            || FRAME.is_match(trimmed)
            || NOTE.is_match(trimmed)
            || SPAN_REF.is_match(trimmed)
    }

    fn finish_multi_line(&mut self, _ctx: &mut ParseContext) -> Option<Diagnostic> {
        self.close_block()
    }

    fn noise_prefixes(&self) -> &'static [&'static str] {
        &[
            "   Compiling ",
            "    Checking ",
            "    Finished ",
            "     Running ",
            " Downloading ",
            "  Downloaded ",
            "    Updating ",
            "       Fresh ",
        ]
    }

    fn reset(&mut self) {
        self.block = None;
    }
}

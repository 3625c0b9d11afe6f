//! CI runner context parsing (L2).
//!
//! Strips runner-specific framing before any tool parser sees a line, and
//! surfaces the `(job, step)` pair the runner is currently executing.
//! Variants: `act` (interleaved `[workflow/job]` framing) and `passthrough`
//! (raw logs). Parsers below this layer never see runner prefixes.

use std::borrow::Cow;

use lazy_static::lazy_static;
use regex::Regex;

use crate::models::WorkflowContext;

/// Result of cleaning one raw line.
#[derive(Debug, Default)]
pub struct CleanedLine<'a> {
    /// Line with runner framing removed. Empty when the framing carried no
    /// content.
    pub content: Cow<'a, str>,
    /// True for runner-internal output that must not reach tool parsers.
    pub skip: bool,
    /// Present when the runner moved to a new `(job, step)`.
    pub context_update: Option<WorkflowContext>,
}

impl<'a> CleanedLine<'a> {
    fn passthrough(line: &'a str) -> Self {
        Self {
            content: Cow::Borrowed(line),
            skip: false,
            context_update: None,
        }
    }

    fn skipped() -> Self {
        Self {
            content: Cow::Borrowed(""),
            skip: true,
            context_update: None,
        }
    }
}

/// A runner-framing dialect. Instances carry per-request state (the current
/// job/step) and must not be shared across extractions.
pub trait CiContextParser: Send {
    /// Stable identifier of the dialect.
    fn id(&self) -> &'static str;

    /// Clean one line, reporting any context change.
    fn clean<'a>(&mut self, line: &'a str) -> CleanedLine<'a>;
}

/// Identity parser for raw (non-runner) logs.
#[derive(Debug, Default)]
pub struct PassthroughParser;

impl CiContextParser for PassthroughParser {
    fn id(&self) -> &'static str {
        "passthrough"
    }

    fn clean<'a>(&mut self, line: &'a str) -> CleanedLine<'a> {
        CleanedLine::passthrough(line)
    }
}

lazy_static! {
    // `[workflow/job] <rest>` framing prefix emitted by act.
    static ref ACT_PREFIX: Regex =
        Regex::new(r"^\[(?P<wf>[^\]/]{1,256})/(?P<job>[^\]]{1,256})\]\s?(?P<rest>.*)$").unwrap();
    // Step start marker; the step name trails the stage keyword.
    static ref ACT_STEP: Regex =
        Regex::new(r"^⭐\s{1,4}Run\s{1,4}(?:Main|Pre|Post)\s(?P<step>.{1,512})$").unwrap();
    // Job result marker; the text is forwarded so metadata detection sees it.
    static ref ACT_JOB_RESULT: Regex = Regex::new(r"^🏁\s{1,4}(?P<result>Job \w{1,32})$").unwrap();
    // Verbose-mode Go struct dumps (`&model.Step{...}` and friends).
    static ref ACT_STRUCT_DUMP: Regex =
        Regex::new(r"^&?\*?(?:[A-Za-z_][A-Za-z0-9_]{0,64}\.)?[A-Za-z_][A-Za-z0-9_]{0,64}\{").unwrap();
}

// Status decorations act prints on its own framing lines.
const ACT_STATUS_MARKS: &[&str] = &[
    "🚀", "🐳", "☁️", "⚙️", "🧪", "💬", "🗑", "✅", "❌", "🤔", "⚠", "📦", "🔶", "⭐",
];

/// Parser for `act`'s interleaved `[workflow/job] | content` framing.
#[derive(Debug, Default)]
pub struct ActParser {
    current: WorkflowContext,
}

impl ActParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a context update only when the pair actually changed.
    fn update_context(&mut self, job: &str, step: Option<&str>) -> Option<WorkflowContext> {
        let next = WorkflowContext::new(
            job,
            step.unwrap_or(if self.current.job == job {
                self.current.step.as_str()
            } else {
                ""
            }),
        );
        if next == self.current {
            None
        } else {
            self.current = next.clone();
            Some(next)
        }
    }
}

impl CiContextParser for ActParser {
    fn id(&self) -> &'static str {
        "act"
    }

    fn clean<'a>(&mut self, line: &'a str) -> CleanedLine<'a> {
        let Some(caps) = ACT_PREFIX.captures(line) else {
            // Interleaved output without framing passes through untouched.
            return CleanedLine::passthrough(line);
        };

        let job = caps.name("job").map_or("", |m| m.as_str());
        let rest = caps.name("rest").map_or("", |m| m.as_str());
        let trimmed = rest.trim_start();

        // Content lines: everything after the pipe, verbatim.
        if let Some(content) = trimmed.strip_prefix('|') {
            let content = content.strip_prefix(' ').unwrap_or(content);
            return CleanedLine {
                content: Cow::Borrowed(content),
                skip: false,
                context_update: self.update_context(job, None),
            };
        }

        // Step transitions are framing, but they move the context.
        if let Some(step_caps) = ACT_STEP.captures(trimmed) {
            let step = step_caps.name("step").map_or("", |m| m.as_str());
            let update = self.update_context(job, Some(step.trim()));
            return CleanedLine {
                context_update: update,
                ..CleanedLine::skipped()
            };
        }

        // Job results are forwarded: `Job failed` feeds metadata detection.
        if let Some(result_caps) = ACT_JOB_RESULT.captures(trimmed) {
            let result = result_caps.name("result").map_or("", |m| m.as_str());
            return CleanedLine {
                content: Cow::Borrowed(result),
                skip: false,
                context_update: self.update_context(job, None),
            };
        }

        // Runner debug noise: log-level tags and verbose struct dumps.
        if trimmed.starts_with("[DEBUG]")
            || trimmed.starts_with("[TRACE]")
            || trimmed.starts_with("[WARN]")
            || trimmed.starts_with("[INFO]")
            || ACT_STRUCT_DUMP.is_match(trimmed)
        {
            return CleanedLine {
                context_update: self.update_context(job, None),
                ..CleanedLine::skipped()
            };
        }

        // Status decorations are framing with no diagnostic content.
        if ACT_STATUS_MARKS.iter().any(|m| trimmed.starts_with(m)) {
            return CleanedLine {
                context_update: self.update_context(job, None),
                ..CleanedLine::skipped()
            };
        }

        // Undecorated framing text (e.g. "Exit with `FAIL: exit code 1`")
        // is forwarded for metadata detection.
        CleanedLine {
            content: Cow::Borrowed(trimmed),
            skip: false,
            context_update: self.update_context(job, None),
        }
    }
}

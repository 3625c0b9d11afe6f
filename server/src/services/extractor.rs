//! Extraction orchestration (L5).
//!
//! Drives L1→L4 for one request: cleans lines through the CI context
//! parser, accumulates cross-parser stack traces, detects metadata
//! signals, dispatches to the registry, deduplicates, attaches workflow
//! context by deep copy, and runs the post-processing passes (severity
//! inference, base-path rewriting). The extractor never fails a request:
//! a panicking parser costs exactly the offending line.

use std::panic::{catch_unwind, AssertUnwindSafe};

use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};
use rustc_hash::FxHashSet;
use tracing::warn;

use super::ci_context::CiContextParser;
use super::line_source::LineSource;
use super::parsers::{node, ParseContext};
use super::registry::ToolRegistry;
use crate::models::{Category, Diagnostic, ExtractStats, Severity, Source, WorkflowContext};
use crate::utils::helpers::strip_ansi;

/// Dedup set cap; past this, emission continues without deduplication.
const MAX_DEDUP_KEYS: usize = 10_000;
/// Stack-trace accumulation caps, with a single appended marker.
const MAX_STACK_LINES: usize = 5_000;
const MAX_STACK_BYTES: usize = 256 * 1024;
const STACK_TRUNCATION_MARKER: &str = "[stack trace truncated]";

lazy_static! {
    static ref JOB_FAILED: Regex =
        Regex::new(r"^Job (?:'(?P<job>[^']{1,256})' )?failed\b").unwrap();
    static ref EXIT_CODE: Regex =
        Regex::new(r"(?i)\bexit code:?\s?(?P<code>\d{1,5})\b").unwrap();
    // Go panic continuation shapes.
    static ref GOROUTINE: Regex = Regex::new(r"^goroutine \d{1,9} \[[^\]]{1,64}\]:$").unwrap();
    static ref GO_FRAME_FUNC: Regex = RegexBuilder::new(
        r"^[a-zA-Z_][\w./*()\[\]{}-]{0,512}\(.{0,1024}\)$"
    )
    .size_limit(50 * 1024 * 1024)
    .build()
    .unwrap();
    static ref GO_FRAME_LOC: Regex =
        Regex::new(r"^\s+\S{1,512}\.go:\d{1,9}(?: \+0x[0-9a-f]{1,16})?$").unwrap();
    static ref GO_SIGNAL: Regex = Regex::new(r"^\[signal ").unwrap();
    // Go test continuation: indented failure output.
    static ref GO_TEST_INDENT: Regex = Regex::new(r"^\s{4}").unwrap();
}

/// Which cross-parser accumulation is in flight.
enum StackKind {
    GoPanic,
    GoTest,
    Node,
}

/// The single diagnostic currently accepting multi-line continuation.
struct StackOwner {
    kind: StackKind,
    diag_index: usize,
    lines: Vec<String>,
    bytes: usize,
    truncated: bool,
}

impl StackOwner {
    fn new(kind: StackKind, diag_index: usize, seed: &str) -> Self {
        let mut owner = Self {
            kind,
            diag_index,
            lines: Vec::new(),
            bytes: 0,
            truncated: false,
        };
        owner.push(seed);
        owner
    }

    fn continues(&self, line: &str) -> bool {
        match self.kind {
            StackKind::GoPanic => {
                line.is_empty()
                    || GOROUTINE.is_match(line)
                    || GO_FRAME_FUNC.is_match(line)
                    || GO_FRAME_LOC.is_match(line)
                    || GO_SIGNAL.is_match(line)
                    || line.starts_with("created by ")
            }
            StackKind::GoTest => GO_TEST_INDENT.is_match(line) || GO_FRAME_LOC.is_match(line),
            StackKind::Node => node::is_frame(line),
        }
    }

    fn push(&mut self, line: &str) {
        if self.lines.len() >= MAX_STACK_LINES || self.bytes >= MAX_STACK_BYTES {
            if !self.truncated {
                self.lines.push(STACK_TRUNCATION_MARKER.to_string());
                self.truncated = true;
            }
            return;
        }
        self.bytes += line.len();
        self.lines.push(line.to_string());
    }
}

/// Per-call mutable state, rooted here so nothing leaks across requests.
struct RunState {
    ctx: ParseContext,
    diagnostics: Vec<Diagnostic>,
    dedup: FxHashSet<(String, String, u32)>,
    dedup_saturated: bool,
    stack_owner: Option<StackOwner>,
}

impl RunState {
    fn new(workflow: Option<WorkflowContext>) -> Self {
        Self {
            ctx: ParseContext {
                workflow_context: workflow.filter(|w| !w.is_empty()),
                ..ParseContext::default()
            },
            diagnostics: Vec::new(),
            dedup: FxHashSet::default(),
            dedup_saturated: false,
            stack_owner: None,
        }
    }

    /// Dedup, attach a deep copy of the workflow context, append. Returns
    /// the index of the stored diagnostic, or None for a dropped repeat.
    fn emit(&mut self, mut diag: Diagnostic) -> Option<usize> {
        if !self.dedup_saturated {
            let key = diag.dedup_key();
            if self.dedup.contains(&key) {
                return None;
            }
            self.dedup.insert(key);
            if self.dedup.len() >= MAX_DEDUP_KEYS {
                self.dedup_saturated = true;
            }
        }
        diag.workflow_context = self.ctx.workflow_context.clone();
        self.diagnostics.push(diag);
        Some(self.diagnostics.len() - 1)
    }

    /// Attach the accumulated trace to its owner and clear the slot.
    fn flush_stack_owner(&mut self) {
        let Some(owner) = self.stack_owner.take() else {
            return;
        };
        if owner.lines.len() <= 1 {
            // Only the seed line: nothing beyond the diagnostic itself.
            return;
        }
        if let Some(diag) = self.diagnostics.get_mut(owner.diag_index) {
            let mut text = owner.lines.join("\n");
            text.truncate(text.trim_end().len());
            diag.stack_trace = Some(text);
        }
    }
}

/// Result of one extraction call.
#[derive(Debug)]
pub struct ExtractResult {
    pub diagnostics: Vec<Diagnostic>,
    pub stats: ExtractStats,
}

/// One engine instance per request. Holds freshly instantiated parsers and
/// per-call state only; safe to drop after the call.
pub struct Extractor {
    registry: ToolRegistry,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor {
    pub fn new() -> Self {
        Self {
            registry: ToolRegistry::with_default_parsers(),
        }
    }

    pub fn parser_count(&self) -> usize {
        self.registry.parser_count()
    }

    pub fn extract(&mut self, logs: &str, ci: &mut dyn CiContextParser) -> ExtractResult {
        self.extract_with_context(logs, ci, None, None)
    }

    pub fn extract_with_context(
        &mut self,
        logs: &str,
        ci: &mut dyn CiContextParser,
        base_path: Option<&str>,
        workflow: Option<WorkflowContext>,
    ) -> ExtractResult {
        self.registry.reset();
        let mut state = RunState::new(workflow);

        for raw in LineSource::new(logs) {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                self.process_line(raw, ci, &mut state);
            }));
            if outcome.is_err() {
                warn!(line_len = raw.len(), "parser fault contained; line skipped");
            }
        }

        // EOF: close any open block, then settle the stack owner.
        for diag in self.registry.finish(&mut state.ctx) {
            state.emit(diag);
        }
        state.flush_stack_owner();

        let mut diagnostics = state.diagnostics;
        infer_severity(&mut diagnostics);
        if let Some(base) = base_path {
            rewrite_base_path(&mut diagnostics, base);
        }
        let stats = ExtractStats::from_diagnostics(&diagnostics);
        ExtractResult { diagnostics, stats }
    }

    fn process_line(&mut self, raw: &str, ci: &mut dyn CiContextParser, state: &mut RunState) {
        let stripped = strip_ansi(raw);
        let cleaned = ci.clean(&stripped);
        if let Some(update) = cleaned.context_update {
            state.ctx.workflow_context = Some(update);
        }
        if cleaned.skip {
            return;
        }
        let line: &str = &cleaned.content;

        // 1. An in-flight stack trace gets first claim on the line.
        if let Some(owner) = state.stack_owner.as_mut() {
            if owner.continues(line) {
                owner.push(line);
                return;
            }
            state.flush_stack_owner();
        }

        // 2. Metadata signals.
        if let Some(diag) = match_metadata(line, raw) {
            state.emit(diag);
            return;
        }

        // 3. Registry dispatch.
        state.ctx.raw_line = raw.to_string();
        let emitted = self.registry.dispatch(line, &mut state.ctx);
        state.ctx.raw_line.clear();

        for diag in emitted {
            let opens = stack_kind_for(&diag);
            let index = state.emit(diag);
            if let (Some(kind), Some(index)) = (opens, index) {
                state.stack_owner = Some(StackOwner::new(kind, index, line));
            }
        }
    }
}

/// Diagnostics that open a cross-parser stack accumulation.
fn stack_kind_for(diag: &Diagnostic) -> Option<StackKind> {
    match (diag.source, diag.category) {
        (Source::Go, Category::Runtime) => Some(StackKind::GoPanic),
        (Source::GoTest, Category::Test) => Some(StackKind::GoTest),
        (Source::Nodejs, Category::Runtime) => Some(StackKind::Node),
        _ => None,
    }
}

/// `Job 'X' failed` and non-zero `exit code N` runner signals.
fn match_metadata(line: &str, raw: &str) -> Option<Diagnostic> {
    let trimmed = line.trim();
    let matched = if JOB_FAILED.is_match(trimmed) {
        true
    } else if let Some(caps) = EXIT_CODE.captures(trimmed) {
        caps.name("code")
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .is_some_and(|code| code != 0)
    } else {
        false
    };
    if !matched {
        return None;
    }
    Some(Diagnostic {
        message: trimmed.to_string(),
        severity: None,
        category: Category::Metadata,
        source: Source::Metadata,
        raw: raw.to_string(),
        ..Diagnostic::default()
    })
}

/// Fill severities the parsers left empty. Running this twice is a no-op.
pub fn infer_severity(diagnostics: &mut [Diagnostic]) {
    for diag in diagnostics.iter_mut() {
        if diag.severity.is_some() {
            continue;
        }
        diag.severity = Some(match diag.category {
            Category::Compile | Category::Runtime => Severity::Error,
            Category::TypeCheck | Category::Lint => Severity::Error,
            Category::Test | Category::Metadata => Severity::Error,
            Category::Unknown => Severity::Error,
        });
    }
}

/// Rewrite absolute paths under `base` to repository-relative form,
/// stripping a single leading separator.
fn rewrite_base_path(diagnostics: &mut [Diagnostic], base: &str) {
    let base = base.trim_end_matches('/');
    if base.is_empty() {
        return;
    }
    for diag in diagnostics.iter_mut() {
        if let Some(rest) = diag.file.strip_prefix(base) {
            if let Some(relative) = rest.strip_prefix('/') {
                diag.file = relative.to_string();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ci_context::{ActParser, PassthroughParser};
    use pretty_assertions::assert_eq;

    fn extract(logs: &str) -> ExtractResult {
        Extractor::new().extract(logs, &mut PassthroughParser)
    }

    #[test]
    fn test_mixed_go_and_typescript() {
        let result = extract(
            "main.go:10:5: undefined: foo\nsrc/index.ts(5,10): error TS2304: Cannot find name 'foo'.\n",
        );
        assert_eq!(result.diagnostics.len(), 2);
        assert_eq!(result.stats.total, 2);
        assert_eq!(result.stats.errors, 2);
        assert_eq!(result.diagnostics[0].source, Source::Go);
        assert_eq!(result.diagnostics[1].source, Source::Typescript);
    }

    #[test]
    fn test_go_panic_collects_stack() {
        let result = extract(concat!(
            "panic: runtime error: invalid memory address or nil pointer dereference\n",
            "[signal SIGSEGV: segmentation violation code=0x1 addr=0x0 pc=0x45fca6]\n",
            "\n",
            "goroutine 1 [running]:\n",
            "main.main()\n",
            "\t/app/main.go:14 +0x1b\n",
            "unrelated trailing output\n",
        ));
        let panic_diag = &result.diagnostics[0];
        assert_eq!(panic_diag.category, Category::Runtime);
        let trace = panic_diag.stack_trace.as_deref().unwrap();
        assert!(trace.contains("goroutine 1 [running]:"));
        assert!(trace.contains("/app/main.go:14 +0x1b"));
    }

    #[test]
    fn test_go_test_failure_collects_output() {
        let result = extract(concat!(
            "--- FAIL: TestParse (0.00s)\n",
            "    main_test.go:42: got 1, want 2\n",
            "    main_test.go:43: context was nil\n",
            "FAIL\n",
        ));
        assert_eq!(result.diagnostics.len(), 1);
        let diag = &result.diagnostics[0];
        assert_eq!(diag.source, Source::GoTest);
        let trace = diag.stack_trace.as_deref().unwrap();
        assert!(trace.contains("got 1, want 2"));
    }

    #[test]
    fn test_node_frames_extend_first_diagnostic() {
        let result = extract(concat!(
            "    at Object.<anonymous> (/app/index.js:3:11)\n",
            "    at Module._compile (node:internal/modules/cjs/loader:1105:14)\n",
            "    at node:internal/main/run_main_module:22:47\n",
            "done\n",
        ));
        assert_eq!(result.diagnostics.len(), 1);
        let diag = &result.diagnostics[0];
        assert_eq!(diag.source, Source::Nodejs);
        assert_eq!(diag.file, "/app/index.js");
        let trace = diag.stack_trace.as_deref().unwrap();
        assert!(trace.contains("Module._compile"));
    }

    #[test]
    fn test_metadata_job_failed_and_exit_code() {
        let result = extract("Job 'build' failed\nProcess completed with exit code 2.\n");
        assert_eq!(result.diagnostics.len(), 2);
        assert!(result
            .diagnostics
            .iter()
            .all(|d| d.source == Source::Metadata && d.category == Category::Metadata));
        assert!(result
            .diagnostics
            .iter()
            .all(|d| d.severity == Some(Severity::Error)));
    }

    #[test]
    fn test_exit_code_zero_is_not_metadata() {
        let result = extract("Process completed with exit code 0.\n");
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_dedup_drops_exact_repeats() {
        let result = extract(concat!(
            "main.go:10:5: undefined: foo\n",
            "main.go:10:5: undefined: foo\n",
            "main.go:11:5: undefined: bar\n",
        ));
        assert_eq!(result.diagnostics.len(), 2);
    }

    #[test]
    fn test_ansi_codes_do_not_change_parsing() {
        let plain = extract("main.go:10:5: undefined: foo\n");
        let colored = extract("\x1b[1m\x1b[31mmain.go:10:5: undefined: foo\x1b[0m\n");
        assert_eq!(colored.diagnostics.len(), 1);
        let mut a = plain.diagnostics[0].clone();
        let mut b = colored.diagnostics[0].clone();
        a.raw = String::new();
        b.raw = String::new();
        assert_eq!(a, b);
        // Raw keeps the original bytes.
        assert!(colored.diagnostics[0].raw.contains('\x1b'));
    }

    #[test]
    fn test_act_framing_attaches_workflow_context() {
        let mut extractor = Extractor::new();
        let logs = concat!(
            "[CI/build] ⭐ Run Main go build ./...\n",
            "[CI/build]   | main.go:10:5: undefined: foo\n",
        );
        let result = extractor.extract(logs, &mut ActParser::new());
        assert_eq!(result.diagnostics.len(), 1);
        let ctx = result.diagnostics[0].workflow_context.as_ref().unwrap();
        assert_eq!(ctx.job, "build");
        assert_eq!(ctx.step, "go build ./...");
        assert_eq!(
            result.diagnostics[0].raw,
            "[CI/build]   | main.go:10:5: undefined: foo"
        );
    }

    #[test]
    fn test_workflow_context_is_isolated_per_diagnostic() {
        let mut extractor = Extractor::new();
        let logs = concat!(
            "[CI/build]   | main.go:10:5: undefined: foo\n",
            "[CI/build]   | main.go:11:5: undefined: bar\n",
        );
        let mut result = extractor.extract(logs, &mut ActParser::new());
        result.diagnostics[0].workflow_context.as_mut().unwrap().job = "mutated".into();
        assert_eq!(
            result.diagnostics[1].workflow_context.as_ref().unwrap().job,
            "build"
        );
    }

    #[test]
    fn test_base_path_rewriting_with_override_context() {
        let mut extractor = Extractor::new();
        let result = extractor.extract_with_context(
            "/workspace/src/main.go:10:5: undefined: foo\n",
            &mut PassthroughParser,
            Some("/workspace"),
            Some(WorkflowContext::new("build", "compile")),
        );
        let diag = &result.diagnostics[0];
        assert_eq!(diag.file, "src/main.go");
        let ctx = diag.workflow_context.as_ref().unwrap();
        assert_eq!(ctx.job, "build");
        assert_eq!(ctx.step, "compile");
    }

    #[test]
    fn test_base_path_requires_component_boundary() {
        let mut diags = vec![Diagnostic {
            file: "/workspace2/src/main.go".to_string(),
            ..Diagnostic::default()
        }];
        rewrite_base_path(&mut diags, "/workspace");
        assert_eq!(diags[0].file, "/workspace2/src/main.go");
    }

    #[test]
    fn test_severity_inference_is_idempotent() {
        let mut diags = vec![
            Diagnostic {
                category: Category::Unknown,
                ..Diagnostic::default()
            },
            Diagnostic {
                severity: Some(Severity::Warning),
                category: Category::Lint,
                ..Diagnostic::default()
            },
        ];
        infer_severity(&mut diags);
        let once = diags.clone();
        infer_severity(&mut diags);
        assert_eq!(diags, once);
        assert_eq!(diags[0].severity, Some(Severity::Error));
        assert_eq!(diags[1].severity, Some(Severity::Warning));
    }

    #[test]
    fn test_determinism() {
        let logs = concat!(
            "main.go:10:5: undefined: foo\n",
            "panic: boom\n",
            "goroutine 1 [running]:\n",
            "main.main()\n",
            "\t/app/main.go:2 +0x1\n",
            "Error: misc failure\n",
        );
        let first = extract(logs);
        let second = extract(logs);
        assert_eq!(first.diagnostics, second.diagnostics);
        assert_eq!(first.stats, second.stats);
    }

    #[test]
    fn test_order_follows_input() {
        let result = extract(concat!(
            "a.go:1:1: first\n",
            "b.go:2:2: second\n",
            "c.go:3:3: third\n",
        ));
        let files: Vec<_> = result.diagnostics.iter().map(|d| d.file.as_str()).collect();
        assert_eq!(files, vec!["a.go", "b.go", "c.go"]);
    }

    #[test]
    fn test_every_emitted_severity_is_set() {
        let result = extract(concat!(
            "Error: mystery\n",
            "main.go:1:1: broken\n",
            "Job failed\n",
        ));
        assert!(result.diagnostics.iter().all(|d| d.severity.is_some()));
    }
}

//! Tool registry and per-line routing (L3).
//!
//! Holds the ordered parser set plus the distinguished generic fallback.
//! Routing: an open multi-line block keeps its lines; otherwise the cheap
//! noise pre-filter screens the line, the parsers vote a confidence, and
//! the highest vote wins (ties broken by priority, then registry order).
//! Lines nobody claims go to the fallback.

use super::parsers::{
    DockerParser, EslintParser, GenericParser, GoParser, NodeParser, ParseContext, PythonParser,
    RustParser, ToolParser, TypescriptParser,
};
use crate::models::Diagnostic;

pub struct ToolRegistry {
    parsers: Vec<Box<dyn ToolParser>>,
    fallback: GenericParser,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::with_default_parsers()
    }
}

impl ToolRegistry {
    /// The standard parser set in registry order. Instantiated fresh per
    /// request; nothing here is shared across extractions.
    pub fn with_default_parsers() -> Self {
        let mut registry = Self {
            parsers: Vec::new(),
            fallback: GenericParser::new(),
        };
        registry.register(Box::new(GoParser::new()));
        registry.register(Box::new(TypescriptParser::new()));
        registry.register(Box::new(EslintParser::new()));
        registry.register(Box::new(RustParser::new()));
        registry.register(Box::new(PythonParser::new()));
        registry.register(Box::new(NodeParser::new()));
        registry.register(Box::new(DockerParser::new()));
        registry
    }

    pub fn register(&mut self, parser: Box<dyn ToolParser>) {
        self.parsers.push(parser);
    }

    /// Registered parsers including the fallback.
    pub fn parser_count(&self) -> usize {
        self.parsers.len() + 1
    }

    /// Cheap substring/prefix screen applied before the confidence vote.
    fn is_prefix_noise(&self, line: &str) -> bool {
        self.parsers
            .iter()
            .flat_map(|p| p.noise_prefixes())
            .any(|prefix| line.starts_with(prefix))
    }

    /// Highest confidence wins; ties break by priority, then registry
    /// order (strictly-greater comparisons keep earlier registrants).
    fn select(&self, line: &str, ctx: &ParseContext) -> Option<usize> {
        let mut best: Option<(usize, f32, i32)> = None;
        for (index, parser) in self.parsers.iter().enumerate() {
            let confidence = parser.can_parse(line, ctx);
            if confidence <= 0.0 {
                continue;
            }
            let wins = match best {
                None => true,
                Some((_, best_confidence, best_priority)) => {
                    confidence > best_confidence
                        || (confidence == best_confidence && parser.priority() > best_priority)
                }
            };
            if wins {
                best = Some((index, confidence, parser.priority()));
            }
        }
        best.map(|(index, _, _)| index)
    }

    /// Route one cleaned line. A single line can yield up to two
    /// diagnostics: the close of a multi-line block plus a fresh parse of
    /// the closing line.
    pub fn dispatch(&mut self, line: &str, ctx: &mut ParseContext) -> Vec<Diagnostic> {
        let mut emitted = Vec::new();

        // An open block keeps its lines regardless of one-shot scores.
        if let Some(open) = self.parsers.iter().position(|p| p.in_multi_line()) {
            if self.parsers[open].continue_multi_line(line, ctx) {
                emitted.extend(self.parsers[open].parse(line, ctx));
                return emitted;
            }
            // Block ends before this line; the line is re-offered below.
            emitted.extend(self.parsers[open].finish_multi_line(ctx));
        }

        if self.is_prefix_noise(line) {
            return emitted;
        }

        match self.select(line, ctx) {
            Some(index) => {
                if !self.parsers[index].is_noise(line) {
                    emitted.extend(self.parsers[index].parse(line, ctx));
                }
            }
            None => {
                if !self.fallback.is_noise(line) {
                    emitted.extend(self.fallback.parse(line, ctx));
                }
            }
        }

        emitted
    }

    /// Close any block still open at end of input.
    pub fn finish(&mut self, ctx: &mut ParseContext) -> Vec<Diagnostic> {
        let mut emitted = Vec::new();
        for parser in &mut self.parsers {
            if parser.in_multi_line() {
                emitted.extend(parser.finish_multi_line(ctx));
            }
        }
        emitted
    }

    /// Clear all per-instance state.
    pub fn reset(&mut self) {
        for parser in &mut self.parsers {
            parser.reset();
        }
        self.fallback.reset();
    }
}

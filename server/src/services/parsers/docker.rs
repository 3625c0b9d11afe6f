//! Docker and container-infrastructure failures.
//!
//! Single-line grammars only: daemon errors, BuildKit solve failures, pull
//! and network errors. Stateless and EOF-safe.

use lazy_static::lazy_static;
use regex::RegexSet;

use super::{priority, ParseContext, ToolParser};
use crate::models::{Category, Diagnostic, Severity, Source};

lazy_static! {
    static ref DOCKER_ERRORS: RegexSet = RegexSet::new([
        r"^(?:docker: )?Error response from daemon: \S",
        r"^ERROR: failed to solve: \S",
        r"^failed to solve: \S",
        r"^ERROR: failed to build: \S",
        r"^(?:ERROR: )?pull access denied for \S",
        r"^(?:ERROR: )?Cannot connect to the Docker daemon\b",
        r"^Error: No such (?:container|network|image): \S",
        r"^(?:docker: )?invalid reference format",
        r"^ERROR: network \S{1,256} not found",
    ])
    .unwrap();
}

#[derive(Debug, Default)]
pub struct DockerParser;

impl DockerParser {
    pub fn new() -> Self {
        Self
    }
}

impl ToolParser for DockerParser {
    fn id(&self) -> &'static str {
        "docker"
    }

    fn priority(&self) -> i32 {
        priority::INFRA
    }

    fn can_parse(&self, line: &str, _ctx: &ParseContext) -> f32 {
        if DOCKER_ERRORS.is_match(line.trim_end()) {
            0.80
        } else {
            0.0
        }
    }

    fn parse(&mut self, line: &str, ctx: &mut ParseContext) -> Option<Diagnostic> {
        let trimmed = line.trim_end();
        if !DOCKER_ERRORS.is_match(trimmed) {
            return None;
        }
        Some(Diagnostic {
            message: trimmed.to_string(),
            severity: Some(Severity::Error),
            category: Category::Runtime,
            source: Source::Docker,
            raw: ctx.raw_for(line),
            ..Diagnostic::default()
        })
    }

    fn is_noise(&self, line: &str) -> bool {
        let trimmed = line.trim_start();
        trimmed.starts_with("Sending build context to Docker daemon")
            || trimmed.starts_with("Status: Downloaded newer image")
            || trimmed.starts_with("Digest: sha256:")
    }

    fn noise_prefixes(&self) -> &'static [&'static str] {
        &["#1 [internal] ", "#2 [internal] ", " => => ", " => CACHED "]
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(line: &str) -> Option<Diagnostic> {
        let mut ctx = ParseContext::default();
        DockerParser::new().parse(line, &mut ctx)
    }

    #[test]
    fn test_daemon_error() {
        let diag =
            parse("Error response from daemon: manifest for acme:latest not found").unwrap();
        assert_eq!(diag.source, Source::Docker);
        assert_eq!(diag.category, Category::Runtime);
        assert_eq!(diag.severity, Some(Severity::Error));
    }

    #[test]
    fn test_buildkit_solve_failure() {
        assert!(parse("ERROR: failed to solve: process \"/bin/sh -c make\" did not complete successfully: exit code: 2").is_some());
    }

    #[test]
    fn test_pull_access_denied() {
        assert!(parse("pull access denied for acme/private, repository does not exist").is_some());
    }

    #[test]
    fn test_daemon_unreachable() {
        assert!(parse(
            "Cannot connect to the Docker daemon at unix:///var/run/docker.sock. Is the docker daemon running?"
        )
        .is_some());
    }

    #[test]
    fn test_ordinary_line_not_claimed() {
        let parser = DockerParser::new();
        let ctx = ParseContext::default();
        assert_eq!(parser.can_parse("Step 3/9 : RUN make build", &ctx), 0.0);
    }
}

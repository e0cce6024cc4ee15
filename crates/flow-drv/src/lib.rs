//! Driver - runs a Flow workflow program end to end.
//!
//! ============================================================================
//! PIPELINE OVERVIEW
//! ============================================================================
//!
//! ```text
//! Source text
//!      |
//!      v
//! [Lexer]    (flow-lex)  --> Token stream
//!      |
//!      v
//! [Parser]   (flow-par)  --> AST + parse diagnostics
//!      |
//!      v
//! [Analyzer] (flow-sem)  --> semantic diagnostics
//!      |
//!      v
//! [Runtime]  (flow-runtime) --> Outcome
//! ```
//!
//! A lex failure is fatal - the lexer has no recovery story, so the first
//! error is returned directly. Parse and analysis errors are instead
//! collected into the [`Handler`] and reported together; the runtime only
//! runs if analysis found no errors, since running a program with an
//! unbound identifier or duplicate step name would just surface the same
//! problem as a runtime crash instead of a diagnostic.
//!
//! ============================================================================
//! ERROR LEVELS
//! ============================================================================
//!
//! - ERROR: the program did not run, or did not complete successfully.
//! - WARNING: the program ran, but something about it looks like a mistake
//!   (an unknown config key, a duplicate service header).
//!
//! All diagnostics from a run are collected and returned together rather
//! than stopping at the first one, so a caller sees every problem in one
//! pass.

use flow_par::ast::Program;
use flow_runtime::{ConnectorRegistry, Outcome, Value};
use flow_util::diagnostic::{Diagnostic, Handler, Level, SourceSnippet};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Everything the driver needs besides the source text itself: the
/// environment variables bound under `env`, and the trigger payload that
/// seeds `request` (and its flattened top-level fields).
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub env: IndexMap<String, String>,
    pub trigger: Value,
}

/// The result of one lex-parse-analyze-run pass. `outcome` is `None` when
/// the program never got past analysis.
pub struct RunReport {
    pub outcome: Option<Outcome>,
    pub diagnostics: Vec<Diagnostic>,
}

impl RunReport {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.level == Level::Error)
    }

    /// Renders every diagnostic against the given file name, one per line
    /// with a blank line between them, the way a CLI would print them.
    pub fn render_diagnostics(&self, file_name: &str) -> String {
        self.diagnostics
            .iter()
            .map(|d| d.render(file_name))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("lex error: {0}")]
    Lex(#[from] flow_lex::LexError),
}

/// Reads a Flow source file from disk and runs it.
pub fn run_file(path: &Path, options: RunOptions, connectors: &dyn ConnectorRegistry) -> Result<RunReport, DriverError> {
    let source = std::fs::read_to_string(path).map_err(|source| DriverError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    run_source(&source, options, connectors)
}

/// Lexes, parses, analyzes, and (if analysis found no errors) runs a Flow
/// program already held in memory.
pub fn run_source(source: &str, options: RunOptions, connectors: &dyn ConnectorRegistry) -> Result<RunReport, DriverError> {
    let (program, handler) = lex_parse_analyze(source)?;

    if handler.has_errors() {
        return Ok(RunReport {
            outcome: None,
            diagnostics: attach_snippets(handler.diagnostics(), source),
        });
    }

    tracing::debug!("running");
    let outcome = run_program(&program, options, connectors);

    Ok(RunReport {
        outcome: Some(outcome),
        diagnostics: attach_snippets(handler.diagnostics(), source),
    })
}

/// Reads a Flow source file from disk and lexes, parses, and analyzes it
/// without running it -- used by `flowc check`.
pub fn check_file(path: &Path) -> Result<Vec<Diagnostic>, DriverError> {
    let source = std::fs::read_to_string(path).map_err(|source| DriverError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    check_source(&source)
}

/// Lexes, parses, and analyzes a Flow program already held in memory,
/// without running it.
pub fn check_source(source: &str) -> Result<Vec<Diagnostic>, DriverError> {
    let (_program, handler) = lex_parse_analyze(source)?;
    Ok(attach_snippets(handler.diagnostics(), source))
}

fn lex_parse_analyze(source: &str) -> Result<(Program, Handler), DriverError> {
    tracing::debug!("lexing");
    let tokens = flow_lex::Lexer::new(source).tokenize()?;

    let handler = Handler::new();

    tracing::debug!("parsing");
    let (program, _parse_errors) = flow_par::parse(tokens, &handler);

    tracing::debug!("analyzing");
    flow_sem::analyze(&program, &handler);

    Ok((program, handler))
}

fn run_program(program: &Program, options: RunOptions, connectors: &dyn ConnectorRegistry) -> Outcome {
    flow_runtime::run(program, options.trigger, options.env, connectors)
}

/// Points each diagnostic at its offending source line so `Diagnostic::render`
/// has something to underline instead of an empty snippet list. The lexer,
/// parser, and analyzer all report a `Span` with a 1-based line/column but
/// none of them see the raw source text at the point they raise an error, so
/// this is done once here where both are in hand.
fn attach_snippets(diagnostics: Vec<Diagnostic>, source: &str) -> Vec<Diagnostic> {
    let lines: Vec<&str> = source.lines().collect();
    diagnostics
        .into_iter()
        .map(|diagnostic| {
            let line_number = diagnostic.span.line as usize;
            match line_number.checked_sub(1).and_then(|index| lines.get(index)) {
                Some(line) => {
                    let column = diagnostic.span.column.max(1) as usize;
                    diagnostic.with_snippet(SourceSnippet::point(*line, line_number, column))
                }
                None => diagnostic,
            }
        })
        .collect()
}

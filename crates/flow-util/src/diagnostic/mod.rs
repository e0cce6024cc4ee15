//! Diagnostic reporting: errors, warnings, and their rendered form.
//!
//! # Examples
//!
//! ```
//! use flow_util::diagnostic::{DiagnosticBuilder, Span, DiagnosticCode};
//!
//! let diag = DiagnosticBuilder::error("unknown service `slak`")
//!     .code(DiagnosticCode::E_SEMANTIC_UNKNOWN_SERVICE)
//!     .span(Span::DUMMY)
//!     .help("did you mean `slack`?")
//!     .build();
//! ```

mod builder;
mod codes;

pub use builder::{DiagnosticBuilder, SourceSnippet};
pub use codes::DiagnosticCode;

use crate::Span;
use std::cell::RefCell;
use std::fmt;

/// Diagnostic severity level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Error,
    Warning,
    Note,
    Help,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Error => write!(f, "error"),
            Level::Warning => write!(f, "warning"),
            Level::Note => write!(f, "note"),
            Level::Help => write!(f, "help"),
        }
    }
}

/// A diagnostic message with severity and location.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub level: Level,
    pub message: String,
    pub span: Span,
    pub code: Option<DiagnosticCode>,
    pub notes: Vec<String>,
    pub helps: Vec<String>,
    pub snippets: Vec<SourceSnippet>,
    /// "Did you mean ...?" suggestion computed from the name set in scope.
    pub suggestion: Option<String>,
}

impl Diagnostic {
    pub fn new(level: Level, message: impl Into<String>, span: Span) -> Self {
        Self {
            level,
            message: message.into(),
            span,
            code: None,
            notes: Vec::new(),
            helps: Vec::new(),
            snippets: Vec::new(),
            suggestion: None,
        }
    }

    pub fn error(message: impl Into<String>, span: Span) -> Self {
        Self::new(Level::Error, message, span)
    }

    pub fn warning(message: impl Into<String>, span: Span) -> Self {
        Self::new(Level::Warning, message, span)
    }

    pub fn with_code(mut self, code: DiagnosticCode) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.helps.push(help.into());
        self
    }

    pub fn with_snippet(mut self, snippet: SourceSnippet) -> Self {
        self.snippets.push(snippet);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Render this diagnostic the way the command-line front end prints it:
    /// a `file:line:column` header, the offending source line with a caret
    /// underline, the message, an optional "Did you mean ...?" suggestion,
    /// and any hints.
    pub fn render(&self, file_name: &str) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "{}:{}:{}: {}: {}\n",
            file_name, self.span.line, self.span.column, self.level, self.message
        ));
        out.push('\n');
        for snippet in &self.snippets {
            out.push_str(&snippet.format());
            out.push('\n');
        }
        if let Some(suggestion) = &self.suggestion {
            out.push_str(&format!("did you mean `{}`?\n", suggestion));
        }
        for help in &self.helps {
            out.push_str(&format!("hint: {}\n", help));
        }
        for note in &self.notes {
            out.push_str(&format!("note: {}\n", note));
        }
        out
    }
}

/// Collects diagnostics raised by any pipeline stage.
///
/// # Examples
///
/// ```
/// use flow_util::diagnostic::{Handler, Span};
///
/// let handler = Handler::new();
/// handler.build_error(Span::DUMMY, "unexpected token").emit(&handler);
/// assert!(handler.has_errors());
/// ```
pub struct Handler {
    diagnostics: RefCell<Vec<Diagnostic>>,
    panic_on_error: RefCell<bool>,
}

impl Handler {
    pub fn new() -> Self {
        Self {
            diagnostics: RefCell::new(Vec::new()),
            panic_on_error: RefCell::new(false),
        }
    }

    /// A handler that panics as soon as an error is emitted. Useful in tests
    /// that want to fail fast on the first unexpected diagnostic.
    pub fn new_panicking() -> Self {
        Self {
            diagnostics: RefCell::new(Vec::new()),
            panic_on_error: RefCell::new(true),
        }
    }

    fn emit(&self, diagnostic: Diagnostic) {
        if *self.panic_on_error.borrow() && diagnostic.level == Level::Error {
            panic!("diagnostic error: {}", diagnostic.message);
        }
        self.diagnostics.borrow_mut().push(diagnostic);
    }

    pub fn emit_diagnostic(&self, diagnostic: Diagnostic) {
        self.emit(diagnostic);
    }

    pub fn build_error(&self, span: Span, message: impl Into<String>) -> DiagnosticBuilder {
        DiagnosticBuilder::error(message).span(span)
    }

    pub fn build_warning(&self, span: Span, message: impl Into<String>) -> DiagnosticBuilder {
        DiagnosticBuilder::warning(message).span(span)
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .borrow()
            .iter()
            .any(|d| d.level == Level::Error)
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .borrow()
            .iter()
            .filter(|d| d.level == Level::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .borrow()
            .iter()
            .filter(|d| d.level == Level::Warning)
            .count()
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.borrow().clone()
    }

    pub fn clear(&self) {
        self.diagnostics.borrow_mut().clear();
    }
}

impl Default for Handler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_display() {
        assert_eq!(format!("{}", Level::Error), "error");
        assert_eq!(format!("{}", Level::Warning), "warning");
    }

    #[test]
    fn diagnostic_builders() {
        let diag = Diagnostic::error("bad thing", Span::DUMMY)
            .with_note("context")
            .with_help("fix it")
            .with_suggestion("goodThing");
        assert_eq!(diag.level, Level::Error);
        assert_eq!(diag.notes, vec!["context"]);
        assert_eq!(diag.suggestion.as_deref(), Some("goodThing"));
    }

    #[test]
    fn handler_tracks_counts() {
        let handler = Handler::new();
        handler.build_error(Span::DUMMY, "e1").emit(&handler);
        handler.build_warning(Span::DUMMY, "w1").emit(&handler);
        assert_eq!(handler.error_count(), 1);
        assert_eq!(handler.warning_count(), 1);
        assert!(handler.has_errors());
    }

    #[test]
    fn handler_clear_resets_counts() {
        let handler = Handler::new();
        handler.build_error(Span::DUMMY, "e1").emit(&handler);
        handler.clear();
        assert!(!handler.has_errors());
        assert_eq!(handler.diagnostics().len(), 0);
    }

    #[test]
    #[should_panic(expected = "diagnostic error")]
    fn panicking_handler_panics_on_error() {
        let handler = Handler::new_panicking();
        handler.build_error(Span::DUMMY, "boom").emit(&handler);
    }

    #[test]
    fn render_includes_header_and_message() {
        let diag = Diagnostic::error("unknown service `slak`", Span::new(0, 4, 7, 3))
            .with_suggestion("slack")
            .with_help("check the services: block");
        let rendered = diag.render("flow.flo");
        assert!(rendered.starts_with("flow.flo:7:3: error: unknown service `slak`"));
        assert!(rendered.contains("did you mean `slack`?"));
        assert!(rendered.contains("hint: check the services: block"));
    }
}

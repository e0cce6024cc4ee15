//! Lexer error types.

use flow_util::diagnostic::{Diagnostic, DiagnosticCode};
use flow_util::Span;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum LexError {
    #[error("tabs are not allowed in indentation at line {line}")]
    TabInIndentation { line: u32, column: u32 },

    #[error("indentation must be a multiple of four spaces at line {line}")]
    BadIndentWidth { line: u32, column: u32, width: usize },

    #[error("indentation does not match any enclosing level at line {line}")]
    MisalignedIndent { line: u32, column: u32 },

    #[error("unexpected character '{ch}' at line {line}")]
    UnexpectedChar { ch: char, line: u32, column: u32 },

    #[error("unterminated string literal starting at line {line}")]
    UnterminatedString { line: u32, column: u32 },

    #[error("empty interpolation at line {line}")]
    EmptyInterpolation { line: u32, column: u32 },

    #[error("unterminated interpolation at line {line}")]
    UnterminatedInterpolation { line: u32, column: u32 },

    #[error("invalid number literal at line {line}")]
    InvalidNumber { line: u32, column: u32 },
}

impl LexError {
    pub fn line(&self) -> u32 {
        match self {
            LexError::TabInIndentation { line, .. }
            | LexError::BadIndentWidth { line, .. }
            | LexError::MisalignedIndent { line, .. }
            | LexError::UnexpectedChar { line, .. }
            | LexError::UnterminatedString { line, .. }
            | LexError::EmptyInterpolation { line, .. }
            | LexError::UnterminatedInterpolation { line, .. }
            | LexError::InvalidNumber { line, .. } => *line,
        }
    }

    pub fn column(&self) -> u32 {
        match self {
            LexError::TabInIndentation { column, .. }
            | LexError::BadIndentWidth { column, .. }
            | LexError::MisalignedIndent { column, .. }
            | LexError::UnexpectedChar { column, .. }
            | LexError::UnterminatedString { column, .. }
            | LexError::EmptyInterpolation { column, .. }
            | LexError::UnterminatedInterpolation { column, .. }
            | LexError::InvalidNumber { column, .. } => *column,
        }
    }

    /// Computed hint text shown below the caret, one per failure cause.
    pub fn hint(&self) -> &'static str {
        match self {
            LexError::TabInIndentation { .. } => "replace the tab with four-space indentation",
            LexError::BadIndentWidth { .. } => "indent using groups of four spaces",
            LexError::MisalignedIndent { .. } => "this line's indentation does not match an enclosing block",
            LexError::UnterminatedString { .. } => "add a closing double quote",
            LexError::EmptyInterpolation { .. } => "write a name between the braces, e.g. {name}",
            LexError::UnterminatedInterpolation { .. } => "add a closing brace",
            LexError::InvalidNumber { .. } => "numbers allow at most one decimal point",
            LexError::UnexpectedChar { .. } => "remove or replace this character",
        }
    }

    pub fn code(&self) -> DiagnosticCode {
        match self {
            LexError::UnexpectedChar { .. } => DiagnosticCode::E_LEXER_UNEXPECTED_CHAR,
            LexError::UnterminatedString { .. } => DiagnosticCode::E_LEXER_UNTERMINATED_STRING,
            LexError::InvalidNumber { .. } => DiagnosticCode::E_LEXER_INVALID_NUMBER,
            LexError::TabInIndentation { .. }
            | LexError::BadIndentWidth { .. }
            | LexError::MisalignedIndent { .. } => DiagnosticCode::E_LEXER_BAD_INDENT,
            LexError::EmptyInterpolation { .. } | LexError::UnterminatedInterpolation { .. } => {
                DiagnosticCode::E_LEXER_UNTERMINATED_INTERPOLATION
            }
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(self.to_string(), Span::point(self.line(), self.column()))
            .with_code(self.code())
            .with_help(self.hint())
    }
}

pub type LexResult<T> = std::result::Result<T, LexError>;

//! Parser error types.

use flow_util::diagnostic::{Diagnostic, DiagnosticCode};
use flow_util::Span;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("unexpected token '{found}' at line {line}")]
    UnexpectedToken {
        found: String,
        line: u32,
        column: u32,
    },

    #[error("expected {expected}, found '{found}' at line {line}")]
    ExpectedToken {
        expected: String,
        found: String,
        line: u32,
        column: u32,
    },

    #[error("unexpected end of file, expected {expected}")]
    UnexpectedEof { expected: String, line: u32, column: u32 },

    #[error("duplicate '{block}' block at line {line}")]
    DuplicateBlock { block: String, line: u32, column: u32 },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::UnexpectedToken { line, column, .. }
            | ParseError::ExpectedToken { line, column, .. }
            | ParseError::UnexpectedEof { line, column, .. }
            | ParseError::DuplicateBlock { line, column, .. } => Span::point(*line, *column),
        }
    }

    pub fn code(&self) -> DiagnosticCode {
        match self {
            ParseError::UnexpectedToken { .. } => DiagnosticCode::E_PARSER_UNEXPECTED_TOKEN,
            ParseError::ExpectedToken { .. } => DiagnosticCode::E_PARSER_EXPECTED_TOKEN,
            ParseError::UnexpectedEof { .. } => DiagnosticCode::E_PARSER_UNEXPECTED_EOF,
            ParseError::DuplicateBlock { .. } => DiagnosticCode::E_PARSER_DUPLICATE_BLOCK,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(self.to_string(), self.span()).with_code(self.code())
    }
}

pub type ParseResult<T> = std::result::Result<T, ParseError>;

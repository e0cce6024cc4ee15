//! Token kinds produced by the lexer.

use flow_util::Span;

/// Reserved single words. `##`-style comments never reach this table; the
/// lexer strips comments before classifying words.
pub const KEYWORDS: &[&str] = &[
    "workflow", "config", "services", "trigger", "step", "if", "otherwise", "set", "to", "ask",
    "using", "with", "and", "or", "not", "in", "for", "each", "env", "retry", "times", "waiting",
    "seconds", "plus", "minus", "complete", "reject", "log", "save", "the", "result", "status",
    "confidence", "as", "an", "a", "is", "at", "contains", "exists",
];

/// Compound phrases recognized as a single token, ordered longest (by word
/// count) to shortest so the lexer's greedy match picks the most specific
/// phrase first.
pub const COMPOUND_KEYWORDS: &[&str] = &[
    "save the confidence as",
    "save the headers as",
    "save the result as",
    "save the status as",
    "if still failing",
    "is not empty",
    "does not exist",
    "is at least",
    "is at most",
    "otherwise if",
    "divided by",
    "rounded to",
    "on failure",
    "is not",
    "is above",
    "is below",
    "for each",
    "is empty",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Keyword,
    CompoundKeyword,
    Identifier,
    Number,
    Boolean,
    String,
    StringPart,
    InterpolationStart,
    InterpolationEnd,
    Colon,
    Dot,
    Comma,
    Newline,
    Indent,
    Dedent,
    Eof,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            text: text.into(),
            span,
        }
    }

    pub fn is_keyword(&self, word: &str) -> bool {
        matches!(self.kind, TokenKind::Keyword | TokenKind::CompoundKeyword) && self.text == word
    }
}

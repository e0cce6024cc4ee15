//! Diagnostic codes for categorizing lexer, parser, and analyzer problems.
//!
//! # Examples
//!
//! ```
//! use flow_util::diagnostic::DiagnosticCode;
//!
//! let code = DiagnosticCode::E_LEXER_UNEXPECTED_CHAR;
//! assert_eq!(code.prefix(), "E");
//! assert_eq!(code.as_str(), "E1001");
//! ```

/// A unique code identifying a diagnostic message.
///
/// Codes follow the format `{prefix}{number}` where `prefix` is "E" for
/// errors or "W" for warnings and `number` is a 4-digit, zero-padded value.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagnosticCode {
    pub prefix: &'static str,
    pub number: u32,
}

impl DiagnosticCode {
    #[inline]
    pub const fn new(prefix: &'static str, number: u32) -> Self {
        Self { prefix, number }
    }

    #[inline]
    pub const fn prefix(&self) -> &'static str {
        self.prefix
    }

    #[inline]
    pub const fn number(&self) -> u32 {
        self.number
    }

    pub fn as_str(&self) -> String {
        format!("{}{:04}", self.prefix, self.number)
    }

    // Lexer (E1xxx)
    pub const E_LEXER_UNEXPECTED_CHAR: Self = Self::new("E", 1001);
    pub const E_LEXER_UNTERMINATED_STRING: Self = Self::new("E", 1002);
    pub const E_LEXER_INVALID_NUMBER: Self = Self::new("E", 1003);
    pub const E_LEXER_BAD_INDENT: Self = Self::new("E", 1004);
    pub const E_LEXER_UNTERMINATED_INTERPOLATION: Self = Self::new("E", 1005);

    // Parser (E2xxx)
    pub const E_PARSER_UNEXPECTED_TOKEN: Self = Self::new("E", 2001);
    pub const E_PARSER_EXPECTED_TOKEN: Self = Self::new("E", 2002);
    pub const E_PARSER_UNEXPECTED_EOF: Self = Self::new("E", 2003);
    pub const E_PARSER_DUPLICATE_BLOCK: Self = Self::new("E", 2004);

    // Semantic (E3xxx)
    pub const E_SEMANTIC_UNKNOWN_SERVICE: Self = Self::new("E", 3001);
    pub const E_SEMANTIC_UNBOUND_IDENTIFIER: Self = Self::new("E", 3002);
    pub const E_SEMANTIC_DUPLICATE_CONFIG_KEY: Self = Self::new("E", 3003);
    pub const E_SEMANTIC_DUPLICATE_STEP_NAME: Self = Self::new("E", 3004);
    pub const E_SEMANTIC_DUPLICATE_SERVICE_NAME: Self = Self::new("E", 3005);

    // Runtime (E4xxx)
    pub const E_RUNTIME_SERVICE_FAILED: Self = Self::new("E", 4001);
    pub const E_RUNTIME_TYPE_ERROR: Self = Self::new("E", 4002);
    pub const E_RUNTIME_DIVISION_BY_ZERO: Self = Self::new("E", 4003);
    pub const E_RUNTIME_DEADLINE_EXCEEDED: Self = Self::new("E", 4004);
    pub const E_RUNTIME_UNKNOWN_CONNECTOR: Self = Self::new("E", 4005);

    // Warnings (W0xxx)
    pub const W_UNKNOWN_CONFIG_KEY: Self = Self::new("W", 1);
    pub const W_DUPLICATE_HEADER: Self = Self::new("W", 2);
    pub const W_HEADER_IGNORED_FOR_SERVICE: Self = Self::new("W", 3);
}

impl std::fmt::Debug for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DiagnosticCode({})", self.as_str())
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_str_pads_to_four_digits() {
        assert_eq!(DiagnosticCode::new("E", 1).as_str(), "E0001");
        assert_eq!(DiagnosticCode::new("W", 1).as_str(), "W0001");
    }

    #[test]
    fn predefined_codes() {
        assert_eq!(DiagnosticCode::E_LEXER_UNEXPECTED_CHAR.as_str(), "E1001");
        assert_eq!(DiagnosticCode::E_SEMANTIC_UNKNOWN_SERVICE.as_str(), "E3001");
        assert_eq!(DiagnosticCode::W_UNKNOWN_CONFIG_KEY.as_str(), "W0001");
    }

    #[test]
    fn equality() {
        assert_eq!(DiagnosticCode::new("E", 1001), DiagnosticCode::new("E", 1001));
        assert_ne!(DiagnosticCode::new("E", 1001), DiagnosticCode::new("E", 1002));
    }
}

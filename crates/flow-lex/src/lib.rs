//! Lexer for the Flow workflow language.
//!
//! Tokenizes indentation-significant, English-phrase source text into a flat
//! token stream ending in [`TokenKind::Eof`]. See [`Lexer::tokenize`].

pub mod error;
pub mod token;

pub use error::{LexError, LexResult};
pub use token::{Token, TokenKind, COMPOUND_KEYWORDS, KEYWORDS};

use flow_util::Span;

/// Indentation width, in spaces, for one level. Fixed by the language;
/// tabs in leading whitespace are a lex error rather than being expanded.
const INDENT_WIDTH: usize = 4;

struct Line {
    content: String,
    number: u32,
}

/// Splits source into logical lines, normalizing CRLF to LF first.
fn split_lines(source: &str) -> Vec<Line> {
    source
        .replace("\r\n", "\n")
        .lines()
        .enumerate()
        .map(|(i, content)| Line {
            content: content.to_string(),
            number: (i + 1) as u32,
        })
        .collect()
}

pub struct Lexer<'a> {
    source: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source }
    }

    /// Tokenize the whole source. Returns the first error encountered; the
    /// lexer does not attempt recovery (spec: fatal for the file).
    pub fn tokenize(&self) -> LexResult<Vec<Token>> {
        tracing::debug!(len = self.source.len(), "lexing source");
        let mut tokens = Vec::new();
        let mut indent_stack = vec![0usize];
        let lines = split_lines(self.source);

        for line in &lines {
            let whitespace_len = line.content.len()
                - line.content.trim_start_matches(|c: char| c == ' ' || c == '\t').len();
            if strip_comment(&line.content[whitespace_len..]).trim().is_empty() {
                continue;
            }

            if line.content[..whitespace_len].contains('\t') {
                return Err(LexError::TabInIndentation {
                    line: line.number,
                    column: 1,
                });
            }

            let trimmed_start = line.content.trim_start_matches(' ');
            let leading_len = line.content.len() - trimmed_start.len();
            let rest = strip_comment(trimmed_start);

            let width = leading_len;
            if width % INDENT_WIDTH != 0 {
                return Err(LexError::BadIndentWidth {
                    line: line.number,
                    column: 1,
                    width,
                });
            }

            let top = *indent_stack.last().unwrap();
            if width > top {
                if width != top + INDENT_WIDTH {
                    return Err(LexError::MisalignedIndent {
                        line: line.number,
                        column: (width + 1) as u32,
                    });
                }
                indent_stack.push(width);
                tokens.push(Token::new(
                    TokenKind::Indent,
                    "",
                    Span::point(line.number, 1),
                ));
            } else if width < top {
                while *indent_stack.last().unwrap() > width {
                    indent_stack.pop();
                    tokens.push(Token::new(
                        TokenKind::Dedent,
                        "",
                        Span::point(line.number, 1),
                    ));
                }
                if *indent_stack.last().unwrap() != width {
                    return Err(LexError::MisalignedIndent {
                        line: line.number,
                        column: (width + 1) as u32,
                    });
                }
            }

            let mut line_tokens = scan_line(rest, line.number, (leading_len + 1) as u32)?;
            tokens.append(&mut line_tokens);
            tokens.push(Token::new(
                TokenKind::Newline,
                "\n",
                Span::point(line.number, (line.content.len() + 1) as u32),
            ));
        }

        let final_line = lines.last().map(|l| l.number + 1).unwrap_or(1);
        while indent_stack.len() > 1 {
            indent_stack.pop();
            tokens.push(Token::new(
                TokenKind::Dedent,
                "",
                Span::point(final_line, 1),
            ));
        }
        tokens.push(Token::new(TokenKind::Eof, "", Span::point(final_line, 1)));

        Ok(tokens)
    }
}

/// Strips a `#` line comment that starts outside of a string. This is a
/// conservative scan: it does not need to be string-aware because comments
/// inside a Flow string would require an escaped or interpolated `#`, which
/// the string scanner below handles directly when the comment character
/// appears after a quote has already been opened on the same line.
fn strip_comment(content: &str) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    for (i, ch) in content.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '#' => return &content[..i],
            _ => {}
        }
    }
    content
}

fn scan_line(content: &str, line: u32, start_column: u32) -> LexResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = content.chars().collect();
    let mut i = 0usize;
    let mut col = start_column;

    while i < chars.len() {
        let ch = chars[i];
        match ch {
            ' ' => {
                i += 1;
                col += 1;
            }
            ':' => {
                tokens.push(Token::new(TokenKind::Colon, ":", Span::point(line, col)));
                i += 1;
                col += 1;
            }
            ',' => {
                tokens.push(Token::new(TokenKind::Comma, ",", Span::point(line, col)));
                i += 1;
                col += 1;
            }
            '.' if !chars.get(i + 1).map(|c| c.is_ascii_digit()).unwrap_or(false) => {
                tokens.push(Token::new(TokenKind::Dot, ".", Span::point(line, col)));
                i += 1;
                col += 1;
            }
            '"' => {
                let (mut string_tokens, consumed) = scan_string(&chars[i..], line, col)?;
                tokens.append(&mut string_tokens);
                i += consumed;
                col += consumed as u32;
            }
            c if c.is_ascii_digit() => {
                let (token, consumed) = scan_number(&chars[i..], line, col)?;
                tokens.push(token);
                i += consumed;
                col += consumed as u32;
            }
            c if c.is_alphabetic() || c == '_' => {
                let (token, consumed) = scan_word(&chars[i..], line, col);
                tokens.push(token);
                i += consumed;
                col += consumed as u32;
            }
            other => {
                return Err(LexError::UnexpectedChar {
                    ch: other,
                    line,
                    column: col,
                })
            }
        }
    }

    classify_words(&mut tokens);
    Ok(tokens)
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

fn scan_word(chars: &[char], line: u32, col: u32) -> (Token, usize) {
    let mut end = 1;
    while end < chars.len() && is_ident_continue(chars[end]) {
        end += 1;
    }
    let text: String = chars[..end].iter().collect();
    let kind = if text == "true" || text == "false" {
        TokenKind::Boolean
    } else {
        TokenKind::Identifier
    };
    (Token::new(kind, text, Span::point(line, col)), end)
}

fn scan_number(chars: &[char], line: u32, col: u32) -> LexResult<(Token, usize)> {
    let mut end = 0;
    while end < chars.len() && chars[end].is_ascii_digit() {
        end += 1;
    }
    if chars.get(end) == Some(&'.') && chars.get(end + 1).map(|c| c.is_ascii_digit()).unwrap_or(false) {
        end += 1;
        while end < chars.len() && chars[end].is_ascii_digit() {
            end += 1;
        }
    }
    if end < chars.len() && chars[end] == '.' {
        return Err(LexError::InvalidNumber { line, column: col });
    }
    let text: String = chars[..end].iter().collect();
    Ok((Token::new(TokenKind::Number, text, Span::point(line, col)), end))
}

/// Scans a (possibly interpolated) string literal starting at `chars[0] ==
/// '"'`. Returns the emitted tokens and the number of characters consumed.
fn scan_string(chars: &[char], line: u32, start_col: u32) -> LexResult<(Vec<Token>, usize)> {
    let mut tokens = Vec::new();
    let mut i = 1usize; // skip opening quote
    let mut col = start_col + 1;
    let mut buf = String::new();
    let mut had_interpolation = false;
    let part_start_col = col;

    loop {
        match chars.get(i) {
            None => {
                return Err(LexError::UnterminatedString {
                    line,
                    column: start_col,
                })
            }
            Some('"') => {
                i += 1;
                if had_interpolation {
                    tokens.push(Token::new(TokenKind::StringPart, buf, Span::point(line, col)));
                } else {
                    tokens.push(Token::new(TokenKind::String, buf, Span::point(line, start_col)));
                }
                break;
            }
            Some('\\') => {
                let escaped = chars.get(i + 1).copied().unwrap_or('\0');
                buf.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    '"' => '"',
                    '\\' => '\\',
                    other => other,
                });
                i += 2;
                col += 2;
            }
            Some('{') if chars.get(i + 1) == Some(&'{') => {
                buf.push('{');
                i += 2;
                col += 2;
            }
            Some('}') if chars.get(i + 1) == Some(&'}') => {
                buf.push('}');
                i += 2;
                col += 2;
            }
            Some('{') => {
                had_interpolation = true;
                tokens.push(Token::new(
                    TokenKind::StringPart,
                    std::mem::take(&mut buf),
                    Span::point(line, part_start_col),
                ));
                tokens.push(Token::new(TokenKind::InterpolationStart, "{", Span::point(line, col)));
                i += 1;
                col += 1;

                if chars.get(i) == Some(&'}') {
                    return Err(LexError::EmptyInterpolation { line, column: col });
                }

                let (expr_tokens, consumed) = scan_interpolation_expr(&chars[i..], line, col)
                    .ok_or(LexError::UnterminatedInterpolation { line, column: col })?;
                tokens.extend(expr_tokens);
                i += consumed;
                col += consumed as u32;

                if chars.get(i) != Some(&'}') {
                    return Err(LexError::UnterminatedInterpolation { line, column: col });
                }
                tokens.push(Token::new(TokenKind::InterpolationEnd, "}", Span::point(line, col)));
                i += 1;
                col += 1;
            }
            Some(c) => {
                buf.push(*c);
                i += 1;
                col += 1;
            }
        }
    }

    Ok((tokens, i))
}

/// Scans `identifier(.identifier)*` inside `{...}`, stopping before the
/// closing brace. Returns `None` if the identifier chain is malformed.
fn scan_interpolation_expr(chars: &[char], line: u32, start_col: u32) -> Option<(Vec<Token>, usize)> {
    let mut tokens = Vec::new();
    let mut i = 0usize;
    let mut col = start_col;

    if chars.get(i).map(|c| c.is_alphabetic() || *c == '_').unwrap_or(false) {
        let (token, consumed) = scan_word(&chars[i..], line, col);
        tokens.push(token);
        i += consumed;
        col += consumed as u32;
    } else {
        return None;
    }

    while chars.get(i) == Some(&'.') {
        tokens.push(Token::new(TokenKind::Dot, ".", Span::point(line, col)));
        i += 1;
        col += 1;
        if chars.get(i).map(|c| c.is_alphabetic() || *c == '_').unwrap_or(false) {
            let (token, consumed) = scan_word(&chars[i..], line, col);
            tokens.push(token);
            i += consumed;
            col += consumed as u32;
        } else {
            return None;
        }
    }

    Some((tokens, i))
}

/// Merges runs of identifier tokens into compound keywords (longest match),
/// then classifies remaining single words as keywords where applicable.
fn classify_words(tokens: &mut Vec<Token>) {
    let compounds: Vec<Vec<&str>> = COMPOUND_KEYWORDS
        .iter()
        .map(|phrase| phrase.split(' ').collect())
        .collect();

    let mut i = 0usize;
    while i < tokens.len() {
        if tokens[i].kind != TokenKind::Identifier {
            i += 1;
            continue;
        }

        let mut matched = false;
        for (phrase, words) in COMPOUND_KEYWORDS.iter().zip(compounds.iter()) {
            if i + words.len() > tokens.len() {
                continue;
            }
            let slice_matches = words.iter().enumerate().all(|(offset, word)| {
                tokens[i + offset].kind == TokenKind::Identifier && tokens[i + offset].text == *word
            });
            if slice_matches {
                let span = tokens[i].span.merge(tokens[i + words.len() - 1].span);
                let merged = Token::new(TokenKind::CompoundKeyword, *phrase, span);
                tokens.splice(i..i + words.len(), std::iter::once(merged));
                matched = true;
                break;
            }
        }

        if !matched && KEYWORDS.contains(&tokens[i].text.as_str()) {
            tokens[i].kind = TokenKind::Keyword;
        }

        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn tokenizes_simple_set_statement() {
        let tokens = Lexer::new("workflow:\n    set x to 2 plus 3\n").tokenize().unwrap();
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert!(texts.contains(&"workflow"));
        assert!(texts.contains(&"set"));
        assert!(texts.contains(&"plus"));
    }

    #[test]
    fn indent_and_dedent_are_balanced() {
        let tokens = Lexer::new("workflow:\n    set x to 1\n    set y to 2\n").tokenize().unwrap();
        let indents = tokens.iter().filter(|t| t.kind == TokenKind::Indent).count();
        let dedents = tokens.iter().filter(|t| t.kind == TokenKind::Dedent).count();
        assert_eq!(indents, dedents);
        assert_eq!(indents, 1);
    }

    #[test]
    fn tabs_in_indentation_fail() {
        let result = Lexer::new("workflow:\n\tset x to 1\n").tokenize();
        assert!(matches!(result, Err(LexError::TabInIndentation { .. })));
    }

    #[test]
    fn non_multiple_of_four_indentation_fails() {
        let result = Lexer::new("workflow:\n   set x to 1\n").tokenize();
        assert!(matches!(result, Err(LexError::BadIndentWidth { .. })));
    }

    #[test]
    fn longest_match_compound_keywords() {
        let tokens = Lexer::new("workflow:\n    if x is not empty:\n        log x\n")
            .tokenize()
            .unwrap();
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert!(texts.contains(&"is not empty"));
        assert!(!texts.contains(&"is not"));
    }

    #[test]
    fn is_not_without_empty_tokenizes_separately() {
        let tokens = Lexer::new("workflow:\n    if x is not valid:\n        log x\n")
            .tokenize()
            .unwrap();
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert!(texts.contains(&"is not"));
        assert!(texts.contains(&"valid"));
    }

    #[test]
    fn string_with_interpolation_emits_parts() {
        let tokens = Lexer::new("workflow:\n    log \"hi {name}!\"\n").tokenize().unwrap();
        let ks = kinds(&tokens);
        assert!(ks.contains(&TokenKind::StringPart));
        assert!(ks.contains(&TokenKind::InterpolationStart));
        assert!(ks.contains(&TokenKind::InterpolationEnd));
    }

    #[test]
    fn string_without_interpolation_is_single_token() {
        let tokens = Lexer::new("workflow:\n    log \"hello\"\n").tokenize().unwrap();
        assert!(tokens.iter().any(|t| t.kind == TokenKind::String && t.text == "hello"));
    }

    #[test]
    fn empty_interpolation_fails() {
        let result = Lexer::new("workflow:\n    log \"{}\"\n").tokenize();
        assert!(matches!(result, Err(LexError::EmptyInterpolation { .. })));
    }

    #[test]
    fn unterminated_string_fails() {
        let result = Lexer::new("workflow:\n    log \"oops\n").tokenize();
        assert!(result.is_err());
    }

    #[test]
    fn hyphenated_identifier_stays_whole() {
        let tokens = Lexer::new("services:\n    order-id is an API at \"https://x\"\n")
            .tokenize()
            .unwrap();
        assert!(tokens.iter().any(|t| t.text == "order-id"));
    }

    #[test]
    fn dedent_to_zero_at_eof_emits_one_dedent_per_level() {
        let tokens = Lexer::new("workflow:\n    if x is empty:\n        log x\n")
            .tokenize()
            .unwrap();
        let dedents = tokens.iter().filter(|t| t.kind == TokenKind::Dedent).count();
        assert_eq!(dedents, 2);
    }

    #[test]
    fn decimal_number_parses() {
        let tokens = Lexer::new("workflow:\n    set x to 3.5\n").tokenize().unwrap();
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Number && t.text == "3.5"));
    }

    #[test]
    fn comment_only_line_is_skipped() {
        let tokens = Lexer::new("workflow:\n    # a comment\n    log 1\n").tokenize().unwrap();
        assert!(!tokens.iter().any(|t| t.text.contains("comment")));
    }
}

//! Recursive-descent parser for the Flow workflow language.
//!
//! Builds a [`ast::Program`] from the flat token stream produced by
//! `flow-lex`. The grammar is small enough that each statement is
//! dispatched by its leading token; see [`Parser::parse_statement`].

pub mod ast;
pub mod error;

pub use error::{ParseError, ParseResult};

use ast::*;
use flow_lex::{Token, TokenKind};
use flow_util::diagnostic::Handler;
use flow_util::Span;

pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    handler: &'a Handler,
    errors: Vec<ParseError>,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, handler: &'a Handler) -> Self {
        Self {
            tokens,
            pos: 0,
            handler,
            errors: Vec::new(),
        }
    }

    /// Parses the whole token stream into a [`Program`], recovering and
    /// continuing after errors so multiple problems are reported per file.
    /// Returns the best-effort AST plus every error collected.
    pub fn parse(mut self) -> (Program, Vec<ParseError>) {
        let mut config = None;
        let mut services = None;
        let mut workflow = None;

        while !self.at_eof() {
            if self.at_newline() {
                self.advance();
                continue;
            }
            match self.current_keyword_text() {
                Some("config") => match self.parse_config_block() {
                    Ok(block) => {
                        if config.is_some() {
                            self.report_duplicate_block("config", block.span);
                        } else {
                            config = Some(block);
                        }
                    }
                    Err(e) => self.record_and_recover(e),
                },
                Some("services") => match self.parse_services_block() {
                    Ok(block) => {
                        if services.is_some() {
                            self.report_duplicate_block("services", block.span);
                        } else {
                            services = Some(block);
                        }
                    }
                    Err(e) => self.record_and_recover(e),
                },
                Some("workflow") => match self.parse_workflow_block() {
                    Ok(block) => {
                        if workflow.is_some() {
                            self.report_duplicate_block("workflow", block.span);
                        } else {
                            workflow = Some(block);
                        }
                    }
                    Err(e) => self.record_and_recover(e),
                },
                _ => {
                    let e = self.error_unexpected_token("a `config:`, `services:`, or `workflow:` block header");
                    self.record_and_recover(e);
                }
            }
        }

        (
            Program {
                config,
                services,
                workflow,
            },
            self.errors,
        )
    }

    // ---- token stream primitives -----------------------------------------

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn advance(&mut self) -> Token {
        let tok = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn at_eof(&self) -> bool {
        self.current().kind == TokenKind::Eof
    }

    fn at_newline(&self) -> bool {
        self.current().kind == TokenKind::Newline
    }

    fn check_kind(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    fn current_keyword_text(&self) -> Option<&str> {
        let tok = self.current();
        if matches!(tok.kind, TokenKind::Keyword | TokenKind::CompoundKeyword) {
            Some(tok.text.as_str())
        } else {
            None
        }
    }

    fn is_keyword(&self, word: &str) -> bool {
        self.current().is_keyword(word)
    }

    fn skip_newlines(&mut self) {
        while self.at_newline() {
            self.advance();
        }
    }

    fn expect_kind(&mut self, kind: TokenKind, what: &str) -> ParseResult<Token> {
        if self.check_kind(kind) {
            Ok(self.advance())
        } else {
            Err(self.error_expected(what))
        }
    }

    fn expect_keyword(&mut self, word: &str) -> ParseResult<Token> {
        if self.is_keyword(word) {
            Ok(self.advance())
        } else {
            Err(self.error_expected(&format!("`{word}`")))
        }
    }

    fn expect_colon(&mut self) -> ParseResult<()> {
        self.expect_kind(TokenKind::Colon, "`:`")?;
        Ok(())
    }

    /// Consumes a NEWLINE, then an INDENT, in sequence (the shape every
    /// block header takes after its trailing colon).
    fn expect_block_open(&mut self) -> ParseResult<()> {
        self.expect_kind(TokenKind::Newline, "a newline")?;
        self.expect_kind(TokenKind::Indent, "an indented block")?;
        Ok(())
    }

    fn error_expected(&self, what: &str) -> ParseError {
        let tok = self.current();
        if tok.kind == TokenKind::Eof {
            ParseError::UnexpectedEof {
                expected: what.to_string(),
                line: tok.span.line,
                column: tok.span.column,
            }
        } else {
            ParseError::ExpectedToken {
                expected: what.to_string(),
                found: describe(tok),
                line: tok.span.line,
                column: tok.span.column,
            }
        }
    }

    fn error_unexpected_token(&self, expected: &str) -> ParseError {
        let tok = self.current();
        if tok.kind == TokenKind::Eof {
            ParseError::UnexpectedEof {
                expected: expected.to_string(),
                line: tok.span.line,
                column: tok.span.column,
            }
        } else {
            ParseError::UnexpectedToken {
                found: describe(tok),
                line: tok.span.line,
                column: tok.span.column,
            }
        }
    }

    fn report_duplicate_block(&mut self, name: &str, span: Span) {
        let err = ParseError::DuplicateBlock {
            block: name.to_string(),
            line: span.line,
            column: span.column,
        };
        self.handler.emit_diagnostic(err.to_diagnostic());
        self.errors.push(err);
    }

    fn record_and_recover(&mut self, error: ParseError) {
        self.handler.emit_diagnostic(error.to_diagnostic());
        self.errors.push(error);
        self.recover_to_sync_point();
    }

    /// Resynchronizes after an error by skipping to the next NEWLINE at
    /// top level, or the next DEDENT that returns to top level, or a
    /// recognized block header. Subsequent blocks then parse independently.
    fn recover_to_sync_point(&mut self) {
        let mut depth = 0i32;
        loop {
            match self.current().kind {
                TokenKind::Eof => return,
                TokenKind::Indent => {
                    depth += 1;
                    self.advance();
                }
                TokenKind::Dedent => {
                    if depth == 0 {
                        self.advance();
                        return;
                    }
                    depth -= 1;
                    self.advance();
                }
                TokenKind::Newline if depth == 0 => {
                    self.advance();
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    // ---- config: block -----------------------------------------------------

    fn parse_config_block(&mut self) -> ParseResult<Config> {
        let start = self.current().span;
        self.expect_keyword("config")?;
        self.expect_colon()?;
        self.expect_block_open()?;

        let mut entries = Vec::new();
        while !self.check_kind(TokenKind::Dedent) && !self.at_eof() {
            if self.at_newline() {
                self.advance();
                continue;
            }
            entries.push(self.parse_config_entry()?);
        }
        self.expect_kind(TokenKind::Dedent, "end of `config:` block")?;

        Ok(Config {
            entries,
            span: start,
        })
    }

    fn parse_config_entry(&mut self) -> ParseResult<ConfigEntry> {
        let key_tok = self.expect_kind(TokenKind::Identifier, "a config key")?;
        let span = key_tok.span;
        self.expect_colon()?;

        let value = if self.check_kind(TokenKind::String) {
            ConfigValue::String(self.advance().text)
        } else if self.check_kind(TokenKind::Number) && self.peek_at(1).kind == TokenKind::Newline {
            let text = self.advance().text;
            ConfigValue::Number(text.parse().unwrap_or(0.0))
        } else {
            let mut words = Vec::new();
            while !self.at_newline() && !self.at_eof() {
                words.push(self.advance().text);
            }
            ConfigValue::Text(words.join(" "))
        };

        self.expect_kind(TokenKind::Newline, "a newline")?;

        Ok(ConfigEntry {
            key: key_tok.text,
            value,
            span,
        })
    }

    // ---- services: block ----------------------------------------------------

    fn parse_services_block(&mut self) -> ParseResult<Services> {
        let start = self.current().span;
        self.expect_keyword("services")?;
        self.expect_colon()?;
        self.expect_block_open()?;

        let mut declarations = Vec::new();
        while !self.check_kind(TokenKind::Dedent) && !self.at_eof() {
            if self.at_newline() {
                self.advance();
                continue;
            }
            declarations.push(self.parse_service_decl()?);
        }
        self.expect_kind(TokenKind::Dedent, "end of `services:` block")?;

        Ok(Services {
            declarations,
            span: start,
        })
    }

    fn parse_service_decl(&mut self) -> ParseResult<ServiceDecl> {
        let name_tok = self.expect_kind(TokenKind::Identifier, "a service name")?;
        let span = name_tok.span;
        self.expect_keyword("is")?;

        let kind;
        let target;
        if self.is_keyword("an") {
            self.advance();
            let type_word = self.advance().text;
            match type_word.to_ascii_lowercase().as_str() {
                "api" => {
                    kind = ServiceType::Api;
                    self.expect_keyword("at")?;
                    target = self.expect_kind(TokenKind::String, "a URL string")?.text;
                }
                "ai" => {
                    kind = ServiceType::Ai;
                    self.expect_keyword("using")?;
                    target = self.expect_kind(TokenKind::String, "a model name string")?.text;
                }
                other => {
                    return Err(ParseError::ExpectedToken {
                        expected: "`API` or `AI`".to_string(),
                        found: other.to_string(),
                        line: span.line,
                        column: span.column,
                    })
                }
            }
        } else if self.is_keyword("a") {
            self.advance();
            let type_word = self.advance().text;
            match type_word.to_ascii_lowercase().as_str() {
                "plugin" => {
                    kind = ServiceType::Plugin;
                    target = self.expect_kind(TokenKind::String, "a plugin id string")?.text;
                }
                "webhook" => {
                    kind = ServiceType::Webhook;
                    self.expect_keyword("at")?;
                    target = self.expect_kind(TokenKind::String, "a URL string")?.text;
                }
                other => {
                    return Err(ParseError::ExpectedToken {
                        expected: "`plugin` or `webhook`".to_string(),
                        found: other.to_string(),
                        line: span.line,
                        column: span.column,
                    })
                }
            }
        } else {
            return Err(self.error_expected("`an` or `a`"));
        }

        let mut headers = Vec::new();
        if self.is_keyword("with") {
            self.advance();
            self.expect_keyword("headers")?;
            self.expect_colon()?;
            self.expect_block_open()?;
            while !self.check_kind(TokenKind::Dedent) && !self.at_eof() {
                if self.at_newline() {
                    self.advance();
                    continue;
                }
                let header_name = self.expect_kind(TokenKind::Identifier, "a header name")?.text;
                self.expect_colon()?;
                let value = self.parse_expr()?;
                self.expect_kind(TokenKind::Newline, "a newline")?;
                headers.push((header_name, value));
            }
            self.expect_kind(TokenKind::Dedent, "end of `with headers:` block")?;
        }

        self.expect_kind(TokenKind::Newline, "a newline")?;

        Ok(ServiceDecl {
            name: name_tok.text,
            kind,
            target,
            headers,
            span,
        })
    }

    // ---- workflow: block ----------------------------------------------------

    fn parse_workflow_block(&mut self) -> ParseResult<Workflow> {
        let start = self.current().span;
        self.expect_keyword("workflow")?;
        self.expect_colon()?;
        self.expect_block_open()?;

        let mut trigger = None;
        if self.is_keyword("trigger") {
            self.advance();
            self.expect_colon()?;
            let mut words = Vec::new();
            while !self.at_newline() && !self.at_eof() {
                words.push(self.advance().text);
            }
            self.expect_kind(TokenKind::Newline, "a newline")?;
            trigger = Some(words.join(" "));
        }

        let statements = self.parse_statement_list()?;
        self.expect_kind(TokenKind::Dedent, "end of `workflow:` block")?;

        Ok(Workflow {
            trigger,
            statements,
            span: start,
        })
    }

    /// Parses statements until a DEDENT or EOF is reached (but does not
    /// consume the DEDENT itself).
    fn parse_statement_list(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut statements = Vec::new();
        loop {
            self.skip_newlines();
            if self.check_kind(TokenKind::Dedent) || self.at_eof() {
                break;
            }
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(e) => self.record_and_recover(e),
            }
        }
        Ok(statements)
    }

    fn parse_indented_block(&mut self) -> ParseResult<Vec<Stmt>> {
        self.expect_block_open()?;
        let body = self.parse_statement_list()?;
        self.expect_kind(TokenKind::Dedent, "end of indented block")?;
        Ok(body)
    }

    fn parse_statement(&mut self) -> ParseResult<Stmt> {
        match self.current_keyword_text() {
            Some("set") => self.parse_set_statement().map(Stmt::Set),
            Some("if") => self.parse_if_statement().map(Stmt::If),
            Some("for each") => self.parse_for_each_statement().map(Stmt::ForEach),
            Some("log") => self.parse_log_statement().map(Stmt::Log),
            Some("complete") => self.parse_complete_statement().map(Stmt::Complete),
            Some("reject") => self.parse_reject_statement().map(Stmt::Reject),
            Some("step") => self.parse_step_block().map(Stmt::Step),
            Some("ask") => self.parse_ask_statement().map(Stmt::Ask),
            _ if self.check_kind(TokenKind::Identifier) => self.parse_service_call().map(Stmt::ServiceCall),
            _ => Err(self.error_unexpected_token("a statement")),
        }
    }

    fn parse_set_statement(&mut self) -> ParseResult<SetStatement> {
        let start = self.current().span;
        self.expect_keyword("set")?;
        let name = self.expect_kind(TokenKind::Identifier, "a variable name")?.text;
        self.expect_keyword("to")?;
        let value = self.parse_expr()?;
        self.expect_kind(TokenKind::Newline, "a newline")?;
        Ok(SetStatement {
            name,
            value,
            span: start,
        })
    }

    fn parse_if_statement(&mut self) -> ParseResult<IfStatement> {
        let start = self.current().span;
        self.expect_keyword("if")?;
        let condition = self.parse_expr()?;
        self.expect_colon()?;
        let then_body = self.parse_indented_block()?;

        let mut else_ifs = Vec::new();
        let mut else_body = None;

        loop {
            self.skip_newlines();
            if self.is_keyword("otherwise if") {
                self.advance();
                let cond = self.parse_expr()?;
                self.expect_colon()?;
                let body = self.parse_indented_block()?;
                else_ifs.push((cond, body));
            } else if self.is_keyword("otherwise") {
                self.advance();
                self.expect_colon()?;
                else_body = Some(self.parse_indented_block()?);
                break;
            } else {
                break;
            }
        }

        Ok(IfStatement {
            condition,
            then_body,
            else_ifs,
            else_body,
            span: start,
        })
    }

    fn parse_for_each_statement(&mut self) -> ParseResult<ForEachStatement> {
        let start = self.current().span;
        self.expect_keyword("for each")?;
        let item_name = self.expect_kind(TokenKind::Identifier, "a loop variable name")?.text;
        self.expect_keyword("in")?;
        let collection = self.parse_expr()?;
        self.expect_colon()?;
        let body = self.parse_indented_block()?;
        Ok(ForEachStatement {
            item_name,
            collection,
            body,
            span: start,
        })
    }

    fn parse_log_statement(&mut self) -> ParseResult<LogStatement> {
        let start = self.current().span;
        self.expect_keyword("log")?;
        let value = self.parse_expr()?;
        self.expect_kind(TokenKind::Newline, "a newline")?;
        Ok(LogStatement { value, span: start })
    }

    fn parse_complete_statement(&mut self) -> ParseResult<CompleteStatement> {
        let start = self.current().span;
        self.expect_keyword("complete")?;
        self.expect_keyword("with")?;

        let mut outputs = Vec::new();
        loop {
            let name = self.expect_kind(TokenKind::Identifier, "an output name")?.text;
            let value = self.parse_output_expr()?;
            outputs.push((name, value));
            if self.is_keyword("and") {
                self.advance();
            } else {
                break;
            }
        }
        self.expect_kind(TokenKind::Newline, "a newline")?;

        Ok(CompleteStatement {
            outputs,
            span: start,
        })
    }

    /// Output expressions in `complete with` are restricted to literals,
    /// identifiers, or dot-access (spec §4.2) -- no math/comparison/logical.
    fn parse_output_expr(&mut self) -> ParseResult<Expr> {
        self.parse_primary()
    }

    fn parse_reject_statement(&mut self) -> ParseResult<RejectStatement> {
        let start = self.current().span;
        self.expect_keyword("reject")?;
        self.expect_keyword("with")?;
        let message = self.parse_expr()?;
        self.expect_kind(TokenKind::Newline, "a newline")?;
        Ok(RejectStatement {
            message,
            span: start,
        })
    }

    fn parse_step_block(&mut self) -> ParseResult<StepBlock> {
        let start = self.current().span;
        self.expect_keyword("step")?;
        let mut words = Vec::new();
        while !self.check_kind(TokenKind::Colon) && !self.at_eof() && !self.at_newline() {
            words.push(self.advance().text);
        }
        if words.is_empty() {
            return Err(self.error_expected("a step name"));
        }
        self.expect_colon()?;
        let body = self.parse_indented_block()?;
        Ok(StepBlock {
            name: words.join(" "),
            body,
            span: start,
        })
    }

    fn parse_ask_statement(&mut self) -> ParseResult<AskStatement> {
        let start = self.current().span;
        self.expect_keyword("ask")?;
        let agent = self.expect_kind(TokenKind::Identifier, "an AI service name")?.text;
        self.expect_keyword("to")?;
        let mut words = Vec::new();
        while !self.at_newline() && !self.at_eof() {
            words.push(self.advance().text);
        }
        self.expect_kind(TokenKind::Newline, "a newline")?;
        let instruction = words.join(" ");

        let mut result_var = None;
        let mut confidence_var = None;

        if self.check_kind(TokenKind::Indent) {
            self.advance();
            while !self.check_kind(TokenKind::Dedent) && !self.at_eof() {
                if self.at_newline() {
                    self.advance();
                    continue;
                }
                if self.is_keyword("save the result as") {
                    self.advance();
                    result_var = Some(self.expect_kind(TokenKind::Identifier, "a variable name")?.text);
                } else if self.is_keyword("save the confidence as") {
                    self.advance();
                    confidence_var = Some(self.expect_kind(TokenKind::Identifier, "a variable name")?.text);
                } else {
                    return Err(self.error_unexpected_token("`save the result as` or `save the confidence as`"));
                }
                self.expect_kind(TokenKind::Newline, "a newline")?;
            }
            self.expect_kind(TokenKind::Dedent, "end of `ask` block")?;
        }

        Ok(AskStatement {
            agent,
            instruction,
            result_var,
            confidence_var,
            span: start,
        })
    }

    fn parse_service_call(&mut self) -> ParseResult<ServiceCall> {
        let start = self.current().span;
        let mut words = Vec::new();
        while !self.is_keyword("using") && !self.at_newline() && !self.at_eof() {
            words.push(self.advance().text);
        }
        if words.is_empty() {
            return Err(self.error_expected("a service call (`<verb> ... using <Service>`)"));
        }
        self.expect_keyword("using")?;
        let service = self.expect_kind(TokenKind::Identifier, "a service name")?.text;

        let verb = words[0].clone();
        let description = words[1..].join(" ");

        let mut path = None;
        if self.is_keyword("at") {
            self.advance();
            path = Some(self.parse_additive()?);
        }

        let mut parameters = Vec::new();
        if self.is_keyword("with") {
            self.advance();
            loop {
                let param_name = self.expect_kind(TokenKind::Identifier, "a parameter name")?.text;
                let value = self.parse_additive()?;
                parameters.push((param_name, value));
                if self.is_keyword("and") {
                    self.advance();
                } else {
                    break;
                }
            }
        }

        if self.is_keyword("to") {
            self.advance();
            let value = self.parse_additive()?;
            parameters.push(("to".to_string(), value));
        }

        self.expect_kind(TokenKind::Newline, "a newline")?;

        let mut result_var = None;
        let mut status_var = None;
        let mut headers_var = None;
        let mut error_handler = None;

        if self.check_kind(TokenKind::Indent) {
            self.advance();
            while !self.check_kind(TokenKind::Dedent) && !self.at_eof() {
                if self.at_newline() {
                    self.advance();
                    continue;
                }
                if self.is_keyword("save the result as") {
                    self.advance();
                    result_var = Some(self.expect_kind(TokenKind::Identifier, "a variable name")?.text);
                    self.expect_kind(TokenKind::Newline, "a newline")?;
                } else if self.is_keyword("save the status as") {
                    self.advance();
                    status_var = Some(self.expect_kind(TokenKind::Identifier, "a variable name")?.text);
                    self.expect_kind(TokenKind::Newline, "a newline")?;
                } else if self.is_keyword("save the headers as") {
                    self.advance();
                    headers_var = Some(self.expect_kind(TokenKind::Identifier, "a variable name")?.text);
                    self.expect_kind(TokenKind::Newline, "a newline")?;
                } else if self.is_keyword("on failure") {
                    error_handler = Some(self.parse_error_handler()?);
                } else {
                    return Err(self.error_unexpected_token(
                        "`save the result as`, `save the status as`, `save the headers as`, or `on failure:`",
                    ));
                }
            }
            self.expect_kind(TokenKind::Dedent, "end of service call block")?;
        }

        Ok(ServiceCall {
            verb,
            description,
            service,
            parameters,
            path,
            result_var,
            status_var,
            headers_var,
            error_handler,
            span: start,
        })
    }

    fn parse_error_handler(&mut self) -> ParseResult<ErrorHandler> {
        let start = self.current().span;
        self.expect_keyword("on failure")?;
        self.expect_colon()?;
        self.expect_block_open()?;

        self.expect_keyword("retry")?;
        let count_tok = self.expect_kind(TokenKind::Number, "a retry count")?;
        let retry_count: u32 = count_tok.text.parse().unwrap_or(0);
        self.expect_keyword("times")?;
        self.expect_keyword("waiting")?;
        let wait_tok = self.expect_kind(TokenKind::Number, "a wait duration")?;
        let retry_wait_seconds: f64 = wait_tok.text.parse().unwrap_or(0.0);
        self.expect_keyword("seconds")?;
        self.expect_kind(TokenKind::Newline, "a newline")?;

        let mut fallback = None;
        self.skip_newlines();
        if self.is_keyword("if still failing") {
            self.advance();
            self.expect_colon()?;
            fallback = Some(self.parse_indented_block()?);
        }

        self.expect_kind(TokenKind::Dedent, "end of `on failure:` block")?;

        Ok(ErrorHandler {
            retry_count,
            retry_wait_seconds,
            fallback,
            span: start,
        })
    }

    // ---- expressions ---------------------------------------------------------

    fn parse_expr(&mut self) -> ParseResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_and()?;
        while self.is_keyword("or") {
            let span = self.advance().span;
            let right = self.parse_and()?;
            left = Expr::Logical(Box::new(left), LogicalOp::Or, Box::new(right), span);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_comparison()?;
        while self.is_keyword("and") {
            let span = self.advance().span;
            let right = self.parse_comparison()?;
            left = Expr::Logical(Box::new(left), LogicalOp::And, Box::new(right), span);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> ParseResult<Expr> {
        let left = self.parse_additive()?;
        let span = self.current().span;

        let op = match self.current_keyword_text() {
            Some("is not empty") => Some((ComparisonOp::IsNotEmpty, false)),
            Some("is empty") => Some((ComparisonOp::IsEmpty, false)),
            Some("does not exist") => Some((ComparisonOp::DoesNotExist, false)),
            Some("exists") => Some((ComparisonOp::Exists, false)),
            Some("is not") => Some((ComparisonOp::IsNot, true)),
            Some("is above") => Some((ComparisonOp::IsAbove, true)),
            Some("is below") => Some((ComparisonOp::IsBelow, true)),
            Some("is at least") => Some((ComparisonOp::IsAtLeast, true)),
            Some("is at most") => Some((ComparisonOp::IsAtMost, true)),
            Some("is") => Some((ComparisonOp::Is, true)),
            Some("contains") => Some((ComparisonOp::Contains, true)),
            _ => None,
        };

        match op {
            Some((comparison_op, needs_right)) => {
                self.advance();
                let right = if needs_right {
                    Some(Box::new(self.parse_additive()?))
                } else {
                    None
                };
                Ok(Expr::Comparison(Box::new(left), comparison_op, right, span))
            }
            None => Ok(left),
        }
    }

    fn parse_additive(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current_keyword_text() {
                Some("plus") => Some(MathOp::Plus),
                Some("minus") => Some(MathOp::Minus),
                _ => None,
            };
            match op {
                Some(op) => {
                    let span = self.advance().span;
                    let right = self.parse_multiplicative()?;
                    left = Expr::Math(Box::new(left), op, Box::new(right), span);
                }
                None => break,
            }
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_primary()?;
        loop {
            if self.is_keyword("times") {
                let span = self.advance().span;
                let right = self.parse_primary()?;
                left = Expr::Math(Box::new(left), MathOp::Times, Box::new(right), span);
            } else if self.is_keyword("divided by") {
                let span = self.advance().span;
                let right = self.parse_primary()?;
                left = Expr::Math(Box::new(left), MathOp::DividedBy, Box::new(right), span);
            } else if self.is_keyword("rounded to") {
                let span = self.advance().span;
                let places_tok = self.expect_kind(TokenKind::Number, "a number of decimal places")?;
                let places: u32 = places_tok.text.parse().unwrap_or(0);
                if self.check_kind(TokenKind::Identifier) && self.current().text == "places" {
                    self.advance();
                }
                left = Expr::RoundedTo(Box::new(left), places, span);
            } else {
                break;
            }
        }
        Ok(left)
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let tok = self.current().clone();
        match tok.kind {
            TokenKind::String => {
                self.advance();
                Ok(Expr::StringLiteral(tok.text, tok.span))
            }
            TokenKind::StringPart => self.parse_interpolated_string(),
            TokenKind::Number => {
                self.advance();
                Ok(Expr::NumberLiteral(tok.text.parse().unwrap_or(0.0), tok.span))
            }
            TokenKind::Boolean => {
                self.advance();
                Ok(Expr::BooleanLiteral(tok.text == "true", tok.span))
            }
            TokenKind::Identifier => {
                self.advance();
                let mut expr = Expr::Identifier(tok.text, tok.span);
                while self.check_kind(TokenKind::Dot) {
                    self.advance();
                    let field = self.expect_kind(TokenKind::Identifier, "a field name")?;
                    expr = Expr::DotAccess(Box::new(expr), field.text, field.span);
                }
                Ok(expr)
            }
            TokenKind::Keyword if tok.text == "env" => {
                self.advance();
                let mut expr = Expr::Identifier(tok.text, tok.span);
                while self.check_kind(TokenKind::Dot) {
                    self.advance();
                    let field = self.expect_kind(TokenKind::Identifier, "a field name")?;
                    expr = Expr::DotAccess(Box::new(expr), field.text, field.span);
                }
                Ok(expr)
            }
            _ => Err(self.error_expected("an expression")),
        }
    }

    /// Parses a `StringPart (InterpolationStart expr InterpolationEnd StringPart)*`
    /// run emitted by the lexer for a single interpolated string literal.
    fn parse_interpolated_string(&mut self) -> ParseResult<Expr> {
        let start_span = self.current().span;
        let mut parts = Vec::new();

        let first = self.expect_kind(TokenKind::StringPart, "a string part")?;
        if !first.text.is_empty() || self.check_kind(TokenKind::InterpolationStart) {
            parts.push(StringPart::Literal(first.text));
        }

        while self.check_kind(TokenKind::InterpolationStart) {
            self.advance();
            let ident = self.expect_kind(TokenKind::Identifier, "a variable name")?;
            let mut expr = Expr::Identifier(ident.text, ident.span);
            while self.check_kind(TokenKind::Dot) {
                self.advance();
                let field = self.expect_kind(TokenKind::Identifier, "a field name")?;
                expr = Expr::DotAccess(Box::new(expr), field.text, field.span);
            }
            parts.push(StringPart::Expr(expr));
            self.expect_kind(TokenKind::InterpolationEnd, "`}`")?;

            let literal = self.expect_kind(TokenKind::StringPart, "a string part")?;
            if !literal.text.is_empty() {
                parts.push(StringPart::Literal(literal.text));
            }
        }

        Ok(Expr::InterpolatedString(parts, start_span))
    }
}

fn describe(tok: &Token) -> String {
    match tok.kind {
        TokenKind::Newline => "newline".to_string(),
        TokenKind::Indent => "indent".to_string(),
        TokenKind::Dedent => "dedent".to_string(),
        TokenKind::Eof => "end of file".to_string(),
        _ => tok.text.clone(),
    }
}

/// Parses a complete Flow program, emitting any diagnostics to `handler`.
pub fn parse(tokens: Vec<Token>, handler: &Handler) -> (Program, Vec<ParseError>) {
    tracing::debug!(tokens = tokens.len(), "parsing token stream");
    Parser::new(tokens, handler).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_lex::Lexer;

    fn parse_source(source: &str) -> (Program, Vec<ParseError>) {
        let handler = Handler::new();
        let tokens = Lexer::new(source).tokenize().expect("lex ok");
        Parser::new(tokens, &handler).parse()
    }

    #[test]
    fn parses_set_and_complete() {
        let (program, errors) = parse_source("workflow:\n    set x to 2 plus 3\n    complete with result x\n");
        assert!(errors.is_empty(), "{errors:?}");
        let workflow = program.workflow.expect("workflow block");
        assert_eq!(workflow.statements.len(), 2);
        assert!(matches!(workflow.statements[0], Stmt::Set(_)));
        assert!(matches!(workflow.statements[1], Stmt::Complete(_)));
    }

    #[test]
    fn parses_if_otherwise() {
        let source = "workflow:\n    if request.n is above 10:\n        complete with tier \"big\"\n    otherwise:\n        complete with tier \"small\"\n";
        let (program, errors) = parse_source(source);
        assert!(errors.is_empty(), "{errors:?}");
        let workflow = program.workflow.unwrap();
        let Stmt::If(if_stmt) = &workflow.statements[0] else {
            panic!("expected if statement");
        };
        assert!(if_stmt.else_body.is_some());
    }

    #[test]
    fn parses_for_each() {
        let source = "workflow:\n    set s to 0\n    for each item in request.xs:\n        set s to s plus item\n    complete with sum s\n";
        let (program, errors) = parse_source(source);
        assert!(errors.is_empty(), "{errors:?}");
        let workflow = program.workflow.unwrap();
        assert!(matches!(workflow.statements[1], Stmt::ForEach(_)));
    }

    #[test]
    fn parses_service_decl_and_call() {
        let source = "services:\n    Api is an API at \"https://x/\"\nworkflow:\n    get data using Api at \"/p\"\n        save the result as d\n    complete with got d.value\n";
        let (program, errors) = parse_source(source);
        assert!(errors.is_empty(), "{errors:?}");
        let services = program.services.unwrap();
        assert_eq!(services.declarations.len(), 1);
        assert_eq!(services.declarations[0].kind, ServiceType::Api);

        let workflow = program.workflow.unwrap();
        let Stmt::ServiceCall(call) = &workflow.statements[0] else {
            panic!("expected service call");
        };
        assert_eq!(call.verb, "get");
        assert_eq!(call.service, "Api");
        assert_eq!(call.result_var.as_deref(), Some("d"));
    }

    #[test]
    fn parses_retry_handler() {
        let source = "services:\n    Api is an API at \"https://x/\"\nworkflow:\n    get data using Api\n        on failure:\n            retry 3 times waiting 0 seconds\n            if still failing:\n                reject with \"down\"\n";
        let (program, errors) = parse_source(source);
        assert!(errors.is_empty(), "{errors:?}");
        let workflow = program.workflow.unwrap();
        let Stmt::ServiceCall(call) = &workflow.statements[0] else {
            panic!("expected service call");
        };
        let handler = call.error_handler.as_ref().unwrap();
        assert_eq!(handler.retry_count, 3);
        assert!(handler.fallback.is_some());
    }

    #[test]
    fn parses_ask_statement() {
        let source = "services:\n    Agent is an AI using \"gpt\"\nworkflow:\n    ask Agent to summarize the request\n        save the result as summary\n        save the confidence as conf\n";
        let (program, errors) = parse_source(source);
        assert!(errors.is_empty(), "{errors:?}");
        let workflow = program.workflow.unwrap();
        let Stmt::Ask(ask) = &workflow.statements[0] else {
            panic!("expected ask statement");
        };
        assert_eq!(ask.result_var.as_deref(), Some("summary"));
        assert_eq!(ask.confidence_var.as_deref(), Some("conf"));
    }

    #[test]
    fn parses_step_block_with_spaces_in_name() {
        let source = "workflow:\n    step Validate the order:\n        log \"ok\"\n";
        let (program, errors) = parse_source(source);
        assert!(errors.is_empty(), "{errors:?}");
        let workflow = program.workflow.unwrap();
        let Stmt::Step(step) = &workflow.statements[0] else {
            panic!("expected step");
        };
        assert_eq!(step.name, "Validate the order");
    }

    #[test]
    fn parses_interpolated_string_expression() {
        let source = "workflow:\n    log \"hi {name}!\"\n";
        let (program, errors) = parse_source(source);
        assert!(errors.is_empty(), "{errors:?}");
        let workflow = program.workflow.unwrap();
        let Stmt::Log(log) = &workflow.statements[0] else {
            panic!("expected log");
        };
        assert!(matches!(log.value, Expr::InterpolatedString(_, _)));
    }

    #[test]
    fn duplicate_block_is_reported_but_parsing_continues() {
        let source = "workflow:\n    log 1\nworkflow:\n    log 2\n";
        let (program, errors) = parse_source(source);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ParseError::DuplicateBlock { .. }));
        assert!(program.workflow.is_some());
    }

    #[test]
    fn config_block_parses_mixed_value_kinds() {
        let source = "config:\n    name: \"demo\"\n    timeout: 5 minutes\n    version: 2\n";
        let (program, errors) = parse_source(source);
        assert!(errors.is_empty(), "{errors:?}");
        let config = program.config.unwrap();
        assert_eq!(config.entries.len(), 3);
        assert!(matches!(config.entries[0].value, ConfigValue::String(_)));
        assert!(matches!(config.entries[1].value, ConfigValue::Text(_)));
        assert!(matches!(config.entries[2].value, ConfigValue::Number(_)));
    }

    #[test]
    fn precedence_math_binds_tighter_than_comparison() {
        let source = "workflow:\n    if 2 plus 3 is above 4:\n        log 1\n";
        let (program, errors) = parse_source(source);
        assert!(errors.is_empty(), "{errors:?}");
        let workflow = program.workflow.unwrap();
        let Stmt::If(if_stmt) = &workflow.statements[0] else {
            panic!("expected if");
        };
        assert!(matches!(if_stmt.condition, Expr::Comparison(_, ComparisonOp::IsAbove, _, _)));
    }

    #[test]
    fn unexpected_token_recovers_and_reports_all_errors() {
        let source = "workflow:\n    blah blah blah\n    log 1\n";
        let (program, errors) = parse_source(source);
        assert!(!errors.is_empty());
        let workflow = program.workflow.unwrap();
        assert!(workflow.statements.iter().any(|s| matches!(s, Stmt::Log(_))));
    }
}

//! Single-pass semantic analysis for Flow programs.
//!
//! Walks the AST once, maintaining a lexical scope chain to catch unbound
//! identifiers, and a handful of flat name tables to catch duplicate
//! declarations. Nothing here mutates the AST -- diagnostics are the only
//! output, reported through the shared [`Handler`].

pub mod scope;

use flow_par::ast::*;
use flow_util::diagnostic::{DiagnosticBuilder, DiagnosticCode, Handler};
use flow_util::suggest::suggest;
use flow_util::Span;
use scope::ScopeTree;
use std::collections::HashSet;

const KNOWN_CONFIG_KEYS: &[&str] = &["name", "version", "timeout", "description"];

pub struct Analyzer<'a> {
    handler: &'a Handler,
    scope: ScopeTree,
    service_names: Vec<String>,
    step_names: Vec<String>,
}

impl<'a> Analyzer<'a> {
    pub fn new(handler: &'a Handler) -> Self {
        Self {
            handler,
            scope: ScopeTree::new(),
            service_names: Vec::new(),
            step_names: Vec::new(),
        }
    }

    pub fn analyze(mut self, program: &Program) {
        if let Some(config) = &program.config {
            self.check_config(config);
        }
        if let Some(services) = &program.services {
            self.check_services(services);
        }
        if let Some(workflow) = &program.workflow {
            self.check_statements(&workflow.statements);
        }
    }

    // ---- config: -------------------------------------------------------------

    fn check_config(&mut self, config: &Config) {
        let mut seen = HashSet::new();
        for entry in &config.entries {
            if !seen.insert(entry.key.clone()) {
                self.emit_error(
                    entry.span,
                    format!("duplicate config key `{}`", entry.key),
                    DiagnosticCode::E_SEMANTIC_DUPLICATE_CONFIG_KEY,
                );
                continue;
            }
            if !KNOWN_CONFIG_KEYS.contains(&entry.key.as_str()) {
                let mut builder = DiagnosticBuilder::warning(format!("unknown config key `{}`", entry.key))
                    .span(entry.span)
                    .code(DiagnosticCode::W_UNKNOWN_CONFIG_KEY);
                if let Some(candidate) = suggest(&entry.key, KNOWN_CONFIG_KEYS) {
                    builder = builder.suggestion(candidate);
                }
                builder.emit(self.handler);
            }
        }
    }

    // ---- services: -------------------------------------------------------------

    fn check_services(&mut self, services: &Services) {
        let mut seen = HashSet::new();
        for decl in &services.declarations {
            if !seen.insert(decl.name.clone()) {
                self.emit_error(
                    decl.span,
                    format!("duplicate service name `{}`", decl.name),
                    DiagnosticCode::E_SEMANTIC_DUPLICATE_SERVICE_NAME,
                );
            } else {
                self.service_names.push(decl.name.clone());
            }

            if decl.kind != ServiceType::Api && !decl.headers.is_empty() {
                DiagnosticBuilder::warning(format!("headers on `{}` are ignored (only API services send them)", decl.name))
                    .span(decl.span)
                    .code(DiagnosticCode::W_HEADER_IGNORED_FOR_SERVICE)
                    .emit(self.handler);
            }

            let mut seen_headers = HashSet::new();
            for (header_name, value) in &decl.headers {
                if !seen_headers.insert(header_name.clone()) {
                    DiagnosticBuilder::warning(format!("duplicate header `{}` on service `{}` (last value wins)", header_name, decl.name))
                        .span(decl.span)
                        .code(DiagnosticCode::W_DUPLICATE_HEADER)
                        .emit(self.handler);
                }
                self.resolve_expr(value, false);
            }
        }
    }

    // ---- workflow: -------------------------------------------------------------

    fn check_statements(&mut self, statements: &[Stmt]) {
        for stmt in statements {
            self.check_statement(stmt);
        }
    }

    fn check_statement(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Set(set) => {
                self.resolve_expr(&set.value, false);
                self.scope.bind(&set.name);
            }
            Stmt::If(if_stmt) => {
                self.resolve_expr(&if_stmt.condition, false);
                self.check_statements(&if_stmt.then_body);
                for (cond, body) in &if_stmt.else_ifs {
                    self.resolve_expr(cond, false);
                    self.check_statements(body);
                }
                if let Some(body) = &if_stmt.else_body {
                    self.check_statements(body);
                }
            }
            Stmt::ForEach(for_each) => {
                self.resolve_expr(&for_each.collection, false);
                self.scope.push_scope();
                self.scope.bind(&for_each.item_name);
                self.check_statements(&for_each.body);
                self.scope.pop_scope();
            }
            Stmt::Log(log) => {
                self.resolve_expr(&log.value, false);
            }
            Stmt::Complete(complete) => {
                for (_, value) in &complete.outputs {
                    self.resolve_expr(value, false);
                }
            }
            Stmt::Reject(reject) => {
                self.resolve_expr(&reject.message, false);
            }
            Stmt::Step(step) => {
                if self.step_names.contains(&step.name) {
                    self.emit_error(
                        step.span,
                        format!("duplicate step name `{}`", step.name),
                        DiagnosticCode::E_SEMANTIC_DUPLICATE_STEP_NAME,
                    );
                } else {
                    self.step_names.push(step.name.clone());
                }
                self.check_statements(&step.body);
            }
            Stmt::ServiceCall(call) => {
                self.check_service_reference(&call.service, call.span);
                if let Some(path) = &call.path {
                    self.resolve_expr(path, false);
                }
                for (_, value) in &call.parameters {
                    self.resolve_expr(value, false);
                }
                if let Some(name) = &call.result_var {
                    self.scope.bind(name);
                }
                if let Some(name) = &call.status_var {
                    self.scope.bind(name);
                }
                if let Some(name) = &call.headers_var {
                    self.scope.bind(name);
                }
                if let Some(handler) = &call.error_handler {
                    if let Some(fallback) = &handler.fallback {
                        self.check_statements(fallback);
                    }
                }
            }
            Stmt::Ask(ask) => {
                self.check_service_reference(&ask.agent, ask.span);
                if let Some(name) = &ask.result_var {
                    self.scope.bind(name);
                }
                if let Some(name) = &ask.confidence_var {
                    self.scope.bind(name);
                }
            }
        }
    }

    fn check_service_reference(&mut self, name: &str, span: Span) {
        if self.service_names.iter().any(|s| s == name) {
            return;
        }
        let candidates: Vec<&str> = self.service_names.iter().map(String::as_str).collect();
        let mut builder = DiagnosticBuilder::error(format!("unknown service `{}`", name))
            .span(span)
            .code(DiagnosticCode::E_SEMANTIC_UNKNOWN_SERVICE);
        if let Some(candidate) = suggest(name, &candidates) {
            builder = builder.suggestion(candidate);
        }
        builder.emit(self.handler);
    }

    /// Resolves identifiers inside `expr`. `in_dot_chain` is true while
    /// descending into the base of a `DotAccess`: the eventual root is never
    /// checked, since trigger and service payload shapes are not known
    /// statically and flagging them would just produce noise.
    fn resolve_expr(&mut self, expr: &Expr, in_dot_chain: bool) {
        match expr {
            Expr::StringLiteral(_, _) | Expr::NumberLiteral(_, _) | Expr::BooleanLiteral(_, _) => {}
            Expr::Identifier(name, span) => {
                if !in_dot_chain && !self.scope.is_bound(name) {
                    let candidates = self.scope.visible_names();
                    let mut builder = DiagnosticBuilder::error(format!("unbound identifier `{}`", name))
                        .span(*span)
                        .code(DiagnosticCode::E_SEMANTIC_UNBOUND_IDENTIFIER);
                    if let Some(candidate) = suggest(name, &candidates) {
                        builder = builder.suggestion(candidate);
                    }
                    builder.emit(self.handler);
                }
            }
            Expr::DotAccess(base, _, _) => {
                self.resolve_expr(base, true);
            }
            Expr::InterpolatedString(parts, _) => {
                for part in parts {
                    if let StringPart::Expr(e) = part {
                        self.resolve_expr(e, false);
                    }
                }
            }
            Expr::Math(lhs, _, rhs, _) => {
                self.resolve_expr(lhs, false);
                self.resolve_expr(rhs, false);
            }
            Expr::RoundedTo(inner, _, _) => {
                self.resolve_expr(inner, false);
            }
            Expr::Comparison(lhs, _, rhs, _) => {
                self.resolve_expr(lhs, false);
                if let Some(rhs) = rhs {
                    self.resolve_expr(rhs, false);
                }
            }
            Expr::Logical(lhs, _, rhs, _) => {
                self.resolve_expr(lhs, false);
                self.resolve_expr(rhs, false);
            }
        }
    }

    fn emit_error(&self, span: Span, message: String, code: DiagnosticCode) {
        DiagnosticBuilder::error(message).span(span).code(code).emit(self.handler);
    }
}

/// Analyzes a parsed program, emitting diagnostics to `handler`.
pub fn analyze(program: &Program, handler: &Handler) {
    tracing::debug!("analyzing program");
    Analyzer::new(handler).analyze(program)
}

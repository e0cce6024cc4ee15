//! The tree-walking evaluator.
//!
//! Single-threaded and sequential within one workflow execution, as
//! required: the only suspension points are service/AI dispatch and retry
//! waits, and both go through the injected [`Clock`] so tests can run them
//! without actually waiting.

use crate::clock::{Clock, SystemClock};
use crate::connector::ConnectorRegistry;
use crate::environment::Environment;
use crate::error::{RuntimeError, RuntimeResult};
use crate::outcome::Outcome;
use crate::value::Value;
use flow_par::ast::*;
use indexmap::IndexMap;
use std::time::{Duration, Instant};

/// Whether statement execution should keep going or the workflow has hit a
/// terminal statement (`complete`/`reject`, or a non-retryable service
/// failure whose fallback itself terminated).
enum Flow {
    Continue,
    Terminate(Outcome),
}

struct Interpreter<'a> {
    env: Environment,
    connectors: &'a dyn ConnectorRegistry,
    clock: &'a dyn Clock,
    deadline: Option<Instant>,
}

/// Runs a parsed program to completion against a trigger payload, using
/// the system clock for any retry waits.
pub fn run(
    program: &Program,
    trigger: Value,
    env_map: IndexMap<String, String>,
    connectors: &dyn ConnectorRegistry,
) -> Outcome {
    run_with_clock(program, trigger, env_map, connectors, &SystemClock)
}

/// Same as [`run`], but with an injectable clock -- used by tests that
/// exercise retry waits and deadlines without actually waiting.
pub fn run_with_clock(
    program: &Program,
    trigger: Value,
    env_map: IndexMap<String, String>,
    connectors: &dyn ConnectorRegistry,
    clock: &dyn Clock,
) -> Outcome {
    let mut env = Environment::new();

    let env_record = Value::Record(env_map.into_iter().map(|(k, v)| (k, Value::Text(v))).collect());
    env.bind_root("env", env_record);

    // The trigger payload is bound to `request` (unwrapping a top-level
    // `request` key if the caller already nested it there, the convention
    // every example follows), and its top-level keys are also flattened
    // into the root scope so dot-access works whichever way a workflow
    // happens to reach for the data.
    let payload_fields = match &trigger {
        Value::Record(fields) => fields.clone(),
        _ => IndexMap::new(),
    };
    let request_value = payload_fields.get("request").cloned().unwrap_or_else(|| trigger.clone());
    env.bind_root("request", request_value);
    for (key, value) in payload_fields {
        env.bind_root(key, value);
    }

    let deadline = parse_timeout(program.config.as_ref()).map(|timeout| clock.now() + timeout);

    let mut interpreter = Interpreter {
        env,
        connectors,
        clock,
        deadline,
    };

    let Some(workflow) = &program.workflow else {
        return Outcome::Completed { outputs: Vec::new() };
    };

    match interpreter.exec_statements(&workflow.statements) {
        Ok(Flow::Terminate(outcome)) => outcome,
        Ok(Flow::Continue) => Outcome::Completed { outputs: Vec::new() },
        Err(e) => Outcome::Error {
            message: e.to_string(),
            location: None,
        },
    }
}

impl<'a> Interpreter<'a> {
    fn check_deadline(&self) -> RuntimeResult<()> {
        if let Some(deadline) = self.deadline {
            if self.clock.now() >= deadline {
                return Err(RuntimeError::DeadlineExceeded);
            }
        }
        Ok(())
    }

    fn exec_statements(&mut self, statements: &[Stmt]) -> RuntimeResult<Flow> {
        for stmt in statements {
            match self.exec_statement(stmt)? {
                Flow::Continue => continue,
                Flow::Terminate(outcome) => return Ok(Flow::Terminate(outcome)),
            }
        }
        Ok(Flow::Continue)
    }

    fn exec_statement(&mut self, stmt: &Stmt) -> RuntimeResult<Flow> {
        match stmt {
            Stmt::Set(set) => {
                let value = self.eval_expr(&set.value)?;
                self.env.set(&set.name, value);
                Ok(Flow::Continue)
            }
            Stmt::If(if_stmt) => self.exec_if(if_stmt),
            Stmt::ForEach(for_each) => self.exec_for_each(for_each),
            Stmt::Log(log) => {
                let value = self.eval_expr(&log.value)?;
                tracing::info!(message = %value.stringify(), "log");
                Ok(Flow::Continue)
            }
            Stmt::Complete(complete) => {
                let mut outputs = Vec::with_capacity(complete.outputs.len());
                for (name, expr) in &complete.outputs {
                    outputs.push((name.clone(), self.eval_expr(expr)?));
                }
                Ok(Flow::Terminate(Outcome::Completed { outputs }))
            }
            Stmt::Reject(reject) => {
                let value = self.eval_expr(&reject.message)?;
                Ok(Flow::Terminate(Outcome::Rejected {
                    message: value.stringify(),
                }))
            }
            Stmt::Step(step) => {
                tracing::debug!(step = %step.name, "entering step");
                self.exec_statements(&step.body)
            }
            Stmt::ServiceCall(call) => self.exec_service_call(call),
            Stmt::Ask(ask) => self.exec_ask(ask),
        }
    }

    fn exec_if(&mut self, if_stmt: &IfStatement) -> RuntimeResult<Flow> {
        if self.eval_expr(&if_stmt.condition)?.is_truthy() {
            return self.exec_statements(&if_stmt.then_body);
        }
        for (condition, body) in &if_stmt.else_ifs {
            if self.eval_expr(condition)?.is_truthy() {
                return self.exec_statements(body);
            }
        }
        if let Some(body) = &if_stmt.else_body {
            return self.exec_statements(body);
        }
        Ok(Flow::Continue)
    }

    fn exec_for_each(&mut self, for_each: &ForEachStatement) -> RuntimeResult<Flow> {
        let collection = self.eval_expr(&for_each.collection)?;
        let items = match collection {
            Value::List(items) => items,
            other => {
                return Err(RuntimeError::NotAList {
                    found: type_name(&other).to_string(),
                })
            }
        };

        for item in items {
            self.env.push_scope();
            self.env.set(&for_each.item_name, item);
            let result = self.exec_statements(&for_each.body);
            self.env.pop_scope();
            match result? {
                Flow::Continue => {}
                Flow::Terminate(outcome) => return Ok(Flow::Terminate(outcome)),
            }
        }
        Ok(Flow::Continue)
    }

    fn exec_service_call(&mut self, call: &ServiceCall) -> RuntimeResult<Flow> {
        self.check_deadline()?;
        if !self.connectors.has_service(&call.service) {
            return Err(RuntimeError::UnknownConnector {
                service: call.service.clone(),
            });
        }

        let mut parameters = IndexMap::new();
        for (name, expr) in &call.parameters {
            parameters.insert(name.clone(), self.eval_expr(expr)?);
        }
        let path_value = call.path.as_ref().map(|p| self.eval_expr(p)).transpose()?;

        let retry_count = call.error_handler.as_ref().map_or(0, |h| h.retry_count);
        let wait = call
            .error_handler
            .as_ref()
            .map_or(Duration::ZERO, |h| Duration::from_secs_f64(h.retry_wait_seconds.max(0.0)));

        let mut attempt = 0u32;
        let response = loop {
            tracing::debug!(service = %call.service, verb = %call.verb, attempt, "dispatching service call");
            match self
                .connectors
                .invoke(&call.service, &call.verb, &call.description, &parameters, path_value.as_ref())
            {
                Ok(response) => break Ok(response),
                Err(service_error) => {
                    if attempt < retry_count {
                        self.check_deadline()?;
                        tracing::debug!(service = %call.service, attempt, "retrying after failure");
                        self.clock.sleep(wait);
                        attempt += 1;
                        continue;
                    }
                    break Err(service_error);
                }
            }
        };

        match response {
            Ok(response) => {
                if let Some(name) = &call.result_var {
                    self.env.set(name, response.get_field("result").unwrap_or(Value::Empty));
                }
                if let Some(name) = &call.status_var {
                    self.env.set(name, response.get_field("status").unwrap_or(Value::Empty));
                }
                if let Some(name) = &call.headers_var {
                    self.env.set(name, response.get_field("headers").unwrap_or(Value::Empty));
                }
                Ok(Flow::Continue)
            }
            Err(service_error) => {
                if let Some(handler) = &call.error_handler {
                    if let Some(fallback) = &handler.fallback {
                        return self.exec_statements(fallback);
                    }
                }
                Err(RuntimeError::ServiceFailed {
                    service: call.service.clone(),
                    message: service_error.message,
                })
            }
        }
    }

    fn exec_ask(&mut self, ask: &AskStatement) -> RuntimeResult<Flow> {
        self.check_deadline()?;
        if !self.connectors.has_service(&ask.agent) {
            return Err(RuntimeError::UnknownConnector {
                service: ask.agent.clone(),
            });
        }

        let context = self.env.get("request").unwrap_or(Value::Empty);
        tracing::debug!(agent = %ask.agent, "dispatching ask");
        match self.connectors.ask_ai(&ask.agent, &ask.instruction, &context) {
            Ok(response) => {
                if let Some(name) = &ask.result_var {
                    self.env.set(name, response.get_field("result").unwrap_or(Value::Empty));
                }
                if let Some(name) = &ask.confidence_var {
                    self.env
                        .set(name, response.get_field("confidence").unwrap_or(Value::Empty));
                }
                Ok(Flow::Continue)
            }
            Err(service_error) => Err(RuntimeError::ServiceFailed {
                service: ask.agent.clone(),
                message: service_error.message,
            }),
        }
    }

    fn eval_expr(&self, expr: &Expr) -> RuntimeResult<Value> {
        match expr {
            Expr::StringLiteral(s, _) => Ok(Value::Text(s.clone())),
            Expr::NumberLiteral(n, _) => Ok(Value::Number(*n)),
            Expr::BooleanLiteral(b, _) => Ok(Value::Boolean(*b)),
            Expr::Identifier(name, _) => self
                .env
                .get(name)
                .ok_or_else(|| RuntimeError::UnboundIdentifier { name: name.clone() }),
            Expr::DotAccess(base, field, _) => {
                let base_value = self.eval_expr(base)?;
                base_value.get_field(field).ok_or_else(|| RuntimeError::TypeMismatch {
                    message: format!("cannot access field `{}` on {}", field, type_name(&base_value)),
                })
            }
            Expr::InterpolatedString(parts, _) => {
                let mut rendered = String::new();
                for part in parts {
                    match part {
                        StringPart::Literal(text) => rendered.push_str(text),
                        StringPart::Expr(e) => rendered.push_str(&self.eval_expr(e)?.stringify()),
                    }
                }
                Ok(Value::Text(rendered))
            }
            Expr::Math(lhs, op, rhs, _) => self.eval_math(lhs, *op, rhs),
            Expr::RoundedTo(inner, places, _) => {
                let n = self.expect_number(&self.eval_expr(inner)?)?;
                Ok(Value::Number(round_half_away_from_zero(n, *places)))
            }
            Expr::Comparison(lhs, op, rhs, _) => self.eval_comparison(lhs, *op, rhs.as_deref()),
            Expr::Logical(lhs, op, rhs, _) => self.eval_logical(lhs, *op, rhs),
        }
    }

    fn eval_math(&self, lhs: &Expr, op: MathOp, rhs: &Expr) -> RuntimeResult<Value> {
        let left = self.eval_expr(lhs)?;
        let right = self.eval_expr(rhs)?;
        match op {
            MathOp::Plus => {
                if matches!(left, Value::Text(_)) || matches!(right, Value::Text(_)) {
                    Ok(Value::Text(format!("{}{}", left.stringify(), right.stringify())))
                } else {
                    Ok(Value::Number(self.expect_number(&left)? + self.expect_number(&right)?))
                }
            }
            MathOp::Minus => Ok(Value::Number(self.expect_number(&left)? - self.expect_number(&right)?)),
            MathOp::Times => Ok(Value::Number(self.expect_number(&left)? * self.expect_number(&right)?)),
            MathOp::DividedBy => {
                let divisor = self.expect_number(&right)?;
                if divisor == 0.0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                Ok(Value::Number(self.expect_number(&left)? / divisor))
            }
        }
    }

    fn eval_comparison(&self, lhs: &Expr, op: ComparisonOp, rhs: Option<&Expr>) -> RuntimeResult<Value> {
        let left = self.eval_expr(lhs)?;
        match op {
            ComparisonOp::IsEmpty | ComparisonOp::DoesNotExist => Ok(Value::Boolean(left.is_emptyish())),
            ComparisonOp::Exists | ComparisonOp::IsNotEmpty => Ok(Value::Boolean(!left.is_emptyish())),
            ComparisonOp::Is => Ok(Value::Boolean(left == self.eval_expr(rhs_of(rhs))?)),
            ComparisonOp::IsNot => Ok(Value::Boolean(left != self.eval_expr(rhs_of(rhs))?)),
            ComparisonOp::IsAbove => {
                let right = self.eval_expr(rhs_of(rhs))?;
                Ok(Value::Boolean(self.expect_number(&left)? > self.expect_number(&right)?))
            }
            ComparisonOp::IsBelow => {
                let right = self.eval_expr(rhs_of(rhs))?;
                Ok(Value::Boolean(self.expect_number(&left)? < self.expect_number(&right)?))
            }
            ComparisonOp::IsAtLeast => {
                let right = self.eval_expr(rhs_of(rhs))?;
                Ok(Value::Boolean(self.expect_number(&left)? >= self.expect_number(&right)?))
            }
            ComparisonOp::IsAtMost => {
                let right = self.eval_expr(rhs_of(rhs))?;
                Ok(Value::Boolean(self.expect_number(&left)? <= self.expect_number(&right)?))
            }
            ComparisonOp::Contains => {
                let right = self.eval_expr(rhs_of(rhs))?;
                match &left {
                    Value::Text(s) => Ok(Value::Boolean(s.contains(&right.stringify()))),
                    Value::List(items) => Ok(Value::Boolean(items.contains(&right))),
                    other => Err(RuntimeError::TypeMismatch {
                        message: format!("`contains` is not supported on {}", type_name(other)),
                    }),
                }
            }
        }
    }

    fn eval_logical(&self, lhs: &Expr, op: LogicalOp, rhs: &Expr) -> RuntimeResult<Value> {
        let left = self.eval_expr(lhs)?;
        match op {
            LogicalOp::And => {
                if !left.is_truthy() {
                    return Ok(left);
                }
                self.eval_expr(rhs)
            }
            LogicalOp::Or => {
                if left.is_truthy() {
                    return Ok(left);
                }
                self.eval_expr(rhs)
            }
        }
    }

    fn expect_number(&self, value: &Value) -> RuntimeResult<f64> {
        match value {
            Value::Number(n) => Ok(*n),
            other => Err(RuntimeError::TypeMismatch {
                message: format!("expected a number, found {}", type_name(other)),
            }),
        }
    }
}

/// Binary comparisons are only ever constructed by the parser with a
/// right-hand side; the unary ones (`is empty`, `exists`, ...) are matched
/// before this is called.
fn rhs_of(rhs: Option<&Expr>) -> &Expr {
    rhs.expect("binary comparison operator always carries a right-hand expression")
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Text(_) => "text",
        Value::Number(_) => "number",
        Value::Boolean(_) => "boolean",
        Value::List(_) => "list",
        Value::Record(_) => "record",
        Value::Empty => "empty",
    }
}

fn round_half_away_from_zero(n: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (n * factor).round() / factor
}

fn parse_timeout(config: Option<&Config>) -> Option<Duration> {
    let config = config?;
    let entry = config.entries.iter().find(|e| e.key == "timeout")?;
    match &entry.value {
        ConfigValue::Number(n) => Some(Duration::from_secs_f64(n.max(0.0))),
        ConfigValue::Text(text) => parse_duration_text(text),
        ConfigValue::String(text) => parse_duration_text(text),
    }
}

fn parse_duration_text(text: &str) -> Option<Duration> {
    let mut words = text.split_whitespace();
    let amount: f64 = words.next()?.parse().ok()?;
    let unit = words.next().unwrap_or("seconds").to_ascii_lowercase();
    let seconds = match unit.trim_end_matches('s') {
        "second" | "sec" => amount,
        "minute" | "min" => amount * 60.0,
        "hour" => amount * 3600.0,
        _ => amount,
    };
    Some(Duration::from_secs_f64(seconds.max(0.0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::connector::ServiceError;
    use std::cell::RefCell;

    struct StubConnector {
        known: Vec<&'static str>,
        responses: RefCell<Vec<Result<Value, ServiceError>>>,
        invocations: RefCell<u32>,
    }

    impl ConnectorRegistry for StubConnector {
        fn invoke(
            &self,
            _service: &str,
            _verb: &str,
            _description: &str,
            _parameters: &IndexMap<String, Value>,
            _path: Option<&Value>,
        ) -> crate::connector::ServiceResult {
            *self.invocations.borrow_mut() += 1;
            self.responses
                .borrow_mut()
                .pop()
                .unwrap_or_else(|| Err(ServiceError::new("no more stubbed responses", false)))
        }

        fn ask_ai(&self, _agent: &str, _instruction: &str, _context: &Value) -> crate::connector::ServiceResult {
            Ok(Value::record([
                ("result".to_string(), Value::Text("ok".to_string())),
                ("confidence".to_string(), Value::Number(0.9)),
            ]))
        }

        fn has_service(&self, service: &str) -> bool {
            self.known.contains(&service)
        }
    }

    fn parse(source: &str) -> Program {
        let handler = flow_util::diagnostic::Handler::new_panicking();
        let tokens = flow_lex::Lexer::new(source).tokenize().expect("lex ok");
        let (program, errors) = flow_par::Parser::new(tokens, &handler).parse();
        assert!(errors.is_empty(), "{errors:?}");
        program
    }

    #[test]
    fn set_and_complete_produces_completed_outcome() {
        let program = parse("workflow:\n    set x to 2 plus 3\n    complete with result x\n");
        let connectors = StubConnector {
            known: vec![],
            responses: RefCell::new(vec![]),
            invocations: RefCell::new(0),
        };
        let outcome = run(&program, Value::record([]), IndexMap::new(), &connectors);
        assert_eq!(
            outcome,
            Outcome::Completed {
                outputs: vec![("result".to_string(), Value::Number(5.0))]
            }
        );
    }

    #[test]
    fn if_otherwise_branches_on_trigger_data() {
        let program = parse(
            "workflow:\n    if request.n is above 10:\n        complete with tier \"big\"\n    otherwise:\n        complete with tier \"small\"\n",
        );
        let connectors = StubConnector {
            known: vec![],
            responses: RefCell::new(vec![]),
            invocations: RefCell::new(0),
        };

        let big_trigger = Value::record([(
            "request".to_string(),
            Value::record([("n".to_string(), Value::Number(42.0))]),
        )]);
        let outcome = run(&program, big_trigger, IndexMap::new(), &connectors);
        assert_eq!(
            outcome,
            Outcome::Completed {
                outputs: vec![("tier".to_string(), Value::Text("big".to_string()))]
            }
        );

        let small_trigger = Value::record([(
            "request".to_string(),
            Value::record([("n".to_string(), Value::Number(3.0))]),
        )]);
        let outcome = run(&program, small_trigger, IndexMap::new(), &connectors);
        assert_eq!(
            outcome,
            Outcome::Completed {
                outputs: vec![("tier".to_string(), Value::Text("small".to_string()))]
            }
        );
    }

    #[test]
    fn for_each_accumulates_over_a_list() {
        let program = parse(
            "workflow:\n    set s to 0\n    for each item in request.xs:\n        set s to s plus item\n    complete with sum s\n",
        );
        let connectors = StubConnector {
            known: vec![],
            responses: RefCell::new(vec![]),
            invocations: RefCell::new(0),
        };
        let trigger = Value::record([(
            "request".to_string(),
            Value::record([(
                "xs".to_string(),
                Value::List(vec![
                    Value::Number(1.0),
                    Value::Number(2.0),
                    Value::Number(3.0),
                    Value::Number(4.0),
                ]),
            )]),
        )]);
        let outcome = run(&program, trigger, IndexMap::new(), &connectors);
        assert_eq!(
            outcome,
            Outcome::Completed {
                outputs: vec![("sum".to_string(), Value::Number(10.0))]
            }
        );
    }

    #[test]
    fn service_call_binds_result_field() {
        let program = parse(
            "services:\n    Api is an API at \"https://x/\"\nworkflow:\n    get data using Api at \"/p\"\n        save the result as d\n    complete with got d.value\n",
        );
        let connectors = StubConnector {
            known: vec!["Api"],
            responses: RefCell::new(vec![Ok(Value::record([
                (
                    "result".to_string(),
                    Value::record([("value".to_string(), Value::Text("ok".to_string()))]),
                ),
                ("status".to_string(), Value::Number(200.0)),
            ]))]),
            invocations: RefCell::new(0),
        };
        let outcome = run(&program, Value::record([]), IndexMap::new(), &connectors);
        assert_eq!(
            outcome,
            Outcome::Completed {
                outputs: vec![("got".to_string(), Value::Text("ok".to_string()))]
            }
        );
    }

    #[test]
    fn retry_succeeds_after_two_failures_with_exactly_three_invocations() {
        let program = parse(
            "services:\n    Api is an API at \"https://x/\"\nworkflow:\n    get data using Api\n        on failure:\n            retry 3 times waiting 0 seconds\n    complete with ok true\n",
        );
        let connectors = StubConnector {
            known: vec!["Api"],
            responses: RefCell::new(vec![
                Ok(Value::record([("result".to_string(), Value::Empty)])),
                Err(ServiceError::new("boom", true)),
                Err(ServiceError::new("boom", true)),
            ]),
            invocations: RefCell::new(0),
        };
        let clock = ManualClock::new();
        let outcome = run_with_clock(&program, Value::record([]), IndexMap::new(), &connectors, &clock);
        assert_eq!(*connectors.invocations.borrow(), 3);
        assert_eq!(
            outcome,
            Outcome::Completed {
                outputs: vec![("ok".to_string(), Value::Boolean(true))]
            }
        );
    }

    #[test]
    fn reject_produces_rejected_outcome() {
        let program = parse("workflow:\n    reject with \"bad\"\n");
        let connectors = StubConnector {
            known: vec![],
            responses: RefCell::new(vec![]),
            invocations: RefCell::new(0),
        };
        let outcome = run(&program, Value::record([]), IndexMap::new(), &connectors);
        assert_eq!(
            outcome,
            Outcome::Rejected {
                message: "bad".to_string()
            }
        );
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        let program = parse("workflow:\n    set x to 1 divided by 0\n    complete with x x\n");
        let connectors = StubConnector {
            known: vec![],
            responses: RefCell::new(vec![]),
            invocations: RefCell::new(0),
        };
        let outcome = run(&program, Value::record([]), IndexMap::new(), &connectors);
        assert!(matches!(outcome, Outcome::Error { .. }));
    }

    #[test]
    fn missing_field_access_yields_empty_not_an_error() {
        let program = parse("workflow:\n    log request.missing\n    complete with ok true\n");
        let connectors = StubConnector {
            known: vec![],
            responses: RefCell::new(vec![]),
            invocations: RefCell::new(0),
        };
        let trigger = Value::record([("request".to_string(), Value::record([]))]);
        let outcome = run(&program, trigger, IndexMap::new(), &connectors);
        assert_eq!(
            outcome,
            Outcome::Completed {
                outputs: vec![("ok".to_string(), Value::Boolean(true))]
            }
        );
    }

    #[test]
    fn deadline_exceeded_terminates_with_error_outcome() {
        let program = parse(
            "config:\n    timeout: 1 seconds\nservices:\n    Api is an API at \"https://x/\"\nworkflow:\n    get data using Api\n",
        );
        let connectors = StubConnector {
            known: vec!["Api"],
            responses: RefCell::new(vec![]),
            invocations: RefCell::new(0),
        };
        let clock = ManualClock::new();
        clock.advance(Duration::from_secs(5));
        let outcome = run_with_clock(&program, Value::record([]), IndexMap::new(), &connectors, &clock);
        assert!(matches!(outcome, Outcome::Error { .. }));
    }
}

use flow_drv::{run_source, RunOptions};
use flow_runtime::{ConnectorRegistry, Outcome, ServiceError, ServiceResult, Value};
use indexmap::IndexMap;
use std::cell::RefCell;

/// A connector registry a test configures by hand: which services it
/// knows about, and the canned responses `invoke` hands back in order.
struct MockConnectorRegistry {
    known_services: Vec<&'static str>,
    responses: RefCell<Vec<ServiceResult>>,
    invocation_count: RefCell<u32>,
}

impl MockConnectorRegistry {
    fn new(known_services: Vec<&'static str>, responses: Vec<ServiceResult>) -> Self {
        Self {
            known_services,
            responses: RefCell::new(responses),
            invocation_count: RefCell::new(0),
        }
    }

    fn empty() -> Self {
        Self::new(vec![], vec![])
    }
}

impl ConnectorRegistry for MockConnectorRegistry {
    fn invoke(
        &self,
        _service: &str,
        _verb: &str,
        _description: &str,
        _parameters: &IndexMap<String, Value>,
        _path: Option<&Value>,
    ) -> ServiceResult {
        *self.invocation_count.borrow_mut() += 1;
        self.responses
            .borrow_mut()
            .pop()
            .unwrap_or_else(|| Err(ServiceError::new("no more stubbed responses", false)))
    }

    fn ask_ai(&self, _agent: &str, _instruction: &str, _context: &Value) -> ServiceResult {
        Err(ServiceError::new("not stubbed", false))
    }

    fn has_service(&self, service: &str) -> bool {
        self.known_services.contains(&service)
    }
}

fn trigger(entries: impl IntoIterator<Item = (String, Value)>) -> Value {
    Value::record(entries)
}

#[test]
fn scenario_1_arithmetic_completes_with_computed_output() {
    let connectors = MockConnectorRegistry::empty();
    let report = run_source(
        "workflow:\n    set x to 2 plus 3\n    complete with result x\n",
        RunOptions::default(),
        &connectors,
    )
    .expect("pipeline runs");
    assert!(!report.has_errors());
    assert_eq!(
        report.outcome,
        Some(Outcome::Completed {
            outputs: vec![("result".to_string(), Value::Number(5.0))]
        })
    );
}

#[test]
fn scenario_2_if_otherwise_branches_on_trigger_data() {
    let source = "workflow:\n    if request.n is above 10:\n        complete with tier \"big\"\n    otherwise:\n        complete with tier \"small\"\n";

    let connectors = MockConnectorRegistry::empty();
    let big = run_source(
        source,
        RunOptions {
            env: IndexMap::new(),
            trigger: trigger([("request".to_string(), trigger([("n".to_string(), Value::Number(42.0))]))]),
        },
        &connectors,
    )
    .expect("pipeline runs");
    assert_eq!(
        big.outcome,
        Some(Outcome::Completed {
            outputs: vec![("tier".to_string(), Value::Text("big".to_string()))]
        })
    );

    let small = run_source(
        source,
        RunOptions {
            env: IndexMap::new(),
            trigger: trigger([("request".to_string(), trigger([("n".to_string(), Value::Number(3.0))]))]),
        },
        &connectors,
    )
    .expect("pipeline runs");
    assert_eq!(
        small.outcome,
        Some(Outcome::Completed {
            outputs: vec![("tier".to_string(), Value::Text("small".to_string()))]
        })
    );
}

#[test]
fn scenario_3_for_each_accumulates_a_sum() {
    let connectors = MockConnectorRegistry::empty();
    let report = run_source(
        "workflow:\n    set s to 0\n    for each item in request.xs:\n        set s to s plus item\n    complete with sum s\n",
        RunOptions {
            env: IndexMap::new(),
            trigger: trigger([(
                "request".to_string(),
                trigger([(
                    "xs".to_string(),
                    Value::List(vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0), Value::Number(4.0)]),
                )]),
            )]),
        },
        &connectors,
    )
    .expect("pipeline runs");
    assert_eq!(
        report.outcome,
        Some(Outcome::Completed {
            outputs: vec![("sum".to_string(), Value::Number(10.0))]
        })
    );
}

#[test]
fn scenario_4_service_call_binds_nested_result_field() {
    let connectors = MockConnectorRegistry::new(
        vec!["Api"],
        vec![Ok(Value::record([
            (
                "result".to_string(),
                Value::record([("value".to_string(), Value::Text("ok".to_string()))]),
            ),
            ("status".to_string(), Value::Number(200.0)),
        ]))],
    );
    let report = run_source(
        "services:\n    Api is an API at \"https://x/\"\nworkflow:\n    get data using Api at \"/p\"\n        save the result as d\n    complete with got d.value\n",
        RunOptions::default(),
        &connectors,
    )
    .expect("pipeline runs");
    assert_eq!(
        report.outcome,
        Some(Outcome::Completed {
            outputs: vec![("got".to_string(), Value::Text("ok".to_string()))]
        })
    );
}

#[test]
fn scenario_5_retry_succeeds_on_third_attempt() {
    let connectors = MockConnectorRegistry::new(
        vec!["Api"],
        vec![
            Ok(Value::record([("result".to_string(), Value::Empty)])),
            Err(ServiceError::new("transient failure", true)),
            Err(ServiceError::new("transient failure", true)),
        ],
    );
    let report = run_source(
        "services:\n    Api is an API at \"https://x/\"\nworkflow:\n    get data using Api\n        on failure:\n            retry 3 times waiting 0 seconds\n    complete with ok true\n",
        RunOptions::default(),
        &connectors,
    )
    .expect("pipeline runs");
    assert_eq!(*connectors.invocation_count.borrow(), 3);
    assert_eq!(
        report.outcome,
        Some(Outcome::Completed {
            outputs: vec![("ok".to_string(), Value::Boolean(true))]
        })
    );
}

#[test]
fn scenario_6_reject_produces_rejected_outcome_with_message() {
    let connectors = MockConnectorRegistry::empty();
    let report = run_source("workflow:\n    reject with \"bad\"\n", RunOptions::default(), &connectors)
        .expect("pipeline runs");
    assert_eq!(
        report.outcome,
        Some(Outcome::Rejected {
            message: "bad".to_string()
        })
    );
}

#[test]
fn scenario_7_unknown_service_reference_suggests_the_declared_name() {
    let connectors = MockConnectorRegistry::empty();
    let report = run_source(
        "services:\n    EmailVerifier is an API at \"https://verify.example/\"\nworkflow:\n    check status using EmailChecker\n",
        RunOptions::default(),
        &connectors,
    )
    .expect("pipeline runs");
    assert!(report.has_errors());
    assert!(report.outcome.is_none());
    let rendered = report.render_diagnostics("scenario7.flow");
    assert!(rendered.contains("EmailVerifier"), "diagnostics: {rendered}");
}

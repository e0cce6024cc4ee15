use flow_drv::RunOptions;
use flow_runtime::{ConnectorRegistry, ServiceResult, Value};
use indexmap::IndexMap;

/// No connectors are wired up here; this binary exists to smoke-test the
/// pipeline against a file without any services configured. `flowc` is the
/// real CLI, with a connector registry behind it.
struct NoConnectors;

impl ConnectorRegistry for NoConnectors {
    fn invoke(
        &self,
        service: &str,
        _verb: &str,
        _description: &str,
        _parameters: &IndexMap<String, Value>,
        _path: Option<&Value>,
    ) -> ServiceResult {
        Err(flow_runtime::ServiceError::new(
            format!("no connector registered for `{service}`"),
            false,
        ))
    }

    fn ask_ai(&self, agent: &str, _instruction: &str, _context: &Value) -> ServiceResult {
        Err(flow_runtime::ServiceError::new(format!("no connector registered for `{agent}`"), false))
    }

    fn has_service(&self, _service: &str) -> bool {
        false
    }
}

fn main() {
    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: flow-drv <workflow-file>");
        std::process::exit(3);
    };

    let report = match flow_drv::run_file(path.as_ref(), RunOptions::default(), &NoConnectors) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(2);
        }
    };

    if report.has_errors() {
        eprint!("{}", report.render_diagnostics(&path));
        std::process::exit(1);
    }

    match report.outcome {
        Some(outcome) => {
            println!("{}", outcome.status());
            std::process::exit(0);
        }
        None => std::process::exit(1),
    }
}

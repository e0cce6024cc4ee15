//! The pluggable service-dispatch seam.
//!
//! The runtime depends only on this two-operation contract; it never knows
//! whether a given service is a real HTTP client, an AI vendor adapter, or
//! (in tests) a hand-rolled mock. Concrete connectors are an external
//! collaborator, out of scope for this crate.

use crate::value::Value;
use indexmap::IndexMap;

/// A service call or AI call failure. `retryable` lets a connector tell the
/// runtime whether retrying is meaningful (a 500 probably is, a 404 or a
/// malformed-request error probably isn't) -- the error handler still
/// decides what to actually do with that information.
#[derive(Clone, Debug, PartialEq)]
pub struct ServiceError {
    pub message: String,
    pub retryable: bool,
}

impl ServiceError {
    pub fn new(message: impl Into<String>, retryable: bool) -> Self {
        Self {
            message: message.into(),
            retryable,
        }
    }
}

pub type ServiceResult = Result<Value, ServiceError>;

/// The seam real and mock connectors both implement. A single registry
/// fields calls for every declared service, keyed by service name.
pub trait ConnectorRegistry {
    /// Dispatches a service call. On success, yields a record with at
    /// least `result`, `status`, and `headers` fields.
    fn invoke(
        &self,
        service: &str,
        verb: &str,
        description: &str,
        parameters: &IndexMap<String, Value>,
        path: Option<&Value>,
    ) -> ServiceResult;

    /// Dispatches an AI call. On success, yields a record with `result`
    /// (text) and `confidence` (a number in `[0, 1]`).
    fn ask_ai(&self, agent: &str, instruction: &str, context: &Value) -> ServiceResult;

    /// Whether a service of this name is known to the registry -- used to
    /// distinguish "never configured" from "configured but failing".
    fn has_service(&self, service: &str) -> bool;
}

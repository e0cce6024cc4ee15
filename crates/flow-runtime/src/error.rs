//! Runtime error types.

use flow_util::diagnostic::DiagnosticCode;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum RuntimeError {
    #[error("type mismatch: {message}")]
    TypeMismatch { message: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("unbound identifier `{name}` (should have been caught by analysis)")]
    UnboundIdentifier { name: String },

    #[error("no connector registered for service `{service}`")]
    UnknownConnector { service: String },

    #[error("service `{service}` failed: {message}")]
    ServiceFailed { service: String, message: String },

    #[error("workflow timed out after its configured deadline")]
    DeadlineExceeded,

    #[error("`for each` requires a list, found {found}")]
    NotAList { found: String },
}

impl RuntimeError {
    pub fn code(&self) -> DiagnosticCode {
        match self {
            RuntimeError::TypeMismatch { .. } | RuntimeError::NotAList { .. } => {
                DiagnosticCode::E_RUNTIME_TYPE_ERROR
            }
            RuntimeError::DivisionByZero => DiagnosticCode::E_RUNTIME_DIVISION_BY_ZERO,
            RuntimeError::UnboundIdentifier { .. } => DiagnosticCode::E_SEMANTIC_UNBOUND_IDENTIFIER,
            RuntimeError::UnknownConnector { .. } => DiagnosticCode::E_RUNTIME_UNKNOWN_CONNECTOR,
            RuntimeError::ServiceFailed { .. } => DiagnosticCode::E_RUNTIME_SERVICE_FAILED,
            RuntimeError::DeadlineExceeded => DiagnosticCode::E_RUNTIME_DEADLINE_EXCEEDED,
        }
    }
}

pub type RuntimeResult<T> = std::result::Result<T, RuntimeError>;

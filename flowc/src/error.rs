//! Error handling for the `flowc` CLI.
//!
//! One variant per failure cause, matching the shape of every other
//! crate-boundary error in this workspace: `#[from]` conversions for
//! wrapped I/O/JSON errors, a crate-local `Result<T>` alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowcError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to read trigger file {path}: {source}")]
    TriggerIo {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("trigger file is not valid JSON: {0}")]
    TriggerJson(#[from] serde_json::Error),

    #[error("failed to initialize logging: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, FlowcError>;

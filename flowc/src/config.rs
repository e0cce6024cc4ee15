//! Process-level configuration for the `flowc` CLI.
//!
//! This is not the `config:` block inside a Flow program -- that is parsed
//! data (`flow_par::ast::Config`) handled entirely inside the pipeline. This
//! is the CLI's own settings: a `serde`-derived struct with `Default`,
//! loaded from a TOML file with a current-dir -> home-dir -> system-dir
//! search order.

use dirs::{config_dir, home_dir};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{FlowcError, Result};

pub const CONFIG_FILE_NAME: &str = "flowc.toml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    /// Enable verbose logging even without `--verbose`.
    #[serde(default)]
    pub verbose: bool,
}

impl Config {
    /// Loads configuration from the default search path, or the default
    /// configuration if no file is found in any of them.
    pub fn load() -> Result<Self> {
        match Self::find_config_file()? {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FlowcError::Config(format!("configuration file not found: {}", path.display())));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| FlowcError::Config(format!("failed to read {}: {e}", path.display())))?;
        toml::from_str(&content).map_err(|e| FlowcError::Config(format!("failed to parse configuration: {e}")))
    }

    fn check_current_dir_config() -> Option<PathBuf> {
        let path = PathBuf::from(CONFIG_FILE_NAME);
        path.exists().then_some(path)
    }

    fn check_home_config() -> Option<PathBuf> {
        home_dir()
            .map(|dir| dir.join(".config").join("flowc").join(CONFIG_FILE_NAME))
            .filter(|path| path.exists())
    }

    fn check_system_config() -> Option<PathBuf> {
        config_dir()
            .map(|dir| dir.join("flowc").join(CONFIG_FILE_NAME))
            .filter(|path| path.exists())
    }

    fn find_config_file() -> Result<Option<PathBuf>> {
        Ok(Self::check_current_dir_config()
            .or_else(Self::check_home_config)
            .or_else(Self::check_system_config))
    }
}

//! CLI configuration

use crate::{CliError, Result};
use fp_core::config::LoweringOptions;
use fp_core::pretty::PrettyOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for one CLI invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub lowering: LoweringOptions,
    /// Print instruction locations next to each statement.
    pub show_locations: bool,
}

impl CliConfig {
    /// Reads `config_path` when given, otherwise uses defaults. Environment
    /// overrides are applied last either way.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.lowering = config.lowering.with_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific JSON file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            CliError::Config(format!("Failed to parse config file {}: {}", path.display(), e))
        })
    }

    pub fn pretty_options(&self) -> PrettyOptions {
        PrettyOptions {
            show_locations: self.show_locations,
            ..PrettyOptions::default()
        }
    }
}

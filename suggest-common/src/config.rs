//! Configuration file discovery and TOML loading
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Platform config directory (`<config_dir>/suggest/<module>.toml`)
//!
//! A missing config file is never fatal: the caller gets compiled defaults and
//! a warning. A config file that exists but does not parse is an error.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Locates the TOML configuration file for a module
#[derive(Debug, Clone)]
pub struct ConfigFileResolver {
    module_name: String,
    env_var_name: String,
}

impl ConfigFileResolver {
    /// Create a resolver for `module_name`, reading overrides from `env_var_name`
    pub fn new(module_name: impl Into<String>, env_var_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            env_var_name: env_var_name.into(),
        }
    }

    /// Resolve the config file path, if any candidate is known
    pub fn resolve(&self, cli_arg: Option<&Path>) -> Option<PathBuf> {
        // Priority 1: Command-line argument
        if let Some(path) = cli_arg {
            return Some(path.to_path_buf());
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(&self.env_var_name) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        // Priority 3: Platform config directory
        self.default_path()
    }

    /// Platform default location for this module's config file
    pub fn default_path(&self) -> Option<PathBuf> {
        dirs::config_dir().map(|d| {
            d.join("suggest")
                .join(format!("{}.toml", self.module_name))
        })
    }
}

/// Load a TOML file into `T`, falling back to `T::default()` when the file is absent
pub fn load_toml_or_default<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        warn!("No config file location available, using built-in defaults");
        return Ok(T::default());
    };

    if !path.exists() {
        warn!(
            "Config file {} not found, using built-in defaults",
            path.display()
        );
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let parsed = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(parsed)
}

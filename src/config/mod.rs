//! Configuration for PlanPilot.
//!
//! One TOML file, `config.toml`, lives in the data directory next to the
//! document store:
//!
//! - `user` - Signed-in user id (`pp login` writes it, `pp logout` clears it)
//! - `backend_url` - Base URL of the AI planning backend (`pp plan` needs it)
//! - `output_format` - Default output format, "json" or "human"
//!
//! The data directory itself resolves `PP_DATA_DIR` > platform data dir
//! (`~/.local/share/planpilot` on Linux).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

const CONFIG_FILE: &str = "config.toml";

/// Default output format when no flag is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Human,
}

/// Persisted configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Currently signed-in user id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Base URL of the planning backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_url: Option<String>,

    /// Default output format
    #[serde(default)]
    pub output_format: OutputFormat,
}

impl Config {
    /// Load the configuration from the data directory, or defaults when
    /// the file does not exist yet.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let file = data_dir.join(CONFIG_FILE);
        if !file.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&file)?;
        toml::from_str(&raw).map_err(|err| Error::Other(format!("invalid config file: {err}")))
    }

    /// Write the configuration to the data directory.
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        fs::create_dir_all(data_dir)?;
        let raw = toml::to_string_pretty(self)
            .map_err(|err| Error::Other(format!("cannot serialize config: {err}")))?;
        fs::write(data_dir.join(CONFIG_FILE), raw)?;
        Ok(())
    }
}

/// Resolve the data directory: explicit flag > `PP_DATA_DIR` > platform
/// data dir.
pub fn resolve_data_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    if let Ok(path) = std::env::var("PP_DATA_DIR") {
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    dirs::data_dir()
        .map(|base| base.join("planpilot"))
        .ok_or_else(|| Error::Other("cannot determine data directory".to_string()))
}

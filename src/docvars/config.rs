use crate::error::{Result, VarsError};
use crate::model::TypeTag;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const CONFIG_FILENAME: &str = "config.json";

/// User configuration, stored as config.json in the config directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VarsConfig {
    /// Type used when a variable is created without one
    #[serde(default = "default_type")]
    pub default_type: TypeTag,

    /// Pretty-print export files
    #[serde(default = "default_pretty_export")]
    pub pretty_export: bool,

    /// Log filter used when DOCVARS_LOG is not set (e.g. "warn", "docvars=debug")
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_type() -> TypeTag {
    TypeTag::Length
}

fn default_pretty_export() -> bool {
    true
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for VarsConfig {
    fn default() -> Self {
        Self {
            default_type: default_type(),
            pretty_export: default_pretty_export(),
            log_level: default_log_level(),
        }
    }
}

impl VarsConfig {
    /// Load config from the given directory, or return defaults if not found
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILENAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).map_err(VarsError::Io)?;
        let config: VarsConfig =
            serde_json::from_str(&content).map_err(VarsError::Serialization)?;
        Ok(config)
    }

    /// Save config to the given directory
    pub fn save<P: AsRef<Path>>(&self, config_dir: P) -> Result<()> {
        let config_dir = config_dir.as_ref();

        if !config_dir.exists() {
            fs::create_dir_all(config_dir).map_err(VarsError::Io)?;
        }

        let config_path = config_dir.join(CONFIG_FILENAME);
        let content = serde_json::to_string_pretty(self).map_err(VarsError::Serialization)?;
        fs::write(config_path, content).map_err(VarsError::Io)?;
        Ok(())
    }
}

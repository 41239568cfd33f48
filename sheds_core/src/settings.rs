//! Local settings for the `sheds` command.
//!
//! Settings are per machine and loaded from `$XDG_CONFIG_HOME/sheds/config.toml`.
//! Club-wide configuration lives in the record store, see [`crate::config`].

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Machine-local settings
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub data: DataSettings,

    #[serde(default)]
    pub operator: OperatorSettings,
}

/// Where the record store lives
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataSettings {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Default names used when a command doesn't give one
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct OperatorSettings {
    #[serde(default)]
    pub name: Option<String>,
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sheds")
}

impl Settings {
    /// Load settings from the standard path, falling back to defaults
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            tracing::debug!("No settings file at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Load settings from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&contents)?;
        tracing::info!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sheds")
            .join("config.toml")
    }

    /// Save settings to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize settings: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved settings to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert!(settings.data.data_dir.ends_with("sheds"));
        assert!(settings.operator.name.is_none());
    }

    #[test]
    fn test_partial_settings() {
        let toml_str = r#"
[operator]
name = "Ann"
"#;
        let settings: Settings = toml::from_str(toml_str).unwrap();
        assert_eq!(settings.operator.name.as_deref(), Some("Ann"));
        assert!(settings.data.data_dir.ends_with("sheds")); // default
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut settings = Settings::default();
        settings.data.data_dir = temp_dir.path().join("store");
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.data.data_dir, temp_dir.path().join("store"));
    }
}

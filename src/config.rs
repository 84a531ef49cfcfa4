use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::features::MfccConfig;

/// Default file name of the classifier inside the models directory
pub const DEFAULT_MODEL_FILE: &str = "xgb_model.json";
/// Default file name of the label encoder inside the models directory
pub const DEFAULT_ENCODER_FILE: &str = "label_encoder.json";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub schema_version: u32,

    // Artifact paths; fall back to the models directory when unset
    pub model_path: Option<PathBuf>,
    pub encoder_path: Option<PathBuf>,

    // HTTP server
    pub bind_addr: String,
    pub max_upload_bytes: usize,

    // Feature front end, must match what the model was trained on
    pub mfcc: MfccConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: 1,
            model_path: None,
            encoder_path: None,
            bind_addr: "127.0.0.1:8501".to_string(),
            max_upload_bytes: 25 * 1024 * 1024,
            mfcc: MfccConfig::default(),
        }
    }
}

impl Config {
    /// Load config from file, or create default
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).context("Failed to read config file")?;
            serde_json::from_str(&content).context("Failed to parse config file")
        } else {
            debug!("No config at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")
    }

    /// Get the default config directory
    pub fn default_config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home.join(".voiceemotion"))
    }

    /// Get the default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::default_config_dir()?.join("config.json"))
    }

    /// Get the default models directory
    pub fn default_models_dir() -> Result<PathBuf> {
        Ok(Self::default_config_dir()?.join("models"))
    }

    /// Get the classifier file path
    pub fn get_model_path(&self) -> Result<PathBuf> {
        match self.model_path {
            Some(ref path) => Ok(path.clone()),
            None => Ok(Self::default_models_dir()?.join(DEFAULT_MODEL_FILE)),
        }
    }

    /// Get the label encoder file path
    pub fn get_encoder_path(&self) -> Result<PathBuf> {
        match self.encoder_path {
            Some(ref path) => Ok(path.clone()),
            None => Ok(Self::default_models_dir()?.join(DEFAULT_ENCODER_FILE)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.schema_version, 1);
        assert_eq!(config.bind_addr, "127.0.0.1:8501");
        assert_eq!(config.mfcc.n_mfcc, 40);
        assert!(config.model_path.is_none());
    }

    #[test]
    fn test_missing_file_gives_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            model_path: Some(PathBuf::from("/models/xgb.json")),
            bind_addr: "0.0.0.0:9000".to_string(),
            ..Default::default()
        };
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.get_model_path().unwrap(), PathBuf::from("/models/xgb.json"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"max_upload_bytes": 1024, "mfcc": {"top_db": null}}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.max_upload_bytes, 1024);
        assert_eq!(config.mfcc.top_db, None);
        assert_eq!(config.mfcc.n_mels, 128);
    }

    #[test]
    fn test_invalid_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(Config::load(&path).is_err());
    }
}

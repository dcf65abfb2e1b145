use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::paths::{config_json_path, default_store_dir};
use crate::tree::CollapseThresholds;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Directory of the file-backed thread store
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub collapse: CollapseThresholds,
    #[serde(default)]
    pub generation: GenerationSettings,
    /// Push streamed content to the store every N fragments
    #[serde(default)]
    pub checkpoint_every: Option<usize>,
}

/// OpenAI-compatible endpoint used for reply generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
    pub system_prompt: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            api_base: "https://openrouter.ai/api/v1".to_string(),
            api_key: None,
            model: "openai/gpt-4o-mini".to_string(),
            system_prompt: String::new(),
        }
    }
}

const CONFIG_FILE_PATH: &str = "config.toml";

fn parse_bool_env(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

impl Config {
    /// ~/.threadline/config.json, then ./config.toml, then environment.
    pub fn new() -> Self {
        let mut config = Self::load(&config_json_path(), Path::new(CONFIG_FILE_PATH));
        config.apply_env();
        config
    }

    /// File layer only: the JSON file wins over the TOML file. Missing or
    /// broken files are skipped.
    pub fn load(json_path: &Path, toml_path: &Path) -> Self {
        for path in [json_path, toml_path] {
            if !path.exists() {
                continue;
            }
            match Self::from_file(path) {
                Ok(config) => return config,
                Err(error) => log::warn!("Ignoring config: {}", error),
            }
        }
        Self::default()
    }

    /// Read one config file; `.json` files are JSON, anything else is TOML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content).map_err(|e| e.to_string())
        } else {
            toml::from_str(&content).map_err(|e| e.to_string())
        };
        parsed.map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var("THREADLINE_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Ok(api_base) = std::env::var("API_BASE") {
            self.generation.api_base = api_base;
        }
        if let Ok(api_key) = std::env::var("API_KEY") {
            self.generation.api_key = Some(api_key);
        }
        if let Ok(model) = std::env::var("MODEL") {
            self.generation.model = model;
        }
        if let Ok(every) = std::env::var("THREADLINE_CHECKPOINT_EVERY") {
            self.checkpoint_every = every.trim().parse().ok().filter(|n| *n > 0);
        }
        if let Ok(flag) = std::env::var("THREADLINE_NO_CHECKPOINTS") {
            if parse_bool_env(&flag) {
                self.checkpoint_every = None;
            }
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_store_dir)
    }
}

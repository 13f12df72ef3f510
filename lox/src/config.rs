use std::{
    fs,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use lox_vm::VmConfig;
use serde::Deserialize;

static CONFIG: OnceLock<Config> = OnceLock::new();

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub vm: VmConfig,
    pub repl: ReplConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ReplConfig {
    pub prompt: String,
    /// Defaults to `~/.lox_history`.
    pub history_file: Option<PathBuf>,
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            prompt: "> ".to_string(),
            history_file: None,
        }
    }
}

impl ReplConfig {
    pub fn history_path(&self) -> PathBuf {
        self.history_file.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".lox_history")
        })
    }
}

impl Config {
    fn new(source: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let path = source.as_ref();
        if path.exists() {
            let content = fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(Config::default())
        }
    }

    pub fn load(path: &str) -> &'static Config {
        CONFIG.get_or_init(|| {
            Config::new(path).unwrap_or_else(|e| {
                tracing::warn!(path, error = %e, "error loading config file, using defaults");
                Config::default()
            })
        })
    }
}

//! Configuration loading and parsing

use anyhow::{Context, Result};
use force_flush_hook::HookConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from a TOML file)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub demo: DemoConfig,
    #[serde(default)]
    pub hook: HookConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LibraryConfig {
    /// Hook library to load (default: next to the executable)
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DemoConfig {
    #[serde(default = "default_message")]
    pub message: String,
    /// How long the child holds its buffered output before exiting
    #[serde(default = "default_hold_ms")]
    pub hold_ms: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            message: default_message(),
            hold_ms: default_hold_ms(),
        }
    }
}

fn default_message() -> String {
    "hello from a buffered stdout".to_string()
}

fn default_hold_ms() -> u64 {
    500
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    if config.demo.message.contains('\0') {
        anyhow::bail!("demo.message must not contain NUL bytes");
    }

    Ok(config)
}

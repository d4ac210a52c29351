use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::chat::ErrorPolicy;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
pub const URL_ENV: &str = "BMAD_DASH_URL";
pub const PROJECT_ROOT_ENV: &str = "BMAD_PROJECT_ROOT";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub project_root: Option<String>,
    pub connect_timeout_secs: Option<u64>,
    pub stop_on_stream_error: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            project_root: None,
            connect_timeout_secs: Some(10),
            stop_on_stream_error: false,
        }
    }

    /// Load the saved config, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let config = Self::load_from(&Self::get_config_path()?)?;
        Ok(config.with_overrides(|key| std::env::var(key).ok()))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Apply `BMAD_DASH_URL` and `BMAD_PROJECT_ROOT` as returned by `lookup`.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.base_url = url;
        }
        if let Some(root) = lookup(PROJECT_ROOT_ENV).filter(|v| !v.trim().is_empty()) {
            self.project_root = Some(root);
        }
        self
    }

    pub fn error_policy(&self) -> ErrorPolicy {
        if self.stop_on_stream_error {
            ErrorPolicy::Terminate
        } else {
            ErrorPolicy::Continue
        }
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }

    /// Project root sent with dashboard calls; the working directory if unset
    pub fn project_root_or_cwd(&self) -> Result<String> {
        match &self.project_root {
            Some(root) => Ok(root.clone()),
            None => Ok(std::env::current_dir()?.to_string_lossy().into_owned()),
        }
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("bmad-dash").join("config.json"))
    }
}

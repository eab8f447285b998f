//! Configuration management for tinyrip CLI

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tinyrip::ProjectOptions;

/// Output directory used when neither the command line nor the config names one
pub const DEFAULT_OUTPUT: &str = "exported";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub output: Option<PathBuf>,
    /// Treat inconsistent sibling data as fatal
    pub strict: bool,
    /// Scene globs; empty means the built-in defaults
    pub scene_patterns: Vec<String>,
    pub log_filter: Option<String>,
    pub threads: Option<usize>,
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("tinyrip");

        Ok(config_dir.join("config.toml"))
    }

    /// Resolve the config file: an explicit path wins over the default location
    pub fn resolve_path(path: Option<&Path>) -> Result<PathBuf> {
        match path {
            Some(path) => Ok(path.to_path_buf()),
            None => Self::config_path(),
        }
    }

    /// Load configuration from file, or the default if it doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&contents).context("Failed to parse config file")
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory at {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;

        Ok(())
    }

    pub fn output_dir(&self, requested: Option<&Path>) -> PathBuf {
        requested
            .map(Path::to_path_buf)
            .or_else(|| self.output.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT))
    }

    /// Project options with command-line overrides applied
    pub fn project_options(&self, strict: bool, scenes: &[String]) -> ProjectOptions {
        let mut options = ProjectOptions {
            strict: strict || self.strict,
            ..ProjectOptions::default()
        };
        if !scenes.is_empty() {
            options.scene_patterns = scenes.to_vec();
        } else if !self.scene_patterns.is_empty() {
            options.scene_patterns = self.scene_patterns.clone();
        }
        options
    }
}

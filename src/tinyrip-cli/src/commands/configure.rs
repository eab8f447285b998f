//! Configuration command handlers
//!
//! Handles the `configure` subcommand for setting up tinyrip defaults.

use crate::config::Config;
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Changes requested on the command line
#[derive(Debug, Default)]
pub struct Changes {
    pub output: Option<PathBuf>,
    pub strict: Option<bool>,
    pub scenes: Vec<String>,
    pub log_filter: Option<String>,
    pub threads: Option<usize>,
}

impl Changes {
    fn is_empty(&self) -> bool {
        self.output.is_none()
            && self.strict.is_none()
            && self.scenes.is_empty()
            && self.log_filter.is_none()
            && self.threads.is_none()
    }

    fn apply(self, config: &mut Config) {
        if let Some(output) = self.output {
            config.output = Some(output);
        }
        if let Some(strict) = self.strict {
            config.strict = strict;
        }
        if !self.scenes.is_empty() {
            config.scene_patterns = self.scenes;
        }
        if let Some(filter) = self.log_filter {
            config.log_filter = Some(filter);
        }
        if let Some(threads) = self.threads {
            config.threads = Some(threads);
        }
    }
}

/// Handle the configure command
pub fn handle(path: &Path, show: bool, changes: Changes) -> Result<()> {
    let mut config = Config::load(path)?;

    if show {
        show_config(&config, path);
        return Ok(());
    }

    if changes.is_empty() {
        show_usage();
        return Ok(());
    }

    changes.apply(&mut config);
    config.save(path)?;
    println!("Config saved to: {}", path.display());

    Ok(())
}

fn show_config(config: &Config, path: &Path) {
    match &config.output {
        Some(output) => println!("Output:         {}", output.display()),
        None => println!("Output:         {} (default)", crate::config::DEFAULT_OUTPUT),
    }
    println!("Strict:         {}", config.strict);
    if config.scene_patterns.is_empty() {
        println!(
            "Scene patterns: {} (default)",
            tinyrip::ProjectOptions::default().scene_patterns.join(", ")
        );
    } else {
        println!("Scene patterns: {}", config.scene_patterns.join(", "));
    }
    let log_filter = config
        .log_filter
        .as_deref()
        .unwrap_or(crate::DEFAULT_LOG_FILTER);
    println!("Log filter:     {}", log_filter);
    match config.threads {
        Some(n) => println!("Threads:        {}", n),
        None => println!("Threads:        one per core"),
    }
    println!("Config file:    {}", path.display());
}

fn show_usage() {
    println!("Usage: tinyrip configure --output DIR [--strict true|false] [--scene GLOB]...");
    println!("                         [--log-filter FILTER] [--threads N]");
    println!("   or: tinyrip configure --show");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_show_usage_does_not_panic() {
        show_usage();
    }

    #[test]
    fn test_changes_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        handle(
            &path,
            false,
            Changes {
                strict: Some(true),
                scenes: vec!["map_*".into()],
                threads: Some(3),
                ..Changes::default()
            },
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert!(config.strict);
        assert_eq!(config.scene_patterns, vec!["map_*".to_string()]);
        assert_eq!(config.threads, Some(3));
        assert_eq!(config.output, None);
    }

    #[test]
    fn test_no_changes_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        handle(&path, false, Changes::default()).unwrap();
        assert!(!path.exists());
        handle(&path, true, Changes::default()).unwrap();
        assert!(!path.exists());
    }
}

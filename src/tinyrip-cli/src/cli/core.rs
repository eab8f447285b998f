//! Core CLI definitions

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tinyrip")]
#[command(about = "Export serialized game files as editor YAML", long_about = None)]
pub struct Cli {
    /// Use this config file instead of the default location
    #[arg(long, global = true, env = "TINYRIP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Export a file or a directory of files as YAML documents
    #[command(visible_alias = "e")]
    Export {
        /// Serialized file, or directory searched recursively
        input: PathBuf,

        /// Output directory (uses configured default if not provided)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Fail a unit on inconsistent sibling data instead of skipping the asset
        #[arg(long)]
        strict: bool,

        /// Worker threads (0 = one per core)
        #[arg(short = 'j', long)]
        threads: Option<usize>,

        /// Glob over file identities treated as scenes (repeatable)
        #[arg(long = "scene")]
        scenes: Vec<String>,
    },

    /// Show the header, dependencies and objects of one file
    #[command(visible_alias = "i")]
    Inspect {
        /// Path to a serialized file
        input: PathBuf,

        /// List every object
        #[arg(short, long)]
        objects: bool,
    },

    /// Configure default settings
    #[command(visible_alias = "c")]
    Configure {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Set default output directory
        #[arg(long)]
        output: Option<PathBuf>,

        /// Set strict mode
        #[arg(long)]
        strict: Option<bool>,

        /// Replace the scene globs (repeatable)
        #[arg(long = "scene")]
        scenes: Vec<String>,

        /// Set the default log filter, e.g. "tinyrip=debug"
        #[arg(long)]
        log_filter: Option<String>,

        /// Set the default worker thread count
        #[arg(long)]
        threads: Option<usize>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_export() {
        let cli = Cli::try_parse_from([
            "tinyrip", "-vv", "export", "data", "-o", "out", "--strict", "-j", "4", "--scene",
            "level*",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Export {
                input,
                output,
                strict,
                threads,
                scenes,
            } => {
                assert_eq!(input, PathBuf::from("data"));
                assert_eq!(output, Some(PathBuf::from("out")));
                assert!(strict);
                assert_eq!(threads, Some(4));
                assert_eq!(scenes, vec!["level*".to_string()]);
            }
            _ => panic!("expected export"),
        }
    }

    #[test]
    fn test_parse_configure_strict_value() {
        let cli = Cli::try_parse_from(["tinyrip", "configure", "--strict", "true"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Configure {
                strict: Some(true),
                ..
            }
        ));
    }

    #[test]
    fn test_global_config_after_subcommand() {
        let cli =
            Cli::try_parse_from(["tinyrip", "inspect", "level0", "--config", "alt.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("alt.toml")));
    }
}

mod cli;
mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::*;

/// Log filter used when neither `RUST_LOG` nor the config sets one
pub const DEFAULT_LOG_FILTER: &str = "tinyrip=info";

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = Config::resolve_path(cli.config.as_deref())?;
    let config = Config::load(&config_path)?;

    init_logging(cli.verbose, config.log_filter.as_deref());

    match cli.command {
        Commands::Export {
            input,
            output,
            strict,
            threads,
            scenes,
        } => {
            let options = commands::export::ExportOptions {
                output: config.output_dir(output.as_deref()),
                threads: threads.or(config.threads).unwrap_or(0),
                project: config.project_options(strict, &scenes),
            };
            commands::export::handle(&input, &options)?;
        }

        Commands::Inspect { input, objects } => {
            commands::inspect::handle(&input, objects)?;
        }

        Commands::Configure {
            show,
            output,
            strict,
            scenes,
            log_filter,
            threads,
        } => {
            let changes = commands::configure::Changes {
                output,
                strict,
                scenes,
                log_filter,
                threads,
            };
            commands::configure::handle(&config_path, show, changes)?;
        }
    }

    Ok(())
}

/// `-v` flags win over `RUST_LOG`, which wins over the configured filter
fn log_filter(verbose: u8, configured: Option<&str>) -> EnvFilter {
    match verbose {
        0 => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(configured.unwrap_or(DEFAULT_LOG_FILTER))),
        1 => EnvFilter::new("tinyrip=debug"),
        _ => EnvFilter::new("tinyrip=trace"),
    }
}

fn init_logging(verbose: u8, configured: Option<&str>) {
    tracing_subscriber::registry()
        .with(log_filter(verbose, configured))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

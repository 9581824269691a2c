use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};

use audio_session_sync::config::{Config, ConfigLoader};
use audio_session_sync::system::StandardFileSystem;
use audio_session_sync::logging;

const LOG_RETENTION_DAYS: u64 = 7;

#[derive(Parser)]
#[command(name = "audio-session-sync")]
#[command(about = "Audio endpoint, session and renderer synchronization toolkit")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration file
    CheckConfig,
    /// Write a default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Print the effective configuration
    ShowConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let loader = config_loader(cli.config.as_deref())?;
    // Loading would write a default file, which init-config decides on itself
    let config = if matches!(cli.command, Some(Commands::InitConfig { .. })) {
        Config::default()
    } else {
        loader.load_config()?
    };
    let (_guard, log_dir) = logging::initialize_logging(&config.logging, cli.verbose)?;
    if let Some(dir) = log_dir {
        info!("Writing logs to {}", dir.display());
        if let Err(e) = logging::cleanup_old_logs(&dir, LOG_RETENTION_DAYS) {
            warn!("Failed to clean up old logs: {}", e);
        }
    }

    match cli.command {
        Some(Commands::CheckConfig) | None => check_config(&config),
        Some(Commands::InitConfig { force }) => init_config(&loader, force),
        Some(Commands::ShowConfig) => show_config(&config),
    }
}

fn config_loader(path: Option<&str>) -> Result<ConfigLoader<StandardFileSystem>> {
    match path {
        Some(path) => Ok(ConfigLoader::new_production(PathBuf::from(path))),
        None => ConfigLoader::new_with_default_path(),
    }
}

fn check_config(config: &Config) -> Result<()> {
    info!("Validating configuration");
    config.validate()?;

    println!("Configuration validation:");
    println!("  ✓ Configuration parsed successfully");
    println!(
        "  ✓ Devices: filter {:?}, role {}, selector {:?}",
        config.devices.filter, config.devices.role, config.devices.selector_mode
    );
    println!(
        "  ✓ Renderer: {} mode, event sync {}, latency {} ms",
        config.renderer.share_mode, config.renderer.event_sync, config.renderer.latency_ms
    );
    println!(
        "  ✓ Provider fallback format: {}",
        config.provider.fallback_format()
    );
    Ok(())
}

fn init_config(loader: &ConfigLoader<StandardFileSystem>, force: bool) -> Result<()> {
    if loader.config_exists() && !force {
        println!(
            "Configuration already exists at {} (use --force to overwrite)",
            loader.get_config_path().display()
        );
        return Ok(());
    }

    loader
        .save_config(&Config::default())
        .context("Failed to write default configuration")?;
    println!(
        "✓ Wrote default configuration to {}",
        loader.get_config_path().display()
    );
    Ok(())
}

fn show_config(config: &Config) -> Result<()> {
    let rendered = toml::to_string_pretty(config).context("Failed to serialize configuration")?;
    println!("{rendered}");
    Ok(())
}

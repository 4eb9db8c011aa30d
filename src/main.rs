use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lightning_backup::config::{self, Config};
use lightning_backup::managers::backup::{
    BackupArtifact, BackupManager, BackupReport, BackupSettings, BackupTimestamp,
};
use lightning_backup::managers::logging::{self, LoggingConfig};
use lightning_backup::storage::{ConnectionDescriptor, ProviderConfig, ProviderRegistry, StorageProvider};
use lightning_backup::utils::{archive, BackupLock};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "lightning-backup")]
#[command(about = "Upload LND channel backups and tapd databases to remote storage", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dotenv file to load (defaults to ./.env when present)
    #[arg(long)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Back up the LND channel.backup file (default)
    Channel,

    /// Back up the Taproot Assets database (tapd.db, -wal, -shm)
    Tapd,

    /// List registered storage providers
    Providers,

    /// Load configuration and build the provider without uploading
    Validate,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let env_result = load_env_file(cli.env_file.as_deref());
    let command = cli.command.unwrap_or(Commands::Channel);

    let registry = ProviderRegistry::with_builtin_providers();

    // Listing providers needs no configuration
    if let Commands::Providers = command {
        logging::init_console_logging();
        for name in registry.provider_names() {
            println!("{}", name);
        }
        return ExitCode::SUCCESS;
    }

    let loaded = env_result
        .and_then(|()| config::load_config(cli.config.as_deref()).map_err(Into::into));
    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            logging::init_console_logging();
            error!("Configuration error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let _log_guard = match logging::init_logging(&LoggingConfig::from_settings(&config.logging)) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match command {
        Commands::Channel => run_channel_backup(&config, &registry),
        Commands::Tapd => run_tapd_backup(&config, &registry),
        Commands::Validate => run_validate(&config, &registry),
        Commands::Providers => Ok(ExitCode::SUCCESS),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Load a dotenv file without overriding variables already set
fn load_env_file(path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("Failed to load env file: {:?}", path))?;
        }
        None => match dotenvy::dotenv() {
            Ok(_) => {}
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e).context("Failed to load .env"),
        },
    }
    Ok(())
}

/// Build the configured provider; an explicit provider name wins over the scheme
fn build_provider(config: &Config, registry: &ProviderRegistry) -> Result<Box<dyn StorageProvider>> {
    let connection = config::resolve_connection_string(&config.storage)?;
    let provider_config = ProviderConfig {
        connection_string: Some(connection.clone()),
        access_token: config.storage.dropbox_access_token.clone(),
        timeout: Duration::from_secs(config.storage.timeout_seconds),
    };

    let provider = match config.storage.provider {
        Some(ref name) => registry.create(name, &provider_config),
        None => registry.create_from_connection_string(&connection, &provider_config),
    }
    .context("Failed to create storage provider")?;

    info!("Using storage provider: {}", provider.name());
    Ok(provider)
}

fn run_channel_backup(config: &Config, registry: &ProviderRegistry) -> Result<ExitCode> {
    let provider = build_provider(config, registry)?;

    let source = config.source.effective_channel_file();
    if !source.exists() {
        warn!("Channel backup file not found at {:?}", source);
        return Ok(ExitCode::SUCCESS);
    }

    let _lock = BackupLock::acquire(&config.backup.lock_dir, "channel")
        .context("Failed to acquire lock for channel backup")?;

    info!("Starting channel backup from {:?}", source);
    let contents = std::fs::read(source)
        .with_context(|| format!("Failed to read channel backup: {:?}", source))?;

    let artifact = BackupArtifact::channel(contents, BackupTimestamp::now());
    let manager = BackupManager::new(provider.as_ref(), BackupSettings::from_config(config));
    let report = manager.run(&artifact)?;

    log_report(&report);
    info!("Channel backup completed successfully");
    Ok(ExitCode::SUCCESS)
}

fn run_tapd_backup(config: &Config, registry: &ProviderRegistry) -> Result<ExitCode> {
    let provider = build_provider(config, registry)?;

    let data_dir = &config.source.tapd_data_dir;
    if !data_dir.exists() {
        warn!("Tapd directory not found at {:?}; nothing to back up", data_dir);
        return Ok(ExitCode::SUCCESS);
    }

    let _lock = BackupLock::acquire(&config.backup.lock_dir, "tapd")
        .context("Failed to acquire lock for tapd backup")?;

    warn!("tapd backups are critical: losing them means permanent asset loss");

    let timestamp = BackupTimestamp::now();
    let archive = archive::build_tapd_archive(data_dir, timestamp.as_str())?;

    let artifact = BackupArtifact::tapd(archive, timestamp);
    let manager = BackupManager::new(provider.as_ref(), BackupSettings::from_config(config));
    let report = manager.run(&artifact)?;

    log_report(&report);
    info!("Tapd backup completed successfully");
    Ok(ExitCode::SUCCESS)
}

fn run_validate(config: &Config, registry: &ProviderRegistry) -> Result<ExitCode> {
    let connection = config::resolve_connection_string(&config.storage)?;
    let provider = build_provider(config, registry)?;
    let settings = BackupSettings::from_config(config);

    let redacted = ConnectionDescriptor::parse(&connection)
        .map(|d| d.redacted())
        .unwrap_or_else(|_| "<unparsed>".to_string());

    println!("Configuration is valid");
    println!("  Provider:       {}", provider.name());
    println!("  Connection:     {}", redacted);
    println!("  Remote dir:     {}", settings.system_dir());
    println!("  Local mirror:   {}", settings.local_backup_dir.display());
    println!("  Keep last:      {}", settings.keep_last_n);
    println!("  Max retries:    {}", settings.max_retries);
    println!("  Channel source: {}", config.source.effective_channel_file().display());
    println!("  Tapd data dir:  {}", config.source.tapd_data_dir.display());
    Ok(ExitCode::SUCCESS)
}

fn log_report(report: &BackupReport) {
    info!(
        "Uploaded {} bytes to {} in {} attempt(s)",
        report.bytes, report.paths.timestamped, report.attempts
    );
    if let Some(ref local) = report.local_copy {
        info!("Local copy: {:?}", local);
    }
    info!(
        "Retention: {} found, {} deleted, {} maintained",
        report.retention.found, report.retention.deleted, report.maintained
    );
}

//! cloudstrm CLI - generate .strm pointer files for cloud media libraries
//!
//! Usage:
//!   cloudstrm scan [--rebuild]
//!   cloudstrm rebuild
//!   cloudstrm watch
//!   cloudstrm command <action>
//!   cloudstrm check
//!   cloudstrm name <folder> <file>

use anyhow::{bail, Context, Result};
use chrono::{Local, Timelike};
use clap::{Parser, Subcommand};
use cloudstrm_core::classify::lookup_key;
use cloudstrm_core::{
    AddressingMode, FolderNamer, PluginConfig, ScanEngine, ScanOutcome, ScanSettings,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cloudstrm")]
#[command(about = "cloudstrm - .strm link generator for cloud media libraries", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: <config dir>/cloudstrm/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the known-file index (overrides the config)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one pass over all monitored directories
    Scan {
        /// Ignore the stored index and reprocess everything
        #[arg(long)]
        rebuild: bool,
    },

    /// Reprocess every file and replace the index
    Rebuild,

    /// Run scans on the configured cron schedules
    Watch,

    /// Handle a remote command; only `cloudstrm_scan` starts a scan
    Command {
        /// Action identifier
        action: String,
    },

    /// Validate the configuration and print the parsed mappings
    Check,

    /// Ask the naming service about one folder
    Name {
        /// Folder path or name
        folder: PathBuf,

        /// Sample file name inside the folder
        file: String,
    },
}

/// Loaded configuration and the settings built from it
struct App {
    config_path: PathBuf,
    config: PluginConfig,
    settings: ScanSettings,
    issues: Vec<String>,
}

impl App {
    fn load(cli: &Cli) -> Result<Self> {
        let config_path = match &cli.config {
            Some(path) => path.clone(),
            None => dirs::config_dir()
                .context("Could not determine the config directory")?
                .join("cloudstrm")
                .join("config.json"),
        };

        let config = PluginConfig::load(&config_path)
            .with_context(|| format!("Failed to load config {}", config_path.display()))?;

        let default_data_dir = match &cli.data_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_dir()
                .context("Could not determine the data directory")?
                .join("cloudstrm"),
        };

        let (mut settings, issues) = ScanSettings::from_config(&config, &default_data_dir);
        if let Some(dir) = &cli.data_dir {
            settings.data_dir = dir.clone();
        }

        let issues: Vec<String> = issues.iter().map(ToString::to_string).collect();
        for issue in &issues {
            tracing::warn!("{}", issue);
        }

        Ok(Self {
            config_path,
            config,
            settings,
            issues,
        })
    }

    /// Clear one-shot flags in the persisted config
    fn clear_flags(&mut self, rebuild: bool, onlyonce: bool) -> Result<()> {
        let rebuild = rebuild && self.config.rebuild;
        let onlyonce = onlyonce && self.config.onlyonce;
        if !rebuild && !onlyonce {
            return Ok(());
        }

        if rebuild {
            self.config.rebuild = false;
        }
        if onlyonce {
            self.config.onlyonce = false;
        }
        self.config
            .save(&self.config_path)
            .with_context(|| format!("Failed to update config {}", self.config_path.display()))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut app = App::load(&cli)?;

    match &cli.command {
        Commands::Scan { rebuild } => run_scan(&mut app, *rebuild),
        Commands::Rebuild => run_rebuild(app),
        Commands::Watch => watch(&mut app),
        Commands::Command { action } => run_command(&mut app, action),
        Commands::Check => check(&app),
        Commands::Name { folder, file } => name_folder(&app, folder, file),
    }
}

fn run_scan(app: &mut App, rebuild: bool) -> Result<()> {
    let settings = app.settings.clone().with_force_rebuild(app.settings.force_rebuild || rebuild);
    let engine = ScanEngine::new(settings).context("Failed to start scan engine")?;

    let outcome = engine.scan();
    if matches!(outcome, ScanOutcome::Completed(_)) {
        app.clear_flags(true, false)?;
    }
    print_outcome(&outcome)
}

fn run_rebuild(app: App) -> Result<()> {
    let engine = ScanEngine::new(app.settings).context("Failed to start scan engine")?;
    print_outcome(&engine.rebuild())
}

fn run_command(app: &mut App, action: &str) -> Result<()> {
    let engine = ScanEngine::new(app.settings.clone()).context("Failed to start scan engine")?;

    let outcome = engine.handle_command(action);
    if matches!(outcome, ScanOutcome::Completed(_)) {
        app.clear_flags(true, false)?;
    }
    print_outcome(&outcome)
}

fn watch(app: &mut App) -> Result<()> {
    let settings = app.settings.clone();
    if !settings.enabled && !settings.run_once {
        bail!("Scanning is disabled and onlyonce is not set, nothing to do");
    }

    let engine = ScanEngine::new(settings.clone()).context("Failed to start scan engine")?;

    if let Some(outcome) = run_once(app, &engine)? {
        log_outcome(&outcome);
    }

    let (scan_job, rebuild_job) = if settings.enabled {
        (settings.scan_schedule, settings.rebuild_schedule)
    } else {
        (None, None)
    };

    if scan_job.is_none() && rebuild_job.is_none() {
        tracing::info!("No jobs scheduled, exiting");
        return Ok(());
    }

    let now = Local::now();
    for (name, job) in [("scan", &scan_job), ("rebuild", &rebuild_job)] {
        if let Some(job) = job {
            match job.next_after(&now) {
                Some(next) => tracing::info!(
                    "{} job '{}', next run {}",
                    name,
                    job,
                    next.format("%Y-%m-%d %H:%M")
                ),
                None => tracing::warn!("{} job '{}' never fires", name, job),
            }
        }
    }

    loop {
        sleep_until_next_minute();
        let now = Local::now();

        if rebuild_job.as_ref().is_some_and(|job| job.matches(&now)) {
            log_outcome(&engine.rebuild());
        }
        if scan_job.as_ref().is_some_and(|job| job.matches(&now)) {
            let outcome = engine.scan();
            if matches!(outcome, ScanOutcome::Completed(_)) {
                if let Err(e) = app.clear_flags(true, false) {
                    tracing::error!("{:#}", e);
                }
            }
            log_outcome(&outcome);
        }
    }
}

/// Run the `onlyonce` pass, clearing the flag before it starts
fn run_once(app: &mut App, engine: &ScanEngine) -> Result<Option<ScanOutcome>> {
    if !app.settings.run_once {
        return Ok(None);
    }

    tracing::info!("Running once now");
    app.clear_flags(false, true)?;
    // A disabled engine refuses the pass, like the scheduled jobs would
    let outcome = engine.scan();
    if matches!(outcome, ScanOutcome::Completed(_)) {
        app.clear_flags(true, false)?;
    }
    Ok(Some(outcome))
}

fn sleep_until_next_minute() {
    let now = Local::now();
    let elapsed = Duration::from_secs(now.second() as u64)
        + Duration::from_nanos(now.nanosecond().min(999_999_999) as u64);
    std::thread::sleep(Duration::from_secs(60).saturating_sub(elapsed));
}

fn check(app: &App) -> Result<()> {
    let settings = &app.settings;

    println!("cloudstrm configuration");
    println!("=======================");
    println!();
    println!("Config:         {}", app.config_path.display());
    println!("Index:          {}", settings.index_path().display());
    println!("Enabled:        {}", settings.enabled);
    println!("Copy non-media: {}", settings.scan.copy_non_media);
    println!(
        "AI naming:      {}",
        settings
            .naming
            .as_ref()
            .map(|n| format!("{} ({})", n.model, n.api_url))
            .unwrap_or_else(|| "off".to_string())
    );
    println!(
        "Scan cron:      {}",
        settings
            .scan_schedule
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "-".to_string())
    );
    println!(
        "Rebuild cron:   {}",
        settings
            .rebuild_schedule
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "-".to_string())
    );
    println!();

    println!("Mappings:");
    for mapping in &settings.mappings {
        match &mapping.mode {
            AddressingMode::LocalMirror { library_root } => println!(
                "  {} -> {} (local: {})",
                mapping.source_root, mapping.dest_root, library_root
            ),
            AddressingMode::Gateway { kind, mount_path, service_host, scheme } => println!(
                "  {} -> {} ({}: {}://{} mount {})",
                mapping.source_root, mapping.dest_root, kind, scheme, service_host, mount_path
            ),
        }
    }

    if app.issues.is_empty() {
        println!();
        println!("No issues found");
        return Ok(());
    }

    println!();
    println!("Issues:");
    for issue in &app.issues {
        println!("  {}", issue);
    }
    bail!("{} configuration issue(s)", app.issues.len())
}

fn name_folder(app: &App, folder: &Path, file: &str) -> Result<()> {
    let config = app
        .settings
        .naming
        .clone()
        .context("AI naming is not configured (enable_ai_naming and deepseek_api_key)")?;
    let namer = FolderNamer::with_chat_api(config).context("Failed to create naming client")?;

    let key = lookup_key(folder);
    let descriptor = namer
        .folder_info(&key, file)
        .with_context(|| format!("No folder info for {}", key))?;

    println!("Lookup key: {}", key);
    println!("{}", serde_json::to_string_pretty(&descriptor)?);
    match descriptor.resolve_names(file) {
        Some(names) => {
            println!();
            println!("File:   {}", names.file_name);
            println!("Folder: {}", names.folder_name);
        }
        None => println!(
            "Media type '{}' keeps the original names",
            String::from(descriptor.media_type.clone())
        ),
    }

    Ok(())
}

/// Scheduled jobs keep running whatever a single pass reports
fn log_outcome(outcome: &ScanOutcome) {
    if let Err(e) = print_outcome(outcome) {
        tracing::error!("{:#}", e);
    }
}

fn print_outcome(outcome: &ScanOutcome) -> Result<()> {
    match outcome {
        ScanOutcome::Completed(report) => {
            println!("{}", report);
            if report.roots_failed > 0 {
                println!("  {} monitored directories could not be read", report.roots_failed);
            }
            Ok(())
        }
        ScanOutcome::AlreadyRunning => {
            println!("A scan is already running");
            Ok(())
        }
        ScanOutcome::Ignored => {
            println!("Command ignored");
            Ok(())
        }
        ScanOutcome::Disabled => bail!("Scanning is disabled in the config"),
        ScanOutcome::NoMappings => bail!("No monitored directories configured"),
    }
}

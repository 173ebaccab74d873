//! Temp Notifier - Raspberry Pi temperature alert binary
//!
//! Run once from cron, or continuously with `--interval`.
//!
//! ```bash
//! # One sample, alert if needed, exit
//! temp_notifier /etc/temp_notifier/config.toml
//!
//! # Sample every 30 seconds for device "attic-pi" until SIGINT/SIGTERM
//! temp_notifier /etc/temp_notifier/config.toml attic-pi --interval 30
//!
//! # Print the current reading without locking or notifying
//! temp_notifier config.toml --probe --format json
//! ```

use clap::{Parser, ValueEnum};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;
use temp_notifier::config::DEFAULT_LOG_FILE;
use temp_notifier::error::{EXIT_FAILURE, EXIT_OK};
use temp_notifier::sensor::take_reading;
use temp_notifier::{
    ConfiguredSensor, MonitorConfig, MonitorError, RunController, TelegramNotifier,
    TemperatureReading, DEFAULT_DEVICE,
};
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing::{error, info, warn, Level};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "temp_notifier")]
#[command(about = "Raspberry Pi temperature monitor with Telegram alerts")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Path to the TOML configuration file
    config: PathBuf,

    /// Device name; one monitor may run per device
    #[arg(default_value = DEFAULT_DEVICE)]
    device: String,

    /// Sample every N seconds until stopped (0 = once). Overrides the config file
    #[arg(short, long)]
    interval: Option<u64>,

    /// Take a single sample and exit, even if an interval is configured
    #[arg(long, conflicts_with = "interval")]
    once: bool,

    /// Print the current reading and exit without locking or notifying
    #[arg(long)]
    probe: bool,

    /// Output format for --probe
    #[arg(short, long, value_enum, default_value_t = ProbeFormat::Pretty)]
    format: ProbeFormat,

    /// Append logs to this file instead of the configured one
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "debug")]
    quiet: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProbeFormat {
    Pretty,
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = MonitorConfig::load(&cli.config, &cli.device);

    let log_path = cli.log_file.clone().unwrap_or_else(|| match &loaded {
        Ok(config) => config.log_file.clone(),
        Err(_) => default_log_path(&cli.config),
    });
    if let Err(e) = init_logging(&cli, &log_path) {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::from(EXIT_FAILURE);
    }

    let config = match loaded {
        Ok(config) => apply_cli_overrides(config, &cli),
        Err(e) => {
            error!(config = %cli.config.display(), device = %cli.device, error = %e, "Failed to load configuration");
            return ExitCode::from(e.exit_code());
        }
    };

    let result = if cli.probe {
        probe_command(&config, cli.format).await
    } else {
        run_command(&config).await
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_OK),
        Err(e) => {
            match &e {
                MonitorError::LockHeld { .. } => {}
                _ => error!(device = %config.device_name, error = %e, "Temp monitor failed"),
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn default_log_path(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(DEFAULT_LOG_FILE)
}

fn apply_cli_overrides(config: MonitorConfig, cli: &Cli) -> MonitorConfig {
    if cli.once {
        config.with_interval(None)
    } else if let Some(secs) = cli.interval {
        config.with_interval(Some(Duration::from_secs(secs)))
    } else {
        config
    }
}

fn init_logging(cli: &Cli, log_path: &Path) -> anyhow::Result<()> {
    let level = if cli.debug {
        Level::DEBUG
    } else if cli.quiet {
        Level::WARN
    } else {
        Level::INFO
    };

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let console = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact();

    let file_result = log_path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map_or(Ok(()), std::fs::create_dir_all)
        .and_then(|_| OpenOptions::new().create(true).append(true).open(log_path));

    match file_result {
        Ok(file) => {
            let file_layer = fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(file_layer)
                .try_init()?;
        }
        Err(e) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .try_init()?;
            warn!(path = %log_path.display(), error = %e, "Log file unavailable, logging to console only");
        }
    }

    Ok(())
}

async fn run_command(config: &MonitorConfig) -> temp_notifier::Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = std::process::id(),
        device = %config.device_name,
        continuous = config.is_continuous(),
        thresholds = config.thresholds.len(),
        "Temp monitor starting"
    );

    let notifier = TelegramNotifier::new(&config.telegram)?;
    let sensor = ConfiguredSensor::from_config(&config.sensor);

    // Handlers must be installed before the lock is taken.
    let signals = ShutdownSignals::register()?;

    let cancel = CancellationToken::new();
    let shutdown_token = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = signals.recv().await {
            error!(error = %e, "Error waiting for shutdown signal");
            return;
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let mut controller = RunController::new(config, sensor, notifier, cancel)?;
    controller.run().await.map(|_| ())
}

async fn probe_command(config: &MonitorConfig, format: ProbeFormat) -> temp_notifier::Result<()> {
    let mut sensor = ConfiguredSensor::from_config(&config.sensor);
    let reading = take_reading(&mut sensor, &config.device_name).await?;

    match format {
        ProbeFormat::Json => {
            let json = serde_json::to_string_pretty(&reading)
                .map_err(|e| MonitorError::Io(e.into()))?;
            println!("{}", json);
        }
        ProbeFormat::Pretty => print_pretty_reading(config, &reading),
    }
    Ok(())
}

fn print_pretty_reading(config: &MonitorConfig, reading: &TemperatureReading) {
    println!("🌡️  {} ({})", reading.device, reading.source);
    println!("  Temperature: {:.1}°C", reading.celsius);
    println!("  Taken at: {}", reading.taken_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("  Thresholds:");
    for rule in &config.thresholds {
        let marker = if reading.celsius >= rule.limit { "🔥" } else { "  " };
        println!("   {} {:>5.1}°C  {}", marker, rule.limit, rule.message);
    }
}

/// SIGTERM and SIGINT handlers, installed on creation.
struct ShutdownSignals {
    #[cfg(unix)]
    sigterm: tokio::signal::unix::Signal,
    #[cfg(unix)]
    sigint: tokio::signal::unix::Signal,
}

impl ShutdownSignals {
    fn register() -> std::io::Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            Ok(Self {
                sigterm: signal(SignalKind::terminate())?,
                sigint: signal(SignalKind::interrupt())?,
            })
        }

        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    /// Waits for the first shutdown signal.
    async fn recv(mut self) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = self.sigterm.recv() => {
                    info!("Received SIGTERM");
                }
                _ = self.sigint.recv() => {
                    info!("Received SIGINT");
                }
            }
        }

        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await?;
            info!("Received Ctrl+C");
        }

        Ok(())
    }
}

//! Timelapse - drift-corrected capture runner
//!
//! CLI entry point for running capture sessions.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::{debug, info, warn};

use timelapse::action;
use timelapse::cli::{Cli, Command};
use timelapse::config::Config;
use timelapse::session::{Session, SessionSummary};
use timelapse::status::StatusReporter;
use timingcore::{ShutdownTrigger, TimingController, shutdown_channel};

fn setup_logging(log_level: Option<&str>, log_file: Option<&PathBuf>) -> Result<()> {
    let level = match log_level {
        Some(level) => level
            .parse::<tracing::Level>()
            .map_err(|_| eyre::eyre!("Invalid log level: {}", level))?,
        None => tracing::Level::INFO,
    };
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).context("Failed to create log directory")?;
            }
            let file = fs::File::create(path).context("Failed to create log file")?;
            tracing_subscriber::fmt()
                .with_writer(file)
                .with_ansi(false)
                .with_env_filter(filter)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .init();
        }
    }

    debug!(%level, "Logging initialized");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.log_level.as_deref(), cli.log_file.as_ref()).context("Failed to setup logging")?;

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    match cli.command {
        Command::Run {
            interval,
            duration,
            max_captures,
            dry_run,
        } => {
            config.apply_overrides(interval, duration, max_captures, dry_run);
            config.validate().context("Invalid configuration")?;
            cmd_run(&config).await
        }
        Command::Config { validate } => cmd_config(&config, validate),
    }
}

/// Run a capture session until a limit or a signal stops it
async fn cmd_run(config: &Config) -> Result<()> {
    let controller = TimingController::new(config.timing.clone()).context("Failed to create timing controller")?;
    let (trigger, shutdown) = shutdown_channel();

    let session = Session::new(controller, action::from_config(&config.capture), shutdown.clone())
        .with_limits(config.session_limits())
        .with_report_every(config.reporting.report_every);

    let reporter = StatusReporter::new(session.handle(), config.reporting.status_interval())
        .with_duration(config.timelapse.duration())
        .spawn(shutdown);
    let signals = tokio::spawn(wait_for_signals(trigger));

    print_banner(config);
    let result = session.run().await;

    // Stop the reporter whether the session ended by itself or by signal
    signals.abort();
    reporter.abort();

    let summary = result.context("Capture session failed")?;
    print_summary(&summary);
    Ok(())
}

/// Trigger shutdown on SIGINT/SIGTERM (Ctrl+C elsewhere)
async fn wait_for_signals(trigger: ShutdownTrigger) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let (mut sigint, mut sigterm) = match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
            (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "Failed to install signal handlers");
                return;
            }
        };

        tokio::select! {
            _ = sigint.recv() => warn!("SIGINT received"),
            _ = sigterm.recv() => warn!("SIGTERM received"),
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            return;
        }
        warn!("Ctrl+C received");
    }

    info!("Initiating graceful shutdown...");
    trigger.trigger();
}

/// Print the effective configuration, or just check it
fn cmd_config(config: &Config, validate: bool) -> Result<()> {
    if validate {
        config.validate().context("Invalid configuration")?;
        println!("{} Configuration is valid", "✓".green());
        return Ok(());
    }
    print!("{}", config.to_yaml()?);
    Ok(())
}

fn print_banner(config: &Config) {
    let duration = match config.timelapse.duration() {
        Some(_) => format!("{} hours", config.timelapse.duration_hours),
        None => "Indefinite".to_string(),
    };
    let mode = if config.capture.dry_run {
        "DRY RUN (no images captured)".yellow().to_string()
    } else {
        config.capture.command.clone()
    };

    println!("{}", "=== Timelapse ===".bold());
    println!("Started:  {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));
    println!("Interval: {} seconds", config.timing.interval_seconds);
    println!("Duration: {}", duration);
    println!("Capture:  {}", mode);
    println!("{}", "=".repeat(40));
}

fn print_summary(summary: &SessionSummary) {
    let stats = &summary.stats;
    println!();
    println!("{}", "=== Timelapse Complete ===".bold());
    println!("Stopped:  {}", summary.stop_reason);
    println!("Captures: {}", summary.captures);
    if summary.failures > 0 {
        println!("Failed:   {}", summary.failures.to_string().red());
    }
    println!("Elapsed:  {:.1}s", stats.elapsed);
    println!(
        "Interval: {:.3}s avg ({:.3}s - {:.3}s)",
        stats.avg_interval, stats.min_interval, stats.max_interval
    );
    println!(
        "Drift:    {:.3}s ({:.2}%), total {:.3}s",
        stats.drift_accumulated, summary.drift.drift_percentage, stats.total_drift
    );
    println!("Clock adjustments: {}", stats.system_clock_adjustments);
}

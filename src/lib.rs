// src/lib.rs

pub mod cli;
pub mod config;
pub mod devices;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::{CliArgs, Command};
use crate::config::{default_config_path, load_and_validate, ConfigFile};
use crate::devices::{DeviceSource, SystemProfiler};
use crate::engine::{Resolution, ShutdownSequence, SystemHost};
use crate::types::ExecMode;
use crate::watch::DeviceMonitor;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - device enumeration / removal monitor
/// - the shutdown sequence with the real host
/// - Ctrl-C handling while watching
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = args
        .config
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);

    match args.command.unwrap_or(Command::Watch) {
        Command::Devices => print_devices(&SystemProfiler::default()).await,
        Command::Check => {
            let cfg = load_config(&config_path)?;
            print_dry_run(&cfg);
            Ok(())
        }
        Command::Trigger => {
            let cfg = load_config(&config_path)?;
            info!("manual trigger");
            run_shutdown_sequence(&cfg).await
        }
        Command::Watch => {
            let cfg = load_config(&config_path)?;
            let monitor = DeviceMonitor::new(SystemProfiler::default(), &cfg.monitor);

            // Ctrl-C → stop watching without running anything.
            tokio::select! {
                removed = monitor.wait_for_removal() => {
                    let removed = removed?;
                    info!(removed = removed.len(), "watched device removed; starting shutdown sequence");
                    run_shutdown_sequence(&cfg).await
                }
                ctrl_c = tokio::signal::ctrl_c() => {
                    ctrl_c.context("listening for Ctrl+C")?;
                    info!("interrupted; stopping device monitor");
                    Ok(())
                }
            }
        }
    }
}

fn load_config(path: &std::path::Path) -> Result<ConfigFile> {
    load_and_validate(path).with_context(|| format!("loading config from {:?}", path))
}

/// Run the configured sequence against the real host.
///
/// With a non-empty command list this does not return: the final action
/// either powers the machine off or exits the process.
async fn run_shutdown_sequence(cfg: &ConfigFile) -> Result<()> {
    let host = Arc::new(SystemHost::new(cfg.power_off_command.clone()));
    let sequence = ShutdownSequence::new(cfg.shutdown.clone(), host);

    match sequence.run().await? {
        None => info!("no shutdown commands configured; doing nothing"),
        Some(Resolution::Completed) => debug!("shutdown sequence completed"),
        Some(Resolution::TimedOut { killed }) => {
            debug!(killed, "shutdown sequence timed out")
        }
    }
    Ok(())
}

async fn print_devices<S: DeviceSource>(source: &S) -> Result<()> {
    let devices = source.enumerate().await?;
    if devices.is_empty() {
        println!("no devices found");
    }
    for device in devices {
        println!("{}\t{}", device.location, device.name);
    }
    Ok(())
}

/// Simple dry-run output: print the sequence plan.
fn print_dry_run(cfg: &ConfigFile) {
    let shutdown = &cfg.shutdown;

    println!("killcord dry-run");
    println!("  shutdown.timeout_ms = {}", shutdown.timeout.as_millis());
    println!("  shutdown.final_action = {}", shutdown.final_action);
    println!("  shutdown.power_off_command = {:?}", cfg.power_off_command);
    println!("  monitor.poll_interval_ms = {}", cfg.monitor.poll_interval_ms);
    if !cfg.monitor.devices.is_empty() {
        println!("  monitor.devices = {:?}", cfg.monitor.devices);
    }
    println!();

    if shutdown.commands.is_empty() {
        println!("commands: none (the sequence will do nothing)");
    } else {
        println!("commands ({}):", shutdown.commands.len());
        for spec in &shutdown.commands {
            let mode = match spec.mode {
                ExecMode::Sync => "sync ",
                ExecMode::Async => "async",
            };
            println!("  - [{mode}] {spec}");
        }
    }

    debug!("dry-run complete (no execution)");
}

//! BLE diagnostics tool for ESP32 WiFi provisioning devices
//!
//! Walks a real adapter and device through the seven diagnostic steps and
//! prints each step's status and log.

mod commands;
mod config;
mod report;
mod shell;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use provdiag_ble_controller::{BtleplugCentral, StepId, Validator};

use config::Config;

#[derive(Parser)]
#[command(name = "provdiag")]
#[command(about = "BLE diagnostics for ESP32 WiFi provisioning devices")]
struct Cli {
    /// Config file (default: $PROVDIAG_HOME/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan for devices
    Scan {
        /// Only report devices advertising the provisioning service
        #[arg(short, long)]
        filtered: bool,
        /// Scan duration in seconds
        #[arg(short, long)]
        duration: Option<u64>,
    },
    /// Run every step against one device
    Run {
        /// Device name or address to connect to
        #[arg(short, long)]
        device: Option<String>,
        /// Print the step report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Trigger steps one at a time
    Shell,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    let mut settings = config.settings();
    if let Commands::Scan {
        duration: Some(secs),
        ..
    } = &cli.command
    {
        settings.scan_window = std::time::Duration::from_secs(*secs);
    }
    let mut validator = Validator::new(BtleplugCentral, settings);

    let outcome = tokio::select! {
        result = execute(&mut validator, &cli.command) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    validator.shutdown().await;

    match outcome {
        None => {
            eprintln!("Interrupted");
            std::process::exit(130);
        }
        Some(result) => {
            if !result? {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}

/// Returns whether every step that ran passed.
async fn execute(
    v: &mut Validator<BtleplugCentral>,
    command: &Commands,
) -> Result<bool, Box<dyn std::error::Error>> {
    match command {
        Commands::Scan { filtered, .. } => {
            let step = if *filtered {
                StepId::FilteredScan
            } else {
                StepId::UnfilteredScan
            };
            println!(
                "Scanning for devices ({} seconds)...",
                v.settings().scan_window.as_secs()
            );
            let passed = commands::scan(v, *filtered).await;
            print!(
                "{}",
                report::render_steps(
                    v.board(),
                    &[StepId::CreateAdapter, StepId::AdapterState, step]
                )
            );
            let devices = if *filtered {
                v.filtered_devices()
            } else {
                v.unfiltered_devices()
            };
            println!("\nFound {} devices:", devices.len());
            print!(
                "{}",
                report::render_devices(devices.iter(), &v.settings().device_name_prefix)
            );
            Ok(passed)
        }
        Commands::Run { device, json } => {
            commands::run_all(v, device.as_deref()).await;
            if *json {
                println!("{}", serde_json::to_string_pretty(v.board())?);
            } else {
                print!("{}", report::render_board(v.board()));
            }
            Ok(!v.board().any_failed())
        }
        Commands::Shell => {
            shell::run(v).await?;
            Ok(!v.board().any_failed())
        }
    }
}

//! Fragscope - fragmentation inspector for rotational EXT4 disks
//!
//! A TUI that lists block devices, runs `e4defrag -c` analyses and full
//! defragmentations in the background, and draws an illustrative map of
//! how fragmented the selected filesystem is.

mod config;
mod core;
mod error;
mod fragmentation;
mod integrations;
mod tasks;
mod ui;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::core::app::App;
use crate::tasks::{headless, TaskKind};

#[derive(Parser)]
#[command(name = "fragscope")]
#[command(author = "Fragscope Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Inspect and defragment rotational EXT4 disks", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List block devices and whether they can be analyzed
    Devices,

    /// Run a fragmentation analysis and print the report
    Analyze {
        /// Device path (/dev/sdb1) or kernel name (sdb1)
        device: String,

        /// Also print an illustrative occupancy map
        #[arg(short, long)]
        map: bool,

        /// Map width in cells
        #[arg(long, default_value = "64")]
        width: u32,

        /// Map height in cells
        #[arg(long, default_value = "16")]
        height: u32,
    },

    /// Defragment a device with e4defrag
    Defrag {
        /// Device path (/dev/sdb1) or kernel name (sdb1)
        device: String,

        /// Confirm the operation; required
        #[arg(short, long)]
        yes: bool,
    },

    /// Write the default configuration file
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

fn setup_logging(verbosity: u8) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // Never log to the terminal; it belongs to the TUI
    let log_dir = dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fragscope")
        .join("logs");

    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "fragscope.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Keep the guard alive for the duration of the program
    let _logging_guard = setup_logging(cli.verbose)?;

    let explicit_config = cli.config.is_some();
    let config_path = cli.config.or_else(config::Config::default_path);

    let config = match &config_path {
        Some(path) if explicit_config || path.exists() => config::Config::load(path)?,
        _ => config::Config::default(),
    };

    match cli.command {
        Some(Commands::Devices) => {
            integrations::devices::print_devices(&config.tools.lister).await?;
        }
        Some(Commands::Analyze {
            device,
            map,
            width,
            height,
        }) => {
            let report = headless::run_once(&config, TaskKind::Analyze, &device).await?;
            print!("{}", headless::describe_report(&device, &report));
            if map {
                println!();
                print!("{}", headless::render_map(&config, &report, width, height));
            }
        }
        Some(Commands::Defrag { device, yes }) => {
            if !yes {
                anyhow::bail!(
                    "defragmenting {} rewrites file data in place; re-run with --yes to proceed",
                    device
                );
            }
            let report = headless::run_once(&config, TaskKind::Defragment, &device).await?;
            for line in report.raw_output.lines().filter(|l| !l.trim().is_empty()) {
                println!("{}", line);
            }
            println!("Defragmentation of {} finished", device);
        }
        Some(Commands::Init { force }) => {
            let path = config_path
                .ok_or_else(|| anyhow::anyhow!("no configuration directory on this system"))?;
            config::init_config(&path, force)?;
        }
        None => {
            // Launch the main TUI
            let mut app = App::new(config)?;
            app.run().await?;
        }
    }

    Ok(())
}

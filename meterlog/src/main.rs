/*!
# Meter Logger

Streams readings from a UNI-T UT61E+ multimeter through its CP2110 HID bridge.

The device node must already be opened up for UART traffic (UART enabled, 9600 8N1);
this tool only sends the reading trigger and decodes the answers.

## Usage

### Read from a device
```bash
meterlog read --device /dev/hidraw3
```

### JSON lines, ten readings, raw frames included
```bash
meterlog read --device /dev/hidraw3 --json --raw --count 10
```

### Without hardware
```bash
meterlog read --simulate
```

### From a configuration file
```bash
meterlog config --output meterlog.toml
meterlog --config meterlog.toml
```
*/

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod capture;
mod config;
mod sim;

use capture::MeterLogger;
use config::{AppConfig, OutputFormat};

#[derive(Parser)]
#[command(name = "meterlog")]
#[command(about = "Reading logger for the UNI-T UT61E+ multimeter")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, default_value = "meterlog.toml")]
    config: PathBuf,

    /// Log protocol details
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Read measurements
    Read {
        /// HID raw device node
        #[arg(short, long)]
        device: Option<String>,

        /// Use the simulated meter
        #[arg(long, conflicts_with = "device")]
        simulate: bool,

        /// Stop after this many readings
        #[arg(short = 'n', long)]
        count: Option<u64>,

        /// Print JSON lines instead of text
        #[arg(long)]
        json: bool,

        /// Include the raw frame as hex
        #[arg(long)]
        raw: bool,

        /// Pause between readings in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,
    },

    /// Generate configuration file
    Config {
        /// Output path for configuration file
        #[arg(short, long, default_value = "meterlog.toml")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr to keep stdout clean for readings
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Some(Commands::Read { device, simulate, count, json, raw, interval_ms }) => {
            let mut config = AppConfig::load_or_default(&cli.config)?;
            if let Some(device) = device {
                config.device.path = device;
                config.device.simulate = false;
            }
            if simulate {
                config.device.simulate = true;
            }
            if count.is_some() {
                config.capture.count = count;
            }
            if json {
                config.output.format = OutputFormat::Json;
            }
            if raw {
                config.output.show_raw = true;
            }
            if let Some(interval_ms) = interval_ms {
                config.capture.poll_interval_ms = interval_ms;
            }
            run_capture(config)
        }

        Some(Commands::Config { output }) => generate_config_file(output),

        None => {
            let config = AppConfig::load_from_file(&cli.config)?;
            info!("🚀 Starting capture from config: {}", cli.config.display());
            run_capture(config)
        }
    }
}

/// Run the read loop until done or interrupted
fn run_capture(config: AppConfig) -> Result<()> {
    if config.device.simulate {
        info!("🚀 Starting capture (simulated meter)");
    } else {
        info!("🚀 Starting capture on {}", config.device.path);
    }

    let mut logger = MeterLogger::new(config);

    // Set up Ctrl+C handler
    let running = logger.get_running_flag();
    ctrlc::set_handler(move || {
        eprintln!("\n🛑 Received Ctrl+C, shutting down gracefully...");
        running.store(false, Ordering::SeqCst);
    })?;

    let stats = logger.start()?;
    info!("✅ Capture completed: {} readings, {} failed cycles", stats.readings, stats.errors());
    Ok(())
}

/// Generate a default configuration file
fn generate_config_file(output_path: PathBuf) -> Result<()> {
    let config = AppConfig::new();
    config.save_to_file(&output_path)?;

    println!("✅ Generated configuration file: {}", output_path.display());
    println!("📝 Edit the file to customize settings, then run:");
    println!("   meterlog --config {}", output_path.display());

    Ok(())
}

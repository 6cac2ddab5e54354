//! Binary entrypoint for the smlbridge CLI.
//!
//! Commands:
//! - `run [--port <path>]` - read the meter and publish registers until interrupted
//! - `init` - create a starter `config.toml`
//! - `replay <file> [--hex]` - run a captured byte dump through the pipeline
//!
//! See the library crate docs for module-level details: `smlbridge::`.
use std::time::Instant;

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use smlbridge::config::Config;
use smlbridge::pipeline::{Pipeline, TickOutcome};
use smlbridge::sink::{JsonFileSink, RegisterBank, RegisterSink};
use smlbridge::source::ReplaySource;

#[derive(Parser)]
#[command(name = "smlbridge")]
#[command(about = "Publishes SML smart meter readings to a register sink")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Read the meter and publish registers
    Run {
        /// Meter serial port (e.g., /dev/ttyUSB0); overrides the config file
        #[arg(short, long)]
        port: Option<String>,
    },
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Feed a captured byte stream through the pipeline and print the results as JSON lines
    Replay {
        /// Capture file
        file: String,
        /// The capture is a whitespace-separated hex dump instead of raw bytes
        #[arg(long)]
        hex: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force } => {
            init_logging(&None, cli.verbose);
            if !force && tokio::fs::try_exists(&cli.config).await.unwrap_or(false) {
                bail!("{} already exists (use --force to overwrite)", cli.config);
            }
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
        }
        Commands::Run { port } => {
            let config = Config::load(&cli.config).await?;
            init_logging(&Some(config.clone()), cli.verbose);
            info!("Starting smlbridge v{}", env!("CARGO_PKG_VERSION"));
            run(config, port).await?;
        }
        Commands::Replay { file, hex } => {
            // Replay works without a config file; defaults are fine for captures.
            let (config, load_err) = match Config::load(&cli.config).await {
                Ok(c) => (c, None),
                Err(e) => (Config::default(), Some(e)),
            };
            init_logging(&Some(config.clone()), cli.verbose);
            if let Some(e) = load_err {
                warn!("{}; using defaults", e);
            }
            replay(&config, &file, hex).await?;
        }
    }

    Ok(())
}

#[cfg_attr(not(feature = "serial"), allow(dead_code))]
fn build_sink(config: &Config) -> Box<dyn RegisterSink> {
    match &config.sink.state_file {
        Some(path) => {
            info!("Mirroring {} registers to {}", config.sink.slots, path);
            Box::new(JsonFileSink::new(path, config.sink.slots))
        }
        None => Box::new(RegisterBank::new(config.sink.slots)),
    }
}

#[cfg(feature = "serial")]
async fn run(config: Config, port: Option<String>) -> Result<()> {
    use smlbridge::source::SerialSource;
    use tokio::time::{interval, sleep, Duration, MissedTickBehavior};

    // CLI overrides config; an empty configured port means "none"
    let port_path = match port {
        Some(p) => p,
        None if !config.serial.port.is_empty() => config.serial.port.clone(),
        None => bail!("No --port specified and no serial.port configured"),
    };
    let baud = config.serial.baud_rate;
    let mut source = SerialSource::open(&port_path, baud)?;
    info!("Connected to meter on {}", source.port_name());

    let mut pipeline = Pipeline::new(&config.pipeline, build_sink(&config));
    let stats = pipeline.stats();

    let mut ticker = interval(config.pipeline.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let stats_every = Duration::from_secs(config.pipeline.stats_interval_secs);
    let mut last_stats = Instant::now();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
            _ = ticker.tick() => {
                if let Err(e) = pipeline.tick(&mut source, Instant::now()) {
                    warn!("Meter port error on {}: {} (reopening)", port_path, e);
                    pipeline.reset();
                    sleep(Duration::from_secs(2)).await;
                    match SerialSource::open(&port_path, baud) {
                        Ok(s) => source = s,
                        Err(e) => warn!("{}", e),
                    }
                }
                if !stats_every.is_zero() && last_stats.elapsed() >= stats_every {
                    info!("Pipeline stats: {:?}", stats.snapshot());
                    last_stats = Instant::now();
                }
            }
        }
    }

    info!("Final pipeline stats: {:?}", stats.snapshot());
    Ok(())
}

#[cfg(not(feature = "serial"))]
async fn run(_config: Config, _port: Option<String>) -> Result<()> {
    bail!("The run command requires the 'serial' feature (cargo build --features serial)")
}

async fn replay(config: &Config, file: &str, hex: bool) -> Result<()> {
    let mut source = if hex {
        let text = tokio::fs::read_to_string(file)
            .await
            .map_err(|e| anyhow!("Failed to read {}: {}", file, e))?;
        ReplaySource::from_hex(&text).map_err(|e| anyhow!("Invalid hex dump {}: {}", file, e))?
    } else {
        let data = tokio::fs::read(file)
            .await
            .map_err(|e| anyhow!("Failed to read {}: {}", file, e))?;
        ReplaySource::new(data)
    };
    info!("Replaying {} bytes from {}", source.remaining(), file);

    let mut pipeline = Pipeline::new(&config.pipeline, RegisterBank::new(config.sink.slots));
    while !source.is_exhausted() {
        if let TickOutcome::Published(report) = pipeline.tick(&mut source, Instant::now())? {
            println!("{}", serde_json::to_string(&report)?);
        }
    }

    let snapshot = pipeline.stats().snapshot();
    info!("Replay finished: {:?}", snapshot);
    eprintln!("{}", serde_json::to_string(&snapshot)?);
    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .map(|c| c.logging.level_filter())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config
        .as_ref()
        .and_then(|c| c.logging.file.as_ref())
        .and_then(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        });

    if let Some(f) = log_file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        // Foreground runs also echo to the console
        let is_tty = atty::is(atty::Stream::Stdout);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
        });
    }
    let _ = builder.try_init();
}

//! gnsslink - GNSS receiver link CLI
//!
//! Provisions a binary-protocol GNSS receiver over a serial port and streams
//! decoded fixes, for bench setup and headless logging.

use clap::{Parser, Subcommand};
use gnsslink_core::cli::{format_fix, format_report, print_exit_codes, CliResult, ExitCodes, OutputFormat};
use gnsslink_core::config::{self, GnssConfig};
use gnsslink_core::core::fix_log::{generate_log_filename, FixLogFormat, FixLogger};
use gnsslink_core::core::protocol::{FrameError, NavigationData};
use gnsslink_core::core::transport::{list_ports, GpsSerial, SerialTransport};
use gnsslink_core::{GnssReceiver, SimulatedReceiver};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info, warn, Level};

/// Consecutive receive timeouts before monitoring gives up
const MAX_SILENT_READS: u32 = 5;

/// gnsslink CLI
#[derive(Parser, Debug)]
#[command(
    name = "gnsslink",
    version,
    about = "Provision a GNSS receiver and stream decoded fixes",
    long_about = None
)]
struct Cli {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Config file (defaults to the per-user config)
    #[arg(long, env = "GNSSLINK_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available serial ports
    Ports,

    /// Provision the receiver and print the report
    Provision {
        /// Serial port name (e.g., COM3, /dev/ttyUSB0)
        #[arg(short, long)]
        port: Option<String>,

        /// Logging sample rate in Hz
        #[arg(short, long)]
        sample_rate: Option<u32>,
    },

    /// Provision the receiver, then print fixes as they arrive
    Monitor {
        /// Serial port name (e.g., COM3, /dev/ttyUSB0)
        #[arg(short, long)]
        port: Option<String>,

        /// Logging sample rate in Hz
        #[arg(short, long)]
        sample_rate: Option<u32>,

        /// Stop after this many fixes
        #[arg(short = 'n', long)]
        count: Option<u64>,

        /// Fix log file, or a directory to create one in
        #[arg(short, long)]
        log: Option<PathBuf>,

        /// Fix log format (text, csv, jsonl)
        #[arg(long, default_value = "text")]
        log_format: FixLogFormat,

        /// Assume the receiver is already provisioned
        #[arg(long)]
        skip_provision: bool,
    },

    /// Run provisioning and monitoring against a simulated receiver
    Simulate {
        /// Fixes to generate
        #[arg(short = 'n', long, default_value = "10")]
        count: u64,

        /// Logging sample rate in Hz
        #[arg(short, long)]
        sample_rate: Option<u32>,

        /// Receiver never answers
        #[arg(long)]
        silent: bool,
    },

    /// Show or create the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show exit code reference
    ExitCodes,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    let result = match run(&cli).await {
        Ok(result) => result,
        Err(e) => CliResult::error(ExitCodes::INTERNAL_ERROR, format!("{e:#}")),
    };

    match &result {
        CliResult::Success(Some(msg)) if !cli.quiet => eprintln!("{msg}"),
        CliResult::Error(code, msg) => eprintln!("error: {msg} (exit code {code})"),
        _ => {}
    }
    result.to_exit_code()
}

fn init_tracing(cli: &Cli) {
    let level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::WARN
    } else {
        Level::INFO
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr);

    match cli.format {
        OutputFormat::Json => builder.json().init(),
        OutputFormat::Text => builder.init(),
    }
}

async fn run(cli: &Cli) -> anyhow::Result<CliResult> {
    match &cli.command {
        Commands::Ports => ports(cli),
        Commands::ExitCodes => {
            print_exit_codes();
            Ok(CliResult::success())
        }
        Commands::Config { action } => config_command(cli, action),
        Commands::Provision { port, sample_rate } => {
            let config = match load_config(cli) {
                Ok(config) => config,
                Err(e) => return Ok(e),
            };
            let mut receiver = match open_receiver(&config, port.as_deref()) {
                Ok(receiver) => receiver,
                Err(e) => return Ok(e),
            };
            let rate = sample_rate.unwrap_or(config.receiver.sample_rate_hz);
            Ok(provision(cli, &mut receiver, rate).await)
        }
        Commands::Monitor {
            port,
            sample_rate,
            count,
            log,
            log_format,
            skip_provision,
        } => {
            let config = match load_config(cli) {
                Ok(config) => config,
                Err(e) => return Ok(e),
            };
            let mut receiver = match open_receiver(&config, port.as_deref()) {
                Ok(receiver) => receiver,
                Err(e) => return Ok(e),
            };
            if !skip_provision {
                let rate = sample_rate.unwrap_or(config.receiver.sample_rate_hz);
                let result = provision(cli, &mut receiver, rate).await;
                if !result.is_success() {
                    return Ok(result);
                }
            }
            let logger = match log {
                Some(path) => Some(start_fix_log(path, *log_format)?),
                None => None,
            };
            monitor(cli, &mut receiver, *count, logger).await
        }
        Commands::Simulate {
            count,
            sample_rate,
            silent,
        } => {
            let config = match load_config(cli) {
                Ok(config) => config,
                Err(e) => return Ok(e),
            };
            let mut sim = SimulatedReceiver::new();
            sim.set_silent(*silent);
            for nav in demo_track(*count) {
                sim.queue_navigation(nav);
            }

            let mut receiver = GnssReceiver::with_settings(sim, config.link_settings());
            let rate = sample_rate.unwrap_or(config.receiver.sample_rate_hz);
            let result = provision(cli, &mut receiver, rate).await;
            if !result.is_success() {
                return Ok(result);
            }
            monitor(cli, &mut receiver, Some(*count), None).await
        }
    }
}

fn load_config(cli: &Cli) -> Result<GnssConfig, CliResult> {
    let config = match &cli.config {
        Some(path) => GnssConfig::load_from(path)?,
        None => GnssConfig::load()?,
    };
    config.validate()?;
    debug!(?config, "configuration loaded");
    Ok(config)
}

fn config_file(cli: &Cli) -> Result<PathBuf, CliResult> {
    match &cli.config {
        Some(path) => Ok(path.clone()),
        None => config::config_path().ok_or_else(|| CliResult::from(config::ConfigError::NoConfigDir)),
    }
}

fn open_receiver(config: &GnssConfig, port: Option<&str>) -> Result<GnssReceiver<SerialTransport>, CliResult> {
    let serial = config.serial_config(port);
    info!(port = %serial.port, line = %serial.line, "opening serial port");

    let mut transport = SerialTransport::new(serial);
    transport.open()?;
    Ok(GnssReceiver::with_settings(transport, config.link_settings()))
}

async fn provision<T: GpsSerial>(cli: &Cli, receiver: &mut GnssReceiver<T>, sample_rate_hz: u32) -> CliResult {
    let provisioned = receiver.provision(sample_rate_hz).await;
    if let Some(report) = receiver.provision_report() {
        if !cli.quiet || cli.format == OutputFormat::Json {
            println!("{}", format_report(report, cli.format));
        }
    }

    if provisioned {
        CliResult::success()
    } else {
        CliResult::provision_failed("receiver could not be provisioned")
    }
}

fn start_fix_log(path: &Path, format: FixLogFormat) -> anyhow::Result<FixLogger> {
    let path = if path.is_dir() {
        path.join(generate_log_filename("fixes", format))
    } else {
        path.to_path_buf()
    };

    let mut logger = FixLogger::new();
    logger.start(&path, format)?;
    info!(path = %path.display(), format = format.name(), "logging fixes");
    Ok(logger)
}

async fn monitor<T: GpsSerial>(
    cli: &Cli,
    receiver: &mut GnssReceiver<T>,
    count: Option<u64>,
    mut logger: Option<FixLogger>,
) -> anyhow::Result<CliResult> {
    let mut received = 0u64;
    let mut silent_reads = 0u32;

    while count.map_or(true, |n| received < n) {
        let update = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!(received, "interrupted");
                break;
            }
            update = receiver.get_update() => update,
        };

        match update {
            Ok(sample) => {
                received += 1;
                silent_reads = 0;
                println!("{}", format_fix(&sample, cli.format));
                if let Some(logger) = logger.as_mut() {
                    logger.log(&sample)?;
                }
            }
            Err(FrameError::Timeout) => {
                silent_reads += 1;
                warn!(silent_reads, "no navigation data");
                if silent_reads >= MAX_SILENT_READS {
                    return Ok(CliResult::timeout(format!(
                        "no navigation data after {silent_reads} attempts"
                    )));
                }
            }
            Err(e @ (FrameError::ChecksumMismatch { .. } | FrameError::Malformed(_))) => {
                warn!(error = %e, "navigation frame dropped");
            }
            Err(e) => return Ok(e.into()),
        }
    }

    if let Some(logger) = logger.as_mut() {
        logger.flush()?;
    }
    Ok(CliResult::success_with_message(format!("{received} fixes received")))
}

fn ports(cli: &Cli) -> anyhow::Result<CliResult> {
    let ports = match list_ports() {
        Ok(ports) => ports,
        Err(e) => return Ok(e.into()),
    };

    match cli.format {
        OutputFormat::Json => {
            let json: Vec<serde_json::Value> = ports
                .iter()
                .map(|p| {
                    serde_json::json!({
                        "name": p.port_name,
                        "type": format!("{:?}", p.port_type)
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            if ports.is_empty() && !cli.quiet {
                println!("No serial ports found.");
            }
            for port in &ports {
                println!("{} [{:?}]", port.port_name, port.port_type);
            }
        }
    }
    Ok(CliResult::success())
}

fn config_command(cli: &Cli, action: &ConfigAction) -> anyhow::Result<CliResult> {
    match action {
        ConfigAction::Show => {
            let config = match load_config(cli) {
                Ok(config) => config,
                Err(e) => return Ok(e),
            };
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
                OutputFormat::Text => match config.to_toml() {
                    Ok(text) => print!("{text}"),
                    Err(e) => return Ok(e.into()),
                },
            }
            Ok(CliResult::success())
        }
        ConfigAction::Path => {
            let path = match config_file(cli) {
                Ok(path) => path,
                Err(e) => return Ok(e),
            };
            println!("{}", path.display());
            Ok(CliResult::success())
        }
        ConfigAction::Init { force } => {
            let path = match config_file(cli) {
                Ok(path) => path,
                Err(e) => return Ok(e),
            };
            if path.exists() && !force {
                return Ok(CliResult::error(
                    ExitCodes::CONFIG_ERROR,
                    format!("{} exists, use --force to overwrite", path.display()),
                ));
            }
            if let Err(e) = GnssConfig::default().save_to(&path) {
                return Ok(e.into());
            }
            config::init_directories()?;
            Ok(CliResult::success_with_message(format!("wrote {}", path.display())))
        }
    }
}

/// A short drive north-east at about 50 km/h, one fix per 100 ms
fn demo_track(count: u64) -> impl Iterator<Item = NavigationData> {
    (0..count).map(demo_fix)
}

fn demo_fix(index: u64) -> NavigationData {
    let step = i32::try_from(index).unwrap_or(i32::MAX);
    let ticks = u32::try_from(index.saturating_mul(10)).unwrap_or(u32::MAX);
    NavigationData {
        fix_mode: 2,
        satellites: 11,
        week: 2300,
        time_of_week: 36_000_000u32.saturating_add(ticks),
        latitude: 601_699_000i32.saturating_add(step.saturating_mul(9)),
        longitude: 249_384_000i32.saturating_add(step.saturating_mul(18)),
        ellipsoid_altitude: 2_150,
        mean_sea_level_altitude: -150,
        ecef_velocity: [-700, 1_100, 550],
        ..NavigationData::default()
    }
}

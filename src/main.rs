//! Fiber Viewing Camera CLI
//!
//! Counts devices, reports camera status, and takes and stores object,
//! bias and test exposures.

use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use xiq_camera::{
    Camera, CameraDriver, CameraManager, CaptureMetrics, ExposureKind, ExposureWriter,
    FileConfig, MockDriver,
};

#[derive(Debug, Parser)]
#[command(name = "xiq-camera", version, about = "XIMEA xiQ fiber viewing camera control")]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Use the simulated camera even when the hardware binding is available.
    #[arg(long, global = true)]
    mock: bool,

    /// Device index.
    #[arg(short, long, global = true)]
    device: Option<i32>,

    /// Print Prometheus metrics before exiting.
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the number of attached devices.
    Count,
    /// Print model, serial number, exposure time and gain.
    Status,
    /// Take one exposure and write it to disk.
    Expose {
        /// Exposure type.
        #[arg(short, long, value_enum)]
        kind: Option<ExposureKind>,
        /// Frames summed (object exposures only).
        #[arg(short = 'n', long)]
        frames: Option<i32>,
        /// Exposure time in microseconds.
        #[arg(short, long)]
        exposure: Option<i32>,
        /// Gain in decibels.
        #[arg(short, long)]
        gain: Option<f32>,
        /// Output directory.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Take object exposures repeatedly until Ctrl-C or the count is reached.
    Watch {
        /// Pause between exposures in milliseconds.
        #[arg(short, long)]
        interval: Option<u64>,
        /// Number of exposures; runs until interrupted when omitted.
        #[arg(short, long)]
        count: Option<u32>,
        /// Frames summed per exposure.
        #[arg(short = 'n', long)]
        frames: Option<i32>,
    },
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    info!("Fiber viewing camera v{}", xiq_camera::VERSION);

    if let Err(e) = dispatch(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<FileConfig, Box<dyn Error>> {
    let mut config = match &cli.config {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };
    if let Some(device) = cli.device {
        config.camera.device = device;
    }
    match &cli.command {
        Command::Expose {
            kind,
            frames,
            exposure,
            gain,
            output,
        } => {
            config.exposure.kind = kind.unwrap_or(config.exposure.kind);
            config.exposure.nframe = frames.unwrap_or(config.exposure.nframe);
            config.camera.exposure_us = exposure.or(config.camera.exposure_us);
            config.camera.gain_db = gain.or(config.camera.gain_db);
            if let Some(dir) = output {
                config.output.directory = dir.clone();
            }
        }
        Command::Watch {
            interval,
            count,
            frames,
        } => {
            config.output.interval_ms = interval.unwrap_or(config.output.interval_ms);
            config.exposure.nframe = frames.unwrap_or(config.exposure.nframe);
            match count {
                Some(count) => {
                    config.output.count = *count;
                    config.output.continuous = false;
                }
                None if cli.config.is_none() => config.output.continuous = true,
                None => {}
            }
        }
        Command::Count | Command::Status => {}
    }
    config.validate()?;
    Ok(config)
}

fn dispatch(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = load_config(&cli)?;
    let metrics = CaptureMetrics::new()?;

    #[cfg(feature = "xiapi")]
    if !cli.mock {
        let driver = xiq_camera::sdk::XiApiDriver::new();
        return run(driver, &cli.command, &config, &metrics, cli.metrics);
    }
    #[cfg(not(feature = "xiapi"))]
    if !cli.mock {
        warn!("Built without the xiapi feature, using the simulated camera");
    }

    run(MockDriver::default(), &cli.command, &config, &metrics, cli.metrics)
}

fn run<D: CameraDriver>(
    driver: D,
    command: &Command,
    config: &FileConfig,
    metrics: &CaptureMetrics,
    print_metrics: bool,
) -> Result<(), Box<dyn Error>> {
    let mut manager = CameraManager::new(driver).with_metrics(metrics.clone());

    match command {
        Command::Count => {
            println!("{}", manager.count_devices()?);
        }
        Command::Status => {
            let camera = connect(manager, config)?;
            println!("{}", camera.status());
        }
        Command::Expose { .. } => {
            let mut camera = connect(manager, config)?;
            let mut writer = exposure_writer(config);
            let exposure = camera.expose(config.exposure.kind, config.exposure.nframe)?;
            let written = writer.write(&exposure)?;
            println!("{}", written.fits.display());
        }
        Command::Watch { .. } => {
            let camera = connect(manager, config)?;
            watch(camera, config)?;
        }
    }

    if print_metrics {
        print!("{}", metrics.encode()?);
    }
    Ok(())
}

fn connect<D: CameraDriver>(
    manager: CameraManager<D>,
    config: &FileConfig,
) -> Result<Camera<D>, Box<dyn Error>> {
    let camera = Camera::connect(
        manager,
        config.camera.device,
        config.camera.exposure_us,
        config.camera.gain_db,
    )?;
    Ok(camera)
}

fn exposure_writer(config: &FileConfig) -> ExposureWriter {
    ExposureWriter::new(&config.output.directory, &config.output.prefix)
        .with_preview(config.output.preview)
}

fn watch<D: CameraDriver>(mut camera: Camera<D>, config: &FileConfig) -> Result<(), Box<dyn Error>> {
    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        handler_flag.store(false, Ordering::SeqCst);
    })?;

    let mut writer = exposure_writer(config);
    let interval = Duration::from_millis(config.output.interval_ms);
    let mut taken = 0u32;

    info!(
        continuous = config.output.continuous,
        count = config.output.count,
        interval_ms = config.output.interval_ms,
        "Watching; press Ctrl-C to stop"
    );

    while running.load(Ordering::SeqCst)
        && (config.output.continuous || taken < config.output.count)
    {
        let started = Instant::now();
        match camera.expose(ExposureKind::Object, config.exposure.nframe) {
            Ok(exposure) => {
                let written = writer.write(&exposure)?;
                println!("{}", written.fits.display());
            }
            Err(e) => {
                warn!("Exposure failed: {}", e);
                camera.reconnect()?;
            }
        }
        taken += 1;
        if !config.output.continuous && taken >= config.output.count {
            break;
        }

        // Sleep in short steps so Ctrl-C is noticed promptly.
        while running.load(Ordering::SeqCst) && started.elapsed() < interval {
            std::thread::sleep(Duration::from_millis(50).min(interval));
        }
    }

    info!(exposures = taken, "Watch finished");
    Ok(())
}

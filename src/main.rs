//! Sensor-capture binary for exercising the capture pipeline on V4L2 devices.

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing::{debug, info, warn};

use sensor_capture::sensor_mode::REFERENCE_MODE_INDEX;
use sensor_capture::traits::PixelFormat;
use sensor_capture::{
    AdaptOutcome, Camera, CameraConfig, CameraProvider, CaptureSession, Image, ReadOutcome,
    SensorDevice, SensorModePolicy, V4L2Provider,
};

#[derive(Parser)]
#[command(name = "sensor-capture")]
#[command(about = "Drive an image sensor through repeating or one-shot capture")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List capture devices and their sensor modes
    List,

    /// Capture continuously, feeding each frame's exposure into the next
    Repeat(CaptureArgs),

    /// Submit one capture per frame
    OneShot(CaptureArgs),
}

#[derive(Args)]
struct CaptureArgs {
    /// Device index (from 'sensor-capture list')
    #[arg(short, long, default_value = "0")]
    device: usize,

    /// Output width in pixels
    #[arg(long, default_value = "1280")]
    width: u32,

    /// Output height in pixels
    #[arg(long, default_value = "720")]
    height: u32,

    /// Locked frame rate
    #[arg(long, default_value = "30")]
    fps: u32,

    /// Sensor mode index
    #[arg(long, conflicts_with = "best_match")]
    sensor_mode: Option<usize>,

    /// Pick the smallest sensor mode that fits the output
    #[arg(long)]
    best_match: bool,

    /// Do not request capture metadata
    #[arg(long)]
    no_metadata: bool,

    /// Request YUYV instead of NV12 from the device
    #[arg(long)]
    yuyv: bool,

    /// Stop after this many frames
    #[arg(short = 'n', long)]
    frames: Option<u64>,

    /// Save the last frame as PNG
    #[arg(short, long)]
    save: Option<PathBuf>,

    /// Give up on a completion event after this many milliseconds
    #[arg(long)]
    event_timeout_ms: Option<u64>,
}

impl CaptureArgs {
    fn config(&self) -> CameraConfig {
        let policy = if self.best_match {
            SensorModePolicy::BestMatch
        } else {
            SensorModePolicy::Fixed(self.sensor_mode.unwrap_or(REFERENCE_MODE_INDEX))
        };
        let format = if self.yuyv {
            PixelFormat::Yuyv
        } else {
            PixelFormat::Yuv420
        };

        let config = CameraConfig::new(self.device, self.width, self.height, !self.no_metadata)
            .fps(self.fps)
            .pixel_format(format)
            .sensor_mode(policy);
        match self.event_timeout_ms {
            Some(ms) => config.event_timeout(Duration::from_millis(ms)),
            None => config,
        }
    }
}

fn main() {
    // RUST_LOG controls verbosity, e.g. RUST_LOG=sensor_capture=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::List => list_devices(),
        Commands::Repeat(args) => capture(&args, Mode::Repeat),
        Commands::OneShot(args) => capture(&args, Mode::OneShot),
    }
}

fn list_devices() -> Result<(), Box<dyn Error>> {
    let devices = V4L2Provider.devices()?;
    if devices.is_empty() {
        println!("No capture devices found");
    }

    for (index, device) in devices.iter().enumerate() {
        println!("[{index}] {} ({})", device.name(), device.path().display());
        match device.sensor_modes() {
            Ok(modes) => {
                for mode in modes {
                    println!("    mode {}: {}", mode.index, mode.label);
                }
            }
            Err(err) => println!("    modes unavailable: {err}"),
        }
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Repeat,
    OneShot,
}

fn capture(args: &CaptureArgs, mode: Mode) -> Result<(), Box<dyn Error>> {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_handler = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        stop_handler.store(true, Ordering::SeqCst);
    })?;

    let mut camera = Camera::open(&V4L2Provider, args.config())?;
    camera.list_devices();

    let last = match mode {
        Mode::Repeat => {
            camera.start_repeating()?;
            let last = read_loop(&mut camera, args, &stop, |camera| {
                match camera.wait_for_completion_and_adapt_exposure()? {
                    AdaptOutcome::Adapted { exposure_range, .. } => {
                        debug!(exposure_ns = exposure_range.min, "next exposure");
                    }
                    AdaptOutcome::Degraded => debug!("exposure left unchanged"),
                }
                Ok(())
            })?;
            camera.stop_repeating()?;
            last
        }
        Mode::OneShot => read_loop(&mut camera, args, &stop, |camera| {
            camera.capture_once()?;
            if !camera.is_connected() {
                camera.wait_for_connection()?;
            }
            Ok(())
        })?,
    };

    if let (Some(path), Some(image)) = (&args.save, last) {
        save_png(&image, path)?;
        info!(path = %path.display(), "frame saved");
    }
    Ok(())
}

/// Run `step` then read a frame until the pipeline runs dry, the frame limit
/// is hit or Ctrl-C is pressed. Returns the last frame when saving.
fn read_loop<S, F>(
    camera: &mut Camera<S>,
    args: &CaptureArgs,
    stop: &AtomicBool,
    mut step: F,
) -> Result<Option<Image>, Box<dyn Error>>
where
    S: CaptureSession,
    F: FnMut(&mut Camera<S>) -> sensor_capture::Result<()>,
{
    let mut image = Image::new();
    let mut last = None;
    let mut count = 0u64;

    while !stop.load(Ordering::SeqCst) && args.frames.map_or(true, |limit| count < limit) {
        match step(camera) {
            Ok(()) => {}
            Err(err) if err.is_recoverable() => warn!(%err, "capture cycle failed"),
            Err(err) => return Err(err.into()),
        }

        match camera.read(&mut image) {
            Ok(ReadOutcome::Frame) => {
                count += 1;
                info!(frame = count, width = image.width(), height = image.height(), "frame");
                if args.save.is_some() {
                    last = Some(image.clone());
                }
            }
            Ok(ReadOutcome::Empty) => {
                info!("pipeline returned no image");
                break;
            }
            Err(err) if err.is_recoverable() => warn!(%err, "frame read failed"),
            Err(err) => return Err(err.into()),
        }
    }

    info!(frames = count, "capture finished");
    Ok(last)
}

fn save_png(image: &Image, path: &Path) -> Result<(), Box<dyn Error>> {
    let rgb: Vec<u8> = image
        .data()
        .chunks_exact(Image::CHANNELS)
        .flat_map(|bgr| bgr.iter().rev().copied())
        .collect();
    let buffer = image::RgbImage::from_raw(image.width(), image.height(), rgb)
        .ok_or("image buffer size mismatch")?;
    buffer.save(path)?;
    Ok(())
}

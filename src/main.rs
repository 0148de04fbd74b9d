//! One-shot CLI: decode an image, push it through the panel's dither/scale
//! pipeline, and show it. No daemon, no scheduler, no web server — whatever
//! needs to run this on a timer owns the timer (cron, systemd timer unit).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use inky::config::Config;
use inky::image::Image;
use inky::inky::{self, CreateOptions, Inky as _};

#[derive(Parser, Debug)]
#[command(name = "inky")]
#[command(about = "Render an image to an Inky e-paper HAT")]
#[command(version)]
struct Args {
    /// Image file to display (PNG/JPEG/whatever the `image` crate reads)
    input: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, default_value = "/etc/inky/config.json")]
    config: PathBuf,

    /// Drive a simulated panel (writes a PNG instead of touching hardware)
    #[arg(long)]
    simulate: bool,

    /// Clear the panel to its border color and exit; ignores `input`
    #[arg(long)]
    clear: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose || Config::load(&args.config).map(|c| c.verbose).unwrap_or(false));

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            match err.downcast_ref::<inky::InkyError>() {
                Some(inky::InkyError::Unsupported(_)) | Some(inky::InkyError::TimedOut(_)) => {
                    ExitCode::from(1)
                }
                _ => ExitCode::from(2),
            }
        }
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let config = Config::load(&args.config).unwrap_or_else(|err| {
        tracing::warn!("failed to load config from {}: {err}", args.config.display());
        tracing::info!("using default configuration");
        Config::default()
    });

    let opts = CreateOptions {
        simulate: args.simulate,
        i2c_device: config.i2c_device.clone(),
        spi_device: config.spi_device.clone(),
        spi_speed_hz: config.spi_speed_hz,
    };
    let mut display = inky::create(&opts)?;
    display.set_border(config.border)?;

    if args.clear {
        tracing::info!("clearing display");
        display.clear()?;
        display.show()?;
        return Ok(());
    }

    let input = args
        .input
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("an input image path is required unless --clear is given"))?;

    tracing::info!("loading {}", input.display());
    let img = Image::read_file(input)?;
    display.set_image(&img)?;
    display.show()?;
    tracing::info!("frame sent");
    Ok(())
}

/// Default level is "warn" to minimize SD card wear from log writes;
/// `--verbose` or a `verbose` config flag bumps it to "debug".
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };

    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| format!("inky={level}").into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

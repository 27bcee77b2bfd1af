//! streetbot - histogram localization and navigation on a street-grid map.
//!
//! The robot is placed anywhere on a printed street-grid map, localizes
//! itself by scanning building colors at intersections with a histogram
//! Bayes filter, and then drives to the requested intersection.
//!
//! Usage: `streetbot-nav <map.ppm> <dest_x> <dest_y>`; a destination of
//! `-1 -1` runs the interactive sensor calibration instead. Exits 0 on
//! arrival or completed calibration, 1 on any startup or parse error.

mod calibrate;
mod config;
mod control;
mod error;

use clap::Parser;
use config::BotConfig;
use control::{Controller, Outcome};
use error::{NavError, Result};
use std::path::PathBuf;
use std::process::ExitCode;
use streetbot_core::{Classifier, ColorTable, GridMap, RgbImage};
use streetbot_io::{Maneuvers, SimDrive};
use tracing::{error, info, warn};

/// Default calibration file, next to the binary's working directory.
const DEFAULT_CALIBRATION_PATH: &str = "rgb.dat";

#[derive(Debug, Parser)]
#[command(
    name = "streetbot",
    about = "Histogram localization and navigation on a street-grid map",
    version
)]
struct Cli {
    /// Map image (.ppm, P6): red border, black streets, yellow
    /// intersections, blue/green/white buildings
    map: PathBuf,

    /// Target intersection column; `-1 -1` runs sensor calibration
    #[arg(allow_hyphen_values = true)]
    dest_x: i32,

    /// Target intersection row
    #[arg(allow_hyphen_values = true)]
    dest_y: i32,

    /// Configuration file (defaults apply when it does not exist)
    #[arg(long, default_value = "streetbot.toml")]
    config: PathBuf,

    /// Drive backend; a physical base plugs in behind the same trait
    #[arg(long, default_value = "sim")]
    device: String,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("streetbot_nav=info".parse().unwrap())
                .add_directive("streetbot_core=info".parse().unwrap())
                .add_directive("streetbot_io=info".parse().unwrap()),
        )
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = if cli.config.exists() {
        info!("loading configuration from {}", cli.config.display());
        BotConfig::load(&cli.config)?
    } else {
        info!("using default configuration");
        BotConfig::default()
    };

    let calibrating = cli.dest_x == -1 && cli.dest_y == -1;
    let calibration_path = config
        .calibration
        .path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CALIBRATION_PATH));

    let table = if calibrating {
        // Start from the previous calibration when one exists.
        if calibration_path.exists() {
            ColorTable::load(&calibration_path)?
        } else {
            ColorTable::pure()
        }
    } else {
        match &config.calibration.path {
            Some(path) => {
                info!("loading calibration from {}", path.display());
                ColorTable::load(path)?
            }
            None => {
                warn!("no calibration file configured, using pure color references");
                ColorTable::pure()
            }
        }
    };

    let image = RgbImage::read(&cli.map)?;
    let map = GridMap::from_image(&image)?;
    info!("parsed map: {} x {} intersections", map.width(), map.height());

    let mut drive = build_drive(&cli.device, image, &config)?;

    if calibrating {
        calibrate::run(&mut drive, table, &calibration_path)?;
        info!("calibration complete");
        return Ok(());
    }

    if !map.in_bounds(cli.dest_x, cli.dest_y) {
        return Err(NavError::DestinationOutOfBounds(cli.dest_x, cli.dest_y));
    }

    let mut controller = Controller::new(
        drive,
        map,
        Classifier::new(table),
        config.filter,
        Maneuvers::new(config.maneuvers),
        config.control.clone(),
        (cli.dest_x as usize, cli.dest_y as usize),
    );

    match controller.run() {
        Outcome::Arrived => {
            info!(
                "arrived at ({}, {}) after {} intersection visits",
                cli.dest_x,
                cli.dest_y,
                controller.visits()
            );
            Ok(())
        }
        Outcome::VisitLimit => Err(NavError::Incomplete(
            "intersection visit limit reached".to_string(),
        )),
    }
}

/// Construct the drive backend. Only the simulator ships in-tree; a real
/// base implements [`streetbot_io::Drive`] over its own transport.
fn build_drive(device: &str, image: RgbImage, config: &BotConfig) -> Result<SimDrive> {
    match device {
        "sim" => Ok(SimDrive::new(image, config.sim)?),
        other => Err(NavError::UnknownDevice(other.to_string())),
    }
}

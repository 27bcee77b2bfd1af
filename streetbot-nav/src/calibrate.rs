//! Interactive sensor calibration.
//!
//! Lets the operator hold the sensor over each map color in turn and
//! records an averaged reference value for it, then writes the table to
//! the calibration file. Illumination and battery level shift the raw
//! readings enough that calibrated references make classification far more
//! reliable than the pure defaults.

use crate::error::Result;
use log::info;
use std::io::BufRead;
use std::path::Path;
use streetbot_core::{Color, ColorTable};
use streetbot_io::Drive;

/// Samples averaged per reference reading.
const SAMPLES_PER_COLOR: usize = 10;

/// Run the calibration dialog on stdin and save the table on quit.
pub fn run<D: Drive>(drive: &mut D, table: ColorTable, path: &Path) -> Result<()> {
    let stdin = std::io::stdin();
    run_with_input(drive, table, path, &mut stdin.lock())
}

fn run_with_input<D: Drive, R: BufRead>(
    drive: &mut D,
    mut table: ColorTable,
    path: &Path,
    input: &mut R,
) -> Result<()> {
    print_menu();
    let mut line = String::new();
    loop {
        line.clear();
        if input.read_line(&mut line)? == 0 {
            // End of input behaves like quit.
            break;
        }
        let color = match line.trim().chars().next() {
            Some('q') | Some('Q') | None => break,
            Some('b') => Color::Black,
            Some('u') => Color::Blue,
            Some('g') => Color::Green,
            Some('y') => Color::Yellow,
            Some('r') => Color::Red,
            Some('w') => Color::White,
            Some(other) => {
                println!("unknown selection {:?}, enter one of b u g y r w q", other);
                print_menu();
                continue;
            }
        };

        let (mean, spread) = average_samples(drive);
        println!(
            "{} reference: {} {} {} (spread {:.1} {:.1} {:.1})",
            color, mean[0], mean[1], mean[2], spread[0], spread[1], spread[2]
        );
        table.set_reference(color, mean);
        print_menu();
    }

    table.save(path)?;
    info!("calibration saved to {}", path.display());
    Ok(())
}

/// Mean and per-channel standard deviation over a burst of samples.
///
/// The spread is a direct readout of the sensor noise under the current
/// conditions; a large value means the matching likelihoods deserve a
/// second look.
fn average_samples<D: Drive>(drive: &mut D) -> ([i32; 3], [f64; 3]) {
    let mut samples = [[0i32; 3]; SAMPLES_PER_COLOR];
    for sample in &mut samples {
        *sample = drive.read_color();
    }

    let mut mean = [0i32; 3];
    let mut spread = [0f64; 3];
    for channel in 0..3 {
        let sum: i32 = samples.iter().map(|s| s[channel]).sum();
        let avg = sum as f64 / SAMPLES_PER_COLOR as f64;
        let var: f64 = samples
            .iter()
            .map(|s| {
                let d = s[channel] as f64 - avg;
                d * d
            })
            .sum::<f64>()
            / SAMPLES_PER_COLOR as f64;
        mean[channel] = avg.round() as i32;
        spread[channel] = var.sqrt();
    }
    (mean, spread)
}

fn print_menu() {
    println!("== sensor calibration ==");
    println!("  b  black (street)");
    println!("  u  blue building");
    println!("  g  green building");
    println!("  y  yellow (intersection)");
    println!("  r  red (boundary)");
    println!("  w  white (background)");
    println!("  q  save and quit");
    println!("place the sensor over the color and enter its key:");
}

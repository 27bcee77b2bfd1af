//! Color classification against a calibrated reference table.
//!
//! The sensor reports raw RGB triples; classification ranks the six
//! canonical map colors by an inverse-distance score and picks the best.
//! The scores are a ranking heuristic, not calibrated probabilities: across
//! the six colors they sum to 5, not 1. Downstream consumers that need a
//! probability (the belief filter's correction step) therefore use soft
//! likelihood constants instead of these scores.

use crate::error::{Error, Result};
use std::fmt;
use std::io::Write;
use std::path::Path;

/// The six canonical sensor colors, in calibration-file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    /// Street surface.
    Black,
    Blue,
    Green,
    /// Intersection marker.
    Yellow,
    /// Map boundary marker.
    Red,
    /// Background / no building.
    White,
}

impl Color {
    /// All colors in calibration-file order.
    pub const ALL: [Color; 6] = [
        Color::Black,
        Color::Blue,
        Color::Green,
        Color::Yellow,
        Color::Red,
        Color::White,
    ];

    fn index(self) -> usize {
        match self {
            Color::Black => 0,
            Color::Blue => 1,
            Color::Green => 2,
            Color::Yellow => 3,
            Color::Red => 4,
            Color::White => 5,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Color::Black => "black",
            Color::Blue => "blue",
            Color::Green => "green",
            Color::Yellow => "yellow",
            Color::Red => "red",
            Color::White => "white",
        };
        f.write_str(name)
    }
}

/// Building color stored per intersection corner.
///
/// `None` covers both "white building" and "no building"; corners whose
/// pixels do not parse are also left as `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildingColor {
    #[default]
    None,
    Blue,
    Green,
}

impl BuildingColor {
    /// Whether a classified sensor reading agrees with this corner.
    pub fn matches(self, seen: Color) -> bool {
        matches!(
            (self, seen),
            (BuildingColor::None, Color::White)
                | (BuildingColor::Blue, Color::Blue)
                | (BuildingColor::Green, Color::Green)
        )
    }
}

/// One intersection's 4-color scan, clockwise from the robot-relative
/// top-left corner.
pub type Observation = [Color; 4];

/// Reference RGB values for the six canonical colors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorTable {
    refs: [[i32; 3]; 6],
}

impl Default for ColorTable {
    fn default() -> Self {
        Self::pure()
    }
}

impl ColorTable {
    /// Idealized references: the pure map-image colors.
    ///
    /// A calibrated table is always preferable on real hardware; these are
    /// the fallback when no calibration file is configured.
    pub fn pure() -> Self {
        Self {
            refs: [
                [0, 0, 0],       // black
                [0, 0, 255],     // blue
                [0, 255, 0],     // green
                [255, 255, 0],   // yellow
                [255, 0, 0],     // red
                [255, 255, 255], // white
            ],
        }
    }

    /// Build a table from explicit references, in [`Color::ALL`] order.
    pub fn from_refs(refs: [[i32; 3]; 6]) -> Self {
        Self { refs }
    }

    /// Reference value for one color.
    pub fn reference(&self, color: Color) -> [i32; 3] {
        self.refs[color.index()]
    }

    /// Replace the reference value for one color.
    pub fn set_reference(&mut self, color: Color, rgb: [i32; 3]) {
        self.refs[color.index()] = rgb;
    }

    /// Load a calibration file: 18 integers, one per line, channel-major
    /// (six R values in [`Color::ALL`] order, then six G, then six B).
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut values = text.lines().filter(|l| !l.trim().is_empty());
        let mut refs = [[0i32; 3]; 6];
        for channel in 0..3 {
            for color in 0..6 {
                let line = values.next().ok_or_else(|| {
                    Error::Calibration(format!("expected 18 values, file ends at {}", channel * 6 + color))
                })?;
                refs[color][channel] = line.trim().parse().map_err(|_| {
                    Error::Calibration(format!("not an integer: {:?}", line.trim()))
                })?;
            }
        }
        Ok(Self { refs })
    }

    /// Write the table in the same 18-line channel-major layout.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut out = std::fs::File::create(path)?;
        for channel in 0..3 {
            for color in 0..6 {
                writeln!(out, "{}", self.refs[color][channel])?;
            }
        }
        Ok(())
    }
}

/// Nearest-reference color classifier.
#[derive(Debug, Clone)]
pub struct Classifier {
    table: ColorTable,
}

impl Classifier {
    pub fn new(table: ColorTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &ColorTable {
        &self.table
    }

    /// Ranking score per color: `(Σ distances − d_color) / Σ distances`.
    ///
    /// Higher is better. Scores sum to 5 across the six colors.
    pub fn scores(&self, sample: [i32; 3]) -> [f64; 6] {
        let distances: Vec<f64> = Color::ALL
            .iter()
            .map(|c| distance(self.table.reference(*c), sample))
            .collect();
        let total: f64 = distances.iter().sum();
        if total <= f64::EPSILON {
            // Degenerate table: every reference equals the sample.
            return [5.0 / 6.0; 6];
        }
        let mut scores = [0.0; 6];
        for (score, d) in scores.iter_mut().zip(&distances) {
            *score = (total - d) / total;
        }
        scores
    }

    /// The best-ranked color for a raw sample.
    pub fn classify(&self, sample: [i32; 3]) -> Color {
        let scores = self.scores(sample);
        let mut best = Color::Black;
        let mut best_score = f64::NEG_INFINITY;
        for color in Color::ALL {
            if scores[color.index()] >= best_score {
                best_score = scores[color.index()];
                best = color;
            }
        }
        best
    }
}

fn distance(reference: [i32; 3], sample: [i32; 3]) -> f64 {
    let mut sq = 0.0;
    for c in 0..3 {
        let d = (reference[c] - sample[c]) as f64;
        sq += d * d;
    }
    sq.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_classify_pure_colors() {
        let classifier = Classifier::new(ColorTable::pure());
        assert_eq!(classifier.classify([0, 0, 0]), Color::Black);
        assert_eq!(classifier.classify([0, 0, 255]), Color::Blue);
        assert_eq!(classifier.classify([0, 255, 0]), Color::Green);
        assert_eq!(classifier.classify([255, 255, 0]), Color::Yellow);
        assert_eq!(classifier.classify([255, 0, 0]), Color::Red);
        assert_eq!(classifier.classify([255, 255, 255]), Color::White);
    }

    #[test]
    fn test_classify_noisy_sample() {
        let classifier = Classifier::new(ColorTable::pure());
        assert_eq!(classifier.classify([20, 30, 10]), Color::Black);
        assert_eq!(classifier.classify([240, 230, 30]), Color::Yellow);
    }

    #[test]
    fn test_scores_sum_to_five() {
        let classifier = Classifier::new(ColorTable::pure());
        let scores = classifier.scores([120, 80, 200]);
        let sum: f64 = scores.iter().sum();
        assert_relative_eq!(sum, 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_calibration_round_trip() {
        let mut table = ColorTable::pure();
        table.set_reference(Color::Black, [12, 14, 9]);
        table.set_reference(Color::Yellow, [230, 220, 40]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.dat");
        table.save(&path).unwrap();

        let loaded = ColorTable::load(&path).unwrap();
        assert_eq!(loaded, table);
    }

    #[test]
    fn test_calibration_file_layout_is_channel_major() {
        let table = ColorTable::pure();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.dat");
        table.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let values: Vec<i32> = text.lines().map(|l| l.parse().unwrap()).collect();
        assert_eq!(values.len(), 18);
        // First six lines: R channel for black, blue, green, yellow, red, white.
        assert_eq!(&values[0..6], &[0, 0, 0, 255, 255, 255]);
        // Next six: G channel.
        assert_eq!(&values[6..12], &[0, 0, 255, 255, 0, 255]);
        // Last six: B channel.
        assert_eq!(&values[12..18], &[0, 255, 0, 0, 0, 255]);
    }

    #[test]
    fn test_calibration_load_rejects_short_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.dat");
        std::fs::write(&path, "1\n2\n3\n").unwrap();
        assert!(ColorTable::load(&path).is_err());
    }

    #[test]
    fn test_building_color_matching() {
        assert!(BuildingColor::None.matches(Color::White));
        assert!(BuildingColor::Blue.matches(Color::Blue));
        assert!(BuildingColor::Green.matches(Color::Green));
        assert!(!BuildingColor::None.matches(Color::Blue));
        assert!(!BuildingColor::Blue.matches(Color::Black));
    }
}

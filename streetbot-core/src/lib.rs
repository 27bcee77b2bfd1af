//! streetbot-core - Localization and navigation primitives for a street-grid
//! robot.
//!
//! The crate is pure computation plus file parsing; hardware access lives in
//! `streetbot-io` and sequencing in the `streetbot-nav` binary.
//!
//! # Layers
//!
//! - [`ppm`] / [`map`]: P6 image reading and the immutable intersection grid
//!   with its four clockwise building colors per cell.
//! - [`color`]: calibrated reference table and the ranking classifier that
//!   turns raw RGB samples into canonical colors.
//! - [`belief`]: the exact histogram Bayes filter over (cell, heading)
//!   states - predict / correct / decide.
//! - [`planner`]: greedy Manhattan-reduction policy from pose to action.

pub mod belief;
pub mod color;
pub mod error;
pub mod map;
pub mod planner;
pub mod pose;
pub mod ppm;

pub use belief::{BeliefFilter, FilterConfig};
pub use color::{BuildingColor, Classifier, Color, ColorTable, Observation};
pub use error::{Error, Result};
pub use map::GridMap;
pub use planner::{plan, NavCommand};
pub use pose::{Action, GridPose, Heading, PoseEstimate};
pub use ppm::RgbImage;

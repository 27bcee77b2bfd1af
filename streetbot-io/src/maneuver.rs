//! Open-loop maneuver table.
//!
//! Every move the controller makes is a timed motor command with a fixed
//! power and duration; the table keeps those timings in one configurable
//! place instead of scattering magic numbers through the control code.
//! Timings are calibrated against the physical base; residual drift is the
//! controller's problem, not the table's.

use crate::drive::{Drive, MOTOR_BOTH, MOTOR_LEFT, MOTOR_RIGHT};
use serde::Deserialize;
use streetbot_core::Action;

/// Power and duration of one timed move.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MoveTiming {
    /// Motor power in percent.
    pub power: i8,
    /// Ramp up/down time in milliseconds.
    pub ramp_ms: u32,
    /// Full-power run time in milliseconds.
    pub run_ms: u32,
}

/// Timings for the whole maneuver repertoire.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ManeuverConfig {
    /// Long step: enter/leave an intersection corner, cross the marker.
    #[serde(default = "default_stride")]
    pub stride: MoveTiming,

    /// Medium step used while probing for the street.
    #[serde(default = "default_nudge")]
    pub nudge: MoveTiming,

    /// Short step used for the intersection double-check.
    #[serde(default = "default_inch")]
    pub inch: MoveTiming,

    /// Small in-place correction turn.
    #[serde(default = "default_trim")]
    pub trim: MoveTiming,

    /// Quarter-diagonal pivot used by the corner scan.
    #[serde(default = "default_pivot_45")]
    pub pivot_45: MoveTiming,

    /// Quarter turn.
    #[serde(default = "default_pivot_90")]
    pub pivot_90: MoveTiming,

    /// Half turn used at the map boundary.
    #[serde(default = "default_pivot_180")]
    pub pivot_180: MoveTiming,

    /// Continuous power while following a street.
    #[serde(default = "default_follow_power")]
    pub follow_power: i8,

    /// Continuous power while creeping in search of a street.
    #[serde(default = "default_seek_power")]
    pub seek_power: i8,
}

fn default_stride() -> MoveTiming {
    MoveTiming { power: 25, ramp_ms: 80, run_ms: 400 }
}
fn default_nudge() -> MoveTiming {
    MoveTiming { power: 20, ramp_ms: 80, run_ms: 200 }
}
fn default_inch() -> MoveTiming {
    MoveTiming { power: 15, ramp_ms: 80, run_ms: 80 }
}
fn default_trim() -> MoveTiming {
    MoveTiming { power: 30, ramp_ms: 60, run_ms: 80 }
}
fn default_pivot_45() -> MoveTiming {
    MoveTiming { power: 20, ramp_ms: 80, run_ms: 500 }
}
fn default_pivot_90() -> MoveTiming {
    MoveTiming { power: 20, ramp_ms: 60, run_ms: 1000 }
}
fn default_pivot_180() -> MoveTiming {
    MoveTiming { power: 20, ramp_ms: 60, run_ms: 2200 }
}
fn default_follow_power() -> i8 {
    10
}
fn default_seek_power() -> i8 {
    5
}

impl Default for ManeuverConfig {
    fn default() -> Self {
        Self {
            stride: default_stride(),
            nudge: default_nudge(),
            inch: default_inch(),
            trim: default_trim(),
            pivot_45: default_pivot_45(),
            pivot_90: default_pivot_90(),
            pivot_180: default_pivot_180(),
            follow_power: default_follow_power(),
            seek_power: default_seek_power(),
        }
    }
}

/// Executes table-driven maneuvers against any [`Drive`].
#[derive(Debug, Clone)]
pub struct Maneuvers {
    config: ManeuverConfig,
}

impl Maneuvers {
    pub fn new(config: ManeuverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ManeuverConfig {
        &self.config
    }

    fn straight<D: Drive>(&self, drive: &mut D, timing: MoveTiming, backwards: bool) {
        let power = if backwards { -timing.power } else { timing.power };
        drive.timed(MOTOR_BOTH, power, timing.ramp_ms, timing.run_ms, timing.ramp_ms);
        drive.wait_idle();
    }

    fn pivot<D: Drive>(&self, drive: &mut D, timing: MoveTiming, clockwise: bool) {
        let (left, right) = if clockwise {
            (timing.power, -timing.power)
        } else {
            (-timing.power, timing.power)
        };
        drive.timed(MOTOR_LEFT, left, timing.ramp_ms, timing.run_ms, timing.ramp_ms);
        drive.timed(MOTOR_RIGHT, right, timing.ramp_ms, timing.run_ms, timing.ramp_ms);
        drive.wait_idle();
    }

    pub fn forward_stride<D: Drive>(&self, drive: &mut D) {
        self.straight(drive, self.config.stride, false);
    }

    pub fn backward_stride<D: Drive>(&self, drive: &mut D) {
        self.straight(drive, self.config.stride, true);
    }

    pub fn nudge_forward<D: Drive>(&self, drive: &mut D) {
        self.straight(drive, self.config.nudge, false);
    }

    pub fn nudge_backward<D: Drive>(&self, drive: &mut D) {
        self.straight(drive, self.config.nudge, true);
    }

    pub fn inch_forward<D: Drive>(&self, drive: &mut D) {
        self.straight(drive, self.config.inch, false);
    }

    pub fn trim_left<D: Drive>(&self, drive: &mut D) {
        self.pivot(drive, self.config.trim, false);
    }

    pub fn trim_right<D: Drive>(&self, drive: &mut D) {
        self.pivot(drive, self.config.trim, true);
    }

    pub fn pivot_left_45<D: Drive>(&self, drive: &mut D) {
        self.pivot(drive, self.config.pivot_45, false);
    }

    pub fn pivot_right_45<D: Drive>(&self, drive: &mut D) {
        self.pivot(drive, self.config.pivot_45, true);
    }

    pub fn pivot_left_90<D: Drive>(&self, drive: &mut D) {
        self.pivot(drive, self.config.pivot_90, false);
    }

    pub fn pivot_right_90<D: Drive>(&self, drive: &mut D) {
        self.pivot(drive, self.config.pivot_90, true);
    }

    /// Half turn, used to back away from the map boundary.
    pub fn about_face<D: Drive>(&self, drive: &mut D) {
        self.pivot(drive, self.config.pivot_180, false);
    }

    /// Execute a planned action's turn component. `Forward` is a no-op:
    /// street following provides the advance.
    pub fn execute<D: Drive>(&self, drive: &mut D, action: Action) {
        match action {
            Action::Forward => {}
            Action::TurnRight => self.pivot_right_90(drive),
            Action::TurnAround => {
                self.pivot_right_90(drive);
                self.pivot_right_90(drive);
            }
            Action::TurnLeft => self.pivot_left_90(drive),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records issued commands for assertions.
    #[derive(Default)]
    struct RecordingDrive {
        commands: Vec<(u8, i8, u32)>,
        waits: usize,
    }

    impl Drive for RecordingDrive {
        fn start(&mut self, _ports: u8, _power: i8) {}
        fn stop_all(&mut self, _brake: bool) {}
        fn timed(&mut self, ports: u8, power: i8, _up: u32, run_ms: u32, _down: u32) {
            self.commands.push((ports, power, run_ms));
        }
        fn wait_idle(&mut self) {
            self.waits += 1;
        }
        fn read_color(&mut self) -> [i32; 3] {
            [0, 0, 0]
        }
    }

    #[test]
    fn test_pivot_drives_wheels_in_opposition() {
        let maneuvers = Maneuvers::new(ManeuverConfig::default());
        let mut drive = RecordingDrive::default();
        maneuvers.pivot_right_90(&mut drive);

        assert_eq!(drive.commands.len(), 2);
        let (left, right) = (drive.commands[0], drive.commands[1]);
        assert_eq!(left.0, MOTOR_LEFT);
        assert_eq!(right.0, MOTOR_RIGHT);
        assert_eq!(left.1, -right.1);
        assert_eq!(drive.waits, 1);
    }

    #[test]
    fn test_backward_negates_power() {
        let maneuvers = Maneuvers::new(ManeuverConfig::default());
        let mut drive = RecordingDrive::default();
        maneuvers.nudge_backward(&mut drive);

        assert_eq!(drive.commands.len(), 1);
        assert_eq!(drive.commands[0].0, MOTOR_BOTH);
        assert!(drive.commands[0].1 < 0);
    }

    #[test]
    fn test_turn_around_is_two_quarter_turns() {
        let maneuvers = Maneuvers::new(ManeuverConfig::default());
        let mut drive = RecordingDrive::default();
        maneuvers.execute(&mut drive, Action::TurnAround);
        assert_eq!(drive.commands.len(), 4);

        drive.commands.clear();
        maneuvers.execute(&mut drive, Action::Forward);
        assert!(drive.commands.is_empty());
    }
}

//! Control state machine.
//!
//! Sequences perception and actuation around the belief filter: follow the
//! street while classifying, confirm and scan intersections, feed the
//! filter, let the planner (or the exploration alternation, while the pose
//! is unknown) pick the next turn, and absorb sensor trouble with the
//! double-check, the boundary reversal, and the widening adjust sweep.
//!
//! Everything is synchronous and single-owner: one cycle is strictly
//! predict, correct, normalize, decide, plan, act, and no sensor sample is
//! taken mid-maneuver.

use crate::config::ControlConfig;
use log::{debug, info, warn};
use streetbot_core::{
    plan, Action, BeliefFilter, Classifier, Color, FilterConfig, GridMap, NavCommand, Observation,
    PoseEstimate,
};
use streetbot_io::{Drive, Maneuvers, MOTOR_BOTH};

/// Control-loop states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    /// Hunting for any street feature after being placed on the map.
    SeekStreet,
    /// Advancing along a street.
    FollowStreet,
    /// Scanning, updating beliefs, and turning at an intersection.
    AtIntersection,
    /// Reversing away from the map boundary.
    AtBoundary,
    /// Sweeping to reacquire a lost street.
    Adjusting,
    /// Terminal.
    Stopped,
}

/// Why the control loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The planner signalled arrival at the target.
    Arrived,
    /// The configured visit limit ran out first.
    VisitLimit,
}

/// Drives the robot until the planner signals arrival.
pub struct Controller<D: Drive> {
    drive: D,
    map: GridMap,
    classifier: Classifier,
    filter: BeliefFilter,
    maneuvers: Maneuvers,
    config: ControlConfig,
    dest: (usize, usize),

    state: ControlState,
    last_action: Option<Action>,
    recovery: bool,
    /// Alternates the exploration turn across unlocalized visits so the
    /// robot does not keep retracing one corridor.
    explore_left: bool,
    visits: u64,
    outcome: Outcome,
}

impl<D: Drive> Controller<D> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        drive: D,
        map: GridMap,
        classifier: Classifier,
        filter_config: FilterConfig,
        maneuvers: Maneuvers,
        config: ControlConfig,
        dest: (usize, usize),
    ) -> Self {
        let filter = BeliefFilter::new(filter_config, map.width(), map.height());
        Self {
            drive,
            map,
            classifier,
            filter,
            maneuvers,
            config,
            dest,
            state: ControlState::SeekStreet,
            last_action: None,
            recovery: false,
            explore_left: true,
            visits: 0,
            outcome: Outcome::Arrived,
        }
    }

    /// Run the loop to completion.
    pub fn run(&mut self) -> Outcome {
        info!("navigating to ({}, {})", self.dest.0, self.dest.1);
        loop {
            debug!("control state: {:?}", self.state);
            self.state = match self.state {
                ControlState::SeekStreet => self.seek_street(),
                ControlState::FollowStreet => self.follow_street(),
                ControlState::AtIntersection => self.at_intersection(),
                ControlState::AtBoundary => self.at_boundary(),
                ControlState::Adjusting => self.adjusting(),
                ControlState::Stopped => break,
            };
        }
        self.outcome
    }

    pub fn visits(&self) -> u64 {
        self.visits
    }

    /// One classified sensor reading.
    fn classify(&mut self) -> Color {
        let sample = self.drive.read_color();
        self.classifier.classify(sample)
    }

    /// Creep until any street feature shows up under the sensor.
    fn seek_street(&mut self) -> ControlState {
        info!("seeking a street");
        loop {
            match self.classify() {
                Color::Black | Color::Yellow | Color::Red => {
                    self.drive.stop_all(true);
                    return ControlState::FollowStreet;
                }
                _ => {
                    let power = self.maneuvers.config().seek_power;
                    self.drive.start(MOTOR_BOTH, power);
                }
            }
        }
    }

    /// Advance while the sensor reads street, then confirm what ended it.
    fn follow_street(&mut self) -> ControlState {
        while self.classify() == Color::Black {
            let power = self.maneuvers.config().follow_power;
            self.drive.start(MOTOR_BOTH, power);
        }
        self.drive.stop_all(true);

        // A single off-street reading may be the gap between street and
        // marker paint; nudge ahead and sample again before committing.
        match self.double_check() {
            Color::Yellow => ControlState::AtIntersection,
            Color::Red => ControlState::AtBoundary,
            Color::Black => ControlState::FollowStreet,
            other => {
                debug!("off-street reading confirmed as {}", other);
                ControlState::Adjusting
            }
        }
    }

    fn double_check(&mut self) -> Color {
        self.maneuvers.inch_forward(&mut self.drive);
        self.classify()
    }

    /// The full intersection visit: scan, filter, decide, turn.
    fn at_intersection(&mut self) -> ControlState {
        if self.config.max_visits > 0 && self.visits >= self.config.max_visits {
            warn!(
                "visit limit ({}) reached without arriving",
                self.config.max_visits
            );
            self.drive.stop_all(false);
            self.outcome = Outcome::VisitLimit;
            return ControlState::Stopped;
        }
        self.visits += 1;

        let observation = self.scan_intersection();
        if observation
            .iter()
            .any(|c| matches!(c, Color::Black | Color::Yellow | Color::Red))
        {
            // Street paint among the buildings means the scan drifted; the
            // soft mismatch likelihood absorbs it, no retry needed.
            warn!("suspicious intersection scan: {:?}", observation);
        }

        self.filter
            .update(&self.map, self.last_action, &observation, self.recovery);
        let pose = self.filter.decide();
        match pose {
            PoseEstimate::Known(p) => {
                info!("localized at ({}, {}) facing {:?}", p.x, p.y, p.heading)
            }
            PoseEstimate::Unknown => info!("pose still ambiguous after visit {}", self.visits),
        }

        let action = match plan(pose, self.dest.0, self.dest.1) {
            NavCommand::Arrive => {
                self.drive.stop_all(false);
                info!("arrived at the target intersection");
                self.outcome = Outcome::Arrived;
                return ControlState::Stopped;
            }
            NavCommand::Continue => {
                let action = if self.explore_left {
                    Action::TurnLeft
                } else {
                    Action::TurnRight
                };
                self.explore_left = !self.explore_left;
                debug!("exploring with {:?}", action);
                action
            }
            NavCommand::Act(action) => action,
        };

        self.maneuvers.execute(&mut self.drive, action);
        // Step off the marker so street following does not re-trigger.
        self.maneuvers.forward_stride(&mut self.drive);
        self.recovery = false;
        self.last_action = Some(action);
        ControlState::FollowStreet
    }

    /// Read the four building corners clockwise from the robot-relative
    /// top-left: sweep one diagonal, then the other, then restore heading.
    fn scan_intersection(&mut self) -> Observation {
        self.maneuvers.pivot_left_45(&mut self.drive);
        self.maneuvers.forward_stride(&mut self.drive);
        let tl = self.classify();
        self.maneuvers.backward_stride(&mut self.drive);
        self.maneuvers.backward_stride(&mut self.drive);
        let br = self.classify();
        self.maneuvers.forward_stride(&mut self.drive);

        self.maneuvers.pivot_right_90(&mut self.drive);
        self.maneuvers.trim_right(&mut self.drive);
        self.maneuvers.forward_stride(&mut self.drive);
        let tr = self.classify();
        self.maneuvers.backward_stride(&mut self.drive);
        self.maneuvers.backward_stride(&mut self.drive);
        let bl = self.classify();
        self.maneuvers.forward_stride(&mut self.drive);
        self.maneuvers.pivot_left_45(&mut self.drive);

        debug!("scan: tl={} tr={} br={} bl={}", tl, tr, br, bl);
        [tl, tr, br, bl]
    }

    /// Reverse away from the boundary marker and flag the next prediction.
    fn at_boundary(&mut self) -> ControlState {
        warn!("map boundary detected, reversing");
        self.recovery = true;
        self.maneuvers.about_face(&mut self.drive);
        while self.classify() == Color::Red {
            self.maneuvers.forward_stride(&mut self.drive);
        }
        ControlState::FollowStreet
    }

    /// Alternating left/right sweep with a widening limit until the street
    /// (or a marker) is back under the sensor.
    fn adjusting(&mut self) -> ControlState {
        warn!("off the street, sweeping to reacquire");
        let mut left_turns = 0usize;
        let mut right_turns = 0usize;
        let mut limit = self.config.adjust_start_limit;
        let mut last_was_left = true;

        loop {
            if matches!(self.classify(), Color::Black | Color::Yellow) {
                self.drive.stop_all(true);
                return ControlState::FollowStreet;
            }
            self.back_onto_street();

            if left_turns < limit {
                self.maneuvers.trim_left(&mut self.drive);
                left_turns += 1;
                last_was_left = true;
            } else if right_turns < 2 * limit {
                self.maneuvers.trim_right(&mut self.drive);
                right_turns += 1;
                last_was_left = false;
            }
            self.maneuvers.nudge_forward(&mut self.drive);

            match self.classify() {
                Color::Black | Color::Yellow | Color::Red => {
                    // Found it ahead; settle back onto the heading that
                    // worked and resume.
                    self.maneuvers.nudge_backward(&mut self.drive);
                    if last_was_left {
                        self.maneuvers.trim_left(&mut self.drive);
                    } else {
                        self.maneuvers.trim_right(&mut self.drive);
                    }
                    self.maneuvers.nudge_forward(&mut self.drive);
                    return ControlState::FollowStreet;
                }
                _ => {
                    if left_turns >= limit && right_turns >= 2 * limit {
                        left_turns = 0;
                        right_turns = 0;
                        limit += 1;
                        debug!("widening adjust sweep to {} trims", limit);
                    }
                }
            }
        }
    }

    /// Reverse slowly until the sensor is back over street paint.
    fn back_onto_street(&mut self) {
        while self.classify() != Color::Black {
            let power = self.maneuvers.config().seek_power;
            self.drive.start(MOTOR_BOTH, -power);
        }
        self.drive.stop_all(true);
    }
}

/// Introspection used by the tests.
#[cfg(test)]
impl<D: Drive> Controller<D> {
    fn state(&self) -> ControlState {
        self.state
    }

    fn recovery(&self) -> bool {
        self.recovery
    }

    fn last_action(&self) -> Option<Action> {
        self.last_action
    }

    fn drive(&self) -> &D {
        &self.drive
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControlConfig;
    use std::collections::VecDeque;
    use streetbot_core::{BuildingColor, ColorTable};
    use streetbot_io::ManeuverConfig;

    const BLACK: [i32; 3] = [0, 0, 0];
    const BLUE: [i32; 3] = [0, 0, 255];
    const GREEN: [i32; 3] = [0, 255, 0];
    const YELLOW: [i32; 3] = [255, 255, 0];
    const RED: [i32; 3] = [255, 0, 0];
    const WHITE: [i32; 3] = [255, 255, 255];

    /// Feeds a fixed sequence of color samples and records timed commands.
    struct ScriptedDrive {
        colors: VecDeque<[i32; 3]>,
        timed_log: Vec<(u8, i8, u32)>,
    }

    impl ScriptedDrive {
        fn new(colors: &[[i32; 3]]) -> Self {
            Self {
                colors: colors.iter().copied().collect(),
                timed_log: Vec::new(),
            }
        }
    }

    impl Drive for ScriptedDrive {
        fn start(&mut self, _ports: u8, _power: i8) {}
        fn stop_all(&mut self, _brake: bool) {}
        fn timed(&mut self, ports: u8, power: i8, _up: u32, run_ms: u32, _down: u32) {
            self.timed_log.push((ports, power, run_ms));
        }
        fn wait_idle(&mut self) {}
        fn read_color(&mut self) -> [i32; 3] {
            self.colors.pop_front().expect("color script exhausted")
        }
    }

    /// Same 3x3 map as the core tests: cell (i, j) = [c(i), c(j), Blue,
    /// Green], pairwise distinct tuples.
    fn test_map() -> GridMap {
        fn c(n: usize) -> BuildingColor {
            match n {
                0 => BuildingColor::None,
                1 => BuildingColor::Blue,
                _ => BuildingColor::Green,
            }
        }
        let mut cells = Vec::new();
        for j in 0..3 {
            for i in 0..3 {
                cells.push([c(i), c(j), BuildingColor::Blue, BuildingColor::Green]);
            }
        }
        GridMap::new(3, 3, cells)
    }

    fn controller(
        script: &[[i32; 3]],
        dest: (usize, usize),
        config: ControlConfig,
    ) -> Controller<ScriptedDrive> {
        Controller::new(
            ScriptedDrive::new(script),
            test_map(),
            Classifier::new(ColorTable::pure()),
            FilterConfig::default(),
            Maneuvers::new(ManeuverConfig::default()),
            config,
            dest,
        )
    }

    #[test]
    fn test_single_scan_localizes_and_arrives() {
        // Seek finds street, follow hits the marker, the scan matches cell
        // (1, 1) facing up, and (1, 1) is the target.
        let script = [
            BLACK, // seek
            YELLOW, // follow stops
            YELLOW, // double check
            BLUE, BLUE, BLUE, GREEN, // scan: tl, br, tr, bl
        ];
        let mut controller = controller(&script, (1, 1), ControlConfig::default());

        assert_eq!(controller.run(), Outcome::Arrived);
        assert_eq!(controller.visits(), 1);
        assert_eq!(controller.state(), ControlState::Stopped);
    }

    #[test]
    fn test_localize_then_drive_one_block() {
        // First visit localizes at (1, 1) facing up; target (1, 0) is one
        // block ahead, so the planner orders Forward and the second visit
        // confirms arrival.
        let script = [
            BLACK, // seek
            YELLOW, YELLOW, // follow + double check
            BLUE, BLUE, BLUE, GREEN, // scan matches (1, 1) up
            BLACK, YELLOW, YELLOW, // follow + double check
            BLUE, BLUE, WHITE, GREEN, // scan matches (1, 0) up: tl, br, tr, bl
        ];
        let mut controller = controller(&script, (1, 0), ControlConfig::default());

        assert_eq!(controller.run(), Outcome::Arrived);
        assert_eq!(controller.visits(), 2);
        assert_eq!(controller.last_action(), Some(Action::Forward));
    }

    #[test]
    fn test_boundary_sets_recovery_and_reverses() {
        let script = [
            BLACK, // seek
            RED, RED, // follow stops, double check confirms boundary
            RED, BLACK, // still on the marker, then clear of it
            BLACK, YELLOW, YELLOW, // follow + double check
            BLUE, BLUE, BLUE, GREEN, // scan matches (1, 1) up
        ];
        let mut controller = controller(&script, (1, 1), ControlConfig::default());

        assert_eq!(controller.run(), Outcome::Arrived);
        // Arrival happens before the flag is cleared by a turn.
        assert!(controller.recovery());
        // The reversal issued the half-turn timing.
        let half_turns = controller
            .drive()
            .timed_log
            .iter()
            .filter(|(_, _, run_ms)| *run_ms == 2200)
            .count();
        assert_eq!(half_turns, 2, "about-face drives both wheels once each");
    }

    #[test]
    fn test_adjust_sweep_reacquires_street() {
        let script = [
            BLACK, // seek
            BLACK, GREEN, // follow advances, then drifts onto a building
            GREEN, // double check confirms off-street
            GREEN, // adjust entry check
            BLACK, // reversing back onto the street
            BLACK, // probe after the first trim finds the street
            YELLOW, YELLOW, // follow + double check
            BLUE, BLUE, BLUE, GREEN, // scan matches (1, 1) up
        ];
        let mut controller = controller(&script, (1, 1), ControlConfig::default());

        assert_eq!(controller.run(), Outcome::Arrived);
        assert_eq!(controller.visits(), 1);
    }

    #[test]
    fn test_unknown_pose_alternates_exploration_turns() {
        // All-white scans match nothing, so the pose stays unknown and the
        // controller alternates left/right exploration turns until the
        // visit limit stops it.
        let script = [
            BLACK, // seek
            YELLOW, YELLOW, // follow + double check
            WHITE, WHITE, WHITE, WHITE, // ambiguous scan
            BLACK, YELLOW, YELLOW, // follow + double check
            WHITE, WHITE, WHITE, WHITE, // ambiguous scan
            YELLOW, YELLOW, // follow + double check, visit limit hits
        ];
        let config = ControlConfig {
            max_visits: 2,
            ..ControlConfig::default()
        };
        let mut controller = controller(&script, (2, 2), config);

        assert_eq!(controller.run(), Outcome::VisitLimit);
        assert_eq!(controller.visits(), 2);
        assert_eq!(controller.last_action(), Some(Action::TurnRight));

        // Left-wheel quarter-turn commands, in order: each scan pivots
        // right once, then the exploration turn follows - left (negative
        // power) after the first scan, right after the second.
        let pivots: Vec<i8> = controller
            .drive()
            .timed_log
            .iter()
            .filter(|(ports, _, run_ms)| *run_ms == 1000 && *ports == streetbot_io::MOTOR_LEFT)
            .map(|(_, power, _)| *power)
            .collect();
        assert_eq!(pivots, vec![20, -20, 20, 20]);
    }
}

//! Grid pose primitives: headings, discrete actions, pose estimates.
//!
//! The grid is raster ordered, so `Up` points toward decreasing `y` and
//! `Down` toward increasing `y`.

use serde::{Deserialize, Serialize};

/// Cardinal facing direction, in clockwise order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Heading {
    Up,
    Right,
    Down,
    Left,
}

impl Heading {
    /// All headings in clockwise order, index-aligned with [`Heading::index`].
    pub const ALL: [Heading; 4] = [Heading::Up, Heading::Right, Heading::Down, Heading::Left];

    /// Index in clockwise order (Up = 0).
    pub fn index(self) -> usize {
        match self {
            Heading::Up => 0,
            Heading::Right => 1,
            Heading::Down => 2,
            Heading::Left => 3,
        }
    }

    /// Heading for a clockwise index (taken modulo 4).
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % 4]
    }

    /// Unit cell step along this heading, `(dx, dy)` in raster coordinates.
    pub fn step(self) -> (i32, i32) {
        match self {
            Heading::Up => (0, -1),
            Heading::Right => (1, 0),
            Heading::Down => (0, 1),
            Heading::Left => (-1, 0),
        }
    }

    /// Heading after a quarter turn clockwise.
    pub fn clockwise(self) -> Self {
        Self::from_index(self.index() + 1)
    }

    /// Heading after a quarter turn counter-clockwise.
    pub fn counter_clockwise(self) -> Self {
        Self::from_index(self.index() + 3)
    }

    /// Opposite heading.
    pub fn reverse(self) -> Self {
        Self::from_index(self.index() + 2)
    }

    /// Unit step perpendicular to this heading (sign is arbitrary; callers
    /// use both signs).
    pub fn lateral(self) -> (i32, i32) {
        let (dx, dy) = self.step();
        (dy, dx)
    }
}

/// A discrete maneuver executed between intersection visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Keep heading, advance one intersection.
    Forward,
    /// Quarter turn clockwise, then advance.
    TurnRight,
    /// Half turn, then advance.
    TurnAround,
    /// Quarter turn counter-clockwise, then advance.
    TurnLeft,
}

impl Action {
    /// Number of clockwise quarter turns this action applies to the heading.
    pub fn quarter_turns(self) -> usize {
        match self {
            Action::Forward => 0,
            Action::TurnRight => 1,
            Action::TurnAround => 2,
            Action::TurnLeft => 3,
        }
    }

    /// Heading after executing this action.
    pub fn apply(self, heading: Heading) -> Heading {
        Heading::from_index(heading.index() + self.quarter_turns())
    }

    /// The action that rotates `from` onto `to`.
    pub fn between(from: Heading, to: Heading) -> Self {
        match (to.index() + 4 - from.index()) % 4 {
            0 => Action::Forward,
            1 => Action::TurnRight,
            2 => Action::TurnAround,
            _ => Action::TurnLeft,
        }
    }
}

/// A committed cell-and-heading pose on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridPose {
    /// Intersection column.
    pub x: usize,
    /// Intersection row.
    pub y: usize,
    /// Facing direction.
    pub heading: Heading,
}

/// Outcome of the belief filter's decision step.
///
/// `Unknown` is returned whenever no single state is a strict, non-tied
/// maximum of the belief distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoseEstimate {
    /// A unique most-likely pose.
    Known(GridPose),
    /// Belief is still ambiguous.
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_rotations() {
        assert_eq!(Heading::Up.clockwise(), Heading::Right);
        assert_eq!(Heading::Left.clockwise(), Heading::Up);
        assert_eq!(Heading::Up.counter_clockwise(), Heading::Left);
        assert_eq!(Heading::Right.reverse(), Heading::Left);
        for h in Heading::ALL {
            assert_eq!(h.clockwise().counter_clockwise(), h);
            assert_eq!(h.reverse().reverse(), h);
        }
    }

    #[test]
    fn test_heading_steps_are_raster_oriented() {
        assert_eq!(Heading::Up.step(), (0, -1));
        assert_eq!(Heading::Down.step(), (0, 1));
        assert_eq!(Heading::Right.step(), (1, 0));
        assert_eq!(Heading::Left.step(), (-1, 0));
    }

    #[test]
    fn test_action_apply() {
        assert_eq!(Action::Forward.apply(Heading::Down), Heading::Down);
        assert_eq!(Action::TurnRight.apply(Heading::Down), Heading::Left);
        assert_eq!(Action::TurnAround.apply(Heading::Left), Heading::Right);
        assert_eq!(Action::TurnLeft.apply(Heading::Up), Heading::Left);
    }

    #[test]
    fn test_action_between_inverts_apply() {
        for from in Heading::ALL {
            for action in [
                Action::Forward,
                Action::TurnRight,
                Action::TurnAround,
                Action::TurnLeft,
            ] {
                let to = action.apply(from);
                assert_eq!(Action::between(from, to), action);
            }
        }
    }
}

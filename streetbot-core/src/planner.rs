//! Greedy grid navigation policy.
//!
//! The street grid has no interior obstacles, only the perimeter boundary,
//! so Manhattan-distance reduction is sufficient: close the x gap first,
//! then the y gap. No path search is involved.

use crate::pose::{Action, Heading, PoseEstimate};

/// Next move decided from the estimated pose and the target cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavCommand {
    /// The estimated pose is the target; stop.
    Arrive,
    /// Pose unknown; keep driving and localizing, do not plan a turn.
    Continue,
    /// Execute this action at the current intersection.
    Act(Action),
}

/// Decide the next move toward `(tx, ty)`.
pub fn plan(pose: PoseEstimate, tx: usize, ty: usize) -> NavCommand {
    let pose = match pose {
        PoseEstimate::Known(p) => p,
        PoseEstimate::Unknown => return NavCommand::Continue,
    };

    if pose.x == tx && pose.y == ty {
        return NavCommand::Arrive;
    }

    let travel = if pose.x == tx {
        if pose.y < ty {
            Heading::Down
        } else {
            Heading::Up
        }
    } else if pose.x < tx {
        Heading::Right
    } else {
        Heading::Left
    };

    NavCommand::Act(Action::between(pose.heading, travel))
}

//! Histogram Bayesian filter over (cell, heading) states.
//!
//! The state space is small and discrete (at most 20 x 20 cells x 4
//! headings = 1600 states), so the filter performs an exact closed-form
//! Bayes update every intersection visit: predict through a transition
//! kernel, correct against the scanned building colors, renormalize, and
//! only commit to a pose when a single state is a strict maximum.
//!
//! Both transition regimes are expressed as one data-driven scatter pass
//! over per-source kernel entries instead of per-action/per-heading
//! branches; the weights are configuration, not constants.

use crate::color::Observation;
use crate::map::GridMap;
use crate::pose::{Action, GridPose, Heading, PoseEstimate};
use log::{debug, warn};
use serde::Deserialize;

/// Tunable weights of the belief filter.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct FilterConfig {
    /// Weight of the exact post-action state in the normal regime.
    #[serde(default = "default_move_weight")]
    pub move_weight: f64,

    /// Weight of each diagonal-neighbor leak in the normal regime.
    #[serde(default = "default_leak_weight")]
    pub leak_weight: f64,

    /// Residual mass kept at the unchanged state in the normal regime.
    #[serde(default = "default_stay_weight")]
    pub stay_weight: f64,

    /// Weight of the reversed-in-place state in the boundary regime.
    #[serde(default = "default_reflect_weight")]
    pub reflect_weight: f64,

    /// Weight of each along-the-wall leak in the boundary regime.
    #[serde(default = "default_reflect_leak_weight")]
    pub reflect_leak_weight: f64,

    /// Residual mass kept at the unchanged state in the boundary regime.
    #[serde(default = "default_reflect_stay_weight")]
    pub reflect_stay_weight: f64,

    /// Likelihood multiplier when the observation matches a state exactly.
    #[serde(default = "default_match_likelihood")]
    pub match_likelihood: f64,

    /// Likelihood multiplier on mismatch. Must stay above zero or a single
    /// misclassified corner wipes out the true state.
    #[serde(default = "default_mismatch_likelihood")]
    pub mismatch_likelihood: f64,

    /// Tolerance for the unique-maximum test in [`BeliefFilter::decide`],
    /// applied uniformly across all headings.
    #[serde(default = "default_decide_epsilon")]
    pub decide_epsilon: f64,
}

fn default_move_weight() -> f64 {
    0.7
}
fn default_leak_weight() -> f64 {
    0.05
}
fn default_stay_weight() -> f64 {
    0.2
}
fn default_reflect_weight() -> f64 {
    0.8
}
fn default_reflect_leak_weight() -> f64 {
    0.05
}
fn default_reflect_stay_weight() -> f64 {
    0.1
}
fn default_match_likelihood() -> f64 {
    0.7
}
fn default_mismatch_likelihood() -> f64 {
    0.3
}
fn default_decide_epsilon() -> f64 {
    1e-5
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            move_weight: default_move_weight(),
            leak_weight: default_leak_weight(),
            stay_weight: default_stay_weight(),
            reflect_weight: default_reflect_weight(),
            reflect_leak_weight: default_reflect_leak_weight(),
            reflect_stay_weight: default_reflect_stay_weight(),
            match_likelihood: default_match_likelihood(),
            mismatch_likelihood: default_mismatch_likelihood(),
            decide_epsilon: default_decide_epsilon(),
        }
    }
}

/// Where one unit of source mass flows under an action, relative to the
/// source cell.
#[derive(Debug, Clone, Copy)]
struct KernelEntry {
    /// Heading after the action's permutation.
    heading: Heading,
    /// Offset of the exact post-action cell.
    step: (i32, i32),
    /// Offsets of the two diagonal leak cells.
    leaks: [(i32, i32); 2],
}

impl KernelEntry {
    fn new(action: Action, source: Heading) -> Self {
        let heading = action.apply(source);
        let step = heading.step();
        let lat = heading.lateral();
        Self {
            heading,
            step,
            leaks: [
                (step.0 + lat.0, step.1 + lat.1),
                (step.0 - lat.0, step.1 - lat.1),
            ],
        }
    }
}

/// Exact histogram filter over (cell, heading) states.
#[derive(Debug, Clone)]
pub struct BeliefFilter {
    config: FilterConfig,
    sx: usize,
    sy: usize,
    belief: Vec<f64>,
    scratch: Vec<f64>,
}

impl BeliefFilter {
    /// Create a filter with a uniform prior over `sx * sy * 4` states.
    pub fn new(config: FilterConfig, sx: usize, sy: usize) -> Self {
        let len = sx * sy * 4;
        Self {
            config,
            sx,
            sy,
            belief: vec![1.0 / len as f64; len],
            scratch: vec![0.0; len],
        }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Number of states.
    pub fn len(&self) -> usize {
        self.belief.len()
    }

    pub fn is_empty(&self) -> bool {
        self.belief.is_empty()
    }

    /// Current belief of one state.
    pub fn probability(&self, x: usize, y: usize, heading: Heading) -> f64 {
        self.belief[self.state(x as i32, y as i32, heading)]
    }

    /// The full distribution, state-major then heading.
    pub fn distribution(&self) -> &[f64] {
        &self.belief
    }

    /// Reset to the uniform prior.
    pub fn reset(&mut self) {
        let p = 1.0 / self.belief.len() as f64;
        self.belief.fill(p);
    }

    fn state(&self, x: i32, y: i32, heading: Heading) -> usize {
        (x as usize + y as usize * self.sx) * 4 + heading.index()
    }

    fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.sx && (y as usize) < self.sy
    }

    /// Motion update.
    ///
    /// In the normal regime each source state scatters its mass to the
    /// exact post-action state, leaks a little to the two diagonal
    /// neighbors, and keeps a residual share in place. Mass whose target
    /// would fall off the grid is folded back into the residual share, so
    /// the pass conserves total mass exactly.
    ///
    /// With `recovery` set the last detected feature was the map boundary
    /// and the robot reversed in place instead of advancing: sources whose
    /// post-action travel direction points off the grid reflect onto the
    /// reversed heading in the same cell (with small leaks along the wall),
    /// and every state keeps only a reduced residual share. Interior mass
    /// decays and renormalization concentrates belief at the boundary.
    pub fn predict(&mut self, action: Action, recovery: bool) {
        self.scratch.fill(0.0);
        if recovery {
            self.predict_boundary(action);
        } else {
            self.predict_normal(action);
        }
        std::mem::swap(&mut self.belief, &mut self.scratch);
    }

    fn predict_normal(&mut self, action: Action) {
        let cfg = self.config;
        for y in 0..self.sy as i32 {
            for x in 0..self.sx as i32 {
                for source in Heading::ALL {
                    let mass = self.belief[self.state(x, y, source)];
                    if mass == 0.0 {
                        continue;
                    }
                    let entry = KernelEntry::new(action, source);
                    let mut stay = cfg.stay_weight;

                    let (tx, ty) = (x + entry.step.0, y + entry.step.1);
                    if self.in_bounds(tx, ty) {
                        let target = self.state(tx, ty, entry.heading);
                        self.scratch[target] += mass * cfg.move_weight;
                    } else {
                        stay += cfg.move_weight;
                    }

                    for (lx, ly) in entry.leaks {
                        let (tx, ty) = (x + lx, y + ly);
                        if self.in_bounds(tx, ty) {
                            let target = self.state(tx, ty, entry.heading);
                            self.scratch[target] += mass * cfg.leak_weight;
                        } else {
                            stay += cfg.leak_weight;
                        }
                    }

                    let source_state = self.state(x, y, source);
                    self.scratch[source_state] += mass * stay;
                }
            }
        }
    }

    fn predict_boundary(&mut self, action: Action) {
        let cfg = self.config;
        for y in 0..self.sy as i32 {
            for x in 0..self.sx as i32 {
                for source in Heading::ALL {
                    let mass = self.belief[self.state(x, y, source)];
                    if mass == 0.0 {
                        continue;
                    }
                    let source_state = self.state(x, y, source);
                    self.scratch[source_state] += mass * cfg.reflect_stay_weight;

                    let travel = action.apply(source);
                    let (tx, ty) = (x + travel.step().0, y + travel.step().1);
                    if self.in_bounds(tx, ty) {
                        // Not against a wall; this source could not have
                        // triggered the boundary reversal.
                        continue;
                    }

                    let back = travel.reverse();
                    let reflected = self.state(x, y, back);
                    self.scratch[reflected] += mass * cfg.reflect_weight;
                    let lat = travel.lateral();
                    for (lx, ly) in [(x + lat.0, y + lat.1), (x - lat.0, y - lat.1)] {
                        if self.in_bounds(lx, ly) {
                            let target = self.state(lx, ly, back);
                            self.scratch[target] += mass * cfg.reflect_leak_weight;
                        }
                    }
                }
            }
        }
    }

    /// Measurement update: exact-match states are scaled by the match
    /// likelihood, everything else by the mismatch likelihood. Binary, no
    /// partial credit, and mismatch never zeroes a state.
    pub fn correct(&mut self, map: &GridMap, observation: &Observation) {
        for y in 0..self.sy {
            for x in 0..self.sx {
                let cell = map.index(x, y);
                for heading in Heading::ALL {
                    let state = self.state(x as i32, y as i32, heading);
                    let factor = if map.matches_observation(cell, heading, observation) {
                        self.config.match_likelihood
                    } else {
                        self.config.mismatch_likelihood
                    };
                    self.belief[state] *= factor;
                }
            }
        }
    }

    /// One full cycle: predict (skipped before the first move), correct,
    /// then the single normalization pass that restores the sum-to-1
    /// invariant.
    pub fn update(
        &mut self,
        map: &GridMap,
        last_action: Option<Action>,
        observation: &Observation,
        recovery: bool,
    ) {
        if let Some(action) = last_action {
            self.predict(action, recovery);
        }
        self.correct(map, observation);
        self.normalize();
    }

    fn normalize(&mut self) {
        let total: f64 = self.belief.iter().sum();
        if total <= 0.0 || !total.is_finite() {
            warn!("belief mass degenerate ({}), resetting to uniform", total);
            self.reset();
            return;
        }
        for p in &mut self.belief {
            *p /= total;
        }
    }

    /// Commit to a pose only when one state is a strict maximum.
    ///
    /// A wrong pose sends the robot down the wrong street; preferring
    /// `Unknown` keeps it exploring instead. Ties are detected with one
    /// epsilon across all headings.
    pub fn decide(&self) -> PoseEstimate {
        let mut best_state = 0;
        let mut best = f64::NEG_INFINITY;
        for (state, &p) in self.belief.iter().enumerate() {
            if p > best {
                best = p;
                best_state = state;
            }
        }

        for (state, &p) in self.belief.iter().enumerate() {
            if state != best_state && best - p < self.config.decide_epsilon {
                debug!("belief maximum is ambiguous, staying unlocalized");
                return PoseEstimate::Unknown;
            }
        }

        let cell = best_state / 4;
        PoseEstimate::Known(GridPose {
            x: cell % self.sx,
            y: cell / self.sx,
            heading: Heading::from_index(best_state % 4),
        })
    }
}

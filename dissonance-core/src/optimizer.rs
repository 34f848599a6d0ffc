//! # Local Optimizer Module
//!
//! Bounded, derivative-free search over a single real variable. The calculator
//! only relies on the [`LocalOptimizer`] trait; [`PatternSearch`] is the
//! implementation it uses by default.

use serde::{Deserialize, Serialize};

/// Whether to look for dissonance minima or maxima.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    Minimize,
    Maximize,
}

impl Direction {
    /// True when `candidate` is a better objective value than `incumbent`.
    pub fn prefers(self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Direction::Minimize => candidate < incumbent,
            Direction::Maximize => candidate > incumbent,
        }
    }
}

pub trait LocalOptimizer {
    /// Searches from `start` for a local optimum of `objective` within
    /// `[lower, upper]`, returning the argument found and its objective value.
    fn optimize(
        &self,
        objective: &mut dyn FnMut(f64) -> f64,
        start: f64,
        lower: f64,
        upper: f64,
        direction: Direction,
    ) -> (f64, f64);
}

/// Compass search: probe one step either side, move on improvement, halve the
/// step otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternSearch {
    /// First step as a fraction of the start point.
    pub initial_step: f64,
    /// Absolute step size below which the search stops.
    pub x_tolerance: f64,
    pub max_evaluations: usize,
}

impl Default for PatternSearch {
    fn default() -> Self {
        Self {
            initial_step: 0.01,
            x_tolerance: 1e-4,
            max_evaluations: 10_000,
        }
    }
}

impl LocalOptimizer for PatternSearch {
    fn optimize(
        &self,
        objective: &mut dyn FnMut(f64) -> f64,
        start: f64,
        lower: f64,
        upper: f64,
        direction: Direction,
    ) -> (f64, f64) {
        let mut x = start.clamp(lower, upper);
        let mut value = objective(x);
        let mut evaluations = 1;
        let mut step = (x.abs() * self.initial_step).max(self.x_tolerance);

        while step >= self.x_tolerance && evaluations < self.max_evaluations {
            let mut moved = false;
            for probe in [x + step, x - step] {
                let probe = probe.clamp(lower, upper);
                if probe == x {
                    continue;
                }
                let probe_value = objective(probe);
                evaluations += 1;
                if direction.prefers(probe_value, value) {
                    x = probe;
                    value = probe_value;
                    moved = true;
                    break;
                }
            }
            if !moved {
                step *= 0.5;
            }
        }

        (x, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_parabola_minimum() {
        let mut f = |x: f64| (x - 3.0).powi(2) + 1.0;
        let (x, v) = PatternSearch::default().optimize(&mut f, 2.0, 0.0, 10.0, Direction::Minimize);
        assert!((x - 3.0).abs() < 1e-3);
        assert!((v - 1.0).abs() < 1e-6);
    }

    #[test]
    fn maximum_stops_at_bound() {
        let mut f = |x: f64| x;
        let (x, v) = PatternSearch::default().optimize(&mut f, 5.0, 1.0, 8.0, Direction::Maximize);
        assert_eq!(x, 8.0);
        assert_eq!(v, 8.0);
    }

    #[test]
    fn start_outside_bounds_is_clamped() {
        let mut evaluated = Vec::new();
        let mut f = |x: f64| {
            evaluated.push(x);
            x.abs()
        };
        PatternSearch::default().optimize(&mut f, -5.0, 1.0, 2.0, Direction::Minimize);
        assert!(evaluated.iter().all(|x| (1.0..=2.0).contains(x)));
    }

    #[test]
    fn direction_preference() {
        assert!(Direction::Minimize.prefers(1.0, 2.0));
        assert!(Direction::Maximize.prefers(2.0, 1.0));
        assert!(!Direction::Maximize.prefers(1.0, 1.0));
    }
}

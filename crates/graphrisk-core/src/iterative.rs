//! Convergence tracking for fixed-point iterations such as risk propagation.

use serde::{Deserialize, Serialize};

/// Progress of a fixed-point iteration.
///
/// Stopping because the largest score change fell below the tolerance is
/// reported differently from running out of iterations; callers log the
/// latter as a warning and still use the last iterate.
#[derive(Debug, Clone)]
pub struct IterativeState {
    tolerance: f64,
    budget: u64,
    steps: u64,
    delta: Option<f64>,
}

impl IterativeState {
    /// Track an iteration that stops below `tolerance` or after `budget` steps.
    pub fn new(tolerance: f64, budget: u64) -> Self {
        Self {
            tolerance,
            budget,
            steps: 0,
            delta: None,
        }
    }

    /// Record the largest change of one finished step. Returns true once converged.
    pub fn update(&mut self, delta: f64) -> bool {
        self.steps += 1;
        self.delta = Some(delta);
        self.converged()
    }

    /// Whether the last step moved every score by less than the tolerance.
    pub fn converged(&self) -> bool {
        self.delta.is_some_and(|d| d < self.tolerance)
    }

    /// Steps taken so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Whether another step should run.
    pub fn should_continue(&self) -> bool {
        !self.converged() && self.steps < self.budget
    }

    /// Summary for reports.
    pub fn summary(&self) -> ConvergenceSummary {
        let converged = self.converged();
        ConvergenceSummary {
            iterations: self.steps,
            final_delta: self.delta.unwrap_or(0.0),
            converged,
            reached_max: !converged && self.steps >= self.budget,
        }
    }
}

/// How an iteration ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceSummary {
    /// Steps executed.
    pub iterations: u64,
    /// Largest score change in the last step (0 when no step ran).
    pub final_delta: f64,
    /// The change fell below the tolerance.
    pub converged: bool,
    /// The step budget ran out first.
    pub reached_max: bool,
}

impl ConvergenceSummary {
    /// Summary for a run that had nothing to iterate over.
    #[must_use]
    pub fn trivial() -> Self {
        Self {
            iterations: 0,
            final_delta: 0.0,
            converged: true,
            reached_max: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converges_below_tolerance() {
        let mut state = IterativeState::new(1e-6, 100);
        assert!(state.should_continue());
        assert!(!state.converged());

        assert!(!state.update(0.1));
        assert!(!state.update(0.01));
        assert!(state.update(1e-7));
        assert!(!state.should_continue());

        let summary = state.summary();
        assert_eq!(summary.iterations, 3);
        assert_eq!(state.steps(), 3);
        assert!(summary.converged);
        assert!(!summary.reached_max);
    }

    #[test]
    fn test_budget_exhausted_is_not_convergence() {
        let mut state = IterativeState::new(1e-9, 2);
        state.update(0.5);
        state.update(0.4);

        assert!(!state.should_continue());
        let summary = state.summary();
        assert!(!summary.converged);
        assert!(summary.reached_max);
        assert_eq!(summary.final_delta, 0.4);
    }

    #[test]
    fn test_zero_budget() {
        let state = IterativeState::new(1e-6, 0);
        assert!(!state.should_continue());
        assert_eq!(state.summary().final_delta, 0.0);
        assert!(state.summary().reached_max);
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stop conditions for a run.
//!
//! Checked in a fixed order after every iteration; the first matching
//! condition wins. Threshold satisfaction is not a stop condition here: the
//! orchestrator short-circuits on it as part of the acceptance decision.

use pf_core::{RunSettings, StopReason};
use std::time::Duration;

/// Inputs to one stop check.
#[derive(Debug)]
pub struct StopInputs<'a> {
    /// Index of the iteration that just finished (0-based).
    pub iteration: u32,
    /// Overall scores of accepted iterations, in acceptance order.
    pub accepted_history: &'a [f64],
    pub consecutive_rejections: u32,
    /// Wall-clock time since the run started.
    pub elapsed: Duration,
}

/// Ordered stop-condition evaluation.
#[derive(Debug, Clone)]
pub struct StopController {
    max_iterations: u32,
    max_consecutive_rejections: u32,
    plateau_window: usize,
    plateau_threshold: f64,
    time_budget: Duration,
}

impl StopController {
    pub fn from_settings(settings: &RunSettings) -> Self {
        Self {
            max_iterations: settings.max_iterations,
            max_consecutive_rejections: settings.max_consecutive_rejections,
            plateau_window: settings.plateau_window,
            plateau_threshold: settings.plateau_threshold,
            time_budget: settings.time_budget,
        }
    }

    /// First matching condition, if any.
    pub fn check(&self, inputs: &StopInputs<'_>) -> Option<StopReason> {
        if inputs.iteration + 1 >= self.max_iterations {
            return Some(StopReason::MaxIterations);
        }
        if inputs.consecutive_rejections >= self.max_consecutive_rejections {
            return Some(StopReason::RegressionLimit);
        }
        if self.is_plateaued(inputs.accepted_history) {
            return Some(StopReason::Plateau);
        }
        if inputs.elapsed > self.time_budget {
            return Some(StopReason::TimeBudget);
        }
        None
    }

    /// Accepted scores have stopped moving: the spread of the last
    /// `plateau_window` accepted scores is under the threshold.
    fn is_plateaued(&self, accepted: &[f64]) -> bool {
        if accepted.len() < self.plateau_window {
            return false;
        }
        let window = &accepted[accepted.len() - self.plateau_window..];
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &score in window {
            min = min.min(score);
            max = max.max(score);
        }
        max - min < self.plateau_threshold
    }
}

#[cfg(test)]
#[path = "stop_tests.rs"]
mod tests;

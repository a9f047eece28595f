// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Score vectors and the weighted overall score.
//!
//! Every screenshot comparison yields a score in [0, 1] for each of the four
//! dimensions. The overall score is a weighted sum, rounded to two decimals
//! so acceptance thresholds behave predictably across platforms.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One scoring dimension of a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Layout,
    Style,
    A11y,
    Perceptual,
}

impl Dimension {
    /// All dimensions, in weight order.
    pub const ALL: [Dimension; 4] = [
        Dimension::Layout,
        Dimension::Style,
        Dimension::A11y,
        Dimension::Perceptual,
    ];

    /// Weight of this dimension in the overall score.
    pub fn weight(&self) -> f64 {
        match self {
            Dimension::Layout => 0.3,
            Dimension::Style => 0.3,
            Dimension::A11y => 0.2,
            Dimension::Perceptual => 0.2,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Layout => write!(f, "layout"),
            Dimension::Style => write!(f, "style"),
            Dimension::A11y => write!(f, "a11y"),
            Dimension::Perceptual => write!(f, "perceptual"),
        }
    }
}

/// Round to two decimal places.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Per-dimension scores for one comparison, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ScoreVector {
    pub layout: f64,
    pub style: f64,
    pub a11y: f64,
    pub perceptual: f64,
}

impl ScoreVector {
    pub fn new(layout: f64, style: f64, a11y: f64, perceptual: f64) -> Self {
        Self {
            layout,
            style,
            a11y,
            perceptual,
        }
    }

    /// Uniform vector, used as the fallback for malformed scorer output.
    pub fn uniform(v: f64) -> Self {
        Self::new(v, v, v, v)
    }

    pub fn get(&self, dim: Dimension) -> f64 {
        match dim {
            Dimension::Layout => self.layout,
            Dimension::Style => self.style,
            Dimension::A11y => self.a11y,
            Dimension::Perceptual => self.perceptual,
        }
    }

    /// Clamp every component into [0, 1].
    pub fn clamped(&self) -> Self {
        Self {
            layout: self.layout.clamp(0.0, 1.0),
            style: self.style.clamp(0.0, 1.0),
            a11y: self.a11y.clamp(0.0, 1.0),
            perceptual: self.perceptual.clamp(0.0, 1.0),
        }
    }

    /// Weighted overall score, rounded to two decimals.
    pub fn overall(&self) -> f64 {
        let sum: f64 = Dimension::ALL
            .iter()
            .map(|d| d.weight() * self.get(*d))
            .sum();
        round2(sum)
    }

    /// Per-dimension mean across a set of breakpoint scores, rounded to two
    /// decimals. Returns `None` for an empty set.
    pub fn mean(scores: &[ScoreVector]) -> Option<ScoreVector> {
        if scores.is_empty() {
            return None;
        }
        let n = scores.len() as f64;
        let mut acc = ScoreVector::default();
        for s in scores {
            acc.layout += s.layout;
            acc.style += s.style;
            acc.a11y += s.a11y;
            acc.perceptual += s.perceptual;
        }
        Some(ScoreVector {
            layout: round2(acc.layout / n),
            style: round2(acc.style / n),
            a11y: round2(acc.a11y / n),
            perceptual: round2(acc.perceptual / n),
        })
    }
}

#[cfg(test)]
#[path = "score_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Horizontal-overflow inspection model.
//!
//! The browser probe reports raw per-element metrics; an element is an
//! offender iff it overflows horizontally by more than [`MIN_OVERFLOW_PX`]
//! while its computed `overflow-x` is `visible`. Scrollable and clipped
//! elements are deliberately ignored.

use serde::{Deserialize, Serialize};

/// Overflow below this many pixels is treated as rendering noise.
pub const MIN_OVERFLOW_PX: f64 = 2.0;

/// Raw element measurements captured inside the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementMetrics {
    pub selector: String,
    pub tag: String,
    pub scroll_width: f64,
    pub client_width: f64,
    /// Computed `overflow-x` value (`visible`, `auto`, `scroll`, `hidden`).
    pub overflow_x: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub figma_node_id: Option<String>,
}

/// One element that overflows its box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverflowOffender {
    pub selector: String,
    pub tag: String,
    pub scroll_width: f64,
    pub client_width: f64,
    pub overflow_px: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub figma_node_id: Option<String>,
}

/// Offenders found at one breakpoint, worst first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverflowReport {
    pub breakpoint_id: String,
    pub offenders: Vec<OverflowOffender>,
}

impl OverflowReport {
    /// Filter raw metrics down to offenders, sorted by overflow descending.
    pub fn from_metrics(breakpoint_id: impl Into<String>, metrics: &[ElementMetrics]) -> Self {
        let mut offenders: Vec<OverflowOffender> = metrics
            .iter()
            .filter(|m| m.overflow_x == "visible")
            .filter_map(|m| {
                let overflow_px = m.scroll_width - m.client_width;
                (overflow_px > MIN_OVERFLOW_PX).then(|| OverflowOffender {
                    selector: m.selector.clone(),
                    tag: m.tag.clone(),
                    scroll_width: m.scroll_width,
                    client_width: m.client_width,
                    overflow_px,
                    figma_node_id: m.figma_node_id.clone(),
                })
            })
            .collect();
        offenders.sort_by(|a, b| {
            b.overflow_px
                .partial_cmp(&a.overflow_px)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Self {
            breakpoint_id: breakpoint_id.into(),
            offenders,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.offenders.is_empty()
    }

    /// The worst `n` offenders.
    pub fn top(&self, n: usize) -> &[OverflowOffender] {
        &self.offenders[..self.offenders.len().min(n)]
    }
}

#[cfg(test)]
#[path = "overflow_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prompt assembly for the code-gen provider.
//!
//! The provider treats the prompt as opaque text; everything it needs is
//! inlined here: the design IR for the target, the current workspace
//! sources, the previous scores, the patch plan, and the worst overflow
//! offenders from the last render.

use pf_core::{IrTarget, OverflowReport, PatchPlan, ScoreVector};

/// Everything the prompt for one iteration is built from.
pub struct PromptContext<'a> {
    pub iteration: u32,
    pub route: &'a str,
    pub ir_target: &'a IrTarget,
    /// `(path, contents)` of the current workspace sources.
    pub sources: &'a [(String, String)],
    pub previous_score: Option<&'a ScoreVector>,
    pub plan: Option<&'a PatchPlan>,
    pub overflow: Option<&'a OverflowReport>,
}

/// Offenders forwarded into the prompt from the last overflow report.
const OVERFLOW_PROMPT_LIMIT: usize = 10;

pub fn build_prompt(ctx: &PromptContext<'_>) -> String {
    let mut prompt = String::new();

    if ctx.iteration == 0 {
        prompt.push_str(&format!(
            "Implement the page served at route {} so it matches the design below.\n\n",
            ctx.route
        ));
    } else {
        prompt.push_str(&format!(
            "Refine the page served at route {} (attempt {}). Keep what already matches; \
             fix what the feedback below calls out.\n\n",
            ctx.route,
            ctx.iteration + 1
        ));
    }

    prompt.push_str("## Design nodes\n\n");
    match serde_json::to_string_pretty(&ctx.ir_target.nodes) {
        Ok(json) => prompt.push_str(&format!("```json\n{json}\n```\n\n")),
        Err(_) => prompt.push_str("(design nodes unavailable)\n\n"),
    }

    if ctx.sources.is_empty() {
        prompt.push_str("## Current code\n\nThe workspace has no sources yet; create the page from scratch.\n\n");
    } else {
        prompt.push_str("## Current code\n\n");
        for (path, contents) in ctx.sources {
            prompt.push_str(&format!("### {path}\n```\n{contents}\n```\n\n"));
        }
    }

    if let Some(score) = ctx.previous_score {
        prompt.push_str(&format!(
            "## Previous scores\n\nlayout {:.2}, style {:.2}, a11y {:.2}, perceptual {:.2} (overall {:.2})\n\n",
            score.layout,
            score.style,
            score.a11y,
            score.perceptual,
            score.overall()
        ));
    }

    if let Some(plan) = ctx.plan {
        prompt.push_str(&format!("## Focus: {}\n\n", plan.focus_area));
        if !plan.top_targets.is_empty() {
            prompt.push_str("Concentrate on these nodes, worst first:\n");
            for target in &plan.top_targets {
                prompt.push_str(&format!(
                    "- {} ({}, severity {:.2})\n",
                    target.name, target.node_id, target.severity
                ));
            }
            prompt.push('\n');
        }
        prompt.push_str(&format!(
            "Change at most {} files and {} lines; at most {} structural change.\n",
            plan.budgets.max_files_changed,
            plan.budgets.max_lines_changed,
            plan.budgets.max_structure_changes
        ));
        if !plan.disallowed_changes.is_empty() {
            prompt.push_str(&format!(
                "Do not change: {}.\n",
                plan.disallowed_changes.join(", ")
            ));
        }
        if !plan.locked_node_ids.is_empty() {
            let locked: Vec<&str> = plan.locked_node_ids.iter().map(|id| id.as_str()).collect();
            prompt.push_str(&format!(
                "These nodes are locked and must not be modified: {}.\n",
                locked.join(", ")
            ));
        }
        prompt.push('\n');
    }

    if let Some(report) = ctx.overflow {
        if !report.is_empty() {
            prompt.push_str(&format!(
                "## Horizontal overflow at {}\n\nFix these elements that overflow their box:\n",
                report.breakpoint_id
            ));
            for offender in report.top(OVERFLOW_PROMPT_LIMIT) {
                prompt.push_str(&format!(
                    "- {} <{}> overflows by {:.0}px\n",
                    offender.selector, offender.tag, offender.overflow_px
                ));
            }
            prompt.push('\n');
        }
    }

    prompt.push_str(
        "## Output format\n\nRespond with exactly one <files> block containing full file \
         contents:\n<files>\n<file path=\"src/...\">...</file>\n</files>\n",
    );

    prompt
}

#[cfg(test)]
#[path = "prompt_tests.rs"]
mod tests;

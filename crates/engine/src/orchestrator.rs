// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The run orchestrator: one closed refinement loop.
//!
//! Each iteration runs the fixed pipeline — generate code, wait for the
//! preview, capture screenshots, inspect overflow, score against baselines —
//! then decides: accept (and possibly stop at the threshold) or reject (and
//! roll the workspace back to the best snapshot). Every step emits trace
//! events; every suspension point checks the stop handle.

use crate::error::RunError;
use crate::locks::LockManager;
use crate::planner::PatchPlanner;
use crate::prompt::{build_prompt, PromptContext};
use crate::score_keeper::ScoreKeeper;
use crate::stop::{StopController, StopInputs};
use crate::trace_bus::{TraceBus, TraceEmitter};
use crate::workspace::{read_workspace_sources, write_generated_files};
use pf_adapters::{
    parse_generated_files, BrowserProbe, CodegenError, CodegenProvider, ScoringError,
    ScoringProvider,
};
use pf_core::{
    ArtifactRef, Clock, DesignIr, EventPayload, IrNode, OverflowReport, PackId, PackManifest,
    ProjectId, RunId, RunOutcome, RunSettings, RunStatus, ScoreVector, StepKind, StopReason,
    SystemClock, TraceNodeId,
};
use pf_core::{IterationRecord, NodeStatus};
use pf_sandbox::{PreviewStatus, SandboxManager};
use pf_storage::{ProjectLayout, SnapshotStore};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Poll interval for preview readiness and route warm-up.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Selector under which overflow inspection enumerates elements.
const APP_ROOT_SELECTOR: &str = "#__next, #root, body";

/// Everything a run needs from the outside.
pub struct OrchestratorDeps<C, S, B> {
    pub codegen: C,
    pub scoring: S,
    pub browser: B,
    pub sandbox: SandboxManager,
    pub snapshots: SnapshotStore,
    pub layout: ProjectLayout,
    pub bus: TraceBus,
}

/// Identity and inputs of one run.
pub struct RunContext {
    pub project: ProjectId,
    pub pack: PackId,
    pub run_id: RunId,
    pub manifest: PackManifest,
    pub ir: DesignIr,
    pub settings: RunSettings,
}

/// Handle used to stop a run from outside.
///
/// Stopping trips the cancellation token shared with the outstanding
/// provider call; the run exits cleanly at its next suspension point.
#[derive(Clone)]
pub struct RunHandle {
    cancel: CancellationToken,
}

impl RunHandle {
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Single-shot state machine executing one run.
pub struct RunOrchestrator<C, S, B, K: Clock = SystemClock> {
    deps: OrchestratorDeps<C, S, B>,
    ctx: RunContext,
    clock: K,
    cancel: CancellationToken,
    emitter: TraceEmitter,
    http: reqwest::Client,

    keeper: ScoreKeeper,
    stop: StopController,
    locks: LockManager,
    planner: PatchPlanner,
    accepted_history: Vec<f64>,
    consecutive_rejections: u32,
    previous_score: Option<ScoreVector>,
    plan: Option<pf_core::PatchPlan>,
    last_overflow: Option<OverflowReport>,
    records: Vec<IterationRecord>,
}

struct IterationScores {
    scores: ScoreVector,
    overall: f64,
}

impl<C, S, B> RunOrchestrator<C, S, B, SystemClock>
where
    C: CodegenProvider,
    S: ScoringProvider,
    B: BrowserProbe,
{
    pub fn new(deps: OrchestratorDeps<C, S, B>, ctx: RunContext) -> Self {
        Self::with_clock(deps, ctx, SystemClock)
    }
}

impl<C, S, B, K> RunOrchestrator<C, S, B, K>
where
    C: CodegenProvider,
    S: ScoringProvider,
    B: BrowserProbe,
    K: Clock,
{
    pub fn with_clock(deps: OrchestratorDeps<C, S, B>, ctx: RunContext, clock: K) -> Self {
        let emitter = TraceEmitter::new(
            deps.bus.clone(),
            ctx.project.clone(),
            Some(ctx.pack.clone()),
        );
        let settings = &ctx.settings;
        Self {
            keeper: ScoreKeeper::new(settings.epsilon),
            stop: StopController::from_settings(settings),
            locks: LockManager::from_settings(settings),
            planner: PatchPlanner::from_settings(settings),
            accepted_history: Vec::new(),
            consecutive_rejections: 0,
            previous_score: None,
            plan: None,
            last_overflow: None,
            records: Vec::new(),
            cancel: CancellationToken::new(),
            emitter,
            http: reqwest::Client::new(),
            clock,
            deps,
            ctx,
        }
    }

    /// Stop handle for this run.
    pub fn handle(&self) -> RunHandle {
        RunHandle {
            cancel: self.cancel.clone(),
        }
    }

    fn check_stop(&self) -> Result<(), RunError> {
        if self.cancel.is_cancelled() {
            Err(RunError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn target_nodes(ctx: &RunContext) -> &[IrNode] {
        ctx.ir
            .target(&ctx.settings.target_id)
            .map(|t| t.nodes.as_slice())
            .unwrap_or(&[])
    }

    fn workspace_dir(&self) -> PathBuf {
        self.deps.layout.workspace_dir(&self.ctx.project)
    }

    /// Execute the run to completion. Emits `runStarted` before any event
    /// and `runFinished` after the last, exactly once each.
    pub async fn run(mut self) -> RunOutcome {
        let project = self.ctx.project.clone();
        let run_id = self.ctx.run_id.clone();
        let root = TraceNodeId::root();

        self.deps
            .bus
            .begin_run(&project, &run_id, &self.ctx.manifest.project_name);
        self.emitter.start_step(
            &root,
            StepKind::Run,
            &format!("Run {}", run_id.short(8)),
        );

        let result = self.run_loop().await;

        let outcome = match result {
            Ok(stop_reason) => {
                self.emitter.finish_with(
                    &root,
                    EventPayload {
                        message: Some(format!("stopped: {stop_reason}")),
                        score: self.keeper.best_overall(),
                        ..Default::default()
                    },
                );
                RunOutcome {
                    status: RunStatus::Success,
                    stop_reason: Some(stop_reason),
                    iterations: std::mem::take(&mut self.records),
                    best_iteration: self.keeper.best_iteration(),
                    best_overall: self.keeper.best_overall(),
                    error: None,
                }
            }
            Err(error) => {
                self.emitter.fail(&root, &error.to_string());
                let stop_reason = matches!(error, RunError::Cancelled)
                    .then_some(StopReason::Cancelled);
                RunOutcome {
                    status: RunStatus::Error,
                    stop_reason,
                    iterations: std::mem::take(&mut self.records),
                    best_iteration: self.keeper.best_iteration(),
                    best_overall: self.keeper.best_overall(),
                    error: Some(error.to_string()),
                }
            }
        };

        self.deps.bus.finish_run(&project, &run_id, outcome.status);
        outcome
    }

    async fn run_loop(&mut self) -> Result<StopReason, RunError> {
        let start = self.clock.now();
        let max_iterations = self.ctx.settings.max_iterations.max(1);

        if self.ctx.ir.target(&self.ctx.settings.target_id).is_none() {
            return Err(RunError::UnknownTarget(self.ctx.settings.target_id.clone()));
        }

        for index in 0..max_iterations {
            self.check_stop()?;

            let iter_node = TraceNodeId::root().child(format!("iter{index}"));
            self.emitter.start_step(
                &iter_node,
                StepKind::Iteration,
                &format!("Iteration {}", index + 1),
            );

            let scores = match self.run_iteration(index, &iter_node).await {
                Ok(scores) => scores,
                Err(error) => {
                    self.emitter.fail(&iter_node, &error.to_string());
                    return Err(error);
                }
            };

            if let Some(reason) = self.decide(index, &iter_node, scores) {
                return Ok(reason);
            }

            let inputs = StopInputs {
                iteration: index,
                accepted_history: &self.accepted_history,
                consecutive_rejections: self.consecutive_rejections,
                elapsed: self.clock.now().duration_since(start),
            };
            if let Some(reason) = self.stop.check(&inputs) {
                info!(%reason, iteration = index, "stop condition met");
                return Ok(reason);
            }
        }

        Ok(StopReason::MaxIterations)
    }

    /// Steps 1–5 of the pipeline. Returns the aggregate scores.
    async fn run_iteration(
        &mut self,
        index: u32,
        iter_node: &TraceNodeId,
    ) -> Result<IterationScores, RunError> {
        self.generate_code(index, iter_node).await?;
        self.check_stop()?;

        let preview_url = self.await_preview(iter_node).await?;
        let page_url = format!("{}{}", preview_url, self.ctx.settings.route);
        self.check_stop()?;

        let captured = self.capture_screenshots(iter_node, &page_url).await?;
        self.check_stop()?;

        // Snapshot as soon as the screenshot step completes, so every
        // captured iteration can be rolled back to or previewed later.
        // Best-effort: a failed archive must not kill the iteration.
        if let Err(e) = self
            .deps
            .snapshots
            .create(&self.ctx.project, index, &self.workspace_dir())
        {
            warn!(iteration = index, error = %e, "workspace snapshot failed");
        }

        self.inspect_overflow(index, iter_node, &page_url).await;
        self.check_stop()?;

        let scores = self.score_captures(iter_node, &captured).await?;
        Ok(scores)
    }

    async fn generate_code(
        &mut self,
        index: u32,
        iter_node: &TraceNodeId,
    ) -> Result<(), RunError> {
        let node = iter_node.child("codegen");
        self.emitter
            .start_step(&node, StepKind::Codegen, "Generate code");

        let workspace = self.workspace_dir();
        let prompt = {
            let sources = read_workspace_sources(&workspace);
            let ir_target = self
                .ctx
                .ir
                .target(&self.ctx.settings.target_id)
                .ok_or_else(|| RunError::UnknownTarget(self.ctx.settings.target_id.clone()))?;
            build_prompt(&PromptContext {
                iteration: index,
                route: &self.ctx.settings.route,
                ir_target,
                sources: &sources,
                previous_score: self.previous_score.as_ref(),
                plan: self.plan.as_ref(),
                overflow: self.last_overflow.as_ref(),
            })
        };

        let response = self
            .deps
            .codegen
            .generate(&prompt, &self.cancel)
            .await
            .map_err(|e| match e {
                CodegenError::Cancelled => RunError::Cancelled,
                other => {
                    self.emitter.fail(&node, &other.to_string());
                    RunError::Codegen(other.to_string())
                }
            })?;

        let files = parse_generated_files(&response);
        if files.is_empty() {
            let error = RunError::EmptyCodegen;
            self.emitter.fail(&node, &error.to_string());
            return Err(error);
        }

        let written = write_generated_files(&workspace, &files)?;
        for file in &written {
            self.emitter.artifact(
                &node,
                ArtifactRef {
                    name: file.path.clone(),
                    path: file.path.clone(),
                    bytes: Some(file.bytes),
                },
            );
        }
        self.emitter
            .finish(&node, Some(format!("{} files written", written.len())));
        Ok(())
    }

    /// Step 2: start (or reuse) the current preview and wait for readiness,
    /// then warm the target route.
    async fn await_preview(&self, iter_node: &TraceNodeId) -> Result<String, RunError> {
        let node = iter_node.child("preview");
        self.emitter
            .start_step(&node, StepKind::Preview, "Start preview");

        let workspace = self.workspace_dir();
        self.deps
            .sandbox
            .start_current(&self.ctx.project, &workspace)?;

        let timeout = self.ctx.settings.preview_timeout;
        let deadline = tokio::time::Instant::now() + timeout;
        let preview_url = loop {
            self.check_stop()?;
            let info = self.deps.sandbox.current_status(&self.ctx.project);
            match info.status {
                PreviewStatus::Ready => match info.preview_url {
                    Some(url) => break url,
                    None => {
                        let error = RunError::Preview("ready without a URL".to_string());
                        self.emitter.fail(&node, &error.to_string());
                        return Err(error);
                    }
                },
                PreviewStatus::Error | PreviewStatus::Stopped => {
                    let message = info
                        .error
                        .unwrap_or_else(|| format!("preview {}", info.status));
                    self.emitter.fail(&node, &message);
                    return Err(RunError::Preview(message));
                }
                PreviewStatus::Installing | PreviewStatus::Starting => {
                    if tokio::time::Instant::now() >= deadline {
                        let error = RunError::PreviewTimeout(timeout.as_secs());
                        self.emitter.fail(&node, &error.to_string());
                        return Err(error);
                    }
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
            }
        };

        self.warm_route(&preview_url).await?;
        self.emitter.finish(&node, Some(preview_url.clone()));
        Ok(preview_url)
    }

    /// Poll the target route until it answers with something other than 404,
    /// then give in-place recompilation a moment to settle. Best-effort: on
    /// cap expiry the capture proceeds anyway.
    async fn warm_route(&self, preview_url: &str) -> Result<(), RunError> {
        let url = format!("{}{}", preview_url, self.ctx.settings.route);
        let deadline = tokio::time::Instant::now() + self.ctx.settings.warmup_budget;
        let mut warmed = false;
        while tokio::time::Instant::now() < deadline {
            self.check_stop()?;
            match self.http.get(&url).send().await {
                Ok(response) if response.status().as_u16() != 404 => {
                    warmed = true;
                    break;
                }
                Ok(_) | Err(_) => tokio::time::sleep(POLL_INTERVAL).await,
            }
        }
        if warmed {
            tokio::time::sleep(self.ctx.settings.recompile_settle).await;
        } else {
            warn!(url, "route warm-up budget exhausted, capturing anyway");
        }
        Ok(())
    }

    /// Step 3: one capture per breakpoint. Per-breakpoint failures are
    /// non-fatal; only a full wipeout fails the step.
    async fn capture_screenshots(
        &self,
        iter_node: &TraceNodeId,
        page_url: &str,
    ) -> Result<Vec<(String, PathBuf)>, RunError> {
        let node = iter_node.child("screenshot");
        self.emitter
            .start_step(&node, StepKind::Screenshot, "Capture screenshots");

        let capture_dir = self
            .deps
            .layout
            .run_capture_dir(&self.ctx.project, &self.ctx.run_id);
        std::fs::create_dir_all(&capture_dir)?;

        let mut captured = Vec::new();
        for breakpoint in &self.ctx.manifest.breakpoints {
            self.check_stop()?;
            let bp_node = node.child(&breakpoint.breakpoint_id);
            self.emitter.start_step(
                &bp_node,
                StepKind::Screenshot,
                &breakpoint.breakpoint_id,
            );

            match self.deps.browser.capture(page_url, breakpoint).await {
                Ok(bytes) => {
                    let path = self.deps.layout.screenshot_path(
                        &self.ctx.project,
                        &self.ctx.run_id,
                        &breakpoint.breakpoint_id,
                    );
                    std::fs::write(&path, &bytes)?;
                    self.emitter.artifact(
                        &bp_node,
                        ArtifactRef {
                            name: format!("{}.png", breakpoint.breakpoint_id),
                            path: path.to_string_lossy().into_owned(),
                            bytes: Some(bytes.len() as u64),
                        },
                    );
                    self.emitter.finish(&bp_node, None);
                    captured.push((breakpoint.breakpoint_id.clone(), path));
                }
                Err(e) => {
                    warn!(
                        breakpoint = breakpoint.breakpoint_id,
                        error = %e,
                        "breakpoint capture failed"
                    );
                    self.emitter.fail(&bp_node, &e.to_string());
                }
            }
        }

        if captured.is_empty() {
            let error = RunError::AllCapturesFailed;
            self.emitter.fail(&node, &error.to_string());
            return Err(error);
        }
        self.emitter.finish(
            &node,
            Some(format!(
                "{}/{} breakpoints captured",
                captured.len(),
                self.ctx.manifest.breakpoints.len()
            )),
        );
        Ok(captured)
    }

    /// Step 4: overflow inspection at the primary breakpoint. Never fails
    /// the iteration; a failed scan just means no overflow context.
    async fn inspect_overflow(&mut self, index: u32, iter_node: &TraceNodeId, page_url: &str) {
        let node = iter_node.child("overflow");
        self.emitter
            .start_step(&node, StepKind::Overflow, "Inspect overflow");

        let Some(breakpoint) = self.ctx.manifest.primary_breakpoint() else {
            self.emitter
                .finish_with_status(&node, NodeStatus::Success, Some("no breakpoints".into()));
            return;
        };

        match self
            .deps
            .browser
            .inspect(page_url, APP_ROOT_SELECTOR, breakpoint)
            .await
        {
            Ok(metrics) => {
                let report =
                    OverflowReport::from_metrics(breakpoint.breakpoint_id.clone(), &metrics);
                let path = self.deps.layout.overflow_report_path(
                    &self.ctx.project,
                    &self.ctx.run_id,
                    index,
                );
                match serde_json::to_vec_pretty(&report) {
                    Ok(json) => {
                        if let Err(e) = std::fs::write(&path, json) {
                            warn!(error = %e, "failed to save overflow report");
                        } else {
                            self.emitter.artifact(
                                &node,
                                ArtifactRef {
                                    name: format!("iter-{index}-overflow.json"),
                                    path: path.to_string_lossy().into_owned(),
                                    bytes: None,
                                },
                            );
                        }
                    }
                    Err(e) => warn!(error = %e, "failed to serialize overflow report"),
                }
                self.emitter.finish(
                    &node,
                    Some(format!("{} offenders", report.offenders.len())),
                );
                self.last_overflow = Some(report);
            }
            Err(e) => {
                warn!(error = %e, "overflow inspection failed");
                self.emitter.fail(&node, &e.to_string());
                self.last_overflow = None;
            }
        }
    }

    /// Step 5: score each captured breakpoint against its baseline and
    /// aggregate.
    async fn score_captures(
        &self,
        iter_node: &TraceNodeId,
        captured: &[(String, PathBuf)],
    ) -> Result<IterationScores, RunError> {
        let node = iter_node.child("score");
        self.emitter
            .start_step(&node, StepKind::Score, "Score against baselines");

        let settings = &self.ctx.settings;
        let ir_summary = self
            .ctx
            .ir
            .target(&settings.target_id)
            .and_then(|t| serde_json::to_string(&t.nodes).ok())
            .unwrap_or_default();

        let mut per_breakpoint = Vec::with_capacity(captured.len());
        for (breakpoint_id, screenshot) in captured {
            self.check_stop()?;
            let baseline = self.deps.layout.baseline_path(
                &self.ctx.project,
                &self.ctx.pack,
                &settings.target_id,
                breakpoint_id,
                &settings.state_id,
            );
            if !baseline.exists() {
                let error = RunError::MissingBaseline {
                    target: settings.target_id.clone(),
                    breakpoint: breakpoint_id.clone(),
                    state: settings.state_id.clone(),
                };
                self.emitter.fail(&node, &error.to_string());
                return Err(error);
            }

            let scores = self
                .deps
                .scoring
                .score(screenshot, &baseline, &ir_summary, &self.cancel)
                .await
                .map_err(|e| match e {
                    ScoringError::Cancelled => RunError::Cancelled,
                    other => {
                        self.emitter.fail(&node, &other.to_string());
                        RunError::Scoring(other.to_string())
                    }
                })?
                .clamped();
            self.emitter.progress(
                &node,
                &format!("{breakpoint_id}: {:.2}", scores.overall()),
            );
            per_breakpoint.push(scores);
        }

        // Captures are never empty here (step 3 guarantees it).
        let scores = ScoreVector::mean(&per_breakpoint).unwrap_or_default();
        let overall = scores.overall();
        self.emitter.finish_with(
            &node,
            EventPayload {
                score: Some(overall),
                ..Default::default()
            },
        );
        Ok(IterationScores { scores, overall })
    }

    /// Step 6 (+7 precursor): snapshot, accept/reject, lock, plan.
    /// Returns `Some(reason)` when the run should stop at the threshold.
    fn decide(
        &mut self,
        index: u32,
        iter_node: &TraceNodeId,
        scores: IterationScores,
    ) -> Option<StopReason> {
        let IterationScores { scores, overall } = scores;
        let node = iter_node.child("decision");
        self.emitter
            .start_step(&node, StepKind::Decision, "Evaluate");

        let workspace = self.workspace_dir();
        let acceptance = self.keeper.evaluate(index, overall);
        let nodes = Self::target_nodes(&self.ctx);
        self.locks.update(&scores, nodes);

        self.records.push(IterationRecord {
            index,
            scores,
            overall,
            accepted: acceptance.accepted,
            reason: acceptance.reason,
        });

        let decision_text = if acceptance.accepted {
            format!("accepted ({})", acceptance.reason)
        } else {
            format!("rejected ({})", acceptance.reason)
        };
        self.emitter.finish_with(
            &node,
            EventPayload {
                score: Some(overall),
                decision: Some(decision_text.clone()),
                ..Default::default()
            },
        );

        let mut stop_reason = None;
        if acceptance.accepted {
            self.accepted_history.push(overall);
            self.consecutive_rejections = 0;
            self.previous_score = Some(scores);

            self.emitter.finish_with(
                iter_node,
                EventPayload {
                    score: Some(overall),
                    decision: Some(decision_text),
                    is_best: Some(true),
                    ..Default::default()
                },
            );

            if overall >= self.ctx.settings.threshold {
                info!(overall, threshold = self.ctx.settings.threshold, "threshold met");
                stop_reason = Some(StopReason::ThresholdMet);
            }
        } else {
            self.consecutive_rejections += 1;
            self.emitter.finish_with(
                iter_node,
                EventPayload {
                    score: Some(overall),
                    decision: Some(decision_text),
                    ..Default::default()
                },
            );

            // Roll back to the best snapshot. Failure is logged, not fatal:
            // the run continues with whatever workspace state exists.
            if let Some(best) = self.keeper.best_iteration() {
                if let Err(e) =
                    self.deps
                        .snapshots
                        .restore(&self.ctx.project, best, &workspace)
                {
                    warn!(best_iteration = best, error = %e, "workspace restore failed");
                }
            }
        }

        // Plan the next iteration from this iteration's measurements.
        let plan = self.planner.plan(&scores, nodes, self.locks.locked());
        self.emitter.focus(
            iter_node,
            &format!("next focus: {}", plan.focus_area),
            plan.focus_area,
        );
        self.plan = Some(plan);

        stop_reason
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;

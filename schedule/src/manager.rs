//! Pass manager.
//!
//! Runs an ordered list of fusion passes over a graph. Each pass sweeps the
//! graph in topological order (ties by ascending `NodeId`) until a sweep
//! applies nothing or the sweep limit is hit, then hands over to the next
//! pass. Accepted rewrites are permanent.

use std::fmt;

use itertools::Itertools;
use snafu::ResultExt;
use strum::IntoEnumIterator;

use graft_ir::{Graph, OpRegistry, ReplacementOutcome, match_at, rewrite};

use crate::config::OptimizerConfig;
use crate::error::*;
use crate::passes::{FusionPass, PassKind};

/// How a pass stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum PassStatus {
    /// A full sweep applied no rewrite.
    Converged,
    /// `max_sweeps` sweeps ran and the last one still rewrote something.
    IterationLimit,
}

/// Outcome of one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub pass: &'static str,
    /// Applied rewrites.
    pub rewrites: usize,
    pub sweeps: usize,
    /// Matches whose builder declined.
    pub declined: usize,
    /// Matches skipped because the replacement was rejected.
    pub skipped: usize,
    pub status: PassStatus,
}

impl PassReport {
    fn new(pass: &'static str) -> Self {
        Self { pass, rewrites: 0, sweeps: 0, declined: 0, skipped: 0, status: PassStatus::Converged }
    }
}

impl fmt::Display for PassReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} rewrites in {} sweeps ({} declined, {} skipped, {})",
            self.pass, self.rewrites, self.sweeps, self.declined, self.skipped, self.status
        )
    }
}

/// Outcome of a [`PassManager::run`], one report per pass in run order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptimizeReport {
    pub passes: Vec<PassReport>,
}

impl OptimizeReport {
    pub fn total_rewrites(&self) -> usize {
        self.passes.iter().map(|p| p.rewrites).sum()
    }

    /// True if every pass reached a fixpoint.
    pub fn converged(&self) -> bool {
        self.passes.iter().all(|p| p.status == PassStatus::Converged)
    }

    pub fn pass(&self, name: &str) -> Option<&PassReport> {
        self.passes.iter().find(|p| p.pass == name)
    }
}

impl fmt::Display for OptimizeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.passes.iter().join("\n"))
    }
}

/// Ordered list of fusion passes bound to an operator registry.
///
/// Takes the graph by `&mut` for a whole run; concurrent optimizations need
/// distinct graphs.
#[derive(Debug)]
pub struct PassManager<'r> {
    registry: &'r OpRegistry,
    config: OptimizerConfig,
    passes: Vec<FusionPass>,
}

impl<'r> PassManager<'r> {
    /// Manager with no passes.
    pub fn new(registry: &'r OpRegistry, config: OptimizerConfig) -> Self {
        Self { registry, config, passes: Vec::new() }
    }

    /// Manager with every built-in pass the configuration leaves enabled, in
    /// [`PassKind`] order.
    pub fn standard(registry: &'r OpRegistry, config: OptimizerConfig) -> Result<Self> {
        let enabled: Vec<PassKind> = PassKind::iter().filter(|&kind| config.is_enabled(kind)).collect();
        let mut manager = Self::new(registry, config);
        for kind in enabled {
            manager.add_pass(kind.instantiate())?;
        }
        Ok(manager)
    }

    /// Append a pass after checking its pattern against the registry.
    pub fn add_pass(&mut self, pass: FusionPass) -> Result<&mut Self> {
        pass.pattern().check(self.registry).context(RegistrationSnafu { pass: pass.name() })?;
        self.passes.push(pass);
        Ok(self)
    }

    pub fn with_pass(mut self, pass: FusionPass) -> Result<Self> {
        self.add_pass(pass)?;
        Ok(self)
    }

    pub fn passes(&self) -> &[FusionPass] {
        &self.passes
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn registry(&self) -> &'r OpRegistry {
        self.registry
    }

    /// Run every pass in order.
    ///
    /// With `verify` on, the input graph is validated first and again after
    /// each pass. The final graph is always validated against the registry,
    /// since kernel dispatch relies on every node conforming to its schema.
    #[tracing::instrument(skip_all, fields(passes = self.passes.len(), nodes = graph.len()))]
    pub fn run(&self, graph: &mut Graph) -> Result<OptimizeReport> {
        if self.config.verify {
            graph.validate(self.registry).context(VerifySnafu { stage: VerifyStage::Input })?;
        }

        let mut report = OptimizeReport::default();
        for pass in &self.passes {
            let summary = self.run_pass(pass, graph)?;
            tracing::info!(
                pass = summary.pass,
                rewrites = summary.rewrites,
                sweeps = summary.sweeps,
                skipped = summary.skipped,
                status = %summary.status,
                "pass finished"
            );
            if tracing::enabled!(tracing::Level::DEBUG) {
                tracing::debug!(pass = summary.pass, graph.tree = %graph.tree(), "graph after pass");
            }
            if self.config.verify {
                graph.validate(self.registry).context(VerifySnafu { stage: VerifyStage::AfterPass(pass.name()) })?;
            }
            report.passes.push(summary);
        }

        graph.validate(self.registry).context(VerifySnafu { stage: VerifyStage::Final })?;
        Ok(report)
    }

    /// Sweep `pass` over the graph until it converges or hits the sweep
    /// limit. At least one sweep always runs.
    pub fn run_pass(&self, pass: &FusionPass, graph: &mut Graph) -> Result<PassReport> {
        let mut report = PassReport::new(pass.name());
        loop {
            if report.sweeps >= self.config.max_sweeps.max(1) {
                report.status = PassStatus::IterationLimit;
                tracing::warn!(pass = pass.name(), sweeps = report.sweeps, "sweep limit reached before fixpoint");
                break;
            }
            report.sweeps += 1;
            if self.sweep(pass, graph, &mut report)? == 0 {
                report.status = PassStatus::Converged;
                break;
            }
        }
        Ok(report)
    }

    /// One pass over the anchors present at the start of the sweep. Nodes
    /// inserted along the way are visited by the next sweep.
    fn sweep(&self, pass: &FusionPass, graph: &mut Graph, report: &mut PassReport) -> Result<usize> {
        let mut applied = 0;
        for anchor in graph.topological_order().context(PassSnafu { pass: pass.name() })? {
            // Removed by an earlier rewrite of this sweep.
            if !graph.contains(anchor) {
                continue;
            }
            let Some(env) = match_at(graph, self.registry, pass.pattern(), anchor) else {
                continue;
            };

            let outcome = rewrite(graph, self.registry, &env, pass.name(), |graph, env, staged| {
                pass.build(graph, env, staged)
            });
            match outcome {
                Ok(ReplacementOutcome::Applied { .. }) => {
                    applied += 1;
                    report.rewrites += 1;
                }
                Ok(ReplacementOutcome::Declined) => report.declined += 1,
                Err(err) if err.is_recoverable() => {
                    tracing::warn!(pass = pass.name(), anchor = %anchor, error = %err, "skipping anchor");
                    report.skipped += 1;
                }
                Err(source) => return Err(PassError::Pass { pass: pass.name(), source }),
            }
        }
        Ok(applied)
    }
}

//! Parallel Monte Carlo execution
//!
//! Draws are embarrassingly parallel: each depends only on its own seed, its
//! assigned perturbation source, and the shared read-only [`UserInputs`].
//! They run across the rayon pool with no shared mutable accumulator; the
//! collect is the join barrier, and aggregation happens strictly after every
//! draw has finished.
//!
//! Cancellation is cooperative: workers check a shared token between draws
//! rather than being killed, so already-completed draws survive for salvage
//! under a reduced-sample marker.

use rayon::prelude::*;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::ensemble::{self, AggregationError, EnsembleSummary};
use crate::inputs::UserInputs;
use crate::trajectory::{DrawFailure, PerturbationSource, SimulationDraw, TrajectoryIntegrator};

/// Shared cancellation flag checked by each worker between draws
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; in-flight draws finish, queued draws are skipped
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Wall-clock and seeding configuration for one ensemble run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Budget for a single draw; an overrunning draw is marked failed rather
    /// than aborted mid-integration
    pub draw_timeout: Duration,
    /// Budget for the whole ensemble
    pub ensemble_timeout: Duration,
    /// Base perturbation seed; draw i uses `base_seed + i`
    pub base_seed: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            draw_timeout: Duration::from_secs(30),
            ensemble_timeout: Duration::from_secs(300),
            base_seed: 0,
        }
    }
}

/// Why an ensemble run produced no aggregated result
///
/// Timeout and cancellation are surfaced separately from draw failures so a
/// caller can tell "the answer was wrong" from "the answer never arrived".
#[derive(Debug)]
pub enum RunError {
    /// The ensemble wall-clock budget expired before every draw ran
    Timeout {
        /// Draws that did complete before the budget expired
        completed: Vec<SimulationDraw>,
        elapsed: Duration,
        budget: Duration,
    },
    /// The caller cancelled the run
    Cancelled {
        /// Draws completed before cancellation, available for salvage
        completed: Vec<SimulationDraw>,
    },
    /// Every draw ran but the ensemble could not be aggregated
    Aggregation(AggregationError),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Timeout {
                completed,
                elapsed,
                budget,
            } => write!(
                f,
                "ensemble timed out after {:.1}s (budget {:.1}s, {} draws completed)",
                elapsed.as_secs_f64(),
                budget.as_secs_f64(),
                completed.len()
            ),
            RunError::Cancelled { completed } => {
                write!(f, "run cancelled with {} draws completed", completed.len())
            }
            RunError::Aggregation(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunError::Aggregation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AggregationError> for RunError {
    fn from(err: AggregationError) -> Self {
        RunError::Aggregation(err)
    }
}

/// Executes one prediction request's Monte Carlo ensemble
#[derive(Debug, Clone, Default)]
pub struct EnsembleRunner {
    config: RunnerConfig,
}

impl EnsembleRunner {
    pub fn new(config: RunnerConfig) -> Self {
        EnsembleRunner { config }
    }

    /// Run every draw of the ensemble and return them after the join barrier
    ///
    /// Draw i is seeded `base_seed + i` and assigned its perturbation source
    /// round-robin, so the ensemble is reproducible and stratified. The
    /// integrator is only handed the shared immutable inputs; no lock is held
    /// across the integration call.
    pub fn run(
        &self,
        integrator: &dyn TrajectoryIntegrator,
        inputs: &UserInputs,
        token: &CancellationToken,
    ) -> Result<Vec<SimulationDraw>, RunError> {
        let runs = u64::from(inputs.prediction_parameters.monte_carlo_runs);
        info!(runs, "running Monte Carlo ensemble");

        let started = Instant::now();
        let deadline = started + self.config.ensemble_timeout;
        let draw_timeout = self.config.draw_timeout;
        let base_seed = self.config.base_seed;

        let results: Vec<Option<SimulationDraw>> = (0..runs)
            .into_par_iter()
            .map(|i| {
                // Cooperative cancellation and deadline check between draws
                if token.is_cancelled() || Instant::now() >= deadline {
                    return None;
                }

                let draw_started = Instant::now();
                let mut draw =
                    integrator.simulate(inputs, base_seed.wrapping_add(i), PerturbationSource::for_draw(i));
                if draw.failure.is_none() && draw_started.elapsed() > draw_timeout {
                    draw.failure = Some(DrawFailure::ExceededDuration);
                }
                Some(draw)
            })
            .collect();

        // Join barrier passed: every worker is done
        let completed: Vec<SimulationDraw> = results.into_iter().flatten().collect();
        let skipped = runs as usize - completed.len();

        if token.is_cancelled() {
            warn!(completed = completed.len(), "ensemble run cancelled");
            return Err(RunError::Cancelled { completed });
        }
        if skipped > 0 {
            let elapsed = started.elapsed();
            warn!(
                skipped,
                elapsed_s = elapsed.as_secs_f64(),
                "ensemble wall-clock budget exhausted"
            );
            return Err(RunError::Timeout {
                completed,
                elapsed,
                budget: self.config.ensemble_timeout,
            });
        }

        let failed = completed.iter().filter(|d| !d.is_success()).count();
        if failed > 0 {
            warn!(failed, runs, "ensemble contains failed draws");
        }
        debug!(
            elapsed_ms = started.elapsed().as_millis(),
            "ensemble run complete"
        );

        Ok(completed)
    }

    /// Run the nominal pass plus the full ensemble, then aggregate
    ///
    /// This is the canonical "run N simulations, then aggregate" composition:
    /// validation is assumed done, the ensemble barrier is inside [`run`],
    /// and aggregation only ever sees a complete ensemble.
    ///
    /// [`run`]: EnsembleRunner::run
    pub fn predict(
        &self,
        integrator: &dyn TrajectoryIntegrator,
        inputs: &UserInputs,
        confidence_level: f64,
        token: &CancellationToken,
    ) -> Result<(SimulationDraw, EnsembleSummary), RunError> {
        let nominal = integrator.simulate_nominal(inputs);
        let draws = self.run(integrator, inputs, token)?;
        let summary = ensemble::aggregate(&draws, confidence_level)?;
        Ok((nominal, summary))
    }
}

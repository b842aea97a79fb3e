//! Damped Newton-Raphson inner loop.
//!
//! One loop serves both analyses. The DC engine runs it in damped mode:
//! residual tracking, backtracking line search, a ±2 V per-component step
//! cap. The transient stepper runs it in clamped mode: no residual
//! bookkeeping, a ±5 V clamp, convergence on step size alone.
//!
//! Per-iteration ordering is part of the solver contract:
//! clear -> linear stamps -> Newton stamps (cached limited voltages) ->
//! Gmin diagonal -> residual -> solve -> step control -> compute_limited
//! for the accepted candidate.

use nalgebra::DVector;
use quiescent_core::{Circuit, MnaSystem, NodeId};

use crate::linear::GaussianSolver;

/// Shrink factor per line-search backtrack.
const BACKTRACK_SHRINK: f64 = 0.5;
/// Give up shrinking below this step fraction.
const MIN_LINE_SEARCH_ALPHA: f64 = 1e-6;
/// Maximum halvings per line search.
const MAX_BACKTRACKS: usize = 10;

/// Configuration for one inner Newton run.
#[derive(Debug, Clone)]
pub(crate) struct NewtonConfig {
    pub max_iterations: usize,
    /// Source scale factor for this continuation point.
    pub scale: f64,
    /// Conductance added to every node-voltage diagonal.
    pub gmin: f64,
    /// Per-component cap on the Newton step (V).
    pub dx_clamp: f64,
    /// Absolute step-size stop.
    pub step_tol: f64,
    /// Relative step-size stop (scaled by the unknown's magnitude).
    pub rel_tol: f64,
    /// Residual stop for damped mode; `None` selects clamped mode.
    pub residual_tol: Option<f64>,
    /// Caller-supplied convergence aid: a soft shunt on one node while the
    /// source scale is below one half, fading out at scale 0.5.
    pub stabilize_node: Option<NodeId>,
}

/// Remaining Newton iterations across a whole continuation strategy.
#[derive(Debug, Clone)]
pub(crate) struct IterationBudget {
    remaining: usize,
}

impl IterationBudget {
    pub fn new(cap: usize) -> Self {
        Self { remaining: cap }
    }

    pub fn unlimited() -> Self {
        Self {
            remaining: usize::MAX,
        }
    }

    fn take(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

/// Outcome of one inner Newton run.
#[derive(Debug, Clone)]
pub(crate) struct NewtonOutcome {
    pub converged: bool,
    pub iterations: usize,
    /// Residual norm at the last stamped point (damped mode only).
    pub residual_norm: f64,
    /// True when the global iteration cap cut the run short.
    pub budget_exhausted: bool,
    /// Last accepted step, for failure ranking.
    pub last_delta: DVector<f64>,
    /// Residual vector at exit, for failure ranking (damped mode only).
    pub last_residual: DVector<f64>,
}

/// Reusable per-iteration buffers owned by the engine.
#[derive(Debug, Clone)]
pub(crate) struct NewtonScratch {
    pub x_solved: DVector<f64>,
    pub x_new: DVector<f64>,
}

impl NewtonScratch {
    pub fn new(n: usize) -> Self {
        Self {
            x_solved: DVector::zeros(n),
            x_new: DVector::zeros(n),
        }
    }
}

/// Run the inner Newton loop, refining `guess` in place.
///
/// Convergence is tested on the proposed step *before* it is adopted, so a
/// converged warm start returns `guess` untouched.
pub(crate) fn run_newton(
    circuit: &mut Circuit,
    system: &mut MnaSystem,
    solver: &mut GaussianSolver,
    scratch: &mut NewtonScratch,
    guess: &mut DVector<f64>,
    cfg: &NewtonConfig,
    budget: &mut IterationBudget,
) -> NewtonOutcome {
    let n = system.size();
    let num_nodes = system.num_nodes();

    let mut outcome = NewtonOutcome {
        converged: false,
        iterations: 0,
        residual_norm: f64::INFINITY,
        budget_exhausted: false,
        last_delta: DVector::zeros(n),
        last_residual: DVector::zeros(n),
    };

    // Prime the limited-voltage caches before the first stamp pass.
    circuit.compute_limited(guess, guess);

    for _ in 0..cfg.max_iterations {
        if !budget.take() {
            outcome.budget_exhausted = true;
            break;
        }
        outcome.iterations += 1;

        system.clear();
        circuit.stamp_linear(system, cfg.scale);
        circuit.stamp_newton(system, cfg.scale, guess);
        for i in 0..num_nodes {
            system.add(i, i, cfg.gmin);
        }
        if let Some(node) = cfg.stabilize_node {
            if cfg.scale < 0.5 {
                if let Some(i) = node.index() {
                    system.add(i, i, 1e-2 * (1.0 - 2.0 * cfg.scale));
                }
            }
        }

        let track_residual = cfg.residual_tol.is_some();
        let r_old = if track_residual {
            system.residual_norm(guess)
        } else {
            0.0
        };

        if solve_with_recovery(system, solver, scratch, cfg, num_nodes).is_err() {
            if track_residual {
                outcome.last_residual = system.residual(guess);
            }
            outcome.residual_norm = r_old;
            return outcome;
        }

        // The solver returns the full candidate vector, not a delta; the
        // step is the distance from the current guess.
        if track_residual {
            // Backtracking line search with the per-component clamp.
            let mut alpha = 1.0;
            for _ in 0..=MAX_BACKTRACKS {
                for i in 0..n {
                    let dx = (alpha * (scratch.x_solved[i] - guess[i]))
                        .clamp(-cfg.dx_clamp, cfg.dx_clamp);
                    scratch.x_new[i] = guess[i] + dx;
                }
                circuit.compute_limited(&scratch.x_new, guess);
                if system.residual_norm(&scratch.x_new) < r_old || alpha < MIN_LINE_SEARCH_ALPHA {
                    break;
                }
                alpha *= BACKTRACK_SHRINK;
            }
        } else {
            for i in 0..n {
                let dx =
                    (scratch.x_solved[i] - guess[i]).clamp(-cfg.dx_clamp, cfg.dx_clamp);
                scratch.x_new[i] = guess[i] + dx;
            }
            circuit.compute_limited(&scratch.x_new, guess);
        }

        let mut step_converged = true;
        for i in 0..n {
            let dx = scratch.x_new[i] - guess[i];
            outcome.last_delta[i] = dx;
            if dx.abs() > cfg.rel_tol * scratch.x_new[i].abs() + cfg.step_tol {
                step_converged = false;
            }
        }
        outcome.residual_norm = r_old;

        let residual_ok = match cfg.residual_tol {
            Some(tol) => r_old < tol,
            None => true,
        };
        if step_converged && residual_ok {
            // Leave the guess untouched: re-solving a converged point must
            // be a no-op on the solution vector.
            outcome.converged = true;
            return outcome;
        }

        guess.copy_from(&scratch.x_new);
    }

    if cfg.residual_tol.is_some() {
        outcome.last_residual = system.residual(guess);
    }
    outcome
}

/// Solve the stamped system, retrying once with a boosted diagonal when the
/// pivot collapses. A second singular pivot aborts the inner loop.
fn solve_with_recovery(
    system: &mut MnaSystem,
    solver: &mut GaussianSolver,
    scratch: &mut NewtonScratch,
    cfg: &NewtonConfig,
    num_nodes: usize,
) -> Result<(), ()> {
    match solver.solve(system.matrix(), system.rhs(), &mut scratch.x_solved) {
        Ok(()) => Ok(()),
        Err(err) => {
            log::debug!(
                "singular system ({err}); retrying with boosted Gmin on {num_nodes} diagonal entries"
            );
            for i in 0..num_nodes {
                system.add(i, i, cfg.gmin * 100.0);
            }
            solver
                .solve(system.matrix(), system.rhs(), &mut scratch.x_solved)
                .map_err(|_| ())
        }
    }
}

//! Operating-point engine: homotopy-driven DC solve and transient stepping.

use nalgebra::DVector;
use quiescent_core::{Circuit, MnaSystem};

use crate::dc::{ConvergenceStats, DcOptions, DcReport};
use crate::diagnostics::FailureReport;
use crate::linear::GaussianSolver;
use crate::newton::{IterationBudget, NewtonConfig, NewtonOutcome, NewtonScratch, run_newton};
use crate::transient::StepOptions;

/// Iteration allowance for the warm-start shortcut before falling back to
/// the full continuation strategy.
const WARM_START_ITERATIONS: usize = 50;

/// The solver side of a finalised circuit.
///
/// Owns the MNA working set, the elimination workspace and the Newton
/// scratch buffers; all are sized once at construction and reused across
/// every solve. The circuit stays reachable through
/// [`circuit`](Engine::circuit)/[`circuit_mut`](Engine::circuit_mut) for
/// nodesets, device handles and introspection.
#[derive(Debug)]
pub struct Engine {
    circuit: Circuit,
    system: MnaSystem,
    solver: GaussianSolver,
    scratch: NewtonScratch,
    last_solution: DVector<f64>,
    final_gmin: f64,
}

impl Engine {
    /// Finalise the circuit and size the working set.
    pub fn new(mut circuit: Circuit) -> Self {
        circuit.finalize();
        let n = circuit.num_unknowns();
        Self {
            system: MnaSystem::new(circuit.num_nodes(), circuit.num_branches()),
            solver: GaussianSolver::new(n),
            scratch: NewtonScratch::new(n),
            last_solution: DVector::zeros(n),
            final_gmin: 0.0,
            circuit,
        }
    }

    /// The underlying circuit.
    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    /// Mutable access for nodesets and post-finalise parameter retuning.
    pub fn circuit_mut(&mut self) -> &mut Circuit {
        &mut self.circuit
    }

    /// Number of non-ground nodes.
    pub fn num_nodes(&self) -> usize {
        self.circuit.num_nodes()
    }

    /// Number of branch-current unknowns.
    pub fn num_branches(&self) -> usize {
        self.circuit.num_branches()
    }

    /// Total unknown count.
    pub fn num_unknowns(&self) -> usize {
        self.circuit.num_unknowns()
    }

    /// Human-readable meaning of unknown `i`.
    pub fn unknown_meaning(&self, index: usize) -> String {
        self.circuit.unknown_meaning(index)
    }

    /// The most recently published solution vector.
    pub fn solution(&self) -> &DVector<f64> {
        &self.last_solution
    }

    /// Gmin level of the last accepted DC solution.
    pub fn final_gmin(&self) -> f64 {
        self.final_gmin
    }

    /// Compute the DC operating point into `x` (also the initial guess).
    ///
    /// Strategy, each stage warm-starting the next:
    ///
    /// 1. Warm-start shortcut: one inner Newton at full scale and target
    ///    Gmin. Linear circuits and re-solves finish here.
    /// 2. Source stepping: ramp the source scale 0 to 1 at `active_gmin`;
    ///    on failure restart the ramp once from zero at `fallback_gmin`.
    /// 3. Gmin stepping: relax the diagonal down the ladder to
    ///    `gmin_target`; on failure keep the last good level and report a
    ///    partial point.
    pub fn solve_dc(&mut self, x: &mut DVector<f64>, opts: &DcOptions) -> DcReport {
        let n = self.circuit.num_unknowns();
        if x.len() != n {
            *x = DVector::zeros(n);
        }
        self.circuit.apply_nodesets(x);
        // Dynamic devices degenerate to their DC forms (capacitor open,
        // inductor short) regardless of stale transient history.
        self.circuit.begin_step(0.0);

        let mut stats = ConvergenceStats::default();
        let mut budget = IterationBudget::new(opts.iteration_cap);
        let mut guess = x.clone();

        // Stage 0: try the target system directly.
        let shortcut_cfg = NewtonConfig {
            max_iterations: WARM_START_ITERATIONS.min(opts.max_iterations),
            scale: 1.0,
            gmin: opts.gmin_target,
            dx_clamp: 2.0,
            step_tol: opts.tolerance,
            rel_tol: 0.0,
            residual_tol: Some(opts.residual_tolerance),
            stabilize_node: None,
        };
        let outcome = self.inner(&mut guess, &shortcut_cfg, &mut budget);
        stats.total_iterations += outcome.iterations;
        if outcome.converged {
            return self.accept(x, guess, opts.gmin_target, outcome.residual_norm, stats, opts);
        }
        guess.copy_from(x);

        // Stage 1: source ramp at the active Gmin.
        let mut active_gmin = opts.active_gmin;
        let steps = opts.source_steps.max(1);
        let mut ramp_failed = false;
        for s in 0..=steps {
            let scale = s as f64 / steps as f64;
            let cfg = NewtonConfig {
                max_iterations: opts.max_iterations,
                scale,
                gmin: active_gmin,
                dx_clamp: 2.0,
                step_tol: opts.tolerance,
                rel_tol: 0.0,
                residual_tol: Some(opts.residual_tolerance),
                stabilize_node: opts.stabilize_node,
            };
            let outcome = self.inner(&mut guess, &cfg, &mut budget);
            stats.total_iterations += outcome.iterations;
            stats.source_steps_reached = s;
            if opts.verbose {
                eprintln!(
                    "[dc] ramp s={scale:.2} g={active_gmin:.1e} iters={} {}",
                    outcome.iterations,
                    if outcome.converged { "ok" } else { "FAILED" }
                );
            }
            if !outcome.converged {
                ramp_failed = true;
                break;
            }
            stats.last_residual = outcome.residual_norm;
        }

        if ramp_failed {
            // Restart from scratch with a heavier diagonal.
            active_gmin = opts.fallback_gmin;
            guess.fill(0.0);
            self.circuit.apply_nodesets(&mut guess);
            for s in 0..=steps {
                let scale = s as f64 / steps as f64;
                let cfg = NewtonConfig {
                    max_iterations: opts.max_iterations,
                    scale,
                    gmin: active_gmin,
                    dx_clamp: 2.0,
                    step_tol: opts.tolerance,
                    rel_tol: 0.0,
                    residual_tol: Some(opts.residual_tolerance),
                    stabilize_node: opts.stabilize_node,
                };
                let outcome = self.inner(&mut guess, &cfg, &mut budget);
                stats.total_iterations += outcome.iterations;
                stats.source_steps_reached = s;
                if !outcome.converged {
                    let failure = self.describe_failure(&guess, &outcome, active_gmin);
                    if opts.verbose {
                        eprintln!("[dc] fallback ramp failed at s={scale:.2}");
                        eprintln!("{failure}");
                    }
                    stats.last_residual = outcome.residual_norm;
                    return DcReport {
                        converged: false,
                        partial: false,
                        stats,
                        failure: Some(failure),
                    };
                }
                stats.last_residual = outcome.residual_norm;
            }
        }

        // Stage 2: Gmin relaxation at full scale.
        let mut last_residual = stats.last_residual;
        let mut failure = None;
        for g in opts.gmin_steps.sequence(active_gmin, opts.gmin_target) {
            let good = guess.clone();
            let cfg = NewtonConfig {
                max_iterations: opts.max_iterations * 2,
                scale: 1.0,
                gmin: g,
                dx_clamp: 2.0,
                step_tol: opts.tolerance,
                rel_tol: 0.0,
                residual_tol: Some(opts.residual_tolerance),
                stabilize_node: None,
            };
            let outcome = self.inner(&mut guess, &cfg, &mut budget);
            stats.total_iterations += outcome.iterations;
            if outcome.converged {
                active_gmin = g;
                last_residual = outcome.residual_norm;
            } else {
                let report = self.describe_failure(&guess, &outcome, g);
                if opts.verbose {
                    eprintln!("[dc] gmin stepping stopped at g={active_gmin:.1e} (failed at {g:.1e})");
                    eprintln!("{report}");
                }
                failure = Some(report);
                guess = good;
                break;
            }
        }

        self.accept_with_failure(x, guess, active_gmin, last_residual, stats, opts, failure)
    }

    /// DC operating point via pseudo-transient continuation.
    ///
    /// Seeds from the nodesets, settles the circuit with relaxed-tolerance
    /// transient steps for `duration`, then polishes with a regular
    /// [`solve_dc`](Engine::solve_dc) warm-started from the settled state.
    pub fn solve_dc_pseudo_transient(
        &mut self,
        x: &mut DVector<f64>,
        duration: f64,
        dt: f64,
        opts: &DcOptions,
    ) -> DcReport {
        let n = self.circuit.num_unknowns();
        if x.len() != n {
            *x = DVector::zeros(n);
        }
        self.circuit.apply_nodesets(x);
        self.initialize_dynamics(x);

        let relaxed = StepOptions {
            max_newton_iterations: 10,
            rel_tol: 1e-3,
            abs_tol: 1e-6,
            gmin: opts.gmin_target,
        };
        let steps = (duration / dt) as usize;
        for _ in 0..steps {
            // A rough patch is fine; keep marching and let the final DC
            // polish sort it out.
            let _ = self.step(dt, x, &relaxed);
        }

        self.solve_dc(x, opts)
    }

    /// Commit `x` as the seed history for transient stepping without
    /// re-solving.
    pub fn initialize_dynamics(&mut self, x: &DVector<f64>) {
        self.circuit.begin_step(0.0);
        self.circuit.commit_step(x);
        self.last_solution = x.clone();
    }

    /// Advance one transient step of size `dt`, updating `x` in place.
    ///
    /// Runs the clamped short Newton loop; on convergence the dynamic
    /// devices commit their history and the new state is published. On
    /// failure `x` is left at the previous step's state.
    pub fn step(&mut self, dt: f64, x: &mut DVector<f64>, opts: &StepOptions) -> bool {
        let n = self.circuit.num_unknowns();
        if x.len() != n {
            *x = DVector::zeros(n);
        }
        self.circuit.begin_step(dt);

        let mut guess = x.clone();
        let cfg = NewtonConfig {
            max_iterations: opts.max_newton_iterations,
            scale: 1.0,
            gmin: opts.gmin,
            dx_clamp: 5.0,
            step_tol: opts.abs_tol,
            rel_tol: opts.rel_tol,
            residual_tol: None,
            stabilize_node: None,
        };
        let mut budget = IterationBudget::unlimited();
        let outcome = self.inner(&mut guess, &cfg, &mut budget);

        if outcome.converged {
            x.copy_from(&guess);
            self.circuit.commit_step(x);
        } else {
            log::debug!(
                "transient step dt={dt:.3e} did not converge in {} iterations",
                outcome.iterations
            );
        }
        self.last_solution = x.clone();
        outcome.converged
    }

    fn inner(
        &mut self,
        guess: &mut DVector<f64>,
        cfg: &NewtonConfig,
        budget: &mut IterationBudget,
    ) -> NewtonOutcome {
        run_newton(
            &mut self.circuit,
            &mut self.system,
            &mut self.solver,
            &mut self.scratch,
            guess,
            cfg,
            budget,
        )
    }

    fn describe_failure(
        &self,
        guess: &DVector<f64>,
        outcome: &NewtonOutcome,
        gmin: f64,
    ) -> FailureReport {
        FailureReport::new(
            &self.circuit,
            guess,
            &outcome.last_residual,
            &outcome.last_delta,
            gmin,
        )
    }

    fn accept(
        &mut self,
        x: &mut DVector<f64>,
        guess: DVector<f64>,
        final_gmin: f64,
        last_residual: f64,
        stats: ConvergenceStats,
        opts: &DcOptions,
    ) -> DcReport {
        self.accept_with_failure(x, guess, final_gmin, last_residual, stats, opts, None)
    }

    #[allow(clippy::too_many_arguments)]
    fn accept_with_failure(
        &mut self,
        x: &mut DVector<f64>,
        guess: DVector<f64>,
        final_gmin: f64,
        last_residual: f64,
        mut stats: ConvergenceStats,
        opts: &DcOptions,
        failure: Option<FailureReport>,
    ) -> DcReport {
        let partial = final_gmin > opts.gmin_target * 10.0;
        if partial {
            log::warn!(
                "partial DC point: gmin stuck at {final_gmin:.3e} (target {:.3e}); \
                 solution may be contaminated",
                opts.gmin_target
            );
        }

        x.copy_from(&guess);
        self.last_solution = guess;
        self.final_gmin = final_gmin;

        stats.last_residual = last_residual;
        stats.final_gmin = final_gmin;
        stats.converged = !partial;

        DcReport {
            converged: !partial,
            partial,
            stats,
            failure,
        }
    }
}

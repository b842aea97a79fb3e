//! DC operating-point configuration and result types.

use quiescent_core::NodeId;

use crate::diagnostics::FailureReport;

/// Gmin relaxation ladder shape.
///
/// Different drafts of real designs want different ladders: the half-decade
/// 5-2-1 sequence trades iterations for robustness, the plain decade ladder
/// is faster on friendly circuits. Both are exposed rather than pinned.
#[derive(Debug, Clone)]
pub enum GminSteps {
    /// 5-2-1 per decade; each level is at most half the previous.
    HalfDecade,
    /// One level per decade.
    Decade,
    /// Explicit levels, used as given (descending).
    Custom(Vec<f64>),
}

impl GminSteps {
    /// The relaxation sequence strictly below `from`, ending at `target`.
    pub fn sequence(&self, from: f64, target: f64) -> Vec<f64> {
        let mut levels = match self {
            GminSteps::HalfDecade => {
                let mut out = Vec::new();
                let mut exp = 4;
                loop {
                    let decade = 10f64.powi(-exp);
                    if decade <= target * 0.999 {
                        break;
                    }
                    for mantissa in [5.0, 2.0, 1.0] {
                        out.push(mantissa * decade);
                    }
                    exp += 1;
                }
                out
            }
            GminSteps::Decade => {
                let mut out = Vec::new();
                let mut exp = 4;
                loop {
                    let g = 10f64.powi(-exp);
                    if g <= target * 0.999 {
                        break;
                    }
                    out.push(g);
                    exp += 1;
                }
                out
            }
            GminSteps::Custom(levels) => levels.clone(),
        };

        // Multiplicative guards keep ladder rungs that land (up to float
        // rounding) on `from` or `target` out of the sequence.
        levels.retain(|&g| g < from * 0.999 && g > target * 1.001);
        levels.push(target);
        levels
    }
}

/// DC operating-point options. Defaults follow the engine contract:
/// `gmin_target = 1e-12`, a 50-step source ramp, active Gmin `1e-7` with a
/// `1e-3` fallback.
#[derive(Debug, Clone)]
pub struct DcOptions {
    /// Inner Newton iteration cap per continuation point.
    pub max_iterations: usize,
    /// Step-size stop: `max|dx| < tolerance`.
    pub tolerance: f64,
    /// Residual stop: `||r||_2 < residual_tolerance`.
    pub residual_tolerance: f64,
    /// Number of source-ramp steps from 0 to 1.
    pub source_steps: usize,
    /// Gmin held during the source ramp.
    pub active_gmin: f64,
    /// Gmin for the restarted ramp after a first-pass failure.
    pub fallback_gmin: f64,
    /// Final Gmin the relaxation aims for.
    pub gmin_target: f64,
    /// Relaxation ladder shape.
    pub gmin_steps: GminSteps,
    /// Optional soft stabilisation shunt, applied while the source scale is
    /// below one half. A topology-specific hint, never inferred.
    pub stabilize_node: Option<NodeId>,
    /// Hard ceiling on Newton iterations across all continuation paths.
    pub iteration_cap: usize,
    /// Print per-stage progress and failure diagnoses to stderr.
    pub verbose: bool,
}

impl Default for DcOptions {
    fn default() -> Self {
        Self {
            max_iterations: 250,
            tolerance: 1e-6,
            residual_tolerance: 1e-4,
            source_steps: 50,
            active_gmin: 1e-7,
            fallback_gmin: 1e-3,
            gmin_target: 1e-12,
            gmin_steps: GminSteps::HalfDecade,
            stabilize_node: None,
            iteration_cap: 10_000,
            verbose: false,
        }
    }
}

impl DcOptions {
    /// Preset for stubborn circuits: a high starting Gmin and the fine
    /// ladder all the way down.
    pub fn robust() -> Self {
        Self {
            active_gmin: 1e-4,
            ..Default::default()
        }
    }
}

/// Counters accumulated over a DC solve.
#[derive(Debug, Clone, Default)]
pub struct ConvergenceStats {
    /// Newton iterations across every continuation point.
    pub total_iterations: usize,
    /// Furthest source-ramp step reached.
    pub source_steps_reached: usize,
    /// Residual norm at the last converged inner loop.
    pub last_residual: f64,
    /// Gmin level of the accepted solution.
    pub final_gmin: f64,
    /// Whether the full criterion (target Gmin and residual) was met.
    pub converged: bool,
}

/// Result of a DC operating-point solve.
///
/// `converged` means the solution reached within a decade of the target
/// Gmin with the residual criterion holding. A `partial` report still
/// publishes the best solution found (at `stats.final_gmin`) and leaves
/// the accept/reject call to the caller.
#[derive(Debug, Clone)]
pub struct DcReport {
    /// Full success.
    pub converged: bool,
    /// Solution valid but Gmin stuck above `10 * gmin_target`.
    pub partial: bool,
    /// Iteration counters and final figures.
    pub stats: ConvergenceStats,
    /// Ranked worst offenders from the last inner-loop failure, if any.
    pub failure: Option<FailureReport>,
}

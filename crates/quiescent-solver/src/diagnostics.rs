//! Newton failure diagnostics.
//!
//! When an inner loop gives up, the engine keeps the offending iterate and
//! ranks the unknowns by residual and by step size. Nine times out of ten
//! the top entry points straight at the miswired node or the device with
//! the impossible bias.

use std::fmt;

use nalgebra::DVector;
use quiescent_core::Circuit;

/// How many unknowns each ranking keeps.
const TOP_COUNT: usize = 10;

/// One unknown's state at the failure point.
#[derive(Debug, Clone)]
pub struct UnknownDiagnostic {
    /// Index into the unknown vector.
    pub index: usize,
    /// `V(...)` / `I(...)` label from the circuit.
    pub meaning: String,
    /// Value of the unknown at the failure point.
    pub value: f64,
    /// `|r_i|` at the failure point.
    pub residual: f64,
    /// `|dx_i|` of the last Newton step.
    pub delta: f64,
}

/// Ranked worst offenders from a failed inner Newton loop.
#[derive(Debug, Clone)]
pub struct FailureReport {
    /// Gmin level at which the loop failed.
    pub gmin: f64,
    /// Unknowns sorted by descending `|r_i|`.
    pub worst_residuals: Vec<UnknownDiagnostic>,
    /// Unknowns sorted by descending `|dx_i|`.
    pub worst_deltas: Vec<UnknownDiagnostic>,
}

impl FailureReport {
    /// Build a report from the retained failure state.
    pub fn new(
        circuit: &Circuit,
        x: &DVector<f64>,
        residual: &DVector<f64>,
        delta: &DVector<f64>,
        gmin: f64,
    ) -> Self {
        let describe = |i: usize| UnknownDiagnostic {
            index: i,
            meaning: circuit.unknown_meaning(i),
            value: x[i],
            residual: residual[i].abs(),
            delta: delta[i].abs(),
        };

        let mut by_residual: Vec<UnknownDiagnostic> = (0..x.len()).map(describe).collect();
        let mut by_delta = by_residual.clone();

        by_residual.sort_by(|a, b| b.residual.total_cmp(&a.residual));
        by_delta.sort_by(|a, b| b.delta.total_cmp(&a.delta));
        by_residual.truncate(TOP_COUNT);
        by_delta.truncate(TOP_COUNT);

        Self {
            gmin,
            worst_residuals: by_residual,
            worst_deltas: by_delta,
        }
    }
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "newton failure at gmin={:.3e}", self.gmin)?;
        writeln!(f, "  worst residuals:")?;
        for d in &self.worst_residuals {
            writeln!(
                f,
                "    {:<20} |r|={:.3e}  x={:.4}",
                d.meaning, d.residual, d.value
            )?;
        }
        writeln!(f, "  worst steps:")?;
        for d in &self.worst_deltas {
            writeln!(
                f,
                "    {:<20} |dx|={:.3e}  x={:.4}",
                d.meaning, d.delta, d.value
            )?;
        }
        Ok(())
    }
}

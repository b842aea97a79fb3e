//! Transient stepping options and trace capture.
//!
//! The stepping core lives on [`Engine::step`](crate::Engine::step):
//! trapezoidal companion models, a short clamped Newton loop per step, no
//! timestep-error control. [`run_transient`] is harness scaffolding that
//! drives `step` over a fixed duration and records the full unknown vector
//! at every accepted point.

use nalgebra::DVector;

use crate::engine::Engine;

/// Options for one transient step.
#[derive(Debug, Clone)]
pub struct StepOptions {
    /// Newton iteration cap per step.
    pub max_newton_iterations: usize,
    /// Relative step-size stop, scaled by each unknown's magnitude.
    pub rel_tol: f64,
    /// Absolute step-size stop.
    pub abs_tol: f64,
    /// Diagonal conductance held during stepping.
    pub gmin: f64,
}

impl Default for StepOptions {
    fn default() -> Self {
        Self {
            max_newton_iterations: 8,
            rel_tol: 1e-6,
            abs_tol: 1e-9,
            gmin: 1e-12,
        }
    }
}

/// A recorded transient run: uniformly spaced samples of the unknown
/// vector.
#[derive(Debug, Clone, Default)]
pub struct TransientTrace {
    /// Sample times (s).
    pub time: Vec<f64>,
    /// Unknown vector at each sample time.
    pub samples: Vec<DVector<f64>>,
    /// Steps whose Newton loop failed; their samples carry the previous
    /// state forward.
    pub failed_steps: usize,
}

impl TransientTrace {
    /// Number of recorded samples.
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// Whether the trace is empty.
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Extract one unknown's waveform.
    pub fn unknown(&self, index: usize) -> Vec<f64> {
        self.samples.iter().map(|x| x[index]).collect()
    }
}

/// Drive `engine.step` over `duration` with fixed `dt`, starting from `x`
/// (normally a committed DC point), recording each step.
pub fn run_transient(
    engine: &mut Engine,
    x: &mut DVector<f64>,
    duration: f64,
    dt: f64,
    opts: &StepOptions,
) -> TransientTrace {
    let steps = (duration / dt).round() as usize;
    let mut trace = TransientTrace {
        time: Vec::with_capacity(steps),
        samples: Vec::with_capacity(steps),
        failed_steps: 0,
    };

    for k in 0..steps {
        if !engine.step(dt, x, opts) {
            trace.failed_steps += 1;
        }
        trace.time.push((k + 1) as f64 * dt);
        trace.samples.push(x.clone());
    }

    if trace.failed_steps > 0 {
        log::warn!(
            "transient run: {}/{} steps failed to converge",
            trace.failed_steps,
            steps
        );
    }

    trace
}

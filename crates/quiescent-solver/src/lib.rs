//! Numerical solver for the Quiescent analog simulator.
//!
//! The [`Engine`] wraps a finalised circuit with the MNA working set and
//! drives two analyses over the element capability traits:
//!
//! - **DC operating point** ([`Engine::solve_dc`]): damped Newton with
//!   backtracking line search and PN-junction step limiting, wrapped in a
//!   two-stage homotopy (source-scale ramp, then geometric Gmin
//!   relaxation), with pseudo-transient continuation as a fallback entry.
//! - **Transient** ([`Engine::step`]): trapezoidal companion models with a
//!   short clamped Newton loop per fixed time step.
//!
//! Numerical failure is reported through [`DcReport`] and boolean step
//! results, never through `Err`: a partial DC point (Gmin stuck above
//! target) still publishes its solution, flagged for the caller to judge.

pub mod dc;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod linear;
mod newton;
pub mod spectral;
pub mod transient;

pub use dc::{ConvergenceStats, DcOptions, DcReport, GminSteps};
pub use diagnostics::{FailureReport, UnknownDiagnostic};
pub use engine::Engine;
pub use error::{Error, Result};
pub use linear::{GaussianSolver, solve_dense};
pub use spectral::{Harmonic, ThdResult, compute_thd};
pub use transient::{StepOptions, TransientTrace, run_transient};

//! Element capability traits and stamping contexts.

use std::any::Any;

use nalgebra::DVector;

use crate::mna::MnaSystem;
use crate::node::NodeId;

/// Context handed to elements during a stamp pass.
pub struct StampContext<'a> {
    /// The linear system being assembled.
    pub system: &'a mut MnaSystem,
    /// Source scale factor in `[0, 1]`. Every independent source must
    /// multiply its contribution by this; the DC engine uses it for
    /// source-stepping homotopy.
    pub scale: f64,
}

/// Context for the junction-limiting pass.
pub struct LimitContext<'a> {
    /// The candidate Newton iterate.
    pub x: &'a DVector<f64>,
    /// The previous accepted iterate (limiting reference).
    pub x_old: &'a DVector<f64>,
}

/// A circuit element.
///
/// Every element stamps linear contributions; richer elements opt into the
/// additional capabilities via the defaulted methods. The solver calls them
/// in a fixed order per Newton iteration: `linear_stamp` for all elements,
/// then `newton_stamp` for elements reporting [`is_newton`](Element::is_newton)
/// (using limited voltages cached by the preceding
/// [`compute_limited`](Element::compute_limited) call).
///
/// The `Any` supertrait backs the typed device handles of
/// [`Circuit`](crate::Circuit); elements never point at each other.
pub trait Element: std::fmt::Debug + Any {
    /// Element label for diagnostics (e.g. "R1", "Q3").
    fn label(&self) -> &str;

    /// Add fixed-coefficient contributions to the system. Must not depend
    /// on the current Newton iterate.
    fn linear_stamp(&self, ctx: &mut StampContext<'_>);

    /// Append node pairs that form DC conduction paths through this
    /// element. Resistors, voltage sources, inductors and junctions count;
    /// ideal current sources and open capacitors do not.
    fn dc_topology(&self, _out: &mut Vec<(NodeId, NodeId)>) {}

    /// Whether this element requires Newton linearisation.
    fn is_newton(&self) -> bool {
        false
    }

    /// Compute and cache limited junction voltages from `(x, x_old)`.
    /// Called before every `newton_stamp`; must not touch the system.
    fn compute_limited(&mut self, _ctx: &LimitContext<'_>) {}

    /// Stamp the first-order expansion of the element's I(V) around the
    /// cached limited voltages.
    fn newton_stamp(&self, _ctx: &mut StampContext<'_>, _x_guess: &DVector<f64>) {}

    /// Whether this element carries companion-model state across time steps.
    fn is_dynamic(&self) -> bool {
        false
    }

    /// Update companion parameters for a new time step of size `dt`.
    /// `dt <= 0` selects the DC degenerate form where applicable.
    fn begin_step(&mut self, _dt: f64) {}

    /// Persist per-step history from the converged solution.
    fn commit_step(&mut self, _x: &DVector<f64>) {}

    /// Number of branch-current unknowns this element claims.
    fn branch_count(&self) -> usize {
        0
    }

    /// Receive the first of this element's contiguous branch indices.
    /// Called once at finalisation.
    fn set_branch_base(&mut self, _base: usize) {}
}

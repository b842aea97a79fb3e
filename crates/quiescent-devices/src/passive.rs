//! Passive device models: resistor, capacitor, inductor.
//!
//! Capacitor and inductor discretise with the trapezoidal rule. Each keeps
//! its companion parameters and one step of history; `begin_step` refreshes
//! the companion for the new `dt` and `commit_step` rolls the history
//! forward after the Newton loop converges.

use nalgebra::DVector;
use quiescent_core::{Element, NodeId, StampContext, node_voltage};

use crate::error::{Error, Result};

/// A linear resistor.
#[derive(Debug, Clone)]
pub struct Resistor {
    label: String,
    a: NodeId,
    b: NodeId,
    resistance: f64,
}

impl Resistor {
    /// Create a resistor between `a` and `b`. `resistance` must be positive.
    pub fn new(label: impl Into<String>, a: NodeId, b: NodeId, resistance: f64) -> Result<Self> {
        let label = label.into();
        if resistance <= 0.0 {
            return Err(Error::invalid(&label, "resistance", "> 0", resistance));
        }
        Ok(Self {
            label,
            a,
            b,
            resistance,
        })
    }

    /// The conductance `1/R`.
    pub fn conductance(&self) -> f64 {
        1.0 / self.resistance
    }
}

impl Element for Resistor {
    fn label(&self) -> &str {
        &self.label
    }

    fn linear_stamp(&self, ctx: &mut StampContext<'_>) {
        ctx.system.stamp_conductance(self.a, self.b, self.conductance());
    }

    fn dc_topology(&self, out: &mut Vec<(NodeId, NodeId)>) {
        out.push((self.a, self.b));
    }
}

/// A capacitor under the trapezoidal companion model.
///
/// During a transient step the capacitor looks like `G_eq = 2C/dt` in
/// parallel with an equivalent current source. With `dt <= 0` it degenerates
/// to an open circuit, which is exactly its DC behaviour.
#[derive(Debug, Clone)]
pub struct Capacitor {
    label: String,
    a: NodeId,
    b: NodeId,
    capacitance: f64,

    // Companion parameters for the current step.
    g_eq: f64,
    i_eq: f64,

    // History.
    v_prev: f64,
    i_prev: f64,
}

impl Capacitor {
    /// Create a capacitor between `a` and `b`. `capacitance` must be
    /// non-negative.
    pub fn new(label: impl Into<String>, a: NodeId, b: NodeId, capacitance: f64) -> Result<Self> {
        let label = label.into();
        if capacitance < 0.0 {
            return Err(Error::invalid(&label, "capacitance", ">= 0", capacitance));
        }
        Ok(Self {
            label,
            a,
            b,
            capacitance,
            g_eq: 0.0,
            i_eq: 0.0,
            v_prev: 0.0,
            i_prev: 0.0,
        })
    }

    /// Branch current at the end of the last committed step (a to b).
    pub fn current(&self) -> f64 {
        self.i_prev
    }

    /// Voltage across the capacitor at the end of the last committed step.
    pub fn voltage(&self) -> f64 {
        self.v_prev
    }
}

impl Element for Capacitor {
    fn label(&self) -> &str {
        &self.label
    }

    fn linear_stamp(&self, ctx: &mut StampContext<'_>) {
        ctx.system.stamp_conductance(self.a, self.b, self.g_eq);
        ctx.system.stamp_current(self.a, self.b, self.i_eq);
    }

    fn is_dynamic(&self) -> bool {
        true
    }

    fn begin_step(&mut self, dt: f64) {
        if dt <= 0.0 {
            // DC: open circuit.
            self.g_eq = 0.0;
            self.i_eq = 0.0;
            return;
        }
        self.g_eq = 2.0 * self.capacitance / dt;
        self.i_eq = -(self.i_prev + self.g_eq * self.v_prev);
    }

    fn commit_step(&mut self, x: &DVector<f64>) {
        let v_new = node_voltage(x, self.a) - node_voltage(x, self.b);

        if self.g_eq == 0.0 {
            self.v_prev = v_new;
            self.i_prev = 0.0;
            return;
        }

        self.i_prev = self.g_eq * v_new + self.i_eq;
        self.v_prev = v_new;
    }
}

/// An inductor under the trapezoidal companion model.
///
/// The branch current is an MNA unknown; the branch equation reads
/// `v(a) - v(b) - R_eff * i = -(R_eff * i_prev + v_prev)` with
/// `R_eff = 2L/dt`. At DC (`R_eff = 0`, zero history) the branch row
/// collapses to `v(a) = v(b)`: a short.
#[derive(Debug, Clone)]
pub struct Inductor {
    label: String,
    a: NodeId,
    b: NodeId,
    inductance: f64,
    branch: Option<usize>,

    r_eff: f64,
    rhs: f64,

    i_prev: f64,
    v_prev: f64,
}

impl Inductor {
    /// Create an inductor between `a` and `b`. `inductance` must be
    /// positive.
    pub fn new(label: impl Into<String>, a: NodeId, b: NodeId, inductance: f64) -> Result<Self> {
        let label = label.into();
        if inductance <= 0.0 {
            return Err(Error::invalid(&label, "inductance", "> 0", inductance));
        }
        Ok(Self {
            label,
            a,
            b,
            inductance,
            branch: None,
            r_eff: 0.0,
            rhs: 0.0,
            i_prev: 0.0,
            v_prev: 0.0,
        })
    }

    /// Branch current at the end of the last committed step (a to b).
    pub fn current(&self) -> f64 {
        self.i_prev
    }

    /// The branch-variable index, once assigned by finalisation.
    pub fn branch_index(&self) -> Option<usize> {
        self.branch
    }
}

impl Element for Inductor {
    fn label(&self) -> &str {
        &self.label
    }

    fn linear_stamp(&self, ctx: &mut StampContext<'_>) {
        let k = self
            .branch
            .unwrap_or_else(|| panic!("{}: branch index unassigned; finalize first", self.label));

        // Branch (KVL) row.
        if let Some(i) = self.a.index() {
            ctx.system.add(k, i, 1.0);
        }
        if let Some(j) = self.b.index() {
            ctx.system.add(k, j, -1.0);
        }
        ctx.system.add(k, k, -self.r_eff);
        ctx.system.add_rhs(k, self.rhs);

        // KCL coupling: branch current leaves a, enters b.
        if let Some(i) = self.a.index() {
            ctx.system.add(i, k, 1.0);
        }
        if let Some(j) = self.b.index() {
            ctx.system.add(j, k, -1.0);
        }
    }

    fn dc_topology(&self, out: &mut Vec<(NodeId, NodeId)>) {
        out.push((self.a, self.b));
    }

    fn is_dynamic(&self) -> bool {
        true
    }

    fn begin_step(&mut self, dt: f64) {
        if dt <= 0.0 {
            self.r_eff = 0.0;
            self.rhs = 0.0;
            return;
        }
        self.r_eff = 2.0 * self.inductance / dt;
        self.rhs = -(self.r_eff * self.i_prev + self.v_prev);
    }

    fn commit_step(&mut self, x: &DVector<f64>) {
        if let Some(k) = self.branch {
            self.i_prev = x[k];
        }
        self.v_prev = node_voltage(x, self.a) - node_voltage(x, self.b);
    }

    fn branch_count(&self) -> usize {
        1
    }

    fn set_branch_base(&mut self, base: usize) {
        self.branch = Some(base);
    }
}

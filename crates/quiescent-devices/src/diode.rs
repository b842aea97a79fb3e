//! Shockley diode with Newton linearisation and optional zener breakdown.

use quiescent_core::{Element, LimitContext, NodeId, StampContext, node_voltage};

use crate::error::{Error, Result};
use crate::limit::{critical_voltage, pnjlim, safe_exp};

/// Diode model parameters.
#[derive(Debug, Clone)]
pub struct DiodeParams {
    /// Saturation current (A).
    pub is: f64,
    /// Emission coefficient.
    pub n: f64,
    /// Thermal voltage (V).
    pub vt: f64,
    /// Junction shunt conductance added for numerical stability (S).
    pub gmin: f64,
    /// Zener breakdown voltage (V). 0 disables the breakdown branch.
    pub bv: f64,
    /// Current at the breakdown knee (A).
    pub ibv: f64,
}

impl Default for DiodeParams {
    fn default() -> Self {
        Self {
            is: 1e-14,
            n: 1.0,
            vt: 0.02585,
            gmin: 1e-12,
            bv: 0.0,
            ibv: 1e-3,
        }
    }
}

/// A Shockley diode, anode to cathode.
///
/// Linearised at every Newton iteration around the limited junction voltage
/// cached by `compute_limited`. With `bv > 0` the reverse characteristic
/// switches to a piecewise-linear zener branch beyond the breakdown knee.
#[derive(Debug, Clone)]
pub struct Diode {
    label: String,
    anode: NodeId,
    cathode: NodeId,
    params: DiodeParams,

    limited_vd: f64,
}

impl Diode {
    /// Create a diode. Parameter constraints: `is > 0`, `n > 0`, `vt > 0`,
    /// `gmin >= 0`, `bv >= 0`, `ibv > 0`.
    pub fn new(
        label: impl Into<String>,
        anode: NodeId,
        cathode: NodeId,
        params: DiodeParams,
    ) -> Result<Self> {
        let label = label.into();
        if params.is <= 0.0 {
            return Err(Error::invalid(&label, "is", "> 0", params.is));
        }
        if params.n <= 0.0 {
            return Err(Error::invalid(&label, "n", "> 0", params.n));
        }
        if params.vt <= 0.0 {
            return Err(Error::invalid(&label, "vt", "> 0", params.vt));
        }
        if params.gmin < 0.0 {
            return Err(Error::invalid(&label, "gmin", ">= 0", params.gmin));
        }
        if params.bv < 0.0 {
            return Err(Error::invalid(&label, "bv", ">= 0", params.bv));
        }
        if params.ibv <= 0.0 {
            return Err(Error::invalid(&label, "ibv", "> 0", params.ibv));
        }
        Ok(Self {
            label,
            anode,
            cathode,
            params,
            limited_vd: 0.0,
        })
    }

    /// Diode current and differential conductance at junction voltage `vd`.
    ///
    /// `id = Is * (exp(vd / nVt) - 1)`, `gd = Is / nVt * exp(vd / nVt)`.
    /// The exponential argument is clamped to ±40.
    pub fn evaluate(&self, vd: f64) -> (f64, f64) {
        let nvt = self.params.n * self.params.vt;
        let ev = safe_exp(vd / nvt);
        let id = self.params.is * (ev - 1.0);
        let gd = self.params.is / nvt * ev;
        (id, gd)
    }

    /// The junction voltage cached by the last limiting pass.
    pub fn limited_voltage(&self) -> f64 {
        self.limited_vd
    }
}

impl Element for Diode {
    fn label(&self) -> &str {
        &self.label
    }

    // All contributions are operating-point dependent.
    fn linear_stamp(&self, _ctx: &mut StampContext<'_>) {}

    fn dc_topology(&self, out: &mut Vec<(NodeId, NodeId)>) {
        out.push((self.anode, self.cathode));
    }

    fn is_newton(&self) -> bool {
        true
    }

    fn compute_limited(&mut self, ctx: &LimitContext<'_>) {
        let vd_new = node_voltage(ctx.x, self.anode) - node_voltage(ctx.x, self.cathode);
        let vd_old = node_voltage(ctx.x_old, self.anode) - node_voltage(ctx.x_old, self.cathode);

        let nvt = self.params.n * self.params.vt;
        let vcrit = critical_voltage(nvt, self.params.is);
        self.limited_vd = pnjlim(vd_new, vd_old, nvt, vcrit);
    }

    fn newton_stamp(&self, ctx: &mut StampContext<'_>, _x_guess: &nalgebra::DVector<f64>) {
        let v = self.limited_vd;

        if self.params.bv > 0.0 && v < -self.params.bv {
            // Zener breakdown: piecewise-linear segment through (-bv, 0)
            // with slope ibv/bv.
            let g = self.params.ibv / self.params.bv;
            let ieq = -g * self.params.bv;
            ctx.system
                .stamp_conductance(self.anode, self.cathode, g + self.params.gmin);
            ctx.system.stamp_current(self.anode, self.cathode, ieq);
            return;
        }

        let (id, gd) = self.evaluate(v);
        let gd = gd + self.params.gmin;
        let ieq = id - gd * v;

        ctx.system.stamp_conductance(self.anode, self.cathode, gd);
        ctx.system.stamp_current(self.anode, self.cathode, ieq);
    }
}

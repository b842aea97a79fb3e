//! Ebers-Moll BJT in transport form, NPN and PNP.
//!
//! The transport formulation stamps the full 3x3 Jacobian block
//! d(Ic,Ib,Ie)/d(Vc,Vb,Ve) plus the Norton intercepts `J*V - I`, which
//! keeps saturation and reverse-active regions numerically honest where a
//! plain hybrid-pi stamp would not. Both junction voltages go through the
//! PN limiter between Newton iterates.

use nalgebra::DVector;
use quiescent_core::{Circuit, Element, LimitContext, NodeId, StampContext, node_voltage};

use crate::error::{Error, Result};
use crate::limit::{critical_voltage, pnjlim, safe_exp};
use crate::passive::{Capacitor, Resistor};

/// BJT polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BjtPolarity {
    Npn,
    Pnp,
}

/// BJT model parameters.
#[derive(Debug, Clone)]
pub struct BjtParams {
    /// Transport saturation current (A).
    pub is: f64,
    /// Emission coefficient times thermal voltage (V).
    pub n_vt: f64,
    /// Forward current gain.
    pub beta_f: f64,
    /// Reverse current gain.
    pub beta_r: f64,
    /// Forward Early voltage (V). 0 disables the Early effect.
    pub vaf: f64,
    /// Junction shunt conductance (S).
    pub gmin: f64,
    /// Series base resistance (ohm). 0 omits the parasitic.
    pub rb: f64,
    /// Series collector resistance (ohm).
    pub rc: f64,
    /// Series emitter resistance (ohm).
    pub re: f64,
    /// Base-emitter junction capacitance (F).
    pub cje: f64,
    /// Base-collector junction capacitance (F).
    pub cjc: f64,
}

impl Default for BjtParams {
    fn default() -> Self {
        Self {
            is: 1e-15,
            n_vt: 0.02585,
            beta_f: 200.0,
            beta_r: 2.0,
            vaf: 100.0,
            gmin: 1e-12,
            rb: 0.0,
            rc: 0.0,
            re: 0.0,
            cje: 0.0,
            cjc: 0.0,
        }
    }
}

impl BjtParams {
    fn validate(&self, label: &str) -> Result<()> {
        if self.is <= 0.0 {
            return Err(Error::invalid(label, "is", "> 0", self.is));
        }
        if self.n_vt <= 0.0 {
            return Err(Error::invalid(label, "n_vt", "> 0", self.n_vt));
        }
        if self.beta_f <= 0.0 {
            return Err(Error::invalid(label, "beta_f", "> 0", self.beta_f));
        }
        if self.beta_r <= 0.0 {
            return Err(Error::invalid(label, "beta_r", "> 0", self.beta_r));
        }
        if self.vaf < 0.0 {
            return Err(Error::invalid(label, "vaf", ">= 0", self.vaf));
        }
        if self.gmin < 0.0 {
            return Err(Error::invalid(label, "gmin", ">= 0", self.gmin));
        }
        for (name, value) in [
            ("rb", self.rb),
            ("rc", self.rc),
            ("re", self.re),
            ("cje", self.cje),
            ("cjc", self.cjc),
        ] {
            if value < 0.0 {
                return Err(Error::invalid(label, name, ">= 0", value));
            }
        }
        Ok(())
    }
}

/// An Ebers-Moll BJT at ports collector, base, emitter.
#[derive(Debug, Clone)]
pub struct Bjt {
    label: String,
    collector: NodeId,
    base: NodeId,
    emitter: NodeId,
    polarity: BjtPolarity,
    params: BjtParams,

    // Limited junction voltages: Vbe/Vbc for NPN, Veb/Vcb for PNP.
    v_fwd: f64,
    v_rev: f64,
}

impl Bjt {
    /// Create an NPN transistor.
    pub fn npn(
        label: impl Into<String>,
        collector: NodeId,
        base: NodeId,
        emitter: NodeId,
        params: BjtParams,
    ) -> Result<Self> {
        Self::new(label, collector, base, emitter, BjtPolarity::Npn, params)
    }

    /// Create a PNP transistor.
    pub fn pnp(
        label: impl Into<String>,
        collector: NodeId,
        base: NodeId,
        emitter: NodeId,
        params: BjtParams,
    ) -> Result<Self> {
        Self::new(label, collector, base, emitter, BjtPolarity::Pnp, params)
    }

    fn new(
        label: impl Into<String>,
        collector: NodeId,
        base: NodeId,
        emitter: NodeId,
        polarity: BjtPolarity,
        params: BjtParams,
    ) -> Result<Self> {
        let label = label.into();
        params.validate(&label)?;
        Ok(Self {
            label,
            collector,
            base,
            emitter,
            polarity,
            params,
            v_fwd: 0.0,
            v_rev: 0.0,
        })
    }

    /// Terminal currents entering (collector, base, emitter) at the given
    /// node voltages, without junction limiting.
    pub fn currents_at(&self, v_collector: f64, v_base: f64, v_emitter: f64) -> (f64, f64, f64) {
        match self.polarity {
            BjtPolarity::Npn => {
                let eval = self.eval_npn(v_base - v_emitter, v_base - v_collector);
                (eval.ic, eval.ib, eval.ie)
            }
            BjtPolarity::Pnp => {
                let eval = self.eval_pnp(v_emitter - v_base, v_collector - v_base);
                (eval.ic, eval.ib, eval.ie)
            }
        }
    }

    fn eval_npn(&self, vbe: f64, vbc: f64) -> BjtEval {
        let p = &self.params;
        let exp_be = safe_exp(vbe / p.n_vt);
        let exp_bc = safe_exp(vbc / p.n_vt);

        let i_transport = p.is * (exp_be - exp_bc);
        let i_be_diode = p.is / p.beta_f * (exp_be - 1.0) + p.gmin * vbe;
        let i_bc_diode = p.is / p.beta_r * (exp_bc - 1.0) + p.gmin * vbc;

        // Early effect: go = |Ic|/VAF, applied around Vce = Vbe - Vbc.
        let vce = vbe - vbc;
        let ic_base = i_transport - i_bc_diode;
        let go = if p.vaf > 0.0 { ic_base.abs() / p.vaf } else { 0.0 };

        let ic = ic_base + go * vce;
        let ib = i_be_diode + i_bc_diode;
        let ie = -(ic + ib);

        let g_fwd = p.is / p.n_vt * exp_be;
        let g_rev = p.is / p.n_vt * exp_bc;
        let g_be = p.is / (p.beta_f * p.n_vt) * exp_be + p.gmin;
        let g_bc = p.is / (p.beta_r * p.n_vt) * exp_bc + p.gmin;

        // d(Ic,Ib,Ie)/d(Vc,Vb,Ve). Vce depends on Vc and Ve only.
        let dic = [g_rev + g_bc + go, g_fwd - g_rev - g_bc, -g_fwd - go];
        let dib = [-g_bc, g_be + g_bc, -g_be];
        let die = [
            -(dic[0] + dib[0]),
            -(dic[1] + dib[1]),
            -(dic[2] + dib[2]),
        ];

        let jv_ic = g_fwd * vbe + (-g_rev - g_bc) * vbc + go * vce;
        let jv_ib = g_be * vbe + g_bc * vbc;
        let jv_ie = -(jv_ic + jv_ib);

        BjtEval {
            ic,
            ib,
            ie,
            dic,
            dib,
            die,
            jv_ic,
            jv_ib,
            jv_ie,
        }
    }

    fn eval_pnp(&self, veb: f64, vcb: f64) -> BjtEval {
        let p = &self.params;
        let exp_eb = safe_exp(veb / p.n_vt);
        let exp_cb = safe_exp(vcb / p.n_vt);

        let i_transport = p.is * (exp_eb - exp_cb);
        let i_eb_diode = p.is / p.beta_f * (exp_eb - 1.0) + p.gmin * veb;
        let i_cb_diode = p.is / p.beta_r * (exp_cb - 1.0) + p.gmin * vcb;

        // PNP collector current flows into the collector; the Early term is
        // an r_o between C and E with the PNP direction convention:
        // I(ro into C) = -go*Vec, I(ro into E) = +go*Vec.
        let vec = veb - vcb;
        let ic_base = -i_transport + i_cb_diode;
        let go = if p.vaf > 0.0 { ic_base.abs() / p.vaf } else { 0.0 };

        let ic = ic_base - go * vec;
        let ie = i_transport + i_eb_diode + go * vec;
        let ib = -(ie + ic);

        let g_fwd = p.is / p.n_vt * exp_eb;
        let g_rev = p.is / p.n_vt * exp_cb;
        let g_eb = p.is / (p.beta_f * p.n_vt) * exp_eb + p.gmin;
        let g_cb = p.is / (p.beta_r * p.n_vt) * exp_cb + p.gmin;

        // d(Ic,Ib,Ie)/d(Vc,Vb,Ve). Vec depends on Ve and Vc only.
        let die = [
            -g_rev - go,
            -(g_fwd + g_eb - g_rev),
            g_fwd + g_eb + go,
        ];
        let dic = [
            g_rev + g_cb + go,
            g_fwd - (g_rev + g_cb),
            -g_fwd - go,
        ];
        let dib = [
            -(die[0] + dic[0]),
            -(die[1] + dic[1]),
            -(die[2] + dic[2]),
        ];

        let jv_ie = (g_fwd + g_eb) * veb + (-g_rev) * vcb + go * vec;
        let jv_ic = (-g_fwd) * veb + (g_rev + g_cb) * vcb - go * vec;
        let jv_ib = -(jv_ie + jv_ic);

        BjtEval {
            ic,
            ib,
            ie,
            dic,
            dib,
            die,
            jv_ic,
            jv_ib,
            jv_ie,
        }
    }

    fn stamp_eval(&self, ctx: &mut StampContext<'_>, eval: &BjtEval) {
        let nodes = [self.collector, self.base, self.emitter];

        let mut stamp_row = |row: NodeId, derivs: &[f64; 3], jv: f64, i_op: f64| {
            let Some(r) = row.index() else { return };
            for (node, d) in nodes.iter().zip(derivs) {
                if let Some(c) = node.index() {
                    ctx.system.add(r, c, *d);
                }
            }
            ctx.system.add_rhs(r, jv - i_op);
        };

        stamp_row(self.collector, &eval.dic, eval.jv_ic, eval.ic);
        stamp_row(self.base, &eval.dib, eval.jv_ib, eval.ib);
        stamp_row(self.emitter, &eval.die, eval.jv_ie, eval.ie);
    }
}

/// One linearisation of the transistor: terminal currents, the Jacobian
/// block ordered (dVc, dVb, dVe), and the `J*V` products for the RHS.
struct BjtEval {
    ic: f64,
    ib: f64,
    ie: f64,
    dic: [f64; 3],
    dib: [f64; 3],
    die: [f64; 3],
    jv_ic: f64,
    jv_ib: f64,
    jv_ie: f64,
}

impl Element for Bjt {
    fn label(&self) -> &str {
        &self.label
    }

    // Purely operating-point dependent.
    fn linear_stamp(&self, _ctx: &mut StampContext<'_>) {}

    fn dc_topology(&self, out: &mut Vec<(NodeId, NodeId)>) {
        out.push((self.base, self.emitter));
        out.push((self.base, self.collector));
    }

    fn is_newton(&self) -> bool {
        true
    }

    fn compute_limited(&mut self, ctx: &LimitContext<'_>) {
        let vc = node_voltage(ctx.x, self.collector);
        let vb = node_voltage(ctx.x, self.base);
        let ve = node_voltage(ctx.x, self.emitter);
        let vc_old = node_voltage(ctx.x_old, self.collector);
        let vb_old = node_voltage(ctx.x_old, self.base);
        let ve_old = node_voltage(ctx.x_old, self.emitter);

        let (fwd_new, fwd_old, rev_new, rev_old) = match self.polarity {
            BjtPolarity::Npn => (vb - ve, vb_old - ve_old, vb - vc, vb_old - vc_old),
            BjtPolarity::Pnp => (ve - vb, ve_old - vb_old, vc - vb, vc_old - vb_old),
        };

        let vcrit = critical_voltage(self.params.n_vt, self.params.is);
        self.v_fwd = pnjlim(fwd_new, fwd_old, self.params.n_vt, vcrit);
        self.v_rev = pnjlim(rev_new, rev_old, self.params.n_vt, vcrit);
    }

    fn newton_stamp(&self, ctx: &mut StampContext<'_>, _x_guess: &DVector<f64>) {
        let eval = match self.polarity {
            BjtPolarity::Npn => self.eval_npn(self.v_fwd, self.v_rev),
            BjtPolarity::Pnp => self.eval_pnp(self.v_fwd, self.v_rev),
        };
        self.stamp_eval(ctx, &eval);
    }
}

/// Interior terminals of a BJT wrapped with parasitics.
#[derive(Debug, Clone, Copy)]
pub struct BjtTerminals {
    pub collector: NodeId,
    pub base: NodeId,
    pub emitter: NodeId,
}

/// Register a BJT together with its parasitic wrapper.
///
/// Positive `rb`/`rc`/`re` insert series resistors between the external
/// terminals and fresh interior nodes; positive `cje`/`cjc` hang junction
/// capacitors off the interior base. The intrinsic transistor then lives
/// entirely on the interior nodes, whose ids are returned.
pub fn add_bjt_with_parasitics(
    circuit: &mut Circuit,
    label: &str,
    collector: NodeId,
    base: NodeId,
    emitter: NodeId,
    polarity: BjtPolarity,
    params: BjtParams,
) -> Result<BjtTerminals> {
    params.validate(label)?;

    let c_int = if params.rc > 0.0 {
        circuit.add_named_node(format!("{label}_Ci"))
    } else {
        collector
    };
    let b_int = if params.rb > 0.0 {
        circuit.add_named_node(format!("{label}_Bi"))
    } else {
        base
    };
    let e_int = if params.re > 0.0 {
        circuit.add_named_node(format!("{label}_Ei"))
    } else {
        emitter
    };

    if params.rb > 0.0 {
        circuit.add(Resistor::new(format!("{label}_RB"), base, b_int, params.rb)?);
    }
    if params.rc > 0.0 {
        circuit.add(Resistor::new(
            format!("{label}_RC"),
            collector,
            c_int,
            params.rc,
        )?);
    }
    if params.re > 0.0 {
        circuit.add(Resistor::new(
            format!("{label}_RE"),
            emitter,
            e_int,
            params.re,
        )?);
    }
    if params.cje > 0.0 {
        circuit.add(Capacitor::new(
            format!("{label}_CJE"),
            b_int,
            e_int,
            params.cje,
        )?);
    }
    if params.cjc > 0.0 {
        circuit.add(Capacitor::new(
            format!("{label}_CJC"),
            b_int,
            c_int,
            params.cjc,
        )?);
    }

    circuit.add(Bjt::new(label, c_int, b_int, e_int, polarity, params)?);

    Ok(BjtTerminals {
        collector: c_int,
        base: b_int,
        emitter: e_int,
    })
}

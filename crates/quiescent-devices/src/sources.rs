//! Independent voltage and current sources.
//!
//! Both honour the stamp context's source scale factor, which the DC engine
//! sweeps from 0 to 1 during source-stepping homotopy.

use std::f64::consts::TAU;

use quiescent_core::{Element, NodeId, StampContext};

use crate::error::{Error, Result};

/// Drive shape of a voltage source.
#[derive(Debug, Clone, Copy)]
enum Drive {
    Dc,
    Sine {
        amplitude: f64,
        frequency: f64,
        phase: f64,
        time: f64,
    },
}

/// An independent voltage source between `a` (+) and `b` (−).
///
/// Claims one branch variable: the current flowing into `a` from the
/// external circuit. The KVL row reads `v(a) - v(b) = V * scale`.
///
/// A sinusoidal drive makes the source a dynamic element: its internal
/// clock advances by `dt` at each `begin_step`, so transient excitation
/// needs no side channel into the stepper.
#[derive(Debug, Clone)]
pub struct VoltageSource {
    label: String,
    a: NodeId,
    b: NodeId,
    voltage: f64,
    drive: Drive,
    branch: Option<usize>,
}

impl VoltageSource {
    /// Create a DC source of `voltage` volts.
    pub fn dc(label: impl Into<String>, a: NodeId, b: NodeId, voltage: f64) -> Self {
        Self {
            label: label.into(),
            a,
            b,
            voltage,
            drive: Drive::Dc,
            branch: None,
        }
    }

    /// Create a sine source `amplitude * sin(2*pi*frequency*t + phase)`,
    /// starting at its `t = 0` value. `frequency` must be positive.
    pub fn sine(
        label: impl Into<String>,
        a: NodeId,
        b: NodeId,
        amplitude: f64,
        frequency: f64,
        phase: f64,
    ) -> Result<Self> {
        let label = label.into();
        if frequency <= 0.0 {
            return Err(Error::invalid(&label, "frequency", "> 0", frequency));
        }
        Ok(Self {
            voltage: amplitude * phase.sin(),
            label,
            a,
            b,
            drive: Drive::Sine {
                amplitude,
                frequency,
                phase,
                time: 0.0,
            },
            branch: None,
        })
    }

    /// Source value in volts at the present instant.
    pub fn voltage(&self) -> f64 {
        self.voltage
    }

    /// Retune a DC source, e.g. for a warm-started supply sweep.
    pub fn set_voltage(&mut self, voltage: f64) {
        self.voltage = voltage;
    }

    /// The branch-variable index, once assigned by finalisation.
    pub fn branch_index(&self) -> Option<usize> {
        self.branch
    }
}

impl Element for VoltageSource {
    fn label(&self) -> &str {
        &self.label
    }

    fn linear_stamp(&self, ctx: &mut StampContext<'_>) {
        let k = self
            .branch
            .unwrap_or_else(|| panic!("{}: branch index unassigned; finalize first", self.label));

        if let Some(i) = self.a.index() {
            ctx.system.add(i, k, 1.0);
            ctx.system.add(k, i, 1.0);
        }
        if let Some(j) = self.b.index() {
            ctx.system.add(j, k, -1.0);
            ctx.system.add(k, j, -1.0);
        }
        ctx.system.add_rhs(k, self.voltage * ctx.scale);
    }

    fn dc_topology(&self, out: &mut Vec<(NodeId, NodeId)>) {
        out.push((self.a, self.b));
    }

    fn is_dynamic(&self) -> bool {
        matches!(self.drive, Drive::Sine { .. })
    }

    fn begin_step(&mut self, dt: f64) {
        if let Drive::Sine {
            amplitude,
            frequency,
            phase,
            ref mut time,
        } = self.drive
        {
            *time += dt.max(0.0);
            self.voltage = amplitude * (TAU * frequency * *time + phase).sin();
        }
    }

    fn branch_count(&self) -> usize {
        1
    }

    fn set_branch_base(&mut self, base: usize) {
        self.branch = Some(base);
    }
}

/// An independent current source injecting `current` amperes from `a` to
/// `b`.
///
/// Reports no DC topology: an ideal current source has infinite impedance,
/// so for floating-node purposes it does not anchor its terminals.
#[derive(Debug, Clone)]
pub struct CurrentSource {
    label: String,
    a: NodeId,
    b: NodeId,
    current: f64,
}

impl CurrentSource {
    /// Create a current source driving `current` amperes from `a` to `b`.
    pub fn new(label: impl Into<String>, a: NodeId, b: NodeId, current: f64) -> Self {
        Self {
            label: label.into(),
            a,
            b,
            current,
        }
    }

    /// Current source value in amperes.
    pub fn current(&self) -> f64 {
        self.current
    }

    /// Retune the source value.
    pub fn set_current(&mut self, current: f64) {
        self.current = current;
    }
}

impl Element for CurrentSource {
    fn label(&self) -> &str {
        &self.label
    }

    fn linear_stamp(&self, ctx: &mut StampContext<'_>) {
        ctx.system
            .stamp_current(self.a, self.b, self.current * ctx.scale);
    }
}

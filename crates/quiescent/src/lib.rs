//! # Quiescent
//!
//! A nonlinear analog circuit simulator for audio signal paths: discrete
//! amplifier stages, opamp internals, clippers. Given a netlist of
//! passives, independent sources and semiconductor devices it computes DC
//! operating points (damped Newton under a two-stage homotopy) and
//! time-domain transient responses (trapezoidal companion models).
//!
//! ## Quick start
//!
//! ```rust
//! use quiescent::prelude::*;
//!
//! // Voltage divider: V1 = 10 V, R1 = R2 = 1k.
//! let mut circuit = Circuit::new();
//! let n1 = circuit.add_named_node("IN");
//! let n2 = circuit.add_named_node("OUT");
//! circuit.add(VoltageSource::dc("V1", n1, NodeId::GROUND, 10.0));
//! circuit.add(Resistor::new("R1", n1, n2, 1e3).unwrap());
//! circuit.add(Resistor::new("R2", n2, NodeId::GROUND, 1e3).unwrap());
//!
//! let mut engine = Engine::new(circuit);
//! let mut x = DVector::zeros(0);
//! let report = engine.solve_dc(&mut x, &DcOptions::default());
//!
//! assert!(report.converged);
//! assert!((x[1] - 5.0).abs() < 1e-6);
//! ```

pub use quiescent_core as core;
pub use quiescent_devices as devices;
pub use quiescent_solver as solver;

pub use quiescent_core::{
    AuditReport, Circuit, DeviceHandle, Element, LimitContext, MnaSystem, Node, NodeId,
    StampContext, check_dc_paths, node_voltage,
};

pub use quiescent_devices::{
    Bjt, BjtParams, BjtPolarity, BjtTerminals, Capacitor, CurrentSource, Diode, DiodeParams,
    Error as DeviceError, Inductor, Resistor, VoltageSource, add_bjt_with_parasitics,
};

pub use quiescent_solver::{
    ConvergenceStats, DcOptions, DcReport, Engine, Error as SolverError, FailureReport, GminSteps,
    StepOptions, ThdResult, TransientTrace, compute_thd, run_transient, solve_dense,
};

/// Re-export of nalgebra's dynamic vector type.
pub use nalgebra::DVector;

/// Re-export of nalgebra's dynamic matrix type.
pub use nalgebra::DMatrix;

/// Commonly used types and traits.
pub mod prelude {
    pub use crate::{
        Bjt, BjtParams, BjtPolarity, Capacitor, Circuit, CurrentSource, DMatrix, DVector,
        DcOptions, DcReport, Diode, DiodeParams, Engine, GminSteps, Inductor, MnaSystem, NodeId,
        Resistor, StepOptions, VoltageSource, check_dc_paths, compute_thd, run_transient,
    };
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_prelude_covers_a_full_solve() {
        let mut circuit = Circuit::new();
        let n1 = circuit.add_node();
        circuit.add(VoltageSource::dc("V1", n1, NodeId::GROUND, 3.0));
        circuit.add(Resistor::new("R1", n1, NodeId::GROUND, 1e3).unwrap());

        let mut engine = Engine::new(circuit);
        let mut x = DVector::zeros(0);
        assert!(engine.solve_dc(&mut x, &DcOptions::default()).converged);
        assert!((x[0] - 3.0).abs() < 1e-9);
    }
}

//! Built-in demo topologies for the harness.

use quiescent_core::{Circuit, DeviceHandle, NodeId};
use quiescent_devices::{Bjt, BjtParams, Diode, DiodeParams, Resistor, VoltageSource};

const GND: NodeId = NodeId::GROUND;

/// Which demo circuit to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Demo {
    /// 10 V voltage divider, 1k / 1k.
    Divider,
    /// Sine-driven anti-parallel diode clipper.
    Clipper,
    /// Two-stage BJT amplifier on split supplies.
    Amp,
}

/// A built demo plus the handles the harness needs afterwards.
pub struct DemoCircuit {
    pub circuit: Circuit,
    /// Positive and negative supply handles (amp only), for sweeps.
    pub supplies: Option<(DeviceHandle<VoltageSource>, DeviceHandle<VoltageSource>)>,
}

pub fn build(demo: Demo, supply: f64) -> DemoCircuit {
    match demo {
        Demo::Divider => divider(supply),
        Demo::Clipper => clipper(),
        Demo::Amp => amp(supply),
    }
}

fn divider(supply: f64) -> DemoCircuit {
    let mut circuit = Circuit::new();
    let n1 = circuit.add_named_node("IN");
    let n2 = circuit.add_named_node("OUT");
    circuit.add(VoltageSource::dc("V1", n1, GND, supply));
    circuit.add(Resistor::new("R1", n1, n2, 1e3).expect("valid resistor"));
    circuit.add(Resistor::new("R2", n2, GND, 1e3).expect("valid resistor"));
    DemoCircuit {
        circuit,
        supplies: None,
    }
}

fn clipper() -> DemoCircuit {
    let mut circuit = Circuit::new();
    let n1 = circuit.add_named_node("IN");
    let n2 = circuit.add_named_node("OUT");
    circuit.add(VoltageSource::sine("VIN", n1, GND, 5.0, 1e3, 0.0).expect("valid source"));
    circuit.add(Resistor::new("R1", n1, n2, 4.7e3).expect("valid resistor"));
    circuit.add(Diode::new("D1", n2, GND, DiodeParams::default()).expect("valid diode"));
    circuit.add(Diode::new("D2", GND, n2, DiodeParams::default()).expect("valid diode"));
    DemoCircuit {
        circuit,
        supplies: None,
    }
}

/// Common-emitter stage with divider bias and degeneration, driving an
/// emitter follower into the negative rail.
fn amp(supply: f64) -> DemoCircuit {
    let mut circuit = Circuit::new();
    let vcc = circuit.add_named_node("VCC");
    let vee = circuit.add_named_node("VEE");
    let b1 = circuit.add_named_node("B1");
    let c1 = circuit.add_named_node("C1");
    let e1 = circuit.add_named_node("E1");
    let out = circuit.add_named_node("OUT");

    let h_vcc = circuit.add(VoltageSource::dc("VCC", vcc, GND, supply));
    let h_vee = circuit.add(VoltageSource::dc("VEE", vee, GND, -supply));

    circuit.add(Resistor::new("R1", vcc, b1, 47e3).expect("valid resistor"));
    circuit.add(Resistor::new("R2", b1, GND, 10e3).expect("valid resistor"));
    circuit.add(Resistor::new("RC", vcc, c1, 4.7e3).expect("valid resistor"));
    circuit.add(Resistor::new("RE", e1, GND, 1e3).expect("valid resistor"));
    circuit.add(Bjt::npn("Q1", c1, b1, e1, BjtParams::default()).expect("valid bjt"));

    circuit.add(Resistor::new("RL", out, vee, 10e3).expect("valid resistor"));
    circuit.add(Bjt::npn("Q2", vcc, c1, out, BjtParams::default()).expect("valid bjt"));

    circuit.set_nodeset(b1, 2.0);
    circuit.set_nodeset(e1, 1.3);

    DemoCircuit {
        circuit,
        supplies: Some((h_vcc, h_vee)),
    }
}

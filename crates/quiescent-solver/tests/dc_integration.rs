//! End-to-end DC operating-point tests.

use nalgebra::DVector;
use quiescent_core::{Circuit, NodeId, check_dc_paths};
use quiescent_devices::{
    Bjt, BjtParams, CurrentSource, Diode, DiodeParams, Resistor, VoltageSource,
};
use quiescent_solver::{DcOptions, Engine};

const GND: NodeId = NodeId::GROUND;

/// Voltage divider: V1 = 10 V, R1 = R2 = 1k.
///
/// ```text
///   V1(10V) -- N1 -- R1 -- N2 -- R2 -- GND
/// ```
#[test]
fn test_voltage_divider() {
    let mut circuit = Circuit::new();
    let n1 = circuit.add_named_node("N1");
    let n2 = circuit.add_named_node("N2");
    let v1 = circuit.add(VoltageSource::dc("V1", n1, GND, 10.0));
    circuit.add(Resistor::new("R1", n1, n2, 1e3).unwrap());
    circuit.add(Resistor::new("R2", n2, GND, 1e3).unwrap());

    let mut engine = Engine::new(circuit);
    let mut x = DVector::zeros(0);
    let report = engine.solve_dc(&mut x, &DcOptions::default());

    assert!(report.converged);
    assert!((x[0] - 10.0).abs() < 1e-6, "V(N1) = {}", x[0]);
    assert!((x[1] - 5.0).abs() < 1e-6, "V(N2) = {}", x[1]);

    // 5 mA circulate; the source branch current runs into the source.
    let k = engine.circuit().device(v1).branch_index().unwrap();
    assert!((x[k] + 5e-3).abs() < 1e-9, "I(V1) = {}", x[k]);
}

/// Purely resistive networks must finish inside the warm-start shortcut:
/// one exact solve plus one verifying iteration.
#[test]
fn test_linear_network_two_iterations() {
    let mut circuit = Circuit::new();
    let n1 = circuit.add_node();
    let n2 = circuit.add_node();
    circuit.add(CurrentSource::new("I1", GND, n1, 2e-3));
    circuit.add(Resistor::new("R1", n1, GND, 1e3).unwrap());
    circuit.add(Resistor::new("R2", n1, n2, 2e3).unwrap());
    circuit.add(Resistor::new("R3", n2, GND, 3e3).unwrap());

    let mut engine = Engine::new(circuit);
    let mut x = DVector::zeros(0);
    let report = engine.solve_dc(&mut x, &DcOptions::default());

    assert!(report.converged);
    assert_eq!(report.stats.total_iterations, 2);

    // Nodal solution by hand: G = [[1/1k + 1/5k]] after folding R2+R3.
    let r_fold = 2e3 + 3e3;
    let v1 = 2e-3 / (1.0 / 1e3 + 1.0 / r_fold);
    let v2 = v1 * 3e3 / r_fold;
    assert!((x[0] - v1).abs() < 1e-6);
    assert!((x[1] - v2).abs() < 1e-6);
}

/// Forward-biased diode behind 1k: the junction settles in the 0.6-0.8 V
/// band with a few hundred microamps through the resistor.
#[test]
fn test_forward_biased_diode() {
    let mut circuit = Circuit::new();
    let n1 = circuit.add_named_node("N1");
    let n2 = circuit.add_named_node("N2");
    circuit.add(VoltageSource::dc("V1", n1, GND, 1.0));
    circuit.add(Resistor::new("R1", n1, n2, 1e3).unwrap());
    circuit.add(
        Diode::new(
            "D1",
            n2,
            GND,
            DiodeParams {
                is: 1e-15,
                ..Default::default()
            },
        )
        .unwrap(),
    );

    let mut engine = Engine::new(circuit);
    let mut x = DVector::zeros(0);
    let report = engine.solve_dc(&mut x, &DcOptions::default());

    assert!(report.converged);
    let vd = x[1];
    assert!(vd > 0.6 && vd < 0.8, "V(N2) = {vd}");

    let i_r = (x[0] - x[1]) / 1e3;
    assert!(i_r > 0.2e-3 && i_r < 0.4e-3, "I(R) = {i_r}");
}

/// KCL at the diode node: resistor current in equals junction current out
/// to within the residual criterion.
#[test]
fn test_kcl_at_converged_point() {
    let mut circuit = Circuit::new();
    let n1 = circuit.add_node();
    let n2 = circuit.add_node();
    circuit.add(VoltageSource::dc("V1", n1, GND, 1.0));
    circuit.add(Resistor::new("R1", n1, n2, 1e3).unwrap());
    circuit.add(Diode::new("D1", n2, GND, DiodeParams::default()).unwrap());

    let mut engine = Engine::new(circuit);
    let mut x = DVector::zeros(0);
    assert!(engine.solve_dc(&mut x, &DcOptions::default()).converged);

    let i_r = (x[0] - x[1]) / 1e3;
    let i_d = 1e-14 * ((x[1] / 0.02585).exp() - 1.0);
    assert!((i_r - i_d).abs() < 1e-4, "KCL defect {}", i_r - i_d);
}

/// NPN at a forced operating point: Vc = 5, Vb = 0.7, Ve = 0. The collector
/// supply's branch current must match the transport-model Ic to 2%.
#[test]
fn test_npn_forced_operating_point() {
    let params = BjtParams {
        is: 1e-14,
        n_vt: 0.02585,
        beta_f: 100.0,
        beta_r: 1.0,
        vaf: 0.0,
        ..Default::default()
    };

    let mut circuit = Circuit::new();
    let nc = circuit.add_named_node("C");
    let nb = circuit.add_named_node("B");
    let vc = circuit.add(VoltageSource::dc("VC", nc, GND, 5.0));
    circuit.add(VoltageSource::dc("VB", nb, GND, 0.7));
    circuit.add(Bjt::npn("Q1", nc, nb, GND, params).unwrap());

    let mut engine = Engine::new(circuit);
    let mut x = DVector::zeros(0);
    let report = engine.solve_dc(&mut x, &DcOptions::default());
    assert!(report.converged);

    let ic_expected = 1e-14 * ((0.7f64 / 0.02585).exp() - ((0.7 - 5.0) / 0.02585_f64).exp());
    let k = engine.circuit().device(vc).branch_index().unwrap();
    let ic_measured = x[k].abs();
    let rel = (ic_measured - ic_expected).abs() / ic_expected;
    assert!(
        rel < 0.02,
        "Ic = {ic_measured} (expected {ic_expected}, rel err {rel})"
    );
}

/// PNP wired as a diode clamp: base and collector grounded, emitter pulled
/// up through 4.3k. The emitter sits one junction drop above ground.
#[test]
fn test_pnp_diode_connected_clamp() {
    let mut circuit = Circuit::new();
    let n1 = circuit.add_named_node("SUPPLY");
    let ne = circuit.add_named_node("E");
    circuit.add(VoltageSource::dc("V1", n1, GND, 5.0));
    circuit.add(Resistor::new("R1", n1, ne, 4.3e3).unwrap());
    circuit.add(Bjt::pnp("Q1", GND, GND, ne, BjtParams::default()).unwrap());

    let mut engine = Engine::new(circuit);
    let mut x = DVector::zeros(0);
    let report = engine.solve_dc(&mut x, &DcOptions::default());
    assert!(report.converged);

    let ve = x[1];
    assert!(ve > 0.5 && ve < 0.85, "V(E) = {ve}");
}

/// The source ramp must not contaminate the answer: wildly different step
/// counts land on the same operating point.
#[test]
fn test_source_step_count_invariance() {
    let build = || {
        let mut circuit = Circuit::new();
        let n1 = circuit.add_node();
        let n2 = circuit.add_node();
        circuit.add(VoltageSource::dc("V1", n1, GND, 2.0));
        circuit.add(Resistor::new("R1", n1, n2, 470.0).unwrap());
        circuit.add(Diode::new("D1", n2, GND, DiodeParams::default()).unwrap());
        Engine::new(circuit)
    };

    let mut x_few = DVector::zeros(0);
    let mut x_many = DVector::zeros(0);
    let opts_few = DcOptions {
        source_steps: 5,
        ..Default::default()
    };
    let opts_many = DcOptions {
        source_steps: 50,
        ..Default::default()
    };

    assert!(build().solve_dc(&mut x_few, &opts_few).converged);
    assert!(build().solve_dc(&mut x_many, &opts_many).converged);

    for i in 0..x_few.len() {
        assert!(
            (x_few[i] - x_many[i]).abs() < 1e-6,
            "unknown {i}: {} vs {}",
            x_few[i],
            x_many[i]
        );
    }
}

/// Re-solving from the converged point must leave the solution untouched,
/// bit for bit.
#[test]
fn test_warm_start_is_idempotent() {
    let mut circuit = Circuit::new();
    let n1 = circuit.add_node();
    let n2 = circuit.add_node();
    circuit.add(VoltageSource::dc("V1", n1, GND, 1.5));
    circuit.add(Resistor::new("R1", n1, n2, 2.2e3).unwrap());
    circuit.add(Diode::new("D1", n2, GND, DiodeParams::default()).unwrap());

    let mut engine = Engine::new(circuit);
    let opts = DcOptions::default();

    let mut x = DVector::zeros(0);
    assert!(engine.solve_dc(&mut x, &opts).converged);
    let first = x.clone();

    let report = engine.solve_dc(&mut x, &opts);
    assert!(report.converged);
    assert_eq!(x, first, "second solve moved the solution");
}

/// Nodesets seed the guess but are not constraints: a wrong hint must not
/// change the converged answer.
#[test]
fn test_nodesets_are_hints_not_constraints() {
    let build = |hint: Option<f64>| {
        let mut circuit = Circuit::new();
        let n1 = circuit.add_node();
        let n2 = circuit.add_node();
        circuit.add(VoltageSource::dc("V1", n1, GND, 1.0));
        circuit.add(Resistor::new("R1", n1, n2, 1e3).unwrap());
        circuit.add(Diode::new("D1", n2, GND, DiodeParams::default()).unwrap());
        if let Some(v) = hint {
            circuit.set_nodeset(n2, v);
        }
        let mut engine = Engine::new(circuit);
        let mut x = DVector::zeros(0);
        assert!(engine.solve_dc(&mut x, &DcOptions::default()).converged);
        x
    };

    let plain = build(None);
    let hinted = build(Some(0.3));
    for i in 0..plain.len() {
        assert!((plain[i] - hinted[i]).abs() < 1e-6);
    }
}

/// Pseudo-transient continuation lands on the same operating point as the
/// direct solve.
#[test]
fn test_pseudo_transient_matches_direct_solve() {
    use quiescent_devices::Capacitor;

    let build = || {
        let mut circuit = Circuit::new();
        let n1 = circuit.add_node();
        let n2 = circuit.add_node();
        circuit.add(VoltageSource::dc("V1", n1, GND, 1.0));
        circuit.add(Resistor::new("R1", n1, n2, 1e3).unwrap());
        circuit.add(Capacitor::new("C1", n2, GND, 100e-9).unwrap());
        circuit.add(Diode::new("D1", n2, GND, DiodeParams::default()).unwrap());
        Engine::new(circuit)
    };

    let mut direct = DVector::zeros(0);
    assert!(
        build()
            .solve_dc(&mut direct, &DcOptions::default())
            .converged
    );

    let mut settled = DVector::zeros(0);
    let report =
        build().solve_dc_pseudo_transient(&mut settled, 1e-4, 1e-6, &DcOptions::default());
    assert!(report.converged);

    for i in 0..direct.len() {
        assert!(
            (direct[i] - settled[i]).abs() < 1e-6,
            "unknown {i}: {} vs {}",
            direct[i],
            settled[i]
        );
    }
}

/// Warm-started supply sweep over a two-stage amplifier: +-12 V through
/// +-18 V, each solution seeding the next. Every solve must converge
/// without a restart.
#[test]
fn test_warm_started_supply_sweep() {
    let mut circuit = Circuit::new();
    let vcc = circuit.add_named_node("VCC");
    let vee = circuit.add_named_node("VEE");
    let b1 = circuit.add_named_node("B1");
    let c1 = circuit.add_named_node("C1");
    let e1 = circuit.add_named_node("E1");
    let out = circuit.add_named_node("OUT");

    let h_vcc = circuit.add(VoltageSource::dc("VCC", vcc, GND, 12.0));
    let h_vee = circuit.add(VoltageSource::dc("VEE", vee, GND, -12.0));

    // Common-emitter stage with divider bias and degeneration.
    circuit.add(Resistor::new("R1", vcc, b1, 47e3).unwrap());
    circuit.add(Resistor::new("R2", b1, GND, 10e3).unwrap());
    circuit.add(Resistor::new("RC", vcc, c1, 4.7e3).unwrap());
    circuit.add(Resistor::new("RE", e1, GND, 1e3).unwrap());
    circuit.add(Bjt::npn("Q1", c1, b1, e1, BjtParams::default()).unwrap());

    // Emitter follower into the negative rail.
    circuit.add(Resistor::new("RL", out, vee, 10e3).unwrap());
    circuit.add(Bjt::npn("Q2", vcc, c1, out, BjtParams::default()).unwrap());

    circuit.set_nodeset(b1, 2.0);
    circuit.set_nodeset(e1, 1.3);

    let mut engine = Engine::new(circuit);
    let opts = DcOptions::default();
    let mut x = DVector::zeros(0);

    for supply in 12..=18 {
        let v = supply as f64;
        engine.circuit_mut().device_mut(h_vcc).set_voltage(v);
        engine.circuit_mut().device_mut(h_vee).set_voltage(-v);

        let report = engine.solve_dc(&mut x, &opts);
        assert!(
            report.converged,
            "supply +-{v} V failed: {:?}",
            report.stats
        );

        // Bias sanity: follower output one drop below the first collector.
        let v_c1 = x[3];
        let v_out = x[5];
        assert!(v_out < v_c1 && v_out > v_c1 - 1.0);
    }
}

/// Floating-node audit over real devices: an ideal current source does not
/// anchor its node, a resistor does.
#[test]
fn test_audit_with_real_devices() {
    let mut circuit = Circuit::new();
    let fed = circuit.add_named_node("FED");
    circuit.add(CurrentSource::new("I1", GND, fed, 1e-3));
    circuit.finalize();
    assert!(!check_dc_paths(&circuit).is_clean());

    let mut circuit = Circuit::new();
    let fed = circuit.add_named_node("FED");
    circuit.add(CurrentSource::new("I1", GND, fed, 1e-3));
    circuit.add(Resistor::new("R1", fed, GND, 1e3).unwrap());
    circuit.finalize();
    assert!(check_dc_paths(&circuit).is_clean());
}

//! Benchmarks for the dense solve and a nonlinear DC operating point.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use nalgebra::{DMatrix, DVector};
use quiescent_core::{Circuit, NodeId};
use quiescent_devices::{Diode, DiodeParams, Resistor, VoltageSource};
use quiescent_solver::{DcOptions, Engine, GaussianSolver};

/// Diagonally dominant dense system, the size class the simulator targets.
fn test_matrix(n: usize) -> (DMatrix<f64>, DVector<f64>) {
    let a = DMatrix::from_fn(n, n, |i, j| {
        if i == j {
            4.0
        } else {
            1.0 / (1.0 + (i as f64 - j as f64).abs())
        }
    });
    let b = DVector::from_fn(n, |i, _| (i % 7) as f64 - 3.0);
    (a, b)
}

fn bench_gaussian_solve(c: &mut Criterion) {
    let (a, b) = test_matrix(64);
    let mut solver = GaussianSolver::new(64);
    let mut x = DVector::zeros(64);

    c.bench_function("gaussian_solve_64", |bencher| {
        bencher.iter(|| {
            solver.solve(black_box(&a), black_box(&b), &mut x).unwrap();
            black_box(x[0])
        })
    });
}

/// Ladder of resistor-diode cells: repeated Newton stamps over a few dozen
/// unknowns, the shape of a real operating-point solve.
fn diode_ladder(cells: usize) -> Engine {
    let mut circuit = Circuit::new();
    let top = circuit.add_node();
    circuit.add(VoltageSource::dc("V1", top, NodeId::GROUND, 5.0));

    let mut prev = top;
    for i in 0..cells {
        let node = circuit.add_node();
        circuit.add(Resistor::new(format!("R{i}"), prev, node, 470.0).unwrap());
        circuit.add(
            Diode::new(format!("D{i}"), node, NodeId::GROUND, DiodeParams::default()).unwrap(),
        );
        prev = node;
    }

    Engine::new(circuit)
}

fn bench_dc_operating_point(c: &mut Criterion) {
    c.bench_function("dc_diode_ladder_24", |bencher| {
        let opts = DcOptions::default();
        bencher.iter(|| {
            let mut engine = diode_ladder(24);
            let mut x = DVector::zeros(0);
            let report = engine.solve_dc(&mut x, &opts);
            black_box((report.converged, x[0]))
        })
    });
}

criterion_group!(benches, bench_gaussian_solve, bench_dc_operating_point);
criterion_main!(benches);

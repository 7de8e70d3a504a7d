//! Benchmarks how the uniform partitioner's cost scales with its per-axis
//! cell count, on a fixed double-integrator closed-loop step.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nalgebra::{DMatrix, DVector};

use reachtube::constraint::{BoundaryType, BoxSet};
use reachtube::diagnostics::Diagnostics;
use reachtube::dynamics::Dynamics;
use reachtube::network::{Activation, Layer, Network};
use reachtube::partition::{Partitioner, PartitionContext, UniformPartitioner};
use reachtube::propagator::CrownPropagator;
use reachtube::rng;

fn double_integrator() -> Dynamics {
    let a = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 0.0, 1.0]);
    let b = DMatrix::from_row_slice(2, 1, &[0.5, 1.0]);
    let c = DVector::zeros(2);
    let u_min = DVector::from_row_slice(&[-1.0]);
    let u_max = DVector::from_row_slice(&[1.0]);
    Dynamics::new(a, b, c, u_min, u_max, 1.0).unwrap()
}

fn crossing_relu_controller() -> Network {
    let weight = DMatrix::from_row_slice(1, 2, &[1.0, 1.0]);
    let bias = DVector::zeros(1);
    let layer = Layer::new(weight, bias, Activation::Relu).unwrap();
    Network::from_layers(vec![layer]).unwrap()
}

fn bench_uniform_grid_sizes(c: &mut Criterion) {
    let dyn_ = double_integrator();
    let net = crossing_relu_controller();
    let state = BoxSet::from_bounds(&[-1.0, -1.0], &[1.0, 1.0]).unwrap();

    let mut group = c.benchmark_group("uniform_partition_step");
    for &parts in &[1usize, 2, 4, 8, 16] {
        let partitioner = UniformPartitioner::new(vec![parts, parts]);
        group.bench_with_input(BenchmarkId::from_parameter(parts * parts), &parts, |b, _| {
            b.iter(|| {
                let mut rng = rng::seeded(0);
                let mut diagnostics = Diagnostics::new();
                let mut ctx = PartitionContext {
                    rng: &mut rng,
                    diagnostics: &mut diagnostics,
                    deadline: None,
                };
                black_box(
                    partitioner
                        .bound_step(
                            black_box(&state),
                            &net,
                            &dyn_,
                            &CrownPropagator,
                            BoundaryType::Box,
                            &mut ctx,
                        )
                        .unwrap(),
                )
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_uniform_grid_sizes);
criterion_main!(benches);

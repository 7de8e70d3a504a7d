//! Benchmarks the per-propagator cost of bounding a fixed-size ReLU network,
//! isolating the propagator from the partitioner and the rest of the
//! analyzer loop.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nalgebra::{DMatrix, DVector};

use reachtube::constraint::BoxSet;
use reachtube::diagnostics::Diagnostics;
use reachtube::network::{Activation, Layer, Network};
use reachtube::propagator::{CrownPropagator, FastLinPropagator, IbpPropagator, Propagator};

fn relu_mlp(input_dim: usize, hidden_dim: usize, depth: usize, output_dim: usize) -> Network {
    let mut layers = Vec::with_capacity(depth + 1);
    let mut prev = input_dim;
    for layer_idx in 0..depth {
        let weight = DMatrix::from_fn(hidden_dim, prev, |r, c| {
            let seed = (layer_idx * 1000 + r * 31 + c) as f64;
            ((seed * 0.618_034).fract() - 0.5) * 2.0
        });
        let bias = DVector::from_fn(hidden_dim, |r, _| ((r as f64 * 0.37).fract() - 0.5) * 0.2);
        layers.push(Layer::new(weight, bias, Activation::Relu).unwrap());
        prev = hidden_dim;
    }
    let weight = DMatrix::from_fn(output_dim, prev, |r, c| ((r * 7 + c) as f64 * 0.11).fract() - 0.5);
    let bias = DVector::zeros(output_dim);
    layers.push(Layer::new(weight, bias, Activation::Linear).unwrap());
    Network::from_layers(layers).unwrap()
}

fn bench_propagators(c: &mut Criterion) {
    let net = relu_mlp(8, 64, 3, 4);
    let input = BoxSet::from_bounds(&vec![-1.0; 8], &vec![1.0; 8]).unwrap();

    let mut group = c.benchmark_group("propagator_bound");
    group.bench_function("ibp", |b| {
        b.iter(|| {
            let mut diag = Diagnostics::new();
            black_box(IbpPropagator.bound(black_box(&input), black_box(&net), &mut diag).unwrap())
        });
    });
    group.bench_function("fast_lin", |b| {
        b.iter(|| {
            let mut diag = Diagnostics::new();
            black_box(FastLinPropagator.bound(black_box(&input), black_box(&net), &mut diag).unwrap())
        });
    });
    group.bench_function("crown", |b| {
        b.iter(|| {
            let mut diag = Diagnostics::new();
            black_box(CrownPropagator.bound(black_box(&input), black_box(&net), &mut diag).unwrap())
        });
    });
    group.finish();
}

criterion_group!(benches, bench_propagators);
criterion_main!(benches);

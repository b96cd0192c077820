//! Register + flush throughput for a mixed subtract/tanh/collapse graph

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use kiln::config::EvalConfig;
use kiln::ops::{collapse, subtract, tanh, tanh_grad, Expr};
use kiln::tensor::{Extents, Shape, Tensor};
use kiln::EvalContext;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::hint::black_box;

fn bench_mixed_graph(c: &mut Criterion) {
    let mut group = c.benchmark_group("register_flush");
    let mut rng = StdRng::seed_from_u64(42);
    let elem = Extents::Matrix { rows: 16, cols: 16 };

    for batch in [1usize, 8, 64] {
        let shape = Shape::batch(elem, batch);
        let x = Tensor::random_uniform(shape.clone(), -1.0, 1.0, &mut rng).unwrap();
        let bias = Tensor::random_uniform(Shape::plain(elem), -1.0, 1.0, &mut rng).unwrap();

        group.throughput(Throughput::Elements(shape.count() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |bencher, _| {
            bencher.iter(|| {
                let x = Expr::input(x.clone());
                let bias = Expr::input(bias.clone());
                let y = tanh(&subtract(&x, &bias).unwrap());
                let g = tanh_grad(&x, &y).unwrap();
                let s = collapse(&g, Shape::plain(elem)).unwrap();

                let mut ctx = EvalContext::with_config(EvalConfig {
                    verify_inputs: false,
                    trace_items: false,
                });
                black_box(ctx.evaluate_all(&[&y, &s]).unwrap());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_mixed_graph);
criterion_main!(benches);

//! Apply-level benchmarks.
//!
//! These measure the memoized binary composition on diagrams with realistic
//! sharing: chains of min/max over shifted hyperplanes.
//!
//! Run with:
//! ```bash
//! cargo bench --bench apply
//! ```

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use xadd_rs::xadd::Xadd;

/// min over `n` planes `x + y·i - i`, a diagram with `n` leaves and a chain
/// of `n - 1` fresh decisions.
fn min_of_planes(xadd: &mut Xadd, n: usize) -> xadd_rs::NodeId {
    let x = xadd.declare_cont("x");
    let y = xadd.declare_cont("y");
    let xe = xadd.pool_mut().var(x);
    let ye = xadd.pool_mut().var(y);

    let mut acc = xadd.var_leaf(x);
    for i in 1..n {
        let coeff = xadd.pool_mut().int_const(i as i64);
        let scaled = xadd.pool_mut().mul(&[coeff, ye]);
        let shift = xadd.pool_mut().int_const(-(i as i64));
        let plane = xadd.pool_mut().add(&[xe, scaled, shift]);
        let leaf = xadd.leaf(plane);
        acc = xadd.apply_min(acc, leaf).expect("linear planes");
    }
    acc
}

fn bench_min_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("min_chain");
    for n in [4usize, 8, 12] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let mut xadd = Xadd::new();
                min_of_planes(&mut xadd, n)
            });
        });
    }
    group.finish();
}

fn bench_add_shared(c: &mut Criterion) {
    c.bench_function("add_shared_subdags", |b| {
        b.iter(|| {
            let mut xadd = Xadd::new();
            let f = min_of_planes(&mut xadd, 8);
            let g = xadd.apply_add(f, f).expect("addition is total");
            xadd.apply_add(g, f).expect("addition is total")
        });
    });
}

fn bench_reduce_lp(c: &mut Criterion) {
    c.bench_function("reduce_lp_chain", |b| {
        b.iter(|| {
            let mut xadd = Xadd::new();
            let f = min_of_planes(&mut xadd, 8);
            xadd.reduce_lp(f)
        });
    });
}

criterion_group!(benches, bench_min_chain, bench_add_shared, bench_reduce_lp);
criterion_main!(benches);

// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use eikonal_umesh::{MarchSolver, Point2, Point3, SortMetric, SweepSolver, TetMesh, TriMesh};

fn make_sweep_2d(n: usize) -> SweepSolver<TriMesh> {
    let h = 1.0 / (n - 1) as f64;
    let mesh = TriMesh::structured(n, n, h, 1).unwrap();
    let mut solver = SweepSolver::new(mesh, 1e-10, 20).unwrap();
    solver.init_ordering(
        &[
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ],
        SortMetric::L2,
    );
    solver
}

fn make_march_3d(n: usize) -> MarchSolver<TetMesh> {
    let h = 1.0 / (n - 1) as f64;
    let mesh = TetMesh::structured(n, n, n, h, 1).unwrap();
    MarchSolver::new(mesh)
}

/// Fast sweeping on a triangulated unit square, one corner shot.
fn bench_sweep_2d(c: &mut Criterion) {
    for n in [65, 129] {
        c.bench_function(&format!("sweep_2d_{}x{}", n, n), |b| {
            let solver = make_sweep_2d(n);
            let tx = [Point2::new(0.0, 0.0)];
            let rx = [Point2::new(1.0, 1.0)];
            b.iter(|| {
                let times = solver.raytrace(&tx, &[0.0], &rx, 0).unwrap();
                black_box(times)
            });
        });
    }
}

/// Fast sweeping including ray tracing for a receiver line.
fn bench_sweep_2d_with_rays(c: &mut Criterion) {
    c.bench_function("sweep_2d_65x65_rays", |b| {
        let solver = make_sweep_2d(65);
        let tx = [Point2::new(0.0, 0.0)];
        let rx: Vec<Point2> = (0..16)
            .map(|k| Point2::new(1.0, k as f64 / 16.0))
            .collect();
        b.iter(|| {
            let out = solver.raytrace_with_paths(&tx, &[0.0], &rx, 0).unwrap();
            black_box(out)
        });
    });
}

/// Fast marching through a tetrahedralised unit cube, centre shot.
fn bench_march_3d(c: &mut Criterion) {
    for n in [17, 33] {
        c.bench_function(&format!("march_3d_{n}x{n}x{n}"), |b| {
            let solver = make_march_3d(n);
            let tx = [Point3::new(0.5, 0.5, 0.5)];
            let rx = [Point3::new(1.0, 1.0, 1.0)];
            b.iter(|| {
                let times = solver.raytrace(&tx, &[0.0], &rx, 0).unwrap();
                black_box(times)
            });
        });
    }
}

criterion_group!(
    benches,
    bench_sweep_2d,
    bench_sweep_2d_with_rays,
    bench_march_3d
);
criterion_main!(benches);

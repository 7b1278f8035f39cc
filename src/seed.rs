// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::{EikonalError, Result};
use crate::geometry::Coord;
use crate::mesh::Mesh;

/// Propagation delay across cell `c` between two points.
fn compute_dt<M: Mesh>(mesh: &M, cell: u32, from: &M::Point, to: &M::Point) -> f64 {
    mesh.slowness(cell) * from.distance(to)
}

/// Mean slowness of the cells around vertex `v`, used when seeding a
/// radius of nodes from a single reference point.
fn mean_owner_slowness<M: Mesh>(mesh: &M, v: u32) -> f64 {
    let owners = mesh.owners(v);
    let sum: f64 = owners.iter().map(|&c| mesh.slowness(c)).sum();
    sum / owners.len() as f64
}

/// Initialise the traveltime field for a set of sources.
///
/// Sources coinciding with a mesh vertex are fixed at their emission time
/// and frozen; their one-hop neighbourhood receives straight-ray arrivals
/// so the singular region starts from an accurate cone. Sources interior
/// to a cell fix and freeze that cell's vertices. With a positive
/// `source_radius` and a single source, every node inside the radius is
/// seeded and frozen instead.
///
/// `freeze_neighbors` controls whether the one-hop cone is frozen as well
/// (the marching driver freezes it, the sweeping driver lets later sweeps
/// refine it). Every node whose slot was touched is reported through
/// `on_seed` so the marching driver can build its initial band.
pub(crate) fn seed_sources<M: Mesh>(
    mesh: &M,
    tx: &[M::Point],
    t0: &[f64],
    worker: usize,
    source_radius: f64,
    freeze_neighbors: bool,
    frozen: &mut [bool],
    mut on_seed: impl FnMut(u32),
) -> Result<()> {
    let slots = mesh.slots();

    for (n, t) in tx.iter().enumerate() {
        if let Some(v) = mesh.vertex_near(t) {
            slots.relax_min(v, worker, t0[n]);
            frozen[v as usize] = true;
            on_seed(v);

            if source_radius > 0.0 && tx.len() == 1 {
                let s_ref = mean_owner_slowness(mesh, v);
                let mut added = 0usize;
                for u in 0..mesh.num_vertices() as u32 {
                    if u == v {
                        continue;
                    }
                    let d = mesh.vertex(v).distance(&mesh.vertex(u));
                    if d <= source_radius && slots.relax_min(u, worker, t0[n] + s_ref * d) {
                        frozen[u as usize] = true;
                        on_seed(u);
                        added += 1;
                    }
                }
                if added == 0 {
                    return Err(EikonalError::NoSourceNodes {
                        radius: source_radius,
                    });
                }
            } else {
                for &cell in mesh.owners(v) {
                    for &u in mesh.cell_vertices(cell) {
                        if u == v {
                            continue;
                        }
                        let dt = compute_dt(mesh, cell, &mesh.vertex(v), &mesh.vertex(u));
                        if slots.relax_min(u, worker, t0[n] + dt) {
                            if freeze_neighbors {
                                frozen[u as usize] = true;
                            }
                            on_seed(u);
                        }
                    }
                }
            }
        } else {
            let cell = mesh
                .cell_containing(t)
                .ok_or_else(|| EikonalError::PointOutsideMesh {
                    index: n,
                    coord: t.to_vec(),
                })?;

            if source_radius > 0.0 && tx.len() == 1 {
                let s_ref = mesh.slowness(cell);
                let mut added = 0usize;
                for u in 0..mesh.num_vertices() as u32 {
                    let d = mesh.vertex(u).distance(t);
                    if d <= source_radius && slots.relax_min(u, worker, t0[n] + s_ref * d) {
                        frozen[u as usize] = true;
                        on_seed(u);
                        added += 1;
                    }
                }
                if added == 0 {
                    return Err(EikonalError::NoSourceNodes {
                        radius: source_radius,
                    });
                }
            } else {
                for &u in mesh.cell_vertices(cell) {
                    let dt = compute_dt(mesh, cell, t, &mesh.vertex(u));
                    if slots.relax_min(u, worker, t0[n] + dt) {
                        frozen[u as usize] = true;
                        on_seed(u);
                    }
                }
            }
        }
    }
    Ok(())
}

/// Interpolate the first arrival at an arbitrary receiver from the
/// converged field.
///
/// A receiver on a vertex reads its slot directly; otherwise the minimum
/// over the containing cell's vertices of `tt[u] + s·|rx - u|` is
/// returned, together with the argmin vertex and the cell.
pub(crate) fn arrival_at<M: Mesh>(
    mesh: &M,
    rx: &M::Point,
    worker: usize,
) -> Result<(f64, u32, u32)> {
    let slots = mesh.slots();
    if let Some(v) = mesh.vertex_near(rx) {
        let cell = mesh.owners(v).first().copied().unwrap_or(0);
        return Ok((slots.get(v, worker), v, cell));
    }

    let cell = mesh
        .cell_containing(rx)
        .ok_or_else(|| EikonalError::PointOutsideMesh {
            index: 0,
            coord: rx.to_vec(),
        })?;

    let mut best = f64::INFINITY;
    let mut best_vertex = mesh.cell_vertices(cell)[0];
    for &u in mesh.cell_vertices(cell) {
        let t = slots.get(u, worker) + compute_dt(mesh, cell, rx, &mesh.vertex(u));
        if t < best {
            best = t;
            best_vertex = u;
        }
    }
    Ok((best, best_vertex, cell))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point2;
    use crate::mesh::TriMesh;

    fn unit_square() -> TriMesh {
        let vertices = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        TriMesh::new(vertices, vec![[0, 1, 2], [0, 2, 3]], 1).unwrap()
    }

    #[test]
    fn vertex_source_seeds_one_hop_cone() {
        let mesh = unit_square();
        let mut frozen = vec![false; 4];
        seed_sources(
            &mesh,
            &[Point2::new(0.0, 0.0)],
            &[0.0],
            0,
            0.0,
            false,
            &mut frozen,
            |_| {},
        )
        .unwrap();

        assert_eq!(mesh.slots().get(0, 0), 0.0);
        assert!(frozen[0]);
        assert!(!frozen[1]);
        assert!((mesh.slots().get(1, 0) - 1.0).abs() < 1e-12);
        assert!((mesh.slots().get(3, 0) - 1.0).abs() < 1e-12);
        assert!((mesh.slots().get(2, 0) - 2.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn interior_source_freezes_cell_vertices() {
        let mesh = unit_square();
        let mut frozen = vec![false; 4];
        let tx = Point2::new(0.7, 0.2); // inside cell 0
        seed_sources(&mesh, &[tx], &[1.0], 0, 0.0, false, &mut frozen, |_| {}).unwrap();

        for v in [0u32, 1, 2] {
            assert!(frozen[v as usize]);
            let expected = 1.0 + tx.distance(&mesh.vertex(v));
            assert!((mesh.slots().get(v, 0) - expected).abs() < 1e-12);
        }
        assert!(!frozen[3]);
        assert!(mesh.slots().get(3, 0).is_infinite());
    }

    #[test]
    fn radius_seeding_and_no_source_nodes() {
        let mesh = unit_square();
        let mut frozen = vec![false; 4];
        let tx = Point2::new(0.5, 0.25);
        // radius covers the two bottom corners
        seed_sources(&mesh, &[tx], &[0.0], 0, 0.6, false, &mut frozen, |_| {}).unwrap();
        assert!(frozen[0] && frozen[1]);
        assert!(mesh.slots().get(0, 0).is_finite());

        // a radius too small to reach any node is a configuration error
        let mesh = unit_square();
        let mut frozen = vec![false; 4];
        let err = seed_sources(&mesh, &[tx], &[0.0], 0, 1e-6, false, &mut frozen, |_| {});
        assert!(matches!(err, Err(EikonalError::NoSourceNodes { .. })));
    }

    #[test]
    fn multi_source_takes_minimum() {
        let mesh = unit_square();
        let mut frozen = vec![false; 4];
        let tx = [Point2::new(0.0, 0.0), Point2::new(1.0, 1.0)];
        seed_sources(&mesh, &tx, &[0.0, 0.1], 0, 0.0, false, &mut frozen, |_| {}).unwrap();

        // corner 1 is reachable from both seeds; the earlier one wins
        let from_a: f64 = 1.0;
        let from_b: f64 = 0.1 + 1.0;
        assert!((mesh.slots().get(1, 0) - from_a.min(from_b)).abs() < 1e-12);
    }

    #[test]
    fn receiver_interpolation() {
        let mesh = unit_square();
        for v in 0..4 {
            mesh.slots().set(v, 0, v as f64);
        }

        // on a vertex: slot value
        let (t, v, _) = arrival_at(&mesh, &Point2::new(1.0, 1.0), 0).unwrap();
        assert_eq!(t, 2.0);
        assert_eq!(v, 2);

        // interior: min over the containing cell's corners
        let rx = Point2::new(0.9, 0.1);
        let (t, v, c) = arrival_at(&mesh, &rx, 0).unwrap();
        assert_eq!(c, 0);
        let mut expected = f64::INFINITY;
        for u in [0u32, 1, 2] {
            expected = expected.min(mesh.slots().get(u, 0) + rx.distance(&mesh.vertex(u)));
        }
        assert!((t - expected).abs() < 1e-12);
        assert_eq!(v, 1);
    }
}

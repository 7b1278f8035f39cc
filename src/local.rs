// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::f64::consts::FRAC_PI_2;

use crate::geometry::Coord;
use crate::mesh::{Mesh, TetMesh, TriMesh};

/// One-triangle arrival candidate for vertex C from vertices A and B.
///
/// Convention: `a` = |CB|, `b` = |CA|, `c` = |AB|, `alpha` = interior angle
/// at B, `beta` = interior angle at A, `s` = cell slowness.
///
/// When the time difference across the opposite edge admits a plane wave
/// whose incidence angle falls inside the half-plane window, the candidate
/// is the Snell update; otherwise it degrades to the corner minimum
/// (head wave along an edge).
#[allow(clippy::too_many_arguments)]
fn planar_candidate(tt_a: f64, tt_b: f64, a: f64, b: f64, c: f64, alpha: f64, beta: f64, s: f64) -> f64 {
    let corner = (tt_a + b * s).min(tt_b + a * s);

    let delta = (tt_b - tt_a).abs();
    if !(delta <= c * s) {
        return corner;
    }

    let theta = (delta / (c * s)).asin();
    let in_window = ((alpha - FRAC_PI_2).max(0.0) <= theta && theta <= FRAC_PI_2 - beta)
        || (alpha - FRAC_PI_2 <= theta && theta <= (FRAC_PI_2 - beta).min(0.0));
    if !in_window {
        return corner;
    }

    let h = a * (alpha - theta).sin();
    let big_h = b * (beta + theta).sin();
    0.5 * (h * s + tt_b) + 0.5 * (big_h * s + tt_a)
}

/// Relax `node` once from every triangle that owns it, lowering its worker
/// slot whenever a better arrival is found. Returns true if the slot was
/// lowered by any cell.
///
/// Obtuse cells are replaced by their precomputed virtual triangle so the
/// plane-wave update direction stays inside the cell fan.
pub(crate) fn relax_node_2d(mesh: &TriMesh, node: u32, worker: usize) -> bool {
    let slots = mesh.slots();
    let mut improved = false;

    for &cell in mesh.owners(node) {
        let tri = mesh.triangle(cell);
        let s = mesh.slowness(cell);
        let Some(i0) = tri.i.iter().position(|&v| v == node) else {
            continue;
        };

        let (va, vb, a, b, c, alpha, beta) = match mesh.virtual_triangle(cell) {
            Some(vn) if tri.a[i0] > FRAC_PI_2 => (
                vn.outer[0],
                vn.outer[1],
                vn.e[1],
                vn.e[2],
                vn.e[0],
                vn.a[2],
                vn.a[1],
            ),
            _ => {
                let i1 = (i0 + 1) % 3;
                let i2 = (i0 + 2) % 3;
                (
                    tri.i[i1],
                    tri.i[i2],
                    tri.l[i1],
                    tri.l[i2],
                    tri.l[i0],
                    tri.a[i2],
                    tri.a[i1],
                )
            }
        };

        let tt_a = slots.get(va, worker);
        let tt_b = slots.get(vb, worker);
        let cand = planar_candidate(tt_a, tt_b, a, b, c, alpha, beta, s);

        if cand.is_finite() && slots.relax_min(node, worker, cand) {
            let trigger = if tt_a <= tt_b { va } else { vb };
            slots.set_parent(node, worker, trigger, cell);
            improved = true;
        }
    }
    improved
}

/// Relax `node` once from every tetrahedron that owns it.
///
/// Each tetrahedron contributes its corner arrivals plus a plane-wave
/// update through each of the three faces meeting at `node`; per-face edge
/// lengths and angles are derived on the fly by the law of cosines.
pub(crate) fn relax_node_3d(mesh: &TetMesh, node: u32, worker: usize) -> bool {
    let slots = mesh.slots();
    let pc = mesh.vertex(node);
    let mut improved = false;

    for &cell in mesh.owners(node) {
        let s = mesh.slowness(cell);
        let tet = mesh.tetra(cell);
        let mut others = [0u32; 3];
        let mut k = 0;
        for &v in &tet.i {
            if v != node {
                if k == 3 {
                    k = 0;
                    break;
                }
                others[k] = v;
                k += 1;
            }
        }
        if k != 3 {
            continue;
        }

        let mut cand = f64::INFINITY;
        let mut trigger = others[0];

        // Corner arrivals straight along the tetrahedron edges.
        for &u in &others {
            let t = slots.get(u, worker) + s * pc.distance(&mesh.vertex(u));
            if t < cand {
                cand = t;
                trigger = u;
            }
        }

        // Plane-wave updates through each face that meets the node.
        const PAIRS: [(usize, usize); 3] = [(0, 1), (0, 2), (1, 2)];
        for (m, n) in PAIRS {
            let va = others[m];
            let vb = others[n];
            let pa = mesh.vertex(va);
            let pb = mesh.vertex(vb);
            let b = pc.distance(&pa); // |CA|
            let a = pc.distance(&pb); // |CB|
            let c = pa.distance(&pb); // |AB|

            let cos_alpha = (c * c + a * a - b * b) / (2.0 * a * c);
            let cos_beta = (c * c + b * b - a * a) / (2.0 * b * c);
            if cos_alpha.abs() > 1.0 || cos_beta.abs() > 1.0 {
                continue;
            }

            let tt_a = slots.get(va, worker);
            let tt_b = slots.get(vb, worker);
            let t = planar_candidate(tt_a, tt_b, a, b, c, cos_alpha.acos(), cos_beta.acos(), s);
            if t < cand {
                cand = t;
                trigger = if tt_a <= tt_b { va } else { vb };
            }
        }

        if cand.is_finite() && slots.relax_min(node, worker, cand) {
            slots.set_parent(node, worker, trigger, cell);
            improved = true;
        }
    }
    improved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point2, Point3};

    fn equilateral() -> TriMesh {
        let vertices = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.5, 3.0_f64.sqrt() / 2.0),
        ];
        TriMesh::new(vertices, vec![[0, 1, 2]], 1).unwrap()
    }

    #[test]
    fn plane_wave_from_opposite_edge() {
        // Wavefront leaves the base edge at t=0; it reaches the apex after
        // travelling the triangle height.
        let mesh = equilateral();
        mesh.slots().set(0, 0, 0.0);
        mesh.slots().set(1, 0, 0.0);
        assert!(relax_node_2d(&mesh, 2, 0));
        let expected = 3.0_f64.sqrt() / 2.0;
        assert!(
            (mesh.slots().get(2, 0) - expected).abs() < 1e-12,
            "got {}",
            mesh.slots().get(2, 0)
        );
    }

    #[test]
    fn corner_fallback_with_one_unreached_vertex() {
        let mesh = equilateral();
        mesh.slots().set(0, 0, 0.0);
        // vertex 1 still at infinity
        assert!(relax_node_2d(&mesh, 2, 0));
        // head wave along the edge from vertex 0 (unit side)
        assert!((mesh.slots().get(2, 0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn no_update_when_nothing_is_reached() {
        let mesh = equilateral();
        assert!(!relax_node_2d(&mesh, 2, 0));
        assert!(mesh.slots().get(2, 0).is_infinite());
    }

    #[test]
    fn relax_never_raises() {
        let mesh = equilateral();
        mesh.slots().set(0, 0, 0.0);
        mesh.slots().set(1, 0, 0.0);
        mesh.slots().set(2, 0, 0.1); // better than any candidate
        assert!(!relax_node_2d(&mesh, 2, 0));
        assert_eq!(mesh.slots().get(2, 0), 0.1);
    }

    #[test]
    fn obtuse_cell_uses_virtual_triangle() {
        // 120-degree corner at the origin; the neighbour's far vertex is the
        // source, so the direct arrival can only be seen through the virtual
        // triangle.
        let vertices = vec![
            Point2::new(0.0, 0.0),
            Point2::new(-0.5, 0.866),
            Point2::new(-0.5, -0.866),
            Point2::new(-1.2, 0.0),
        ];
        let mesh = TriMesh::new(vertices.clone(), vec![[0, 1, 2], [1, 3, 2]], 1).unwrap();
        assert!(mesh.virtual_triangle(0).is_some());

        let d13 = vertices[1].distance(&vertices[3]);
        mesh.slots().set(3, 0, 0.0);
        mesh.slots().set(1, 0, d13);
        mesh.slots().set(2, 0, d13);
        relax_node_2d(&mesh, 0, 0);

        // The straight ray from the source to the corner.
        let expected = vertices[0].distance(&vertices[3]);
        assert!(
            (mesh.slots().get(0, 0) - expected).abs() < 1e-9,
            "got {} expected {}",
            mesh.slots().get(0, 0),
            expected
        );

        // Without the correction, the best the original cell offers is the
        // head wave through an edge endpoint, which is measurably worse.
        let uncorrected = d13 + vertices[0].distance(&vertices[1]);
        assert!(mesh.slots().get(0, 0) < uncorrected - 0.5);
    }

    #[test]
    fn tet_corner_and_face_updates() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        ];
        let mesh = TetMesh::new(vertices, vec![[0, 1, 2, 3]], 1).unwrap();

        // Only one reached vertex: straight edge arrival.
        mesh.slots().set(0, 0, 0.0);
        assert!(relax_node_3d(&mesh, 3, 0));
        assert!((mesh.slots().get(3, 0) - 1.0).abs() < 1e-12);

        // With the full base at t=0 the plane wave through a face reaches
        // the apex after the perpendicular distance from the apex to the
        // base edge, here 1.
        mesh.slots().reset(0);
        mesh.slots().set(0, 0, 0.0);
        mesh.slots().set(1, 0, 0.0);
        mesh.slots().set(2, 0, 0.0);
        relax_node_3d(&mesh, 3, 0);
        let t = mesh.slots().get(3, 0);
        assert!((t - 1.0).abs() < 1e-12, "got {}", t);
    }
}

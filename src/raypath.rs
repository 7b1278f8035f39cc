// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::BTreeSet;

use crate::geometry::{Coord, Point2, Point3, COINCIDENT_TOL, GEOM_EPS};
use crate::mesh::{Mesh, TetMesh, TriMesh};

/// How the traveltime gradient is estimated while walking a ray.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GradientScheme {
    /// Exact plane fit through the current cell's vertices.
    Cell,
    /// Least-squares fit over all vertices of all cells touching the
    /// current cell. Smoother and less cell-biased; the default.
    #[default]
    Neighborhood,
}

/// Angular slack for the sector-acceptance tests.
const ANG_TOL: f64 = 1e-9;

/// Descent direction (negated traveltime gradient) from an exact plane fit
/// through the three vertices of a triangle.
fn cell_gradient_tri(mesh: &TriMesh, cell: u32, worker: usize) -> Point2 {
    let idx = mesh.cell_vertices(cell);
    let p0 = mesh.vertex(idx[0]);
    let e1 = mesh.vertex(idx[1]) - p0;
    let e2 = mesh.vertex(idx[2]) - p0;
    let t0 = mesh.slots().get(idx[0], worker);
    let dt1 = mesh.slots().get(idx[1], worker) - t0;
    let dt2 = mesh.slots().get(idx[2], worker) - t0;
    if !dt1.is_finite() || !dt2.is_finite() {
        return Point2::default();
    }
    let det = e1.cross(&e2);
    if det.abs() < GEOM_EPS {
        return Point2::default();
    }
    let gx = (dt1 * e2.z - dt2 * e1.z) / det;
    let gz = (e1.x * dt2 - e2.x * dt1) / det;
    -Point2::new(gx, gz)
}

/// All vertices of all cells that share a vertex with `cell`.
fn neighborhood_of<M: Mesh>(mesh: &M, cell: u32) -> BTreeSet<u32> {
    let mut nodes = BTreeSet::new();
    for &v in mesh.cell_vertices(cell) {
        nodes.insert(v);
        for &c2 in mesh.owners(v) {
            for &u in mesh.cell_vertices(c2) {
                nodes.insert(u);
            }
        }
    }
    nodes
}

/// Descent direction from a centred least-squares plane fit over the
/// cell's one-ring neighbourhood. Unreached vertices are ignored; falls
/// back to the per-cell fit when the system is rank-deficient.
fn neighborhood_gradient_tri(mesh: &TriMesh, cell: u32, worker: usize) -> Point2 {
    let nodes = neighborhood_of(mesh, cell);
    let mut pts: Vec<(Point2, f64)> = Vec::with_capacity(nodes.len());
    for v in nodes {
        let t = mesh.slots().get(v, worker);
        if t.is_finite() {
            pts.push((mesh.vertex(v), t));
        }
    }
    if pts.len() < 3 {
        return cell_gradient_tri(mesh, cell, worker);
    }

    let inv = 1.0 / pts.len() as f64;
    let mx = pts.iter().map(|(p, _)| p.x).sum::<f64>() * inv;
    let mz = pts.iter().map(|(p, _)| p.z).sum::<f64>() * inv;
    let mt = pts.iter().map(|(_, t)| t).sum::<f64>() * inv;

    let (mut sxx, mut sxz, mut szz, mut sxt, mut szt) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for (p, t) in &pts {
        let dx = p.x - mx;
        let dz = p.z - mz;
        let dt = t - mt;
        sxx += dx * dx;
        sxz += dx * dz;
        szz += dz * dz;
        sxt += dx * dt;
        szt += dz * dt;
    }
    let det = sxx * szz - sxz * sxz;
    if det.abs() < GEOM_EPS {
        return cell_gradient_tri(mesh, cell, worker);
    }
    let gx = (sxt * szz - szt * sxz) / det;
    let gz = (sxx * szt - sxz * sxt) / det;
    -Point2::new(gx, gz)
}

fn gradient_tri(mesh: &TriMesh, cell: u32, worker: usize, scheme: GradientScheme) -> Point2 {
    match scheme {
        GradientScheme::Cell => cell_gradient_tri(mesh, cell, worker),
        GradientScheme::Neighborhood => neighborhood_gradient_tri(mesh, cell, worker),
    }
}

/// The two vertices of `cell` other than `node`, in ascending index order.
fn opposite_edge(mesh: &TriMesh, cell: u32, node: u32) -> (u32, u32) {
    let mut nb = [u32::MAX; 2];
    let mut k = 0;
    for &v in mesh.cell_vertices(cell) {
        if v != node && k < 2 {
            nb[k] = v;
            k += 1;
        }
    }
    if nb[0] > nb[1] {
        nb.swap(0, 1);
    }
    (nb[0], nb[1])
}

/// True if direction `g` lies inside the angular sector spanned at a
/// vertex by the unit edge directions `v1` and `v2` (sector boundaries
/// count as inside).
fn in_sector(v1: &Point2, v2: &Point2, g: &Point2) -> bool {
    let theta1 = v1.dot(g).clamp(-1.0, 1.0).acos();
    let theta2 = v1.dot(v2).clamp(-1.0, 1.0).acos();
    if theta1 > theta2 + ANG_TOL {
        return false;
    }
    let c1 = v1.cross(g);
    let c2 = v1.cross(v2);
    !(c1 * c2 < 0.0 && c1.abs() > ANG_TOL)
}

/// Shoot a ray from `curr` along `g` against the segment between vertices
/// `i0` and `i1`.
///
/// If the ray is parallel to the direction towards either endpoint the
/// walker lands exactly on that vertex (`true` is returned); otherwise
/// `curr` moves to the line intersection.
fn shoot_at_edge(mesh: &TriMesh, i0: u32, i1: u32, g: &Point2, curr: &mut Point2) -> bool {
    let p0 = mesh.vertex(i0);
    let p1 = mesh.vertex(i1);

    for p in [p0, p1] {
        let dir = (p - *curr).normalized();
        if dir.cross(g).abs() < ANG_TOL && dir.dot(g) > 0.0 {
            *curr = p;
            return true;
        }
    }

    let e = p1 - p0;
    let denom = g.cross(&e);
    if denom.abs() < GEOM_EPS {
        // grazing along the edge: settle on the endpoint ahead
        *curr = if e.dot(g) > 0.0 { p1 } else { p0 };
        return true;
    }
    let u = ((p0 - *curr).cross(g) / denom).clamp(0.0, 1.0);
    *curr = p0 + e * u;
    false
}

/// The cell on the far side of edge `(i0, i1)` as seen from vertex `node`.
fn next_cell_from_vertex(mesh: &TriMesh, i0: u32, i1: u32, node: u32) -> Option<u32> {
    let shared: Vec<u32> = mesh
        .owners(i0)
        .iter()
        .copied()
        .filter(|c| mesh.owners(i1).contains(c))
        .collect();
    match shared.len() {
        1 => Some(shared[0]), // external edge
        2 => {
            let first_owns_node = mesh.cell_vertices(shared[0]).contains(&node);
            let second_owns_node = mesh.cell_vertices(shared[1]).contains(&node);
            match (first_owns_node, second_owns_node) {
                (true, false) => Some(shared[1]),
                (false, true) => Some(shared[0]),
                _ => Some(shared[0]),
            }
        }
        _ => None,
    }
}

/// The cell on the far side of edge `(i0, i1)` as seen from `cell`.
fn next_cell_from_edge(mesh: &TriMesh, i0: u32, i1: u32, cell: u32) -> Option<u32> {
    let shared: Vec<u32> = mesh
        .owners(i0)
        .iter()
        .copied()
        .filter(|c| mesh.owners(i1).contains(c))
        .collect();
    match shared.len() {
        1 => Some(shared[0]), // external edge: stay, the fallback handles it
        2 => {
            if shared[0] == cell {
                Some(shared[1])
            } else if shared[1] == cell {
                Some(shared[0])
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Walk from `rx` back to one of the `tx` points along the reversed
/// traveltime gradient of worker `worker`'s field.
///
/// Returns the polyline from `rx` to the reached source. When the walk
/// cannot find a valid continuation (or exceeds the step bound) a warning
/// is emitted and the single-point polyline `[rx]` is returned; the
/// traveltime at the receiver remains valid.
pub(crate) fn trace_tri(
    mesh: &TriMesh,
    tx: &[Point2],
    rx: &Point2,
    worker: usize,
    scheme: GradientScheme,
) -> Vec<Point2> {
    match walk_tri(mesh, tx, rx, worker, scheme) {
        Some(path) => path,
        None => {
            eprintln!(
                "warning: ray tracing failed to converge for receiver {}",
                rx
            );
            vec![*rx]
        }
    }
}

fn walk_tri(
    mesh: &TriMesh,
    tx: &[Point2],
    rx: &Point2,
    worker: usize,
    scheme: GradientScheme,
) -> Option<Vec<Point2>> {
    let mut path = vec![*rx];
    if tx.iter().any(|t| t.is_close(rx)) {
        return Some(path);
    }

    let tx_node: Vec<Option<u32>> = tx.iter().map(|t| mesh.vertex_near(t)).collect();
    let tx_cell: Vec<Option<u32>> = tx
        .iter()
        .zip(&tx_node)
        .map(|(t, on)| if on.is_none() { mesh.cell_containing(t) } else { None })
        .collect();

    let mut curr = *rx;
    let mut on_node = mesh.vertex_near(&curr);
    let mut cell = match on_node {
        Some(_) => 0,
        None => mesh.cell_containing(&curr)?,
    };
    let mut entry_edge: Option<(u32, u32)> = None;

    let max_steps = 4 * mesh.num_cells().max(8);
    for _ in 0..max_steps {
        // Termination checks against every source.
        if on_node.is_some() {
            for t in tx {
                if curr.distance(t) < COINCIDENT_TOL {
                    return Some(path);
                }
            }
        } else {
            for (nt, t) in tx.iter().enumerate() {
                let reached = match tx_node[nt] {
                    Some(tn) => mesh.owners(tn).contains(&cell),
                    None => tx_cell[nt] == Some(cell),
                };
                if reached {
                    path.push(*t);
                    return Some(path);
                }
            }
        }

        if let Some(node) = on_node {
            // Find the owner cell whose descent direction leaves through
            // the opposite edge; keep the rejected gradients for the
            // averaged retry.
            let mut rejected: Vec<Point2> = Vec::new();
            let mut accepted = None;

            for pass in 0..2 {
                for &c in mesh.owners(node) {
                    let (n0, n1) = opposite_edge(mesh, c, node);
                    let g = if pass == 0 {
                        gradient_tri(mesh, c, worker, scheme).normalized()
                    } else {
                        let mut avg = Point2::default();
                        for r in &rejected {
                            avg = avg + *r;
                        }
                        avg.normalized()
                    };
                    if g == Point2::default() {
                        continue;
                    }
                    let v1 = (mesh.vertex(n0) - mesh.vertex(node)).normalized();
                    let v2 = (mesh.vertex(n1) - mesh.vertex(node)).normalized();
                    if !in_sector(&v1, &v2, &g) {
                        if pass == 0 {
                            rejected.push(g);
                        }
                        continue;
                    }
                    accepted = Some((c, n0, n1, g));
                    break;
                }
                if accepted.is_some() || rejected.is_empty() {
                    break;
                }
            }

            let (_, n0, n1, g) = accepted?;
            let hit_vertex = shoot_at_edge(mesh, n0, n1, &g, &mut curr);
            path.push(curr);
            if !hit_vertex {
                entry_edge = Some((n0, n1));
                cell = next_cell_from_vertex(mesh, n0, n1, node)?;
            }
        } else {
            let g = gradient_tri(mesh, cell, worker, scheme).normalized();
            if g == Point2::default() {
                return None;
            }

            let idx = mesh.cell_vertices(cell);
            let mut edges = [(idx[0], idx[1]), (idx[0], idx[2]), (idx[1], idx[2])];
            for e in &mut edges {
                if e.0 > e.1 {
                    *e = (e.1, e.0);
                }
            }

            let mut moved = false;
            for (i0, i1) in edges {
                let p0 = mesh.vertex(i0);
                let p1 = mesh.vertex(i1);
                let e = p1 - p0;

                if entry_edge == Some((i0, i1)) {
                    if e.normalized().cross(&g).abs() < ANG_TOL {
                        // Flat field along the entry edge: jump to the
                        // endpoint with the earlier arrival, deterministic
                        // when the gradient gives no preference.
                        let t0 = mesh.slots().get(i0, worker);
                        let t1 = mesh.slots().get(i1, worker);
                        curr = if t1 <= t0 { p1 } else { p0 };
                        path.push(curr);
                        moved = true;
                        break;
                    }
                    continue;
                }

                let denom = g.cross(&e);
                if denom.abs() < GEOM_EPS {
                    continue;
                }
                let t = (p0 - curr).cross(&e) / denom;
                let u = (p0 - curr).cross(&g) / denom;
                if t <= GEOM_EPS || !(-GEOM_EPS..=1.0 + GEOM_EPS).contains(&u) {
                    continue;
                }

                curr = p0 + e * u.clamp(0.0, 1.0);
                path.push(curr);
                entry_edge = Some((i0, i1));
                cell = next_cell_from_edge(mesh, i0, i1, cell)?;
                moved = true;
                break;
            }

            if !moved {
                // Gradient points just outside the cell: slide to the entry
                // edge endpoint ahead of it.
                let (e0, e1) = entry_edge?;
                let evec = mesh.vertex(e1) - mesh.vertex(e0);
                curr = if evec.dot(&g) > 0.0 {
                    mesh.vertex(e1)
                } else {
                    mesh.vertex(e0)
                };
                path.push(curr);
            }
        }

        on_node = mesh.vertex_near(&curr);
        if on_node.is_some() {
            entry_edge = None;
        }
    }
    None
}

/// Descent direction from an exact linear fit through a tetrahedron's
/// four vertex times.
fn cell_gradient_tet(mesh: &TetMesh, cell: u32, worker: usize) -> Point3 {
    let idx = mesh.cell_vertices(cell);
    let p0 = mesh.vertex(idx[0]);
    let t0 = mesh.slots().get(idx[0], worker);
    let mut e = [Point3::default(); 3];
    let mut dt = [0.0f64; 3];
    for k in 0..3 {
        e[k] = mesh.vertex(idx[k + 1]) - p0;
        dt[k] = mesh.slots().get(idx[k + 1], worker) - t0;
        if !dt[k].is_finite() {
            return Point3::default();
        }
    }
    solve3(
        [
            [e[0].x, e[0].y, e[0].z],
            [e[1].x, e[1].y, e[1].z],
            [e[2].x, e[2].y, e[2].z],
        ],
        dt,
    )
    .map(|g| -g)
    .unwrap_or_default()
}

/// Descent direction from a centred least-squares fit over the cell's
/// one-ring neighbourhood.
fn neighborhood_gradient_tet(mesh: &TetMesh, cell: u32, worker: usize) -> Point3 {
    let nodes = neighborhood_of(mesh, cell);
    let mut pts: Vec<(Point3, f64)> = Vec::with_capacity(nodes.len());
    for v in nodes {
        let t = mesh.slots().get(v, worker);
        if t.is_finite() {
            pts.push((mesh.vertex(v), t));
        }
    }
    if pts.len() < 4 {
        return cell_gradient_tet(mesh, cell, worker);
    }

    let inv = 1.0 / pts.len() as f64;
    let mean = pts
        .iter()
        .fold(Point3::default(), |acc, (p, _)| acc + *p)
        * inv;
    let mt = pts.iter().map(|(_, t)| t).sum::<f64>() * inv;

    let mut m = [[0.0f64; 3]; 3];
    let mut rhs = [0.0f64; 3];
    for (p, t) in &pts {
        let d = *p - mean;
        let dt = t - mt;
        let dv = [d.x, d.y, d.z];
        for r in 0..3 {
            for c in 0..3 {
                m[r][c] += dv[r] * dv[c];
            }
            rhs[r] += dv[r] * dt;
        }
    }
    match solve3(m, rhs) {
        Some(g) => -g,
        None => cell_gradient_tet(mesh, cell, worker),
    }
}

/// Solve a 3x3 linear system by Cramer's rule. Rows of `m` are the
/// equations. Returns None when the system is singular.
fn solve3(m: [[f64; 3]; 3], b: [f64; 3]) -> Option<Point3> {
    let det = det3(m);
    if det.abs() < GEOM_EPS {
        return None;
    }
    let mut cols = [0.0f64; 3];
    for c in 0..3 {
        let mut mc = m;
        for r in 0..3 {
            mc[r][c] = b[r];
        }
        cols[c] = det3(mc) / det;
    }
    Some(Point3::new(cols[0], cols[1], cols[2]))
}

fn det3(m: [[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

fn gradient_tet(mesh: &TetMesh, cell: u32, worker: usize, scheme: GradientScheme) -> Point3 {
    match scheme {
        GradientScheme::Cell => cell_gradient_tet(mesh, cell, worker),
        GradientScheme::Neighborhood => neighborhood_gradient_tet(mesh, cell, worker),
    }
}

/// Mean edge length of a tetrahedron, the step scale for the 3D walker.
fn mean_edge_tet(mesh: &TetMesh, cell: u32) -> f64 {
    let idx = mesh.cell_vertices(cell);
    let mut sum = 0.0;
    let mut n = 0;
    for a in 0..4 {
        for b in a + 1..4 {
            sum += mesh.vertex(idx[a]).distance(&mesh.vertex(idx[b]));
            n += 1;
        }
    }
    sum / n as f64
}

/// Walk from `rx` back to a source through a tetrahedral mesh.
///
/// The 3D walker advances point-wise: half a local edge length along the
/// reversed neighbourhood gradient per step, re-locating the containing
/// cell as it goes, until a source cell or a source point is reached.
pub(crate) fn trace_tet(
    mesh: &TetMesh,
    tx: &[Point3],
    rx: &Point3,
    worker: usize,
    scheme: GradientScheme,
) -> Vec<Point3> {
    match walk_tet(mesh, tx, rx, worker, scheme) {
        Some(path) => path,
        None => {
            eprintln!(
                "warning: ray tracing failed to converge for receiver {}",
                rx
            );
            vec![*rx]
        }
    }
}

fn walk_tet(
    mesh: &TetMesh,
    tx: &[Point3],
    rx: &Point3,
    worker: usize,
    scheme: GradientScheme,
) -> Option<Vec<Point3>> {
    let mut path = vec![*rx];
    if tx.iter().any(|t| t.is_close(rx)) {
        return Some(path);
    }

    let tx_node: Vec<Option<u32>> = tx.iter().map(|t| mesh.vertex_near(t)).collect();
    let tx_cell: Vec<Option<u32>> = tx
        .iter()
        .zip(&tx_node)
        .map(|(t, on)| if on.is_none() { mesh.cell_containing(t) } else { None })
        .collect();

    let mut curr = *rx;
    let max_steps = 16 * mesh.num_cells().max(64);
    for _ in 0..max_steps {
        let cell = match mesh.vertex_near(&curr) {
            // nudge off a vertex by looking at any owner cell
            Some(v) => mesh.owners(v).first().copied()?,
            None => mesh.cell_containing(&curr)?,
        };
        let step = 0.5 * mean_edge_tet(mesh, cell);

        for (nt, t) in tx.iter().enumerate() {
            let reached_cell = match tx_node[nt] {
                Some(tn) => mesh.owners(tn).contains(&cell),
                None => tx_cell[nt] == Some(cell),
            };
            if reached_cell || curr.distance(t) <= step {
                path.push(*t);
                return Some(path);
            }
        }

        let g = gradient_tet(mesh, cell, worker, scheme).normalized();
        if g == Point3::default() {
            return None;
        }
        curr = curr + g * step;
        path.push(curr);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> TriMesh {
        let vertices = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        TriMesh::new(vertices, vec![[0, 1, 2], [0, 2, 3]], 1).unwrap()
    }

    fn seed_distance_field(mesh: &TriMesh) {
        // exact distances from the origin
        for v in 0..mesh.num_vertices() as u32 {
            let d = mesh.vertex(v).distance(&Point2::new(0.0, 0.0));
            mesh.slots().set(v, 0, d);
        }
    }

    #[test]
    fn cell_gradient_matches_plane() {
        let mesh = unit_square();
        // T = 2x + 3z on cell 0
        for v in 0..4 {
            let p = mesh.vertex(v);
            mesh.slots().set(v, 0, 2.0 * p.x + 3.0 * p.z);
        }
        let g = cell_gradient_tri(&mesh, 0, 0);
        assert!((g.x + 2.0).abs() < 1e-12);
        assert!((g.z + 3.0).abs() < 1e-12);
    }

    #[test]
    fn neighborhood_gradient_smooths_linear_field() {
        let mesh = TriMesh::structured(5, 5, 0.25, 1).unwrap();
        for v in 0..mesh.num_vertices() as u32 {
            let p = mesh.vertex(v);
            mesh.slots().set(v, 0, 0.5 * p.x + 1.5 * p.z);
        }
        let g = neighborhood_gradient_tri(&mesh, 7, 0);
        assert!((g.x + 0.5).abs() < 1e-10);
        assert!((g.z + 1.5).abs() < 1e-10);
    }

    #[test]
    fn in_sector_boundaries_count() {
        let v1 = Point2::new(-1.0, -1.0).normalized();
        let v2 = Point2::new(-1.0, 0.0);
        assert!(in_sector(&v1, &v2, &v1)); // on the first boundary
        assert!(in_sector(&v1, &v2, &v2)); // on the second boundary
        assert!(in_sector(
            &v1,
            &v2,
            &Point2::new(-1.0, -0.5).normalized()
        ));
        assert!(!in_sector(&v1, &v2, &Point2::new(1.0, 0.5).normalized()));
        assert!(!in_sector(&v1, &v2, &Point2::new(0.0, -1.0)));
    }

    #[test]
    fn diagonal_ray_on_two_triangle_square() {
        let mesh = unit_square();
        seed_distance_field(&mesh);
        let tx = [Point2::new(0.0, 0.0)];
        let rx = Point2::new(1.0, 1.0);
        let path = trace_tri(&mesh, &tx, &rx, 0, GradientScheme::Neighborhood);
        assert!(path.len() >= 2, "walk failed: {:?}", path);
        assert!(path[0].is_close(&rx));
        assert!(path.last().unwrap().is_close(&tx[0]));
        // the straight diagonal: every point on the segment
        for p in &path {
            assert!((p.x - p.z).abs() < 1e-3, "off-diagonal point {:?}", p);
        }
    }

    #[test]
    fn receiver_coincident_with_source() {
        let mesh = unit_square();
        seed_distance_field(&mesh);
        let tx = [Point2::new(1.0, 1.0)];
        let path = trace_tri(&mesh, &tx, &Point2::new(1.0, 1.0), 0, GradientScheme::Cell);
        assert_eq!(path.len(), 1);
    }

    #[test]
    fn interior_receiver_same_cell_as_source() {
        let mesh = unit_square();
        seed_distance_field(&mesh);
        // both strictly inside cell 0
        let tx = [Point2::new(0.6, 0.2)];
        let rx = Point2::new(0.9, 0.5);
        let path = trace_tri(&mesh, &tx, &rx, 0, GradientScheme::Cell);
        assert_eq!(path.len(), 2);
        assert!(path[1].is_close(&tx[0]));
    }

    #[test]
    fn unreachable_field_reports_single_point() {
        let mesh = unit_square();
        // all slots at infinity: no gradient anywhere
        let tx = [Point2::new(0.0, 0.0)];
        let rx = Point2::new(0.9, 0.5);
        let path = trace_tri(&mesh, &tx, &rx, 0, GradientScheme::Cell);
        assert_eq!(path, vec![rx]);
    }

    #[test]
    fn tet_walker_straight_field() {
        let mesh = TetMesh::structured(5, 5, 5, 0.5, 1).unwrap();
        let src = Point3::new(0.0, 0.0, 0.0);
        for v in 0..mesh.num_vertices() as u32 {
            mesh.slots().set(v, 0, mesh.vertex(v).distance(&src));
        }
        let rx = Point3::new(1.9, 1.9, 1.9);
        let path = trace_tet(&mesh, &[src], &rx, 0, GradientScheme::Neighborhood);
        assert!(path.len() >= 2, "walk failed");
        assert!(path[0].is_close(&rx));
        assert!(path.last().unwrap().is_close(&src));
        // the path must shorten the distance to the source monotonically
        let mut prev = f64::INFINITY;
        for p in &path {
            let d = p.distance(&src);
            assert!(d <= prev + 1e-9);
            prev = d;
        }
    }
}

// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::HashMap;
use std::f64::consts::{FRAC_PI_2, PI};

use crate::error::{EikonalError, Result};
use crate::geometry::{Coord, Point2, Point3, GEOM_EPS};
use crate::raypath::GradientScheme;
use crate::state::SlotTable;

/// Capability set shared by the 2D and 3D meshes.
///
/// The sweeping and marching drivers, the source seeding and the receiver
/// interpolation are generic over this trait; only the one-cell relaxation
/// and the ray walker are specialised per cell dimensionality.
pub trait Mesh: Send + Sync {
    /// The point type of the mesh (`Point2` or `Point3`).
    type Point: Coord;

    /// Number of vertices.
    fn num_vertices(&self) -> usize;

    /// Number of cells.
    fn num_cells(&self) -> usize;

    /// Coordinates of vertex `v`.
    fn vertex(&self, v: u32) -> Self::Point;

    /// The vertex indices of cell `c`.
    fn cell_vertices(&self, c: u32) -> &[u32];

    /// The cells that contain vertex `v`.
    fn owners(&self, v: u32) -> &[u32];

    /// Slowness of cell `c` (s/m).
    fn slowness(&self, c: u32) -> f64;

    /// The per-worker traveltime slot table.
    fn slots(&self) -> &SlotTable;

    /// The cell containing `p`, if any. Points on shared edges or faces
    /// resolve to the first matching cell.
    fn cell_containing(&self, p: &Self::Point) -> Option<u32>;

    /// The vertex coincident with `p` within tolerance, if any.
    fn vertex_near(&self, p: &Self::Point) -> Option<u32> {
        (0..self.num_vertices() as u32).find(|&v| self.vertex(v).is_close(p))
    }

    /// Validate that every point lies on a vertex or inside a cell.
    /// Fails on the first violation.
    fn check_points(&self, pts: &[Self::Point]) -> Result<()> {
        for (index, p) in pts.iter().enumerate() {
            if self.vertex_near(p).is_none() && self.cell_containing(p).is_none() {
                return Err(EikonalError::PointOutsideMesh {
                    index,
                    coord: p.to_vec(),
                });
            }
        }
        Ok(())
    }

    /// Relax vertex `node` once from all of its owner cells, lowering its
    /// worker slot if a better arrival is found. Returns true if the slot
    /// was lowered.
    fn relax(&self, node: u32, worker: usize) -> bool;

    /// Walk from `rx` back to one of the `tx` points along the reversed
    /// traveltime gradient. On failure the returned polyline contains only
    /// `rx`.
    fn trace_ray(
        &self,
        tx: &[Self::Point],
        rx: &Self::Point,
        worker: usize,
        scheme: GradientScheme,
    ) -> Vec<Self::Point>;
}

/// A triangle with precomputed edge lengths and interior angles.
///
/// `l[k]` is the length of the edge opposite vertex `i[k]`; `a[k]` is the
/// interior angle at vertex `i[k]`, from the law of cosines.
#[derive(Debug, Clone)]
pub struct TriangleCell {
    /// Vertex indices.
    pub i: [u32; 3],
    /// Edge lengths, `l[k]` opposite `i[k]`.
    pub l: [f64; 3],
    /// Interior angles, `a[k]` at `i[k]`.
    pub a: [f64; 3],
}

/// Surrogate triangle substituted during relaxation when a cell's angle at
/// the updated vertex is obtuse.
///
/// The two outer vertices are drawn from the neighbouring triangle across
/// the obtuse vertex's opposite edge; the geometry is stored by value so
/// only vertex indices need resolving at solve time.
#[derive(Debug, Clone)]
pub struct VirtualTriangle {
    /// The two replacement vertices.
    pub outer: [u32; 2],
    /// Edge lengths: `e[0]` between the outer pair, `e[1]` from the updated
    /// vertex to `outer[1]`, `e[2]` from the updated vertex to `outer[0]`.
    pub e: [f64; 3],
    /// Angles: `a[0]` at the updated vertex, `a[1]` at `outer[0]`,
    /// `a[2]` at `outer[1]`.
    pub a: [f64; 3],
}

/// An unstructured triangular mesh with per-cell slowness and per-worker
/// traveltime storage.
#[derive(Debug)]
pub struct TriMesh {
    vertices: Vec<Point2>,
    cells: Vec<TriangleCell>,
    owners: Vec<Vec<u32>>,
    slowness: Vec<f64>,
    virtual_cells: HashMap<u32, VirtualTriangle>,
    slots: SlotTable,
}

/// Edge lengths of a triangle given its three corner points, ordered so
/// entry `k` is opposite corner `k`.
fn triangle_edges<P: Coord>(p0: &P, p1: &P, p2: &P) -> [f64; 3] {
    [p1.distance(p2), p0.distance(p2), p0.distance(p1)]
}

/// Interior angles from edge lengths via the law of cosines, `a[k]`
/// opposite `l[k]`. Returns None for degenerate (collinear) geometry.
fn triangle_angles(l: &[f64; 3]) -> Option<[f64; 3]> {
    let [a, b, c] = *l;
    if a < GEOM_EPS || b < GEOM_EPS || c < GEOM_EPS {
        return None;
    }
    let cos0 = (b * b + c * c - a * a) / (2.0 * b * c);
    let cos1 = (c * c + a * a - b * b) / (2.0 * a * c);
    let cos2 = (a * a + b * b - c * c) / (2.0 * a * b);
    // collinear corners drive a cosine to ±1
    if [cos0, cos1, cos2].iter().any(|c| c.abs() >= 1.0 - 1e-12) {
        return None;
    }
    Some([cos0.acos(), cos1.acos(), cos2.acos()])
}

fn validate_cells(
    cells: &[&[u32]],
    num_vertices: usize,
) -> Result<()> {
    for (cell, idx) in cells.iter().enumerate() {
        for &v in idx.iter() {
            if v as usize >= num_vertices {
                return Err(EikonalError::InvalidVertexIndex {
                    cell,
                    index: v,
                    num_vertices,
                });
            }
        }
        for k in 0..idx.len() {
            for m in k + 1..idx.len() {
                if idx[k] == idx[m] {
                    return Err(EikonalError::DegenerateCell { cell });
                }
            }
        }
    }
    Ok(())
}

fn build_owners(cells: &[&[u32]], num_vertices: usize) -> Vec<Vec<u32>> {
    let mut owners = vec![Vec::new(); num_vertices];
    for (c, idx) in cells.iter().enumerate() {
        for &v in idx.iter() {
            owners[v as usize].push(c as u32);
        }
    }
    owners
}

impl TriMesh {
    /// Build a triangular mesh from vertex coordinates and per-cell vertex
    /// index triples.
    ///
    /// Computes vertex-to-cell adjacency, per-cell edge lengths and angles,
    /// and the obtuse-angle virtual-triangle table. Slowness starts uniform
    /// at 1.0; use [`TriMesh::set_slowness`] to install a model.
    ///
    /// # Errors
    /// Returns an error on out-of-range vertex indices, repeated vertices
    /// within a cell, collinear cells, or a zero worker count.
    pub fn new(vertices: Vec<Point2>, tri: Vec<[u32; 3]>, num_workers: usize) -> Result<Self> {
        if num_workers == 0 {
            return Err(EikonalError::Other(
                "at least one worker slot is required".to_string(),
            ));
        }
        let refs: Vec<&[u32]> = tri.iter().map(|t| &t[..]).collect();
        validate_cells(&refs, vertices.len())?;
        let owners = build_owners(&refs, vertices.len());

        let mut cells = Vec::with_capacity(tri.len());
        for (n, idx) in tri.iter().enumerate() {
            let l = triangle_edges(
                &vertices[idx[0] as usize],
                &vertices[idx[1] as usize],
                &vertices[idx[2] as usize],
            );
            let a = triangle_angles(&l).ok_or(EikonalError::DegenerateCell { cell: n })?;
            cells.push(TriangleCell { i: *idx, l, a });
        }

        let slots = SlotTable::new(vertices.len(), num_workers);
        let num_cells = cells.len();
        let mut mesh = TriMesh {
            vertices,
            cells,
            owners,
            slowness: vec![1.0; num_cells],
            virtual_cells: HashMap::new(),
            slots,
        };
        mesh.virtual_cells = mesh.process_obtuse();
        Ok(mesh)
    }

    /// Generate a structured triangulation of a rectangle with `nx` by `nz`
    /// nodes spaced `h` apart, each quad split along its main diagonal.
    pub fn structured(nx: usize, nz: usize, h: f64, num_workers: usize) -> Result<Self> {
        let mut vertices = Vec::with_capacity(nx * nz);
        for i in 0..nx {
            for k in 0..nz {
                vertices.push(Point2::new(i as f64 * h, k as f64 * h));
            }
        }
        let at = |i: usize, k: usize| (i * nz + k) as u32;
        let mut tri = Vec::with_capacity(2 * (nx - 1) * (nz - 1));
        for i in 0..nx - 1 {
            for k in 0..nz - 1 {
                tri.push([at(i, k), at(i + 1, k), at(i + 1, k + 1)]);
                tri.push([at(i, k), at(i + 1, k + 1), at(i, k + 1)]);
            }
        }
        TriMesh::new(vertices, tri, num_workers)
    }

    /// Set a per-cell slowness model. The vector length must equal the
    /// number of cells and every value must be positive and finite.
    pub fn set_slowness(&mut self, s: &[f64]) -> Result<()> {
        if s.len() != self.cells.len() {
            return Err(EikonalError::SlownessSizeMismatch {
                expected: self.cells.len(),
                got: s.len(),
            });
        }
        for (index, &value) in s.iter().enumerate() {
            if !value.is_finite() || value <= 0.0 {
                return Err(EikonalError::InvalidSlowness { index, value });
            }
        }
        self.slowness.copy_from_slice(s);
        Ok(())
    }

    /// Set the same slowness in every cell.
    pub fn set_uniform_slowness(&mut self, s: f64) -> Result<()> {
        if !s.is_finite() || s <= 0.0 {
            return Err(EikonalError::InvalidSlowness { index: 0, value: s });
        }
        self.slowness.iter_mut().for_each(|v| *v = s);
        Ok(())
    }

    /// The triangle record of cell `c`.
    pub fn triangle(&self, c: u32) -> &TriangleCell {
        &self.cells[c as usize]
    }

    /// The virtual triangle substituted for cell `c` during relaxation, if
    /// one was recorded.
    pub fn virtual_triangle(&self, c: u32) -> Option<&VirtualTriangle> {
        self.virtual_cells.get(&c)
    }

    /// Axis-aligned bounding box of the mesh.
    pub fn bounds(&self) -> (Point2, Point2) {
        let mut lo = self.vertices[0];
        let mut hi = self.vertices[0];
        for v in &self.vertices[1..] {
            lo.x = lo.x.min(v.x);
            lo.z = lo.z.min(v.z);
            hi.x = hi.x.max(v.x);
            hi.z = hi.z.max(v.z);
        }
        (lo, hi)
    }

    /// Barycentric triangle-interior test, tolerant to points on edges.
    pub fn inside_triangle(&self, p: &Point2, c: u32) -> bool {
        let t = &self.cells[c as usize];
        let v0 = self.vertices[t.i[0] as usize];
        let e1 = self.vertices[t.i[1] as usize] - v0;
        let e2 = self.vertices[t.i[2] as usize] - v0;
        let r = *p - v0;
        let denom = e1.det(&e2);
        if denom.abs() < GEOM_EPS {
            return false;
        }
        let a = r.det(&e2) / denom;
        let b = e1.det(&r) / denom;
        a >= -GEOM_EPS && b >= -GEOM_EPS && a + b <= 1.0 + GEOM_EPS
    }

    /// For each triangle whose angle at some vertex exceeds π/2, record a
    /// well-conditioned surrogate triangle drawn across the opposite edge
    /// into the adjacent cell. Boundary edges and surrogates that remain
    /// obtuse are skipped.
    fn process_obtuse(&self) -> HashMap<u32, VirtualTriangle> {
        let mut table = HashMap::new();

        for (ntri, tri) in self.cells.iter().enumerate() {
            for n in 0..3 {
                if tri.a[n] <= FRAC_PI_2 {
                    continue;
                }

                let i0 = tri.i[n];
                let i1 = tri.i[(n + 1) % 3];
                let i2 = tri.i[(n + 2) % 3];

                // The neighbour sharing the opposite edge, if any.
                let opposite = self.owners[i1 as usize]
                    .iter()
                    .find(|&&c| c != ntri as u32 && self.owners[i2 as usize].contains(&c));
                let Some(&opposite) = opposite else {
                    continue; // boundary edge, no correction applied
                };

                let i3 = *self.cells[opposite as usize]
                    .i
                    .iter()
                    .find(|&&v| v != i1 && v != i2)
                    .expect("adjacent triangle shares the full edge");

                // Keep i1, replace i2 with the neighbour's far vertex.
                let mut outer = [i1, i3];
                let mut a = self.distance(i1, i3);
                let mut b = self.distance(i0, i3);
                let mut c = self.distance(i0, i1);
                let mut a0 = ((b * b + c * c - a * a) / (2.0 * b * c)).acos();

                if a0 > FRAC_PI_2 {
                    // Still obtuse: keep i2 instead and replace i1.
                    outer = [i3, i2];
                    a = self.distance(i2, i3);
                    b = self.distance(i0, i2);
                    c = self.distance(i0, i3);
                    a0 = ((b * b + c * c - a * a) / (2.0 * b * c)).acos();
                }

                if !a0.is_finite() || a0 > FRAC_PI_2 {
                    continue; // no well-conditioned surrogate exists
                }

                let a1 = ((c * c + a * a - b * b) / (2.0 * a * c)).acos();
                let a2 = ((a * a + b * b - c * c) / (2.0 * a * b)).acos();
                table.insert(
                    ntri as u32,
                    VirtualTriangle {
                        outer,
                        e: [a, b, c],
                        a: [a0, a1, a2],
                    },
                );
            }
        }
        table
    }

    fn distance(&self, v0: u32, v1: u32) -> f64 {
        self.vertices[v0 as usize].distance(&self.vertices[v1 as usize])
    }
}

impl Mesh for TriMesh {
    type Point = Point2;

    fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    fn num_cells(&self) -> usize {
        self.cells.len()
    }

    fn vertex(&self, v: u32) -> Point2 {
        self.vertices[v as usize]
    }

    fn cell_vertices(&self, c: u32) -> &[u32] {
        &self.cells[c as usize].i
    }

    fn owners(&self, v: u32) -> &[u32] {
        &self.owners[v as usize]
    }

    fn slowness(&self, c: u32) -> f64 {
        self.slowness[c as usize]
    }

    fn slots(&self) -> &SlotTable {
        &self.slots
    }

    fn cell_containing(&self, p: &Point2) -> Option<u32> {
        (0..self.cells.len() as u32).find(|&c| self.inside_triangle(p, c))
    }

    fn relax(&self, node: u32, worker: usize) -> bool {
        crate::local::relax_node_2d(self, node, worker)
    }

    fn trace_ray(
        &self,
        tx: &[Point2],
        rx: &Point2,
        worker: usize,
        scheme: GradientScheme,
    ) -> Vec<Point2> {
        crate::raypath::trace_tri(self, tx, rx, worker, scheme)
    }
}

/// A tetrahedron.
#[derive(Debug, Clone)]
pub struct TetraCell {
    /// Vertex indices.
    pub i: [u32; 4],
}

/// An unstructured tetrahedral mesh with per-cell slowness and per-worker
/// traveltime storage.
pub struct TetMesh {
    vertices: Vec<Point3>,
    cells: Vec<TetraCell>,
    owners: Vec<Vec<u32>>,
    slowness: Vec<f64>,
    slots: SlotTable,
}

impl TetMesh {
    /// Build a tetrahedral mesh from vertex coordinates and per-cell vertex
    /// index quadruples.
    ///
    /// Per-face edge lengths and angles are derived on the fly by the local
    /// solver; only adjacency is precomputed here.
    ///
    /// # Errors
    /// Returns an error on out-of-range vertex indices, repeated vertices
    /// within a cell, or a zero worker count.
    pub fn new(vertices: Vec<Point3>, tet: Vec<[u32; 4]>, num_workers: usize) -> Result<Self> {
        if num_workers == 0 {
            return Err(EikonalError::Other(
                "at least one worker slot is required".to_string(),
            ));
        }
        let refs: Vec<&[u32]> = tet.iter().map(|t| &t[..]).collect();
        validate_cells(&refs, vertices.len())?;
        let owners = build_owners(&refs, vertices.len());
        let cells: Vec<TetraCell> = tet.into_iter().map(|i| TetraCell { i }).collect();
        let slots = SlotTable::new(vertices.len(), num_workers);
        let num_cells = cells.len();
        Ok(TetMesh {
            vertices,
            cells,
            owners,
            slowness: vec![1.0; num_cells],
            slots,
        })
    }

    /// Generate a structured tetrahedralisation of a box with `nx` by `ny`
    /// by `nz` nodes spaced `h` apart, each cube cut into six tetrahedra
    /// around its main diagonal.
    pub fn structured(
        nx: usize,
        ny: usize,
        nz: usize,
        h: f64,
        num_workers: usize,
    ) -> Result<Self> {
        let mut vertices = Vec::with_capacity(nx * ny * nz);
        for i in 0..nx {
            for j in 0..ny {
                for k in 0..nz {
                    vertices.push(Point3::new(i as f64 * h, j as f64 * h, k as f64 * h));
                }
            }
        }
        let at = |i: usize, j: usize, k: usize| ((i * ny + j) * nz + k) as u32;
        let mut tet = Vec::with_capacity(6 * (nx - 1) * (ny - 1) * (nz - 1));
        for i in 0..nx - 1 {
            for j in 0..ny - 1 {
                for k in 0..nz - 1 {
                    let c000 = at(i, j, k);
                    let c100 = at(i + 1, j, k);
                    let c010 = at(i, j + 1, k);
                    let c001 = at(i, j, k + 1);
                    let c110 = at(i + 1, j + 1, k);
                    let c101 = at(i + 1, j, k + 1);
                    let c011 = at(i, j + 1, k + 1);
                    let c111 = at(i + 1, j + 1, k + 1);
                    // Kuhn subdivision: six tetrahedra along the paths from
                    // c000 to c111.
                    tet.push([c000, c100, c110, c111]);
                    tet.push([c000, c100, c101, c111]);
                    tet.push([c000, c010, c110, c111]);
                    tet.push([c000, c010, c011, c111]);
                    tet.push([c000, c001, c101, c111]);
                    tet.push([c000, c001, c011, c111]);
                }
            }
        }
        TetMesh::new(vertices, tet, num_workers)
    }

    /// Set a per-cell slowness model. The vector length must equal the
    /// number of cells and every value must be positive and finite.
    pub fn set_slowness(&mut self, s: &[f64]) -> Result<()> {
        if s.len() != self.cells.len() {
            return Err(EikonalError::SlownessSizeMismatch {
                expected: self.cells.len(),
                got: s.len(),
            });
        }
        for (index, &value) in s.iter().enumerate() {
            if !value.is_finite() || value <= 0.0 {
                return Err(EikonalError::InvalidSlowness { index, value });
            }
        }
        self.slowness.copy_from_slice(s);
        Ok(())
    }

    /// Set the same slowness in every cell.
    pub fn set_uniform_slowness(&mut self, s: f64) -> Result<()> {
        if !s.is_finite() || s <= 0.0 {
            return Err(EikonalError::InvalidSlowness { index: 0, value: s });
        }
        self.slowness.iter_mut().for_each(|v| *v = s);
        Ok(())
    }

    /// The tetrahedron record of cell `c`.
    pub fn tetra(&self, c: u32) -> &TetraCell {
        &self.cells[c as usize]
    }

    /// Axis-aligned bounding box of the mesh.
    pub fn bounds(&self) -> (Point3, Point3) {
        let mut lo = self.vertices[0];
        let mut hi = self.vertices[0];
        for v in &self.vertices[1..] {
            lo.x = lo.x.min(v.x);
            lo.y = lo.y.min(v.y);
            lo.z = lo.z.min(v.z);
            hi.x = hi.x.max(v.x);
            hi.y = hi.y.max(v.y);
            hi.z = hi.z.max(v.z);
        }
        (lo, hi)
    }

    /// Same-side tetrahedron-interior test, tolerant to points on faces.
    pub fn inside_tetra(&self, p: &Point3, c: u32) -> bool {
        let t = &self.cells[c as usize];
        // For each face, p must lie on the same side as the opposite vertex.
        const FACES: [[usize; 4]; 4] = [
            [0, 1, 2, 3],
            [0, 1, 3, 2],
            [0, 2, 3, 1],
            [1, 2, 3, 0],
        ];
        for f in FACES {
            let a = self.vertices[t.i[f[0]] as usize];
            let b = self.vertices[t.i[f[1]] as usize];
            let cpt = self.vertices[t.i[f[2]] as usize];
            let d = self.vertices[t.i[f[3]] as usize];
            let n = (b - a).cross(&(cpt - a)).normalized();
            let sp = n.dot(&(*p - a));
            let sd = n.dot(&(d - a));
            if sd.abs() < GEOM_EPS {
                return false;
            }
            if sp * sd < 0.0 && sp.abs() > 1e-9 * sd.abs() {
                return false;
            }
        }
        true
    }
}

impl Mesh for TetMesh {
    type Point = Point3;

    fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    fn num_cells(&self) -> usize {
        self.cells.len()
    }

    fn vertex(&self, v: u32) -> Point3 {
        self.vertices[v as usize]
    }

    fn cell_vertices(&self, c: u32) -> &[u32] {
        &self.cells[c as usize].i
    }

    fn owners(&self, v: u32) -> &[u32] {
        &self.owners[v as usize]
    }

    fn slowness(&self, c: u32) -> f64 {
        self.slowness[c as usize]
    }

    fn slots(&self) -> &SlotTable {
        &self.slots
    }

    fn cell_containing(&self, p: &Point3) -> Option<u32> {
        (0..self.cells.len() as u32).find(|&c| self.inside_tetra(p, c))
    }

    fn relax(&self, node: u32, worker: usize) -> bool {
        crate::local::relax_node_3d(self, node, worker)
    }

    fn trace_ray(
        &self,
        tx: &[Point3],
        rx: &Point3,
        worker: usize,
        scheme: GradientScheme,
    ) -> Vec<Point3> {
        crate::raypath::trace_tet(self, tx, rx, worker, scheme)
    }
}

/// Check that the interior angles of every triangle sum to π.
/// Exposed for diagnostics and tests.
pub fn angle_sum_defect(mesh: &TriMesh) -> f64 {
    let mut worst = 0.0_f64;
    for c in 0..mesh.num_cells() as u32 {
        let t = mesh.triangle(c);
        let defect = (t.a[0] + t.a[1] + t.a[2] - PI).abs();
        worst = worst.max(defect);
    }
    worst
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Unit square split along the (0,0)-(1,1) diagonal.
    fn unit_square(num_workers: usize) -> TriMesh {
        let vertices = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        let tri = vec![[0, 1, 2], [0, 2, 3]];
        TriMesh::new(vertices, tri, num_workers).unwrap()
    }

    /// One 120-degree triangle at the origin plus a well-shaped neighbour
    /// across its opposite edge.
    fn obtuse_pair() -> TriMesh {
        let vertices = vec![
            Point2::new(0.0, 0.0),    // obtuse corner
            Point2::new(-0.5, 0.866), // upper edge endpoint
            Point2::new(-0.5, -0.866),
            Point2::new(-1.2, 0.0), // far vertex of the neighbour
        ];
        let tri = vec![[0, 1, 2], [1, 3, 2]];
        TriMesh::new(vertices, tri, 1).unwrap()
    }

    #[test]
    fn angle_sums_to_pi() {
        let mesh = unit_square(1);
        assert!(angle_sum_defect(&mesh) < 1e-10);
        let mesh = TriMesh::structured(9, 9, 0.125, 1).unwrap();
        assert!(angle_sum_defect(&mesh) < 1e-10);
    }

    #[test]
    fn owners_cover_cells() {
        let mesh = unit_square(1);
        assert_eq!(mesh.owners(0), &[0, 1]);
        assert_eq!(mesh.owners(1), &[0]);
        assert_eq!(mesh.owners(2), &[0, 1]);
        assert_eq!(mesh.owners(3), &[1]);
    }

    #[test]
    fn inside_triangle_predicate() {
        let mesh = unit_square(1);
        assert!(mesh.inside_triangle(&Point2::new(0.7, 0.2), 0));
        assert!(!mesh.inside_triangle(&Point2::new(0.2, 0.7), 0));
        assert!(mesh.inside_triangle(&Point2::new(0.2, 0.7), 1));
        // a point on the shared diagonal is inside both
        assert!(mesh.inside_triangle(&Point2::new(0.5, 0.5), 0));
        assert!(mesh.inside_triangle(&Point2::new(0.5, 0.5), 1));
        assert!(!mesh.inside_triangle(&Point2::new(1.5, 0.5), 0));
    }

    #[test]
    fn cell_lookup_and_check_points() {
        let mesh = unit_square(1);
        assert_eq!(mesh.cell_containing(&Point2::new(0.7, 0.2)), Some(0));
        assert_eq!(mesh.cell_containing(&Point2::new(0.2, 0.7)), Some(1));
        assert_eq!(mesh.cell_containing(&Point2::new(2.0, 2.0)), None);

        assert!(mesh
            .check_points(&[Point2::new(0.5, 0.5), Point2::new(0.0, 0.0)])
            .is_ok());
        let err = mesh
            .check_points(&[Point2::new(0.5, 0.5), Point2::new(2.0, 2.0)])
            .unwrap_err();
        assert!(matches!(
            err,
            EikonalError::PointOutsideMesh { index: 1, .. }
        ));
    }

    #[test]
    fn obtuse_triangle_gets_virtual_record() {
        let mesh = obtuse_pair();
        assert!(mesh.triangle(0).a[0] > FRAC_PI_2);

        let vn = mesh.virtual_triangle(0).expect("virtual triangle stored");
        // The replacement pair is drawn from the neighbour, never from the
        // shared edge alone.
        assert!(vn.outer.contains(&3));
        // Well-conditioned at the updated vertex, angles sum to pi.
        assert!(vn.a[0] <= FRAC_PI_2 + 1e-12);
        assert!((vn.a[0] + vn.a[1] + vn.a[2] - PI).abs() < 1e-10);
        // 60 degrees at the corner for this geometry
        assert!((vn.a[0] - PI / 3.0).abs() < 1e-3);
    }

    #[test]
    fn boundary_obtuse_is_skipped() {
        let vertices = vec![
            Point2::new(0.0, 0.0),
            Point2::new(-0.5, 0.866),
            Point2::new(-0.5, -0.866),
        ];
        let mesh = TriMesh::new(vertices, vec![[0, 1, 2]], 1).unwrap();
        assert!(mesh.triangle(0).a[0] > FRAC_PI_2);
        assert!(mesh.virtual_triangle(0).is_none());
    }

    #[test]
    fn rejects_bad_cells() {
        let vertices = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.0, 1.0),
        ];
        let err = TriMesh::new(vertices.clone(), vec![[0, 1, 7]], 1).unwrap_err();
        assert!(matches!(err, EikonalError::InvalidVertexIndex { .. }));

        let err = TriMesh::new(vertices.clone(), vec![[0, 1, 1]], 1).unwrap_err();
        assert!(matches!(err, EikonalError::DegenerateCell { cell: 0 }));

        // collinear
        let flat = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(2.0, 0.0),
        ];
        let err = TriMesh::new(flat, vec![[0, 1, 2]], 1).unwrap_err();
        assert!(matches!(err, EikonalError::DegenerateCell { cell: 0 }));
    }

    #[test]
    fn slowness_validation() {
        let mut mesh = unit_square(1);
        assert!(mesh.set_slowness(&[1.0, 2.0]).is_ok());
        assert_eq!(mesh.slowness(1), 2.0);

        let err = mesh.set_slowness(&[1.0]).unwrap_err();
        assert!(matches!(err, EikonalError::SlownessSizeMismatch { .. }));

        let err = mesh.set_slowness(&[1.0, -2.0]).unwrap_err();
        assert!(matches!(
            err,
            EikonalError::InvalidSlowness { index: 1, .. }
        ));

        assert!(mesh.set_uniform_slowness(0.5).is_ok());
        assert_eq!(mesh.slowness(0), 0.5);
        assert!(mesh.set_uniform_slowness(f64::NAN).is_err());
    }

    #[test]
    fn structured_counts() {
        let mesh = TriMesh::structured(5, 4, 1.0, 1).unwrap();
        assert_eq!(mesh.num_vertices(), 20);
        assert_eq!(mesh.num_cells(), 2 * 4 * 3);
        let (lo, hi) = mesh.bounds();
        assert_eq!(lo, Point2::new(0.0, 0.0));
        assert_eq!(hi, Point2::new(4.0, 3.0));
    }

    #[test]
    fn tet_structured_counts_and_lookup() {
        let mesh = TetMesh::structured(3, 3, 3, 1.0, 1).unwrap();
        assert_eq!(mesh.num_vertices(), 27);
        assert_eq!(mesh.num_cells(), 6 * 8);

        // every interior point is found in exactly the cells that contain it
        let p = Point3::new(0.3, 0.6, 1.2);
        let c = mesh.cell_containing(&p).expect("inside the box");
        assert!(mesh.inside_tetra(&p, c));
        assert!(mesh.cell_containing(&Point3::new(3.0, 0.5, 0.5)).is_none());
    }

    #[test]
    fn tet_vertex_near() {
        let mesh = TetMesh::structured(2, 2, 2, 1.0, 1).unwrap();
        assert_eq!(mesh.vertex_near(&Point3::new(1.0, 1.0, 1.0)), Some(7));
        assert_eq!(mesh.vertex_near(&Point3::new(0.5, 0.5, 0.5)), None);
    }
}

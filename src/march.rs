// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::error::{EikonalError, Result};
use crate::mesh::Mesh;
use crate::raypath::GradientScheme;
use crate::seed::{arrival_at, seed_sources};

/// A frontier entry: the node's traveltime at push time.
///
/// Entries are not removed on decrease; improved nodes are simply pushed
/// again and stale copies are discarded when they surface.
#[derive(Clone, Copy)]
struct BandEntry {
    time: f64,
    node: u32,
}

impl PartialEq for BandEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for BandEntry {}

impl PartialOrd for BandEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BandEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.time
            .total_cmp(&other.time)
            .then_with(|| self.node.cmp(&other.node))
    }
}

/// Fast Marching eikonal solver.
///
/// A single pass over the mesh driven by a min-priority frontier: the
/// smallest tentative arrival is final when popped, and its cell
/// neighbours are relaxed and (re-)pushed on improvement.
///
/// Like the sweeping solver, a worker id selects a private traveltime
/// slot per vertex so concurrent solves do not interfere.
pub struct MarchSolver<M: Mesh> {
    mesh: M,
    source_radius: f64,
    scheme: GradientScheme,
}

impl<M: Mesh> MarchSolver<M> {
    /// Create a marching solver over `mesh`.
    pub fn new(mesh: M) -> Self {
        MarchSolver {
            mesh,
            source_radius: 0.0,
            scheme: GradientScheme::default(),
        }
    }

    /// Seed every node within `radius` of a single source instead of the
    /// one-hop neighbourhood (builder method).
    pub fn with_source_radius(mut self, radius: f64) -> Self {
        self.source_radius = radius;
        self
    }

    /// Select the gradient estimate used for ray tracing (builder method).
    pub fn with_gradient_scheme(mut self, scheme: GradientScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Borrow the mesh.
    pub fn mesh(&self) -> &M {
        &self.mesh
    }

    /// Mutably borrow the mesh, e.g. to change the slowness model between
    /// solves.
    pub fn mesh_mut(&mut self) -> &mut M {
        &mut self.mesh
    }

    /// Consume the solver and return the mesh.
    pub fn into_mesh(self) -> M {
        self.mesh
    }

    /// Compute traveltimes from `tx`/`t0` at the receivers `rx` using
    /// worker slot `worker`.
    ///
    /// # Errors
    /// Fails before any mutation if a point lies outside the mesh, the
    /// source and emission-time counts differ, or the worker id is out of
    /// range.
    pub fn raytrace(
        &self,
        tx: &[M::Point],
        t0: &[f64],
        rx: &[M::Point],
        worker: usize,
    ) -> Result<Vec<f64>> {
        self.mesh.check_points(rx)?;
        self.solve_field(tx, t0, worker)?;
        rx.iter()
            .map(|r| arrival_at(&self.mesh, r, worker).map(|(t, _, _)| t))
            .collect()
    }

    /// Like [`MarchSolver::raytrace`], additionally walking a ray from
    /// every receiver back to a source.
    pub fn raytrace_with_paths(
        &self,
        tx: &[M::Point],
        t0: &[f64],
        rx: &[M::Point],
        worker: usize,
    ) -> Result<(Vec<f64>, Vec<Vec<M::Point>>)> {
        self.mesh.check_points(rx)?;
        self.solve_field(tx, t0, worker)?;
        let mut times = Vec::with_capacity(rx.len());
        let mut paths = Vec::with_capacity(rx.len());
        for r in rx {
            times.push(arrival_at(&self.mesh, r, worker)?.0);
            paths.push(self.mesh.trace_ray(tx, r, worker, self.scheme));
        }
        Ok((times, paths))
    }

    /// Batched variant: one receiver spread per output vector, solved from
    /// a single field.
    pub fn raytrace_batches(
        &self,
        tx: &[M::Point],
        t0: &[f64],
        rx: &[&[M::Point]],
        worker: usize,
    ) -> Result<Vec<Vec<f64>>> {
        for batch in rx {
            self.mesh.check_points(batch)?;
        }
        self.solve_field(tx, t0, worker)?;
        rx.iter()
            .map(|batch| {
                batch
                    .iter()
                    .map(|r| arrival_at(&self.mesh, r, worker).map(|(t, _, _)| t))
                    .collect()
            })
            .collect()
    }

    /// Batched variant with ray paths.
    #[allow(clippy::type_complexity)]
    pub fn raytrace_batches_with_paths(
        &self,
        tx: &[M::Point],
        t0: &[f64],
        rx: &[&[M::Point]],
        worker: usize,
    ) -> Result<(Vec<Vec<f64>>, Vec<Vec<Vec<M::Point>>>)> {
        for batch in rx {
            self.mesh.check_points(batch)?;
        }
        self.solve_field(tx, t0, worker)?;
        let mut times = Vec::with_capacity(rx.len());
        let mut paths = Vec::with_capacity(rx.len());
        for batch in rx {
            let mut bt = Vec::with_capacity(batch.len());
            let mut bp = Vec::with_capacity(batch.len());
            for r in batch.iter() {
                bt.push(arrival_at(&self.mesh, r, worker)?.0);
                bp.push(self.mesh.trace_ray(tx, r, worker, self.scheme));
            }
            times.push(bt);
            paths.push(bp);
        }
        Ok((times, paths))
    }

    /// Propagate the field for one shot: seed the band, then march.
    fn solve_field(&self, tx: &[M::Point], t0: &[f64], worker: usize) -> Result<()> {
        if worker >= self.mesh.slots().num_workers() {
            return Err(EikonalError::InvalidWorker {
                worker,
                num_workers: self.mesh.slots().num_workers(),
            });
        }
        if t0.len() != tx.len() {
            return Err(EikonalError::SourceCountMismatch {
                sources: tx.len(),
                times: t0.len(),
            });
        }
        self.mesh.check_points(tx)?;

        let slots = self.mesh.slots();
        slots.reset(worker);

        let num = self.mesh.num_vertices();
        let mut frozen = vec![false; num];
        let mut processed = vec![false; num];
        let mut band: BinaryHeap<Reverse<BandEntry>> = BinaryHeap::new();

        seed_sources(
            &self.mesh,
            tx,
            t0,
            worker,
            self.source_radius,
            true,
            &mut frozen,
            |v| {
                band.push(Reverse(BandEntry {
                    time: slots.get(v, worker),
                    node: v,
                }));
            },
        )?;

        while let Some(Reverse(entry)) = band.pop() {
            let src = entry.node;
            if processed[src as usize] {
                continue; // stale duplicate
            }
            processed[src as usize] = true;

            for &cell in self.mesh.owners(src) {
                for &v in self.mesh.cell_vertices(cell) {
                    if v == src || frozen[v as usize] || processed[v as usize] {
                        continue;
                    }
                    if self.mesh.relax(v, worker) {
                        band.push(Reverse(BandEntry {
                            time: slots.get(v, worker),
                            node: v,
                        }));
                    }
                }
            }
        }
        Ok(())
    }
}

// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::{EikonalError, Result};
use crate::geometry::Coord;
use crate::mesh::Mesh;
use crate::raypath::GradientScheme;
use crate::seed::{arrival_at, seed_sources};

/// Metric used to order vertices by distance to a reference point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMetric {
    /// Manhattan distance.
    L1,
    /// Euclidean distance.
    L2,
}

/// Fast Sweeping eikonal solver.
///
/// Vertices are visited in precomputed orderings (ascending then
/// descending distance to each reference point) and relaxed with the
/// one-cell local solver until the cumulative update norm drops below the
/// tolerance or the iteration cap is reached.
///
/// One solver instance may serve several threads at once: `raytrace` takes
/// a worker id selecting a private traveltime slot per vertex, so calls
/// with distinct ids never interfere.
pub struct SweepSolver<M: Mesh> {
    mesh: M,
    epsilon: f64,
    max_iter: usize,
    source_radius: f64,
    scheme: GradientScheme,
    sorted: Vec<Vec<u32>>,
}

impl<M: Mesh> SweepSolver<M> {
    /// Create a solver with convergence tolerance `epsilon` and iteration
    /// cap `max_iter`.
    ///
    /// # Errors
    /// Returns an error if the tolerance is not positive and finite.
    pub fn new(mesh: M, epsilon: f64, max_iter: usize) -> Result<Self> {
        if !epsilon.is_finite() || epsilon <= 0.0 {
            return Err(EikonalError::InvalidTolerance(epsilon));
        }
        Ok(SweepSolver {
            mesh,
            epsilon,
            max_iter,
            source_radius: 0.0,
            scheme: GradientScheme::default(),
            sorted: Vec::new(),
        })
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

    /// Precompute the sweep orderings: for each reference point, all
    /// vertices sorted by ascending distance under the chosen metric.
    ///
    /// Reference points are typically the mesh corners. If this is never
    /// called, sweeps fall back to natural vertex order.
    pub fn init_ordering(&mut self, ref_pts: &[M::Point], metric: SortMetric) {
        self.sorted.clear();
        for rp in ref_pts {
            let mut dist: Vec<(f64, u32)> = (0..self.mesh.num_vertices() as u32)
                .map(|v| {
                    let p = self.mesh.vertex(v);
                    let d = match metric {
                        SortMetric::L1 => p.l1_distance(rp),
                        SortMetric::L2 => p.distance(rp),
                    };
                    (d, v)
                })
                .collect();
            dist.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            self.sorted.push(dist.into_iter().map(|(_, v)| v).collect());
        }
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

    /// Like [`SweepSolver::raytrace`], additionally walking a ray from
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

    /// Propagate the field for one shot: seed, then sweep to convergence.
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

        let mut frozen = vec![false; self.mesh.num_vertices()];
        seed_sources(
            &self.mesh,
            tx,
            t0,
            worker,
            self.source_radius,
            false,
            &mut frozen,
            |_| {},
        )?;

        let natural: Vec<Vec<u32>>;
        let orderings: &[Vec<u32>] = if self.sorted.is_empty() {
            natural = vec![(0..self.mesh.num_vertices() as u32).collect()];
            &natural
        } else {
            &self.sorted
        };

        let mut times = slots.snapshot(worker);
        let mut error = f64::MAX;
        let mut niter = 0usize;

        while error >= self.epsilon && niter < self.max_iter {
            for order in orderings {
                for &v in order.iter() {
                    if !frozen[v as usize] {
                        self.mesh.relax(v, worker);
                    }
                }
                error = self.accumulate_error(&mut times, worker);
                if error < self.epsilon {
                    niter += 1;
                    break;
                }

                for &v in order.iter().rev() {
                    if !frozen[v as usize] {
                        self.mesh.relax(v, worker);
                    }
                }
                error = self.accumulate_error(&mut times, worker);
                if error < self.epsilon {
                    niter += 1;
                    break;
                }
            }
            niter += 1;
        }

        if error >= self.epsilon {
            eprintln!(
                "warning: fast sweeping stopped after {} iterations with error {:e} >= epsilon {:e}",
                niter, error, self.epsilon
            );
        }
        Ok(())
    }

    /// Cumulative per-node change since the last snapshot; refreshes the
    /// snapshot in place.
    fn accumulate_error(&self, times: &mut [f64], worker: usize) -> f64 {
        let slots = self.mesh.slots();
        let mut error = 0.0;
        for (n, t) in times.iter_mut().enumerate() {
            let now = slots.get(n as u32, worker);
            // a node first reached this sweep counts as a unit change so an
            // expanding front never reads as converged
            let dt = if t.is_infinite() && now.is_infinite() {
                0.0
            } else if t.is_infinite() || now.is_infinite() {
                1.0
            } else {
                (*t - now).abs()
            };
            error += dt;
            *t = now;
        }
        error
    }
}

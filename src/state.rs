// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::sync::atomic::{AtomicU64, Ordering};

/// Sentinel for "no parent recorded".
const NO_PARENT: u64 = u64::MAX;

/// Per-worker traveltime slots for every mesh vertex, plus optional
/// parent (vertex, cell) records for ray reconstruction.
///
/// Each vertex carries one slot per worker id; a solve scoped to worker
/// `w` reads and writes only the slots of `w`, so concurrent solves with
/// distinct worker ids never interfere. Values are stored as `f64` bit
/// patterns in `AtomicU64`, which keeps the table usable through a shared
/// reference while the mesh topology stays immutable.
#[derive(Debug)]
pub struct SlotTable {
    num_nodes: usize,
    num_workers: usize,
    /// `num_workers * num_nodes` traveltimes, worker-major.
    times: Box<[AtomicU64]>,
    /// Packed `(vertex << 32) | cell` parent records, same layout.
    parents: Box<[AtomicU64]>,
}

impl SlotTable {
    /// Create a table with all slots at +∞ and no parents.
    pub fn new(num_nodes: usize, num_workers: usize) -> Self {
        let len = num_nodes * num_workers;
        let times: Box<[AtomicU64]> = (0..len)
            .map(|_| AtomicU64::new(f64::INFINITY.to_bits()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        let parents: Box<[AtomicU64]> = (0..len)
            .map(|_| AtomicU64::new(NO_PARENT))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        SlotTable {
            num_nodes,
            num_workers,
            times,
            parents,
        }
    }

    /// Number of vertices covered by the table.
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Number of worker slots per vertex.
    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    #[inline]
    fn idx(&self, node: u32, worker: usize) -> usize {
        debug_assert!(worker < self.num_workers);
        worker * self.num_nodes + node as usize
    }

    /// Read the traveltime of `node` in worker slot `worker`.
    pub fn get(&self, node: u32, worker: usize) -> f64 {
        f64::from_bits(self.times[self.idx(node, worker)].load(Ordering::Relaxed))
    }

    /// Overwrite the traveltime of `node` in worker slot `worker`.
    pub fn set(&self, node: u32, worker: usize, val: f64) {
        self.times[self.idx(node, worker)].store(val.to_bits(), Ordering::Relaxed);
    }

    /// Lower the traveltime of `node` to `val` if `val` is smaller.
    /// Returns true if the slot was updated.
    pub fn relax_min(&self, node: u32, worker: usize, val: f64) -> bool {
        let atom = &self.times[self.idx(node, worker)];
        let mut current = atom.load(Ordering::Relaxed);
        loop {
            if f64::from_bits(current) <= val {
                return false;
            }
            match atom.compare_exchange_weak(
                current,
                val.to_bits(),
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Record the vertex and cell that produced the current value of
    /// `node`'s slot.
    pub fn set_parent(&self, node: u32, worker: usize, vertex: u32, cell: u32) {
        let packed = ((vertex as u64) << 32) | cell as u64;
        self.parents[self.idx(node, worker)].store(packed, Ordering::Relaxed);
    }

    /// The `(vertex, cell)` parent of `node`, if one was recorded since the
    /// last reset.
    pub fn parent(&self, node: u32, worker: usize) -> Option<(u32, u32)> {
        let packed = self.parents[self.idx(node, worker)].load(Ordering::Relaxed);
        if packed == NO_PARENT {
            None
        } else {
            Some(((packed >> 32) as u32, packed as u32))
        }
    }

    /// Reset every slot of `worker` to +∞ and clear its parents.
    pub fn reset(&self, worker: usize) {
        let start = worker * self.num_nodes;
        for i in start..start + self.num_nodes {
            self.times[i].store(f64::INFINITY.to_bits(), Ordering::Relaxed);
            self.parents[i].store(NO_PARENT, Ordering::Relaxed);
        }
    }

    /// Snapshot all of `worker`'s traveltimes into a plain vector.
    pub fn snapshot(&self, worker: usize) -> Vec<f64> {
        (0..self.num_nodes)
            .map(|n| self.get(n as u32, worker))
            .collect()
    }
}

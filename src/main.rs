// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use clap::Parser;

use eikonal_umesh::io;
use eikonal_umesh::mesh::Mesh;
use eikonal_umesh::{
    Coord, GradientScheme, MarchSolver, Point2, Point3, SortMetric, SweepSolver, TetMesh, TriMesh,
};

#[derive(Parser)]
#[command(
    name = "eikonal-umesh",
    about = "First-arrival traveltime solver for unstructured meshes"
)]
struct Cli {
    /// Dimensionality (2 or 3)
    #[arg(short = 'd', long)]
    dim: usize,

    /// Vertex coordinates (.npy, N x dim)
    #[arg(long)]
    nodes: Option<PathBuf>,

    /// Cell connectivity (.npy, M x dim+1, integer)
    #[arg(long)]
    cells: Option<PathBuf>,

    /// Generate a structured mesh instead of loading one:
    /// "nx,nz,h" in 2D or "nx,ny,nz,h" in 3D
    #[arg(long, conflicts_with_all = ["nodes", "cells"])]
    generate: Option<String>,

    /// Slowness model: "uniform:<val>", "slowness-file:<path>",
    /// or "velocity-file:<path>"
    #[arg(long, default_value = "uniform:1.0")]
    slowness: String,

    /// Source coordinates "x,z[@t0]" (repeatable); each source is an
    /// independent shot
    #[arg(long, num_args = 1)]
    source: Vec<String>,

    /// Receiver coordinates "x,z" (repeatable)
    #[arg(long, num_args = 1)]
    rx: Vec<String>,

    /// Receiver coordinates file (.npy, N x dim)
    #[arg(long)]
    rx_file: Option<PathBuf>,

    /// Solver: "sweep" (fast sweeping) or "march" (fast marching)
    #[arg(long, default_value = "sweep")]
    method: String,

    /// Fast sweeping convergence tolerance
    #[arg(short = 't', long, default_value = "1e-10")]
    epsilon: f64,

    /// Fast sweeping iteration cap
    #[arg(long, default_value = "20")]
    max_iter: usize,

    /// Sweep ordering metric (1 = Manhattan, 2 = Euclidean)
    #[arg(long, default_value = "2")]
    order: usize,

    /// Seed all nodes within this radius of a single source (0 disables)
    #[arg(long, default_value = "0.0")]
    source_radius: f64,

    /// Gradient estimate for ray tracing: "cell" or "neighborhood"
    #[arg(long, default_value = "neighborhood")]
    gradient: String,

    /// Also trace rays receiver-to-source and write them per shot (.dat)
    #[arg(long)]
    raypaths: bool,

    /// Output path for the node traveltime field; with several shots a
    /// _NNN suffix is inserted before the extension
    #[arg(short = 'o', long, default_value = "times.npy")]
    output: PathBuf,

    /// Worker threads; shots are distributed over them (default: cores)
    #[arg(long)]
    threads: Option<usize>,
}

enum Solver<M: Mesh> {
    Sweep(SweepSolver<M>),
    March(MarchSolver<M>),
}

impl<M: Mesh> Solver<M> {
    fn mesh(&self) -> &M {
        match self {
            Solver::Sweep(s) => s.mesh(),
            Solver::March(s) => s.mesh(),
        }
    }

    fn raytrace(
        &self,
        tx: &[M::Point],
        t0: &[f64],
        rx: &[M::Point],
        worker: usize,
    ) -> eikonal_umesh::Result<Vec<f64>> {
        match self {
            Solver::Sweep(s) => s.raytrace(tx, t0, rx, worker),
            Solver::March(s) => s.raytrace(tx, t0, rx, worker),
        }
    }

    #[allow(clippy::type_complexity)]
    fn raytrace_with_paths(
        &self,
        tx: &[M::Point],
        t0: &[f64],
        rx: &[M::Point],
        worker: usize,
    ) -> eikonal_umesh::Result<(Vec<f64>, Vec<Vec<M::Point>>)> {
        match self {
            Solver::Sweep(s) => s.raytrace_with_paths(tx, t0, rx, worker),
            Solver::March(s) => s.raytrace_with_paths(tx, t0, rx, worker),
        }
    }
}

fn parse_floats(s: &str, expected: usize, what: &str) -> Result<Vec<f64>> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("invalid {}: expected comma-separated floats", what))?;
    if parts.len() != expected {
        bail!(
            "{} has {} components but --dim needs {}",
            what,
            parts.len(),
            expected
        );
    }
    Ok(parts)
}

/// Split "x,z[@t0]" into coordinates and emission time.
fn parse_source(s: &str, dim: usize) -> Result<(Vec<f64>, f64)> {
    let (coords, t0) = match s.split_once('@') {
        Some((c, t)) => (
            c,
            t.trim()
                .parse::<f64>()
                .context("invalid emission time after '@'")?,
        ),
        None => (s, 0.0),
    };
    Ok((parse_floats(coords, dim, "--source")?, t0))
}

fn parse_gradient(s: &str) -> Result<GradientScheme> {
    match s {
        "cell" => Ok(GradientScheme::Cell),
        "neighborhood" => Ok(GradientScheme::Neighborhood),
        other => bail!("unknown --gradient '{}': expected cell|neighborhood", other),
    }
}

fn parse_metric(order: usize) -> Result<SortMetric> {
    match order {
        1 => Ok(SortMetric::L1),
        2 => Ok(SortMetric::L2),
        other => bail!("--order must be 1 or 2, got {}", other),
    }
}

enum SlownessModel {
    Uniform(f64),
    PerCell(Vec<f64>),
}

/// Parse the `--slowness` argument, loading model files as needed.
fn parse_slowness(mode: &str, num_cells: usize) -> Result<SlownessModel> {
    if let Some(val_str) = mode.strip_prefix("uniform:") {
        let val: f64 = val_str.parse().context("invalid uniform slowness value")?;
        return Ok(SlownessModel::Uniform(val));
    }
    if let Some(path_str) = mode.strip_prefix("slowness-file:") {
        let s = io::load_slowness(Path::new(path_str), num_cells)
            .map_err(|e| anyhow::anyhow!("{}", e))?;
        return Ok(SlownessModel::PerCell(s));
    }
    if let Some(path_str) = mode.strip_prefix("velocity-file:") {
        let s = io::load_velocity_as_slowness(Path::new(path_str), num_cells)
            .map_err(|e| anyhow::anyhow!("{}", e))?;
        return Ok(SlownessModel::PerCell(s));
    }
    bail!(
        "unknown --slowness mode: '{}'. Expected 'uniform:<val>', \
         'slowness-file:<path>', or 'velocity-file:<path>'",
        mode
    );
}

/// Insert a shot index before the output extension when several shots are
/// written.
fn shot_path(base: &Path, shot: usize, total: usize) -> PathBuf {
    if total == 1 {
        return base.to_path_buf();
    }
    let stem = base
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("times");
    let ext = base.extension().and_then(|s| s.to_str()).unwrap_or("npy");
    base.with_file_name(format!("{}_{:03}.{}", stem, shot, ext))
}

/// Run every shot, distributing them over the worker threads; each worker
/// uses its own traveltime slot so shots never interfere.
fn run_shots<M: Mesh + 'static>(
    solver: &Solver<M>,
    shots: &[(M::Point, f64)],
    rx: &[M::Point],
    workers: usize,
    want_paths: bool,
    output: &Path,
) -> Result<()> {
    let failures: Mutex<Vec<String>> = Mutex::new(Vec::new());
    let chunk_size = shots.len().div_ceil(workers);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    pool.scope(|s| {
        for (worker, chunk) in shots.chunks(chunk_size).enumerate() {
            let failures = &failures;
            s.spawn(move |_| {
                for (k, (tx, t0)) in chunk.iter().enumerate() {
                    let shot = worker * chunk_size + k;
                    let result = run_one_shot(
                        solver, *tx, *t0, rx, worker, want_paths, output, shot,
                        shots.len(),
                    );
                    if let Err(e) = result {
                        failures
                            .lock()
                            .unwrap()
                            .push(format!("shot {}: {}", shot, e));
                    }
                }
            });
        }
    });

    let failures = failures.into_inner().unwrap();
    if !failures.is_empty() {
        bail!("{}", failures.join("; "));
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_one_shot<M: Mesh>(
    solver: &Solver<M>,
    tx: M::Point,
    t0: f64,
    rx: &[M::Point],
    worker: usize,
    want_paths: bool,
    output: &Path,
    shot: usize,
    total: usize,
) -> Result<()> {
    let times = if want_paths {
        let (times, paths) = solver
            .raytrace_with_paths(&[tx], &[t0], rx, worker)
            .map_err(|e| anyhow::anyhow!("{}", e))?;
        let ray_out = shot_path(output, shot, total).with_extension("rays.dat");
        io::save_raypaths_dat(&paths, &ray_out).map_err(|e| anyhow::anyhow!("{}", e))?;
        times
    } else {
        solver
            .raytrace(&[tx], &[t0], rx, worker)
            .map_err(|e| anyhow::anyhow!("{}", e))?
    };

    let out = shot_path(output, shot, total);
    io::save_times(solver.mesh(), worker, &out).map_err(|e| anyhow::anyhow!("{}", e))?;

    for (r, t) in rx.iter().zip(&times) {
        println!("shot {}  rx {:?}  t {:.9}", shot, r.to_vec(), t);
    }
    Ok(())
}

fn run_2d(cli: &Cli, workers: usize) -> Result<()> {
    let mut mesh = if let Some(gen) = &cli.generate {
        let parts = parse_floats(gen, 3, "--generate")?;
        TriMesh::structured(parts[0] as usize, parts[1] as usize, parts[2], workers)
            .map_err(|e| anyhow::anyhow!("{}", e))?
    } else {
        let nodes_path = cli.nodes.as_ref().context("--nodes or --generate required")?;
        let cells_path = cli.cells.as_ref().context("--cells required with --nodes")?;
        let vertices = io::load_points2(nodes_path).map_err(|e| anyhow::anyhow!("{}", e))?;
        let tris = io::load_triangles(cells_path).map_err(|e| anyhow::anyhow!("{}", e))?;
        TriMesh::new(vertices, tris, workers).map_err(|e| anyhow::anyhow!("{}", e))?
    };

    match parse_slowness(&cli.slowness, mesh.num_cells())? {
        SlownessModel::Uniform(v) => mesh.set_uniform_slowness(v),
        SlownessModel::PerCell(s) => mesh.set_slowness(&s),
    }
    .map_err(|e| anyhow::anyhow!("{}", e))?;

    let mut rx: Vec<Point2> = Vec::new();
    for s in &cli.rx {
        let c = parse_floats(s, 2, "--rx")?;
        rx.push(Point2::new(c[0], c[1]));
    }
    if let Some(path) = &cli.rx_file {
        rx.extend(io::load_points2(path).map_err(|e| anyhow::anyhow!("{}", e))?);
    }

    let mut shots: Vec<(Point2, f64)> = Vec::new();
    for s in &cli.source {
        let (c, t0) = parse_source(s, 2)?;
        shots.push((Point2::new(c[0], c[1]), t0));
    }

    let scheme = parse_gradient(&cli.gradient)?;
    let solver = match cli.method.as_str() {
        "sweep" => {
            let mut s = SweepSolver::new(mesh, cli.epsilon, cli.max_iter)
                .map_err(|e| anyhow::anyhow!("{}", e))?
                .with_source_radius(cli.source_radius)
                .with_gradient_scheme(scheme);
            let (lo, hi) = s.mesh().bounds();
            let corners = [
                Point2::new(lo.x, lo.z),
                Point2::new(hi.x, lo.z),
                Point2::new(hi.x, hi.z),
                Point2::new(lo.x, hi.z),
            ];
            s.init_ordering(&corners, parse_metric(cli.order)?);
            Solver::Sweep(s)
        }
        "march" => Solver::March(
            MarchSolver::new(mesh)
                .with_source_radius(cli.source_radius)
                .with_gradient_scheme(scheme),
        ),
        other => bail!("unknown --method '{}': expected sweep|march", other),
    };

    run_shots(&solver, &shots, &rx, workers, cli.raypaths, &cli.output)
}

fn run_3d(cli: &Cli, workers: usize) -> Result<()> {
    let mut mesh = if let Some(gen) = &cli.generate {
        let parts = parse_floats(gen, 4, "--generate")?;
        TetMesh::structured(
            parts[0] as usize,
            parts[1] as usize,
            parts[2] as usize,
            parts[3],
            workers,
        )
        .map_err(|e| anyhow::anyhow!("{}", e))?
    } else {
        let nodes_path = cli.nodes.as_ref().context("--nodes or --generate required")?;
        let cells_path = cli.cells.as_ref().context("--cells required with --nodes")?;
        let vertices = io::load_points3(nodes_path).map_err(|e| anyhow::anyhow!("{}", e))?;
        let tets = io::load_tetrahedra(cells_path).map_err(|e| anyhow::anyhow!("{}", e))?;
        TetMesh::new(vertices, tets, workers).map_err(|e| anyhow::anyhow!("{}", e))?
    };

    match parse_slowness(&cli.slowness, mesh.num_cells())? {
        SlownessModel::Uniform(v) => mesh.set_uniform_slowness(v),
        SlownessModel::PerCell(s) => mesh.set_slowness(&s),
    }
    .map_err(|e| anyhow::anyhow!("{}", e))?;

    let mut rx: Vec<Point3> = Vec::new();
    for s in &cli.rx {
        let c = parse_floats(s, 3, "--rx")?;
        rx.push(Point3::new(c[0], c[1], c[2]));
    }
    if let Some(path) = &cli.rx_file {
        rx.extend(io::load_points3(path).map_err(|e| anyhow::anyhow!("{}", e))?);
    }

    let mut shots: Vec<(Point3, f64)> = Vec::new();
    for s in &cli.source {
        let (c, t0) = parse_source(s, 3)?;
        shots.push((Point3::new(c[0], c[1], c[2]), t0));
    }

    let scheme = parse_gradient(&cli.gradient)?;
    let solver = match cli.method.as_str() {
        "sweep" => {
            let mut s = SweepSolver::new(mesh, cli.epsilon, cli.max_iter)
                .map_err(|e| anyhow::anyhow!("{}", e))?
                .with_source_radius(cli.source_radius)
                .with_gradient_scheme(scheme);
            let (lo, hi) = s.mesh().bounds();
            let corners = [
                Point3::new(lo.x, lo.y, lo.z),
                Point3::new(hi.x, lo.y, lo.z),
                Point3::new(lo.x, hi.y, lo.z),
                Point3::new(hi.x, hi.y, lo.z),
                Point3::new(lo.x, lo.y, hi.z),
                Point3::new(hi.x, lo.y, hi.z),
                Point3::new(lo.x, hi.y, hi.z),
                Point3::new(hi.x, hi.y, hi.z),
            ];
            s.init_ordering(&corners, parse_metric(cli.order)?);
            Solver::Sweep(s)
        }
        "march" => Solver::March(
            MarchSolver::new(mesh)
                .with_source_radius(cli.source_radius)
                .with_gradient_scheme(scheme),
        ),
        other => bail!("unknown --method '{}': expected sweep|march", other),
    };

    run_shots(&solver, &shots, &rx, workers, cli.raypaths, &cli.output)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.dim != 2 && cli.dim != 3 {
        bail!("--dim must be 2 or 3, got {}", cli.dim);
    }
    if cli.source.is_empty() {
        bail!("at least one --source must be specified");
    }
    if cli.rx.is_empty() && cli.rx_file.is_none() {
        bail!("at least one receiver is required (--rx or --rx-file)");
    }

    let workers = cli
        .threads
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
        .max(1)
        .min(cli.source.len().max(1));

    match cli.dim {
        2 => run_2d(&cli, workers),
        3 => run_3d(&cli, workers),
        _ => unreachable!(),
    }
}
